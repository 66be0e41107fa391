//! Dashboard components on top of the query cache.

pub mod draft;
pub mod forms;
pub mod schedule;
pub mod status;
pub mod topics;
pub mod trigger;

pub use draft::{ClipboardSink, DraftPreview};
pub use forms::{EditableForm, MutationState};
pub use schedule::{ScheduleCard, ScheduleNoteStore};
pub use status::{history_rows, project, HistoryRow, StatusProjection};
pub use topics::TopicPresetManager;
pub use trigger::TriggerCoordinator;
