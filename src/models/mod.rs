mod draft;
mod preset;
mod run;

pub use draft::DraftPayload;
pub use preset::TopicPreset;
pub use run::{RunRecord, RunStatus, TriggerRequest, TriggerResponse};
