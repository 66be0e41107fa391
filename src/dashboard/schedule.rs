use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::forms::EditableForm;
use crate::db::Repository;
use crate::error::Result;

pub const CRON_KEY: &str = "newsletter-cron";
pub const TIMEZONE_KEY: &str = "newsletter-timezone";
pub const DEFAULT_CRON: &str = "0 15 * * 1";
pub const DEFAULT_TIMEZONE: &str = "UTC";

const SAVED_MESSAGE: &str =
    "Saved locally. Transcribe this schedule into the backend scheduler to automate runs.";
const MESSAGE_TTL: Duration = Duration::from_millis(4000);

/// Advisory schedule for a human to copy into the real scheduler.
/// The cron text is not validated and nothing executes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleNote {
    pub cron: String,
    pub timezone: String,
}

impl Default for ScheduleNote {
    fn default() -> Self {
        Self {
            cron: DEFAULT_CRON.to_string(),
            timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }
}

impl EditableForm for ScheduleNote {
    fn labels(&self) -> &'static [&'static str] {
        &["Cron expression", "Timezone"]
    }

    fn field(&self, index: usize) -> &str {
        match index {
            0 => &self.cron,
            _ => &self.timezone,
        }
    }

    fn field_mut(&mut self, index: usize) -> &mut String {
        match index {
            0 => &mut self.cron,
            _ => &mut self.timezone,
        }
    }
}

pub struct ScheduleNoteStore {
    repository: Arc<Repository>,
}

impl ScheduleNoteStore {
    pub fn new(repository: Arc<Repository>) -> Self {
        Self { repository }
    }

    pub async fn load(&self) -> Result<ScheduleNote> {
        let cron = self.repository.get_setting(CRON_KEY).await?;
        let timezone = self.repository.get_setting(TIMEZONE_KEY).await?;
        Ok(ScheduleNote {
            cron: cron.unwrap_or_else(|| DEFAULT_CRON.to_string()),
            timezone: timezone.unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
        })
    }

    /// Persist both values and return the operator-facing confirmation.
    pub async fn save(&self, cron: &str, timezone: &str) -> Result<String> {
        self.repository
            .set_settings(vec![
                (CRON_KEY.to_string(), cron.to_string()),
                (TIMEZONE_KEY.to_string(), timezone.to_string()),
            ])
            .await?;
        Ok(SAVED_MESSAGE.to_string())
    }
}

/// Schedule pane: editable note plus a short-lived save message.
pub struct ScheduleCard {
    store: ScheduleNoteStore,
    pub note: ScheduleNote,
    message: Option<(String, Instant)>,
}

impl ScheduleCard {
    pub async fn load(store: ScheduleNoteStore) -> Result<Self> {
        let note = store.load().await?;
        Ok(Self {
            store,
            note,
            message: None,
        })
    }

    pub async fn save(&mut self) -> Result<()> {
        let message = self.store.save(&self.note.cron, &self.note.timezone).await?;
        tracing::info!("Saved schedule note {} ({})", self.note.cron, self.note.timezone);
        self.message = Some((message, Instant::now() + MESSAGE_TTL));
        Ok(())
    }

    pub fn message(&self) -> Option<&str> {
        self.message
            .as_ref()
            .filter(|(_, until)| Instant::now() < *until)
            .map(|(message, _)| message.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_at(path: &std::path::Path) -> ScheduleNoteStore {
        let repository = Repository::new(path.to_str().unwrap()).await.unwrap();
        ScheduleNoteStore::new(Arc::new(repository))
    }

    #[tokio::test]
    async fn defaults_when_nothing_saved() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(&dir.path().join("console.db")).await;
        let note = store.load().await.unwrap();
        assert_eq!(note.cron, "0 15 * * 1");
        assert_eq!(note.timezone, "UTC");
    }

    #[test]
    fn save_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("console.db");

        tokio_test::block_on(async {
            let store = store_at(&path).await;
            let message = store.save("0 9 * * 2", "America/New_York").await.unwrap();
            assert!(message.contains("backend scheduler"));
        });

        // Fresh connection, as after a restart
        let note = tokio_test::block_on(async { store_at(&path).await.load().await.unwrap() });
        assert_eq!(
            note,
            ScheduleNote {
                cron: "0 9 * * 2".to_string(),
                timezone: "America/New_York".to_string(),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn save_message_is_transient() {
        let repository = Arc::new(Repository::in_memory().await.unwrap());
        let mut card = ScheduleCard::load(ScheduleNoteStore::new(repository))
            .await
            .unwrap();
        assert!(card.message().is_none());

        card.note.cron = "not really cron".to_string();
        card.save().await.unwrap();
        assert!(card.message().is_some());

        tokio::time::advance(Duration::from_millis(4001)).await;
        assert!(card.message().is_none());
    }
}
