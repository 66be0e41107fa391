use std::sync::Arc;

use super::forms::{optional_feeds, split_topics, EditableForm, Mutation, MutationState};
use crate::api::{ApiResult, PipelineApi};
use crate::error::ValidationErrors;
use crate::models::TopicPreset;
use crate::query::{keys, Invalidator, QueryClient, Subscription};

const MIN_LEN: usize = 3;
const EMPTY_STATE: &str = "No presets yet";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetForm {
    pub name: String,
    pub topics: String,
    pub rss_feeds: String,
}

impl Default for PresetForm {
    fn default() -> Self {
        Self {
            name: "Weekly AI".to_string(),
            topics: "AI, LLMs, Research".to_string(),
            rss_feeds: String::new(),
        }
    }
}

impl PresetForm {
    pub fn to_preset(&self) -> Result<TopicPreset, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.check_min_len("name", "Name", &self.name, MIN_LEN);
        errors.check_min_len("topics", "Topics", &self.topics, MIN_LEN);

        let topics = split_topics(&self.topics);
        if topics.is_empty() && errors.for_field("topics").is_none() {
            errors.push("topics", "Topics must include at least one topic");
        }
        errors.into_result()?;

        Ok(TopicPreset {
            id: None,
            name: self.name.trim().to_string(),
            topics,
            rss_feeds: optional_feeds(&self.rss_feeds),
            updated_at: None,
        })
    }
}

impl EditableForm for PresetForm {
    fn labels(&self) -> &'static [&'static str] {
        &["Preset name", "Topics (comma separated)", "RSS feeds"]
    }

    fn field(&self, index: usize) -> &str {
        match index {
            0 => &self.name,
            1 => &self.topics,
            _ => &self.rss_feeds,
        }
    }

    fn field_mut(&mut self, index: usize) -> &mut String {
        match index {
            0 => &mut self.name,
            1 => &mut self.topics,
            _ => &mut self.rss_feeds,
        }
    }
}

/// One line per preset, or an explicit empty state.
pub fn format_presets(presets: &[TopicPreset]) -> String {
    if presets.is_empty() {
        return EMPTY_STATE.to_string();
    }
    presets
        .iter()
        .map(TopicPreset::summary_line)
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct TopicPresetManager {
    api: Arc<dyn PipelineApi>,
    invalidator: Invalidator,
    presets: Subscription<Vec<TopicPreset>>,
    pub form: PresetForm,
    pub errors: ValidationErrors,
    mutation: Mutation<TopicPreset>,
}

impl TopicPresetManager {
    pub fn new(client: &QueryClient, api: Arc<dyn PipelineApi>, invalidator: Invalidator) -> Self {
        let fetch_api = Arc::clone(&api);
        let presets = client.subscribe(
            keys::TOPICS,
            move || {
                let api = Arc::clone(&fetch_api);
                async move { api.get_topics().await }
            },
            None,
        );
        Self {
            api,
            invalidator,
            presets,
            form: PresetForm::default(),
            errors: ValidationErrors::default(),
            mutation: Mutation::new(),
        }
    }

    pub fn state(&self) -> &MutationState {
        self.mutation.state()
    }

    pub fn presets(&self) -> &Subscription<Vec<TopicPreset>> {
        &self.presets
    }

    /// Text for the preset list pane.
    pub fn listing(&self) -> String {
        let state = self.presets.state();
        match state.data {
            Some(presets) => format_presets(&presets),
            None if state.is_fetching => "Loading...".to_string(),
            None => EMPTY_STATE.to_string(),
        }
    }

    pub fn submit(&mut self) -> bool {
        if self.mutation.is_pending() {
            return false;
        }
        match self.form.to_preset() {
            Ok(preset) => {
                self.errors = ValidationErrors::default();
                let api = Arc::clone(&self.api);
                self.mutation
                    .start(async move { api.upsert_topic(&preset).await });
                true
            }
            Err(errors) => {
                self.errors = errors;
                false
            }
        }
    }

    pub fn poll_result(&mut self) {
        if let Some(outcome) = self.mutation.try_finish() {
            self.apply(outcome);
        }
    }

    fn apply(&mut self, outcome: ApiResult<TopicPreset>) {
        match outcome {
            Ok(saved) => {
                tracing::info!("Saved preset {}", saved.name);
                self.invalidator.invalidate(keys::TOPICS);
                self.form = PresetForm::default();
            }
            Err(e) => {
                tracing::error!("Failed to save preset: {}", e);
            }
        }
    }

    #[cfg(test)]
    pub async fn settle(&mut self) {
        if let Some(outcome) = self.mutation.finish().await {
            self.apply(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::api::fake::FakeApi;
    use crate::error::TransportError;
    use crate::query::invalidation_channel;

    #[test]
    fn formats_presets_one_per_line() {
        let presets = vec![
            TopicPreset {
                id: Some("1".to_string()),
                name: "Weekly AI".to_string(),
                topics: vec!["AI".to_string(), "LLMs".to_string()],
                rss_feeds: None,
                updated_at: None,
            },
            TopicPreset {
                id: None,
                name: "Climate".to_string(),
                topics: vec!["Energy".to_string()],
                rss_feeds: None,
                updated_at: None,
            },
        ];
        assert_eq!(format_presets(&presets), "Weekly AI: AI, LLMs\nClimate: Energy");
        assert_eq!(format_presets(&[]), "No presets yet");
    }

    #[test]
    fn validates_name_and_topics() {
        let form = PresetForm {
            name: "AI".to_string(),
            topics: "ML".to_string(),
            rss_feeds: "https://a.com/rss https://b.com/rss".to_string(),
        };
        let errors = form.to_preset().unwrap_err();
        assert!(errors.for_field("name").is_some());
        assert!(errors.for_field("topics").is_some());

        let preset = PresetForm {
            rss_feeds: "https://a.com/rss\nhttps://b.com/rss".to_string(),
            ..PresetForm::default()
        }
        .to_preset()
        .unwrap();
        assert_eq!(preset.topics, vec!["AI", "LLMs", "Research"]);
        assert_eq!(preset.rss_feeds.map(|f| f.len()), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn upserting_twice_keeps_one_preset() {
        let client = QueryClient::new();
        let (invalidator, rx) = invalidation_channel();
        let listener = client.listen(rx);
        let api = Arc::new(FakeApi::default());
        let mut manager = TopicPresetManager::new(&client, api.clone(), invalidator);

        manager.presets().refetch().await.unwrap();
        assert_eq!(manager.listing(), "No presets yet");

        for _ in 0..2 {
            manager.form = PresetForm::default();
            assert!(manager.submit());
            manager.settle().await;
            assert_eq!(manager.state(), &MutationState::Succeeded);
        }
        tokio::time::sleep(Duration::from_millis(1)).await;

        let presets = manager.presets().data().unwrap();
        assert_eq!(
            presets.iter().filter(|p| p.name == "Weekly AI").count(),
            1
        );
        assert_eq!(manager.listing(), "Weekly AI: AI, LLMs, Research");
        // initial fetch plus one per successful save
        assert_eq!(api.topics_calls.load(Ordering::SeqCst), 3);

        listener.abort();
    }

    #[tokio::test]
    async fn failed_save_keeps_form() {
        let client = QueryClient::new();
        let (invalidator, mut rx) = invalidation_channel();
        let api = Arc::new(FakeApi::default());
        let mut manager = TopicPresetManager::new(&client, api.clone(), invalidator);

        api.fail(TransportError::status(400, "topics list cannot be empty"));
        manager.form.name = "Climate desk".to_string();
        assert!(manager.submit());
        manager.settle().await;

        assert_eq!(
            manager.state(),
            &MutationState::Failed("topics list cannot be empty".to_string())
        );
        assert_eq!(manager.form.name, "Climate desk");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn listing_shows_loading_until_first_fetch() {
        let client = QueryClient::new();
        let (invalidator, _rx) = invalidation_channel();
        let api = Arc::new(FakeApi::with_delay(Duration::from_millis(50)));
        let manager = TopicPresetManager::new(&client, api, invalidator);

        assert_eq!(manager.listing(), "Loading...");
        manager.presets().refetch().await.unwrap();
        assert_eq!(manager.listing(), "No presets yet");
    }
}
