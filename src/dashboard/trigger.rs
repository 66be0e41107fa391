use std::sync::Arc;

use super::forms::{
    optional_feeds, optional_text, split_topics, EditableForm, Mutation, MutationState,
};
use crate::api::{ApiResult, PipelineApi};
use crate::error::ValidationErrors;
use crate::models::{TriggerRequest, TriggerResponse};
use crate::query::{keys, Invalidator};

const MIN_LEN: usize = 3;

/// Raw manual-trigger form text as the operator typed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerForm {
    pub topics: String,
    pub subject: String,
    pub title: String,
    pub preheader: String,
    pub hero_query: String,
    pub rss_feeds: String,
}

impl Default for TriggerForm {
    fn default() -> Self {
        Self {
            topics: "AI, Startups, Research".to_string(),
            subject: "Weekly Brief: Fresh Signals".to_string(),
            title: "Weekly Brief".to_string(),
            preheader: "Hand-picked stories generated in minutes".to_string(),
            hero_query: String::new(),
            rss_feeds: String::new(),
        }
    }
}

impl TriggerForm {
    pub fn to_request(&self) -> Result<TriggerRequest, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.check_min_len("topics", "Topics", &self.topics, MIN_LEN);
        errors.check_min_len("subject", "Subject", &self.subject, MIN_LEN);
        errors.check_min_len("title", "Title", &self.title, MIN_LEN);

        let topics = split_topics(&self.topics);
        if topics.is_empty() && errors.for_field("topics").is_none() {
            errors.push("topics", "Topics must include at least one topic");
        }
        errors.into_result()?;

        Ok(TriggerRequest {
            topics,
            title: self.title.clone(),
            subject: self.subject.clone(),
            preheader: optional_text(&self.preheader),
            hero_query: optional_text(&self.hero_query),
            rss_feeds: optional_feeds(&self.rss_feeds),
        })
    }
}

impl EditableForm for TriggerForm {
    fn labels(&self) -> &'static [&'static str] {
        &["Topics", "Subject", "Title", "Preheader", "Hero image hint", "RSS feeds"]
    }

    fn field(&self, index: usize) -> &str {
        match index {
            0 => &self.topics,
            1 => &self.subject,
            2 => &self.title,
            3 => &self.preheader,
            4 => &self.hero_query,
            _ => &self.rss_feeds,
        }
    }

    fn field_mut(&mut self, index: usize) -> &mut String {
        match index {
            0 => &mut self.topics,
            1 => &mut self.subject,
            2 => &mut self.title,
            3 => &mut self.preheader,
            4 => &mut self.hero_query,
            _ => &mut self.rss_feeds,
        }
    }
}

/// Manual trigger: validates the form, posts the run, resyncs runs and draft.
pub struct TriggerCoordinator {
    api: Arc<dyn PipelineApi>,
    invalidator: Invalidator,
    pub form: TriggerForm,
    pub errors: ValidationErrors,
    pub last_run_id: Option<String>,
    mutation: Mutation<TriggerResponse>,
}

impl TriggerCoordinator {
    pub fn new(api: Arc<dyn PipelineApi>, invalidator: Invalidator) -> Self {
        Self {
            api,
            invalidator,
            form: TriggerForm::default(),
            errors: ValidationErrors::default(),
            last_run_id: None,
            mutation: Mutation::new(),
        }
    }

    pub fn state(&self) -> &MutationState {
        self.mutation.state()
    }

    /// Start a submission. Returns false if the form is invalid or a
    /// submission is already running; invalid forms never reach the network.
    pub fn submit(&mut self) -> bool {
        if self.mutation.is_pending() {
            return false;
        }
        match self.form.to_request() {
            Ok(request) => {
                self.errors = ValidationErrors::default();
                let api = Arc::clone(&self.api);
                self.mutation
                    .start(async move { api.trigger_run(&request).await });
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

    fn apply(&mut self, outcome: ApiResult<TriggerResponse>) {
        match outcome {
            Ok(response) => {
                tracing::info!("Run {} queued ({})", response.run_id, response.status);
                self.invalidator.invalidate(keys::RUNS);
                self.invalidator.invalidate(keys::DRAFT);
                self.form = TriggerForm::default();
                self.last_run_id = Some(response.run_id);
            }
            Err(e) => {
                tracing::error!("Failed to trigger run: {}", e);
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
    use super::*;
    use crate::api::fake::FakeApi;
    use crate::error::TransportError;
    use crate::query::invalidation_channel;

    fn coordinator() -> (
        TriggerCoordinator,
        Arc<FakeApi>,
        tokio::sync::mpsc::UnboundedReceiver<String>,
    ) {
        let api = Arc::new(FakeApi::default());
        let (invalidator, rx) = invalidation_channel();
        (TriggerCoordinator::new(api.clone(), invalidator), api, rx)
    }

    #[test]
    fn transforms_form_into_request() {
        let form = TriggerForm {
            topics: "AI, Startups, Research, ".to_string(),
            rss_feeds: "https://a.com/rss, https://b.com/rss".to_string(),
            hero_query: "  ".to_string(),
            ..TriggerForm::default()
        };
        let request = form.to_request().unwrap();
        assert_eq!(request.topics, vec!["AI", "Startups", "Research"]);
        assert_eq!(
            request.rss_feeds,
            Some(vec![
                "https://a.com/rss".to_string(),
                "https://b.com/rss".to_string()
            ])
        );
        assert!(request.hero_query.is_none());
        assert_eq!(
            request.preheader.as_deref(),
            Some("Hand-picked stories generated in minutes")
        );
    }

    #[test]
    fn short_fields_are_reported_per_field() {
        let form = TriggerForm {
            topics: "AI".to_string(),
            subject: "Hi".to_string(),
            title: String::new(),
            ..TriggerForm::default()
        };
        let errors = form.to_request().unwrap_err();
        assert!(errors.for_field("topics").is_some());
        assert!(errors.for_field("subject").is_some());
        assert!(errors.for_field("title").is_some());

        let only_commas = TriggerForm {
            topics: " , , ".to_string(),
            ..TriggerForm::default()
        };
        assert_eq!(
            only_commas.to_request().unwrap_err().for_field("topics"),
            Some("Topics must include at least one topic")
        );
    }

    #[tokio::test]
    async fn invalid_form_never_reaches_network() {
        let (mut coordinator, api, mut rx) = coordinator();
        coordinator.form.title = "x".to_string();

        assert!(!coordinator.submit());
        assert!(coordinator.errors.for_field("title").is_some());
        assert_eq!(coordinator.state(), &MutationState::Idle);
        assert!(api.triggers.lock().unwrap().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn success_invalidates_runs_and_draft_and_resets() {
        let (mut coordinator, api, mut rx) = coordinator();
        coordinator.form.topics = "Climate, Energy".to_string();

        assert!(coordinator.submit());
        assert_eq!(coordinator.state(), &MutationState::Pending);
        assert!(!coordinator.submit());
        coordinator.settle().await;

        assert_eq!(coordinator.state(), &MutationState::Succeeded);
        assert_eq!(coordinator.form, TriggerForm::default());
        assert_eq!(coordinator.last_run_id.as_deref(), Some("run-1"));
        assert_eq!(api.triggers.lock().unwrap()[0].topics, vec!["Climate", "Energy"]);
        assert_eq!(rx.try_recv().unwrap(), keys::RUNS);
        assert_eq!(rx.try_recv().unwrap(), keys::DRAFT);
    }

    #[tokio::test]
    async fn failure_keeps_form_and_surfaces_message() {
        let (mut coordinator, api, mut rx) = coordinator();
        api.fail(TransportError::status(422, "topics list cannot be empty"));
        coordinator.form.subject = "Custom subject".to_string();

        assert!(coordinator.submit());
        coordinator.settle().await;

        assert_eq!(
            coordinator.state(),
            &MutationState::Failed("topics list cannot be empty".to_string())
        );
        assert_eq!(coordinator.form.subject, "Custom subject");
        assert!(rx.try_recv().is_err());
    }
}
