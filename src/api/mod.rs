mod client;

pub use client::{HttpPipelineApi, TransportClient};

use async_trait::async_trait;

use crate::error::TransportError;
use crate::models::{DraftPayload, RunRecord, TopicPreset, TriggerRequest, TriggerResponse};

pub type ApiResult<T> = std::result::Result<T, TransportError>;

/// Backend endpoints consumed by the dashboard.
#[async_trait]
pub trait PipelineApi: Send + Sync {
    async fn get_topics(&self) -> ApiResult<Vec<TopicPreset>>;

    /// Create or update a preset; the backend decides by id/name.
    async fn upsert_topic(&self, preset: &TopicPreset) -> ApiResult<TopicPreset>;

    async fn get_runs(&self) -> ApiResult<Vec<RunRecord>>;

    async fn trigger_run(&self, request: &TriggerRequest) -> ApiResult<TriggerResponse>;

    async fn get_latest_draft(&self) -> ApiResult<Option<DraftPayload>>;
}

#[cfg(test)]
pub mod fake {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::models::RunStatus;

    /// In-memory backend: upserts presets by name, records triggers.
    #[derive(Default)]
    pub struct FakeApi {
        pub presets: Mutex<Vec<TopicPreset>>,
        pub runs: Mutex<Vec<RunRecord>>,
        pub draft: Mutex<Option<DraftPayload>>,
        pub triggers: Mutex<Vec<TriggerRequest>>,
        pub fail_with: Mutex<Option<TransportError>>,
        pub delay: Option<Duration>,
        pub runs_calls: AtomicUsize,
        pub draft_calls: AtomicUsize,
        pub topics_calls: AtomicUsize,
    }

    impl FakeApi {
        pub fn with_delay(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Default::default()
            }
        }

        pub fn fail(&self, err: TransportError) {
            *self.fail_with.lock().unwrap() = Some(err);
        }

        pub fn recover(&self) {
            *self.fail_with.lock().unwrap() = None;
        }

        async fn gate(&self) -> ApiResult<()> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match self.fail_with.lock().unwrap().clone() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl PipelineApi for FakeApi {
        async fn get_topics(&self) -> ApiResult<Vec<TopicPreset>> {
            self.topics_calls.fetch_add(1, Ordering::SeqCst);
            self.gate().await?;
            Ok(self.presets.lock().unwrap().clone())
        }

        async fn upsert_topic(&self, preset: &TopicPreset) -> ApiResult<TopicPreset> {
            self.gate().await?;
            let mut presets = self.presets.lock().unwrap();
            let mut saved = preset.clone();
            if let Some(existing) = presets.iter_mut().find(|p| p.name == preset.name) {
                saved.id = existing.id.clone();
                *existing = saved.clone();
            } else {
                saved.id = Some(format!("preset-{}", presets.len() + 1));
                presets.push(saved.clone());
            }
            Ok(saved)
        }

        async fn get_runs(&self) -> ApiResult<Vec<RunRecord>> {
            self.runs_calls.fetch_add(1, Ordering::SeqCst);
            self.gate().await?;
            Ok(self.runs.lock().unwrap().clone())
        }

        async fn trigger_run(&self, request: &TriggerRequest) -> ApiResult<TriggerResponse> {
            self.gate().await?;
            let mut triggers = self.triggers.lock().unwrap();
            triggers.push(request.clone());
            let run_id = format!("run-{}", triggers.len());
            self.runs.lock().unwrap().insert(
                0,
                RunRecord {
                    id: run_id.clone(),
                    status: RunStatus::Queued,
                    message: None,
                    created_at: None,
                    topics: Some(request.topics.clone()),
                },
            );
            Ok(TriggerResponse {
                run_id,
                status: RunStatus::Queued,
            })
        }

        async fn get_latest_draft(&self) -> ApiResult<Option<DraftPayload>> {
            self.draft_calls.fetch_add(1, Ordering::SeqCst);
            self.gate().await?;
            Ok(self.draft.lock().unwrap().clone())
        }
    }
}
