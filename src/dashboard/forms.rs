use std::fmt::Display;
use std::future::Future;
use std::sync::OnceLock;

use regex::Regex;
use tokio::sync::mpsc;

use crate::error::TransportError;

static FEED_SEPARATOR: OnceLock<Regex> = OnceLock::new();

/// Topics are comma separated only; pieces are trimmed and blanks dropped.
pub fn split_topics(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Feeds may be separated by commas or any run of whitespace.
pub fn split_feeds(raw: &str) -> Vec<String> {
    let separator = FEED_SEPARATOR.get_or_init(|| Regex::new(r"[\s,]+").expect("valid regex"));
    separator
        .split(raw)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Blank optional text fields are left out of requests.
pub fn optional_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn optional_feeds(raw: &str) -> Option<Vec<String>> {
    let feeds = split_feeds(raw);
    (!feeds.is_empty()).then_some(feeds)
}

/// Text form the terminal UI can walk field by field.
pub trait EditableForm {
    fn labels(&self) -> &'static [&'static str];
    fn field(&self, index: usize) -> &str;
    fn field_mut(&mut self, index: usize) -> &mut String;

    fn len(&self) -> usize {
        self.labels().len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MutationState {
    #[default]
    Idle,
    Pending,
    Succeeded,
    Failed(String),
}

/// One background write at a time, with its outcome handed back over a channel.
pub struct Mutation<T, E = TransportError> {
    state: MutationState,
    tx: mpsc::Sender<Result<T, E>>,
    rx: mpsc::Receiver<Result<T, E>>,
}

impl<T, E> Mutation<T, E>
where
    T: Send + 'static,
    E: Display + Send + 'static,
{
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self {
            state: MutationState::Idle,
            tx,
            rx,
        }
    }

    pub fn state(&self) -> &MutationState {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        self.state == MutationState::Pending
    }

    pub fn start<Fut>(&mut self, fut: Fut)
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.state = MutationState::Pending;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(fut.await).await;
        });
    }

    /// Non-blocking check for a finished write.
    pub fn try_finish(&mut self) -> Option<Result<T, E>> {
        let outcome = self.rx.try_recv().ok()?;
        self.record(&outcome);
        Some(outcome)
    }

    /// Wait for the pending write, if any.
    pub async fn finish(&mut self) -> Option<Result<T, E>> {
        if !self.is_pending() {
            return None;
        }
        let outcome = self.rx.recv().await?;
        self.record(&outcome);
        Some(outcome)
    }

    fn record(&mut self, outcome: &Result<T, E>) {
        self.state = match outcome {
            Ok(_) => MutationState::Succeeded,
            Err(e) => MutationState::Failed(e.to_string()),
        };
    }
}

impl<T, E> Default for Mutation<T, E>
where
    T: Send + 'static,
    E: Display + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
