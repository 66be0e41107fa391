use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::api::PipelineApi;
use crate::error::{AppError, Result};
use crate::models::DraftPayload;
use crate::query::{keys, QueryClient, QueryState, Subscription};

/// How long the "Copied" acknowledgment stays up.
pub const COPY_ACK: Duration = Duration::from_millis(2000);

/// Destination for the copy-HTML action.
pub trait OutputSink {
    fn copy_text(&mut self, text: &str) -> Result<()>;
}

/// System clipboard. The handle is kept for the app lifetime so clipboard
/// managers on X11/Wayland have time to take ownership of the contents.
#[derive(Default)]
pub struct ClipboardSink {
    clipboard: Option<arboard::Clipboard>,
}

impl OutputSink for ClipboardSink {
    fn copy_text(&mut self, text: &str) -> Result<()> {
        if self.clipboard.is_none() {
            let clipboard =
                arboard::Clipboard::new().map_err(|e| AppError::Clipboard(e.to_string()))?;
            self.clipboard = Some(clipboard);
        }
        match self.clipboard.as_mut() {
            Some(clipboard) => clipboard
                .set_text(text.to_string())
                .map_err(|e| AppError::Clipboard(e.to_string())),
            None => Err(AppError::Clipboard("clipboard unavailable".to_string())),
        }
    }
}

pub struct DraftPreview {
    draft: Subscription<Option<DraftPayload>>,
    copied_until: Option<Instant>,
}

impl DraftPreview {
    pub fn new(client: &QueryClient, api: Arc<dyn PipelineApi>, poll_interval: Duration) -> Self {
        let draft = client.subscribe(
            keys::DRAFT,
            move || {
                let api = Arc::clone(&api);
                async move { api.get_latest_draft().await }
            },
            Some(poll_interval),
        );
        Self {
            draft,
            copied_until: None,
        }
    }

    pub fn state(&self) -> QueryState<Option<DraftPayload>> {
        self.draft.state()
    }

    pub fn payload(&self) -> Option<Arc<Option<DraftPayload>>> {
        self.draft.data()
    }

    /// Manual refresh through the coalesced refetch.
    pub fn refresh(&self) {
        self.draft.refresh();
    }

    pub fn can_copy(&self) -> bool {
        self.payload()
            .is_some_and(|draft| (*draft).as_ref().is_some_and(DraftPayload::has_html))
    }

    /// Copy the draft HTML. Returns false when there is nothing to copy.
    pub fn copy_html(&mut self, sink: &mut dyn OutputSink) -> Result<bool> {
        let Some(draft) = self.payload() else {
            return Ok(false);
        };
        let Some(payload) = (*draft).as_ref().filter(|d| d.has_html()) else {
            return Ok(false);
        };

        sink.copy_text(&payload.html)?;
        // A repeat copy does not push the deadline out
        if !self.is_copied() {
            self.copied_until = Some(Instant::now() + COPY_ACK);
        }
        Ok(true)
    }

    pub fn is_copied(&self) -> bool {
        self.copied_until
            .is_some_and(|deadline| Instant::now() < deadline)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::api::fake::FakeApi;

    #[derive(Default)]
    struct RecordingSink {
        copied: Vec<String>,
    }

    impl OutputSink for RecordingSink {
        fn copy_text(&mut self, text: &str) -> Result<()> {
            self.copied.push(text.to_string());
            Ok(())
        }
    }

    fn draft(html: &str) -> DraftPayload {
        DraftPayload {
            run_id: "r1".to_string(),
            hero: None,
            sections: vec![],
            html: html.to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn copy_enabled_only_with_html() {
        let client = QueryClient::new();
        let api = Arc::new(FakeApi::default());
        let mut preview = DraftPreview::new(&client, api.clone(), Duration::from_secs(20));
        let mut sink = RecordingSink::default();

        client.refetch::<Option<DraftPayload>>(keys::DRAFT).await.unwrap();
        assert!(!preview.can_copy());
        assert!(!preview.copy_html(&mut sink).unwrap());

        *api.draft.lock().unwrap() = Some(draft(""));
        client.refetch::<Option<DraftPayload>>(keys::DRAFT).await.unwrap();
        assert!(!preview.can_copy());

        *api.draft.lock().unwrap() = Some(draft("<p>hi</p>"));
        client.refetch::<Option<DraftPayload>>(keys::DRAFT).await.unwrap();
        assert!(preview.can_copy());
        assert!(preview.copy_html(&mut sink).unwrap());
        assert_eq!(sink.copied, vec!["<p>hi</p>"]);
        assert!(preview.is_copied());
    }

    #[tokio::test(start_paused = true)]
    async fn acknowledgment_clears_after_two_seconds() {
        let client = QueryClient::new();
        let api = Arc::new(FakeApi::default());
        *api.draft.lock().unwrap() = Some(draft("<p>hi</p>"));
        let mut preview = DraftPreview::new(&client, api.clone(), Duration::from_secs(20));
        let mut sink = RecordingSink::default();
        client.refetch::<Option<DraftPayload>>(keys::DRAFT).await.unwrap();

        preview.copy_html(&mut sink).unwrap();
        tokio::time::advance(Duration::from_millis(1500)).await;
        preview.copy_html(&mut sink).unwrap();
        preview.refresh();
        assert!(preview.is_copied());

        tokio::time::advance(Duration::from_millis(501)).await;
        assert!(!preview.is_copied());
        assert_eq!(sink.copied.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn polls_on_its_interval() {
        let client = QueryClient::new();
        let api = Arc::new(FakeApi::default());
        let preview = DraftPreview::new(&client, api.clone(), Duration::from_secs(20));
        client.refetch::<Option<DraftPayload>>(keys::DRAFT).await.unwrap();

        tokio::time::sleep(Duration::from_millis(40_100)).await;
        assert_eq!(api.draft_calls.load(Ordering::SeqCst), 3);

        drop(preview);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(api.draft_calls.load(Ordering::SeqCst), 3);
    }
}
