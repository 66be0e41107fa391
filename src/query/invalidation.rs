use tokio::sync::mpsc;

/// Publishing side of the invalidation channel, held by mutations.
#[derive(Clone, Debug)]
pub struct Invalidator {
    tx: mpsc::UnboundedSender<String>,
}

impl Invalidator {
    pub fn invalidate(&self, key: &str) {
        if self.tx.send(key.to_string()).is_err() {
            tracing::warn!(key, "invalidation dropped, cache listener is gone");
        }
    }
}

/// Pair the receiver with [`super::QueryClient::listen`].
pub fn invalidation_channel() -> (Invalidator, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Invalidator { tx }, rx)
}
