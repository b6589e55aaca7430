//! Side-effect delivery for handler results that need blocking I/O.
//!
//! Called from the daemon loop after a handler returns a
//! [`SideEffect`](super::handler::SideEffect). On failure the daemon
//! loop replaces the optimistic ok response with an error.

use std::sync::Arc;

use crate::history::ClipboardContent;
use crate::resolver::ClipboardProvider;
use crate::resolver::ResolverError;

/// Write content to the OS clipboard on the blocking pool.
pub async fn deliver_clipboard(
    provider: &Arc<dyn ClipboardProvider>,
    content: ClipboardContent,
) -> Result<(), ResolverError> {
    let provider = Arc::clone(provider);
    tokio::task::spawn_blocking(move || provider.write(&content))
        .await
        .map_err(|e| ResolverError::Clipboard(format!("write task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::clipboard::fake::FakeClipboard;

    #[tokio::test]
    async fn writes_through_provider() {
        let fake = Arc::new(FakeClipboard::new());
        let provider: Arc<dyn ClipboardProvider> = fake.clone();
        deliver_clipboard(&provider, ClipboardContent::Text("hi".into()))
            .await
            .unwrap();
        assert_eq!(fake.writes(), vec![ClipboardContent::Text("hi".into())]);
    }
}
