//! Clipboard poller: timed sampling of the OS clipboard.
//!
//! The OS clipboard is treated as pull-only. Every tick the poller reads
//! the provider's change counter; when it moves, content is extracted
//! (text first, then image) and handed to the store owner loop as a
//! [`ClipboardEntry`] over an mpsc channel. The poller never touches
//! the store directly, which keeps the store single-writer.
//!
//! Extraction failures are silent no-ops: an unsupported format costs
//! one ignored change, never a stalled loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::history::{ClipboardContent, ClipboardEntry};
use crate::resolver::ClipboardProvider;

/// Default sampling interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Outcome of one tick.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Sample {
    /// Counter value to remember for the next tick.
    pub counter: Option<u64>,
    /// Content extracted on a change, if any representation was usable.
    pub content: Option<ClipboardContent>,
}

/// Sample the clipboard once.
///
/// - The first observation (`last_seen == None`) only records a
///   baseline, so whatever is on the clipboard at startup is not
///   captured.
/// - An unchanged counter is a no-op.
/// - A changed counter is recorded even when extraction yields nothing,
///   so the same external change is never processed twice.
/// - If the counter cannot be read, `last_seen` is kept.
pub fn sample(provider: &dyn ClipboardProvider, last_seen: Option<u64>) -> Sample {
    let counter = match provider.change_count() {
        Ok(counter) => counter,
        Err(e) => {
            tracing::debug!(error = %e, "change counter unavailable");
            return Sample {
                counter: last_seen,
                content: None,
            };
        }
    };

    let Some(previous) = last_seen else {
        tracing::debug!(counter, "clipboard baseline recorded");
        return Sample {
            counter: Some(counter),
            content: None,
        };
    };

    if previous == counter {
        return Sample {
            counter: Some(counter),
            content: None,
        };
    }

    Sample {
        counter: Some(counter),
        content: extract(provider),
    }
}

/// Extract content, preferring text. Image probing only happens when no
/// text is available.
fn extract(provider: &dyn ClipboardProvider) -> Option<ClipboardContent> {
    match provider.read_text() {
        Ok(Some(text)) => return Some(ClipboardContent::Text(text)),
        Ok(None) => {}
        Err(e) => tracing::debug!(error = %e, "text extraction failed"),
    }
    match provider.read_image() {
        Ok(Some(bytes)) => Some(ClipboardContent::Image(bytes)),
        Ok(None) => {
            tracing::debug!("clipboard changed to an unsupported format, ignoring");
            None
        }
        Err(e) => {
            tracing::debug!(error = %e, "image extraction failed");
            None
        }
    }
}

/// Background sampling loop handle.
pub struct ClipboardPoller {
    provider: Arc<dyn ClipboardProvider>,
    tx: mpsc::UnboundedSender<ClipboardEntry>,
    interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl ClipboardPoller {
    pub fn new(
        provider: Arc<dyn ClipboardProvider>,
        tx: mpsc::UnboundedSender<ClipboardEntry>,
        interval: Duration,
    ) -> Self {
        Self {
            provider,
            tx,
            interval,
            task: None,
        }
    }

    /// Spawn the sampling loop. Calling again while the loop is alive
    /// does nothing.
    ///
    /// Must be called from within a tokio runtime. Returns immediately.
    pub fn start(&mut self) {
        if self.is_running() {
            tracing::debug!("poller already running");
            return;
        }
        let provider = Arc::clone(&self.provider);
        let tx = self.tx.clone();
        let interval = self.interval;
        self.task = Some(tokio::spawn(poll_loop(provider, tx, interval)));
        tracing::info!(interval_ms = interval.as_millis() as u64, "clipboard poller started");
    }

    /// Abort the sampling loop.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!("clipboard poller stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for ClipboardPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_loop(
    provider: Arc<dyn ClipboardProvider>,
    tx: mpsc::UnboundedSender<ClipboardEntry>,
    period: Duration,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_seen = None;

    loop {
        ticker.tick().await;

        // Provider calls may spawn processes or touch a socket.
        let p = Arc::clone(&provider);
        let tick = match tokio::task::spawn_blocking(move || sample(&*p, last_seen)).await {
            Ok(tick) => tick,
            Err(e) => {
                tracing::warn!(error = %e, "clipboard sample task failed");
                continue;
            }
        };
        last_seen = tick.counter;

        if let Some(content) = tick.content {
            tracing::debug!(
                kind = content.kind(),
                bytes = content.byte_len(),
                "clipboard change captured"
            );
            if tx.send(ClipboardEntry::now(content)).is_err() {
                tracing::debug!("history loop gone, poller exiting");
                return;
            }
        }
    }
}
