use import_core::event_bus::EventBus;
use model::events::realtime;
use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// One realtime message as relayed line by line: `{"event": topic, "data": payload}`.
#[derive(Debug, Deserialize)]
struct FeedLine {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FeedStats {
    pub published: u64,
    pub skipped: u64,
}

/// Publishes realtime messages read from a line-delimited JSON stream.
pub struct JsonLinesFeed<R> {
    reader: R,
    bus: EventBus,
}

impl<R> JsonLinesFeed<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R, bus: EventBus) -> Self {
        Self { reader, bus }
    }

    /// Runs until end of input or cancellation.
    pub async fn run(self, cancel_token: CancellationToken) -> std::io::Result<FeedStats> {
        let mut lines = self.reader.lines();
        let mut stats = FeedStats::default();

        loop {
            let line = tokio::select! {
                _ = cancel_token.cancelled() => break,
                line = lines.next_line() => match line? {
                    Some(line) => line,
                    None => break,
                },
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let message: FeedLine = match serde_json::from_str(line) {
                Ok(message) => message,
                Err(e) => {
                    warn!(error = %e, "Skipping malformed feed line");
                    stats.skipped += 1;
                    continue;
                }
            };

            match realtime::decode(&message.event, &message.data) {
                Some(event) => {
                    self.bus.publish_import_event(event).await;
                    stats.published += 1;
                }
                None => {
                    debug!(topic = %message.event, "Feed line carries no import event");
                    stats.skipped += 1;
                }
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{
        events::{CompletionEvent, ProgressEvent},
        job::JobId,
    };
    use std::sync::Arc;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn publishes_decoded_lines_and_skips_the_rest() {
        let bus = EventBus::new();
        let job_id = JobId::new("imp-1");
        let (progress_tx, mut progress_rx) = mpsc::channel::<Arc<ProgressEvent>>(8);
        let (done_tx, mut done_rx) = mpsc::channel::<Arc<CompletionEvent>>(8);
        bus.subscribe(job_id.clone(), progress_tx).await;
        bus.subscribe(job_id.clone(), done_tx).await;

        let input = concat!(
            r#"{"event": "data_import_progress", "data": {"data_import": "imp-1", "current": 3, "total": 10, "eta": 12.7}}"#,
            "\n",
            "not json\n",
            "\n",
            r#"{"event": "list_update", "data": {}}"#,
            "\n",
            r#"{"event": "data_import_refresh", "data": {"data_import": "imp-1"}}"#,
            "\n",
        );

        let feed = JsonLinesFeed::new(input.as_bytes(), bus.clone());
        let stats = feed.run(CancellationToken::new()).await.unwrap();

        assert_eq!(
            stats,
            FeedStats {
                published: 2,
                skipped: 2
            }
        );

        let progress = progress_rx.recv().await.unwrap();
        assert_eq!(progress.current, 3);
        assert_eq!(progress.eta_seconds, 12);
        assert_eq!(done_rx.recv().await.unwrap().job_id, job_id);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn malformed_lines_are_logged() {
        let feed = JsonLinesFeed::new("{\"event\": \n".as_bytes(), EventBus::new());
        let stats = feed.run(CancellationToken::new()).await.unwrap();

        assert_eq!(stats.skipped, 1);
        assert!(logs_contain("Skipping malformed feed line"));
    }
}
