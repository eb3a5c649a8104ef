//! Decoding of the server's realtime payloads into import events.

use super::{CompletionEvent, ImportEvent, ProgressEvent, ProgressPhase};
use crate::job::JobId;
use serde_json::Value;

/// Topic carrying progress counts.
pub const PROGRESS_TOPIC: &str = "data_import_progress";

/// Topic signalling that the job document changed and should be refetched.
pub const REFRESH_TOPIC: &str = "data_import_refresh";

/// Decode one realtime message. Returns `None` for unrelated topics and
/// payloads that do not name a job.
pub fn decode(topic: &str, payload: &Value) -> Option<ImportEvent> {
    let job_id = payload
        .get("data_import")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .map(JobId::new)?;

    match topic {
        REFRESH_TOPIC => Some(ImportEvent::Completed(CompletionEvent { job_id })),
        PROGRESS_TOPIC => {
            let counts = (
                payload.get("current").and_then(as_count),
                payload.get("total").and_then(as_count),
            );

            match counts {
                (Some(current), Some(total)) => {
                    let skipping = payload
                        .get("skipping")
                        .and_then(Value::as_bool)
                        .unwrap_or(false);

                    Some(ImportEvent::Progress(ProgressEvent {
                        job_id,
                        current,
                        total,
                        eta_seconds: payload.get("eta").and_then(as_count).unwrap_or(0),
                        phase: if skipping {
                            ProgressPhase::Skipping
                        } else {
                            ProgressPhase::Success
                        },
                    }))
                }
                // A stop request publishes `{data_import, status}` on the
                // progress topic. It only announces a status change.
                _ if payload.get("status").is_some() => {
                    Some(ImportEvent::Completed(CompletionEvent { job_id }))
                }
                _ => None,
            }
        }
        _ => None,
    }
}

fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().map(|f| f.max(0.0).floor() as u64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.max(0.0).floor() as u64),
        _ => None,
    }
}
