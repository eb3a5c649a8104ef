use model::{
    events::{ProgressEvent, ProgressPhase},
    job::ImportMode,
};
use serde::Serialize;

/// Human estimate of the remaining time. Presentation only, never a status signal.
pub fn eta_message(eta_seconds: u64) -> String {
    match eta_seconds {
        0..60 => format!("about {eta_seconds} seconds remaining"),
        60..120 => "about 1 minute remaining".to_string(),
        _ => format!("about {} minutes remaining", eta_seconds / 60),
    }
}

pub fn percent(current: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    (current.saturating_mul(100) / total).min(100) as u8
}

pub fn progress_message(mode: ImportMode, event: &ProgressEvent) -> String {
    let verb = match event.phase {
        ProgressPhase::Skipping => "Skipping",
        ProgressPhase::Success => mode.progressive(),
    };

    format!(
        "{verb} {} of {}, {}",
        event.current,
        event.total,
        eta_message(event.eta_seconds)
    )
}

/// What a progress bar shows for the current job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressView {
    pub percent: u8,
    pub current: u64,
    pub total: u64,
    pub message: String,
}

impl ProgressView {
    pub fn from_event(mode: ImportMode, event: &ProgressEvent) -> Self {
        ProgressView {
            percent: percent(event.current, event.total),
            current: event.current,
            total: event.total,
            message: progress_message(mode, event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eta_buckets() {
        assert_eq!(eta_message(0), "about 0 seconds remaining");
        assert_eq!(eta_message(45), "about 45 seconds remaining");
        assert_eq!(eta_message(59), "about 59 seconds remaining");
        assert_eq!(eta_message(60), "about 1 minute remaining");
        assert_eq!(eta_message(75), "about 1 minute remaining");
        assert_eq!(eta_message(120), "about 2 minutes remaining");
        assert_eq!(eta_message(150), "about 2 minutes remaining");
        assert_eq!(eta_message(3600), "about 60 minutes remaining");
    }

    #[test]
    fn message_follows_mode_and_phase() {
        let event = ProgressEvent::new("imp-1", 3, 10).with_eta(45);

        assert_eq!(
            progress_message(ImportMode::InsertNew, &event),
            "Importing 3 of 10, about 45 seconds remaining"
        );
        assert_eq!(
            progress_message(ImportMode::UpdateExisting, &event),
            "Updating 3 of 10, about 45 seconds remaining"
        );
        assert_eq!(
            progress_message(ImportMode::UpdateExisting, &event.clone().skipping()),
            "Skipping 3 of 10, about 45 seconds remaining"
        );
    }

    #[test]
    fn percent_handles_empty_and_overflowing_totals() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(5, 4), 100);
    }
}
