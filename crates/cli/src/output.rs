use crate::error::CliError;
use import_core::log_view::{LogTable, RowStatus};
use import_runtime::view::CoordinatorView;
use model::events::{Notice, NoticeLevel};
use serde::Serialize;
use std::fmt::Write;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

pub fn render_status(view: &CoordinatorView) -> String {
    let job = &view.job;
    let mut out = String::new();

    let _ = writeln!(out, "Import '{}' ({}):", job.id, job.reference_doctype);
    let _ = writeln!(out, "-----------------------------");
    let _ = writeln!(out, "{:<16} {} ({})", "Status", job.status, view.indicator.color());
    if let Some(headline) = &view.headline {
        let _ = writeln!(out, "{:<16} {}", "Summary", headline);
    }
    if let Some(progress) = &view.progress {
        let _ = writeln!(out, "{:<16} {}% {}", "Progress", progress.percent, progress.message);
    }

    let control = match (view.affordance.label(), view.control_enabled) {
        ("", _) => "n/a".to_string(),
        (label, true) => label.to_string(),
        (label, false) => format!("{label} (disabled)"),
    };
    let _ = writeln!(out, "{:<16} {}", "Primary action", control);

    let actions = view
        .actions
        .iter()
        .map(|action| action.label())
        .collect::<Vec<_>>();
    let actions = if actions.is_empty() {
        "n/a".to_string()
    } else {
        actions.join(", ")
    };
    let _ = writeln!(out, "{:<16} {}", "Actions", actions);

    if let Some(report) = &view.error_report {
        let first_line = report.error.lines().next().unwrap_or_default();
        let _ = writeln!(out, "{:<16} {}", "Last error", first_line);
    }
    if view.gone {
        let _ = writeln!(out, "This import no longer exists.");
    }

    out
}

/// One page of the log table; `page` starts at 1.
pub fn render_log_page(table: &LogTable, page: usize) -> String {
    let mut out = String::new();

    if table.is_empty() {
        let _ = writeln!(out, "No log entries.");
        return out;
    }

    let index = page.saturating_sub(1);
    let first_row = index * table.page_size();
    let _ = writeln!(out, "{:<6} {:<12} {:<8} Message", "#", "Row", "Status");
    for (offset, row) in table.page(index).iter().enumerate() {
        let status = match row.status {
            RowStatus::Success => "ok",
            RowStatus::Failure => "failed",
        };
        let mut message = row.message.clone();
        if let Some(link) = &row.reference_link {
            let _ = write!(message, " ({link})");
        }
        if row.has_traceback {
            message.push_str(" [traceback]");
        }
        let _ = writeln!(
            out,
            "{:<6} {:<12} {:<8} {}",
            first_row + offset + 1,
            row.row_numbers,
            status,
            message
        );
    }
    let _ = writeln!(out, "Page {} of {}", page.max(1), table.page_count());

    out
}

pub fn render_notice(notice: &Notice) -> String {
    match notice.level {
        NoticeLevel::Info => notice.message.clone(),
        NoticeLevel::Failure => format!("error: {}", notice.message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use import_core::{actions::FormAction, affordance::ControlAffordance};
    use model::{
        job::{ImportJob, JobId, Totals},
        log::{LogMessage, LogRecord},
        status::JobStatus,
    };

    fn view(job: ImportJob) -> CoordinatorView {
        CoordinatorView {
            indicator: job.status.indicator(),
            job,
            affordance: ControlAffordance::None,
            control_enabled: false,
            progress: None,
            headline: None,
            actions: Vec::new(),
            logs: None,
            error_report: None,
            reload_pending: false,
            gone: false,
        }
    }

    #[test]
    fn status_lists_headline_and_actions() {
        let mut view = view(
            ImportJob::new("DIC-0001", "Customer")
                .with_status(JobStatus::PartialSuccess)
                .with_totals(Totals::new(7, 3, 10)),
        );
        view.headline = Some("Successfully imported 7 records out of 10.".into());
        view.actions = vec![FormAction::ExportErroredRows, FormAction::ExportImportLog];

        let out = render_status(&view);
        assert!(out.contains("Partial Success (yellow)"));
        assert!(out.contains("Successfully imported 7 records out of 10."));
        assert!(out.contains("Export Errored Rows, Export Import Log"));
        assert!(out.contains("Primary action   n/a"));
    }

    #[test]
    fn disabled_control_is_marked() {
        let mut view = view(
            ImportJob::new("DIC-0002", "Item").with_import_file("/private/files/items.csv"),
        );
        view.affordance = ControlAffordance::Start;

        assert!(render_status(&view).contains("Start Import (disabled)"));
    }

    #[test]
    fn log_page_numbers_rows_across_pages() {
        let records = (1..=4)
            .map(|i| {
                if i % 2 == 0 {
                    LogRecord::success(vec![i], format!("CUST-{i}"))
                } else {
                    LogRecord::failure(
                        vec![i],
                        vec![LogMessage {
                            title: None,
                            message: "Missing email".into(),
                        }],
                        Some("Traceback".into()),
                    )
                }
            })
            .collect::<Vec<_>>();
        let table = LogTable::build(&records, Default::default(), "Customer", false).with_page_size(3);

        let out = render_log_page(&table, 2);
        assert!(out.contains("4      4"));
        assert!(out.contains("/app/customer/CUST-4"));
        assert!(out.contains("Page 2 of 2"));
        assert!(!out.contains("Missing email"));
    }

    #[test]
    fn failure_notices_are_prefixed() {
        let notice = Notice::failure(JobId::new("DIC-1"), "Failed to start import: Request timed out");
        assert_eq!(
            render_notice(&notice),
            "error: Failed to start import: Request timed out"
        );
    }
}
