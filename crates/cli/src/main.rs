use crate::{
    commands::{Commands, FeedKind},
    env::EnvManager,
    error::CliError,
    session::{NoticeStream, Session},
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use import_core::{
    log_view::LogTable,
    service::{JobControlService, LogService},
};
use import_runtime::{
    actor::{
        ImportCoordinator,
        import::{START_NOTICE, STOP_NOTICE},
    },
    view::CoordinatorView,
};
use model::{events::NoticeLevel, job::JobId, status::JobStatus};
use std::{path::PathBuf, time::Duration};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod env;
mod error;
mod output;
mod session;
mod shutdown;
mod watch;

/// Upper bound on waiting for the follow-up loads behind `status`.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(
    name = "import-monitor",
    version,
    about = "Follow and control Frappe data import jobs"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "KEY=VALUE settings file (default: ~/.import-monitor/env when present)"
    )]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let shutdown = ShutdownCoordinator::new(CancellationToken::new());
    shutdown.register_handlers();

    let code = match run(cli, &shutdown).await {
        Ok(code) => code,
        Err(_) if shutdown.is_shutdown_requested() => ExitCode::ShutdownRequested,
        Err(CliError::ShutdownRequested) => ExitCode::ShutdownRequested,
        Err(e @ (CliError::Failed(_) | CliError::Gone(_))) => {
            eprintln!("error: {e}");
            ExitCode::ImportFailed
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::GeneralError
        }
    };

    std::process::exit(code.as_i32());
}

async fn run(cli: Cli, shutdown: &ShutdownCoordinator) -> Result<ExitCode, CliError> {
    let env = EnvManager::load(cli.env_file.as_deref())?;
    let session = Session::from_env(&env)?;
    let cancel_token = shutdown.cancel_token();

    match cli.command {
        Commands::Start { job, watch, feed } => {
            let feed = watch.then_some(feed);
            start(&session, JobId::new(job), feed, &cancel_token).await
        }
        Commands::Stop { job } => stop(&session, JobId::new(job), &cancel_token).await,
        Commands::Status { job, json } => status(&session, JobId::new(job), json).await,
        Commands::Watch { job, feed } => {
            follow(&session, JobId::new(job), feed, &cancel_token).await
        }
        Commands::Logs {
            job,
            failed_only,
            page,
            traceback,
            json,
        } => {
            logs(
                &session,
                JobId::new(job),
                LogQuery {
                    failed_only,
                    page,
                    traceback,
                    json,
                },
            )
            .await
        }
        Commands::Export {
            job,
            errored,
            full: _,
            output,
        } => export(&session, JobId::new(job), errored, output).await,
    }
}

async fn start(
    session: &Session,
    job_id: JobId,
    feed: Option<FeedKind>,
    cancel_token: &CancellationToken,
) -> Result<ExitCode, CliError> {
    let mut notices = session.notices(&job_id).await;
    let mut coordinator = session.open(&job_id).await?;

    let result = start_import(session, &coordinator, &mut notices, feed, cancel_token).await;

    notices.close().await;
    coordinator.close().await;
    result
}

async fn start_import(
    session: &Session,
    coordinator: &ImportCoordinator,
    notices: &mut NoticeStream,
    feed: Option<FeedKind>,
    cancel_token: &CancellationToken,
) -> Result<ExitCode, CliError> {
    coordinator.request_start().await?;

    match feed {
        Some(feed) => {
            let view = watch::follow(session, coordinator, notices, feed, true, cancel_token).await?;
            Ok(exit_code(&view))
        }
        None => {
            await_notice(notices, START_NOTICE, cancel_token).await?;
            Ok(ExitCode::Success)
        }
    }
}

async fn stop(
    session: &Session,
    job_id: JobId,
    cancel_token: &CancellationToken,
) -> Result<ExitCode, CliError> {
    let mut notices = session.notices(&job_id).await;
    let mut coordinator = session.open(&job_id).await?;

    let result = match coordinator.request_stop().await {
        Ok(()) => await_notice(&mut notices, STOP_NOTICE, cancel_token).await,
        Err(e) => Err(e.into()),
    };

    notices.close().await;
    coordinator.close().await;
    result.map(|()| ExitCode::Success)
}

async fn status(session: &Session, job_id: JobId, json: bool) -> Result<ExitCode, CliError> {
    let mut coordinator = session.open(&job_id).await?;
    let view = settled_view(&coordinator).await;
    coordinator.close().await;

    if json {
        output::print_json(&view)?;
    } else {
        print!("{}", output::render_status(&view));
    }
    Ok(ExitCode::Success)
}

async fn follow(
    session: &Session,
    job_id: JobId,
    feed: FeedKind,
    cancel_token: &CancellationToken,
) -> Result<ExitCode, CliError> {
    let mut notices = session.notices(&job_id).await;
    let mut coordinator = session.open(&job_id).await?;

    let result =
        watch::follow(session, &coordinator, &mut notices, feed, false, cancel_token).await;

    notices.close().await;
    coordinator.close().await;
    result.map(|view| exit_code(&view))
}

struct LogQuery {
    failed_only: bool,
    page: usize,
    traceback: Option<usize>,
    json: bool,
}

async fn logs(session: &Session, job_id: JobId, query: LogQuery) -> Result<ExitCode, CliError> {
    let job = session.client.fetch_job(&job_id).await?;
    let records = session.client.logs(&job_id).await?;
    let table = LogTable::build(
        &records,
        job.import_mode,
        &job.reference_doctype,
        query.failed_only,
    )
    .with_page_size(session.settings.log_page_size);

    if let Some(row) = query.traceback {
        let trace = row
            .checked_sub(1)
            .and_then(|index| table.reveal_traceback(index))
            .ok_or(CliError::NoTraceback(row))?;
        println!("{trace}");
        return Ok(ExitCode::Success);
    }

    if query.json {
        output::print_json(table.page(query.page.saturating_sub(1)))?;
    } else {
        print!("{}", output::render_log_page(&table, query.page));
    }
    Ok(ExitCode::Success)
}

async fn export(
    session: &Session,
    job_id: JobId,
    errored: bool,
    output: PathBuf,
) -> Result<ExitCode, CliError> {
    let bytes = if errored {
        session.client.errored_rows(&job_id).await?
    } else {
        session.client.full_log(&job_id).await?
    };

    tokio::fs::write(&output, &bytes).await?;
    info!(
        job_id = %job_id,
        path = %output.display(),
        bytes = bytes.len(),
        "Export written"
    );
    Ok(ExitCode::Success)
}

/// Waits for the notice that confirms a control request. Any failure notice
/// ends the wait with an error.
async fn await_notice(
    notices: &mut NoticeStream,
    expected: &str,
    cancel_token: &CancellationToken,
) -> Result<(), CliError> {
    loop {
        let notice = tokio::select! {
            _ = cancel_token.cancelled() => return Err(CliError::ShutdownRequested),
            notice = notices.recv() => notice
                .ok_or_else(|| CliError::Unexpected("Notice stream closed".into()))?,
        };

        println!("{}", output::render_notice(&notice));
        match notice.level {
            NoticeLevel::Failure => return Err(CliError::Failed(notice.message.clone())),
            NoticeLevel::Info if notice.message == expected => return Ok(()),
            NoticeLevel::Info => {}
        }
    }
}

/// The view once the headline and log follow-ups of the initial load are in,
/// or whatever is there after [`SETTLE_TIMEOUT`].
async fn settled_view(coordinator: &ImportCoordinator) -> CoordinatorView {
    let mut views = coordinator.watch();
    match time::timeout(SETTLE_TIMEOUT, views.wait_for(is_settled)).await {
        Ok(Ok(view)) => view.clone(),
        _ => {
            debug!(job_id = %coordinator.job_id(), "Showing unsettled view");
            coordinator.view()
        }
    }
}

fn is_settled(view: &CoordinatorView) -> bool {
    let status = view.job.status;
    let headline_ready = status == JobStatus::Pending || view.headline.is_some();
    let logs_ready = status.is_active() || view.job.is_new || view.logs.is_some();
    view.gone || (headline_ready && logs_ready)
}

fn exit_code(view: &CoordinatorView) -> ExitCode {
    match view.job.status {
        JobStatus::Error | JobStatus::TimedOut => ExitCode::ImportFailed,
        _ => ExitCode::Success,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn watch_defaults_to_polling() {
        let cli = Cli::try_parse_from(["import-monitor", "watch", "--job", "DIC-0001"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Watch { feed: FeedKind::Poll, .. }
        ));
    }

    #[test]
    fn export_needs_exactly_one_kind() {
        let base = ["import-monitor", "export", "--job", "DIC-1", "--output", "out.csv"];

        assert!(Cli::try_parse_from(base).is_err());
        assert!(Cli::try_parse_from(base.iter().chain(&["--errored", "--full"])).is_err());

        let cli = Cli::try_parse_from(base.iter().chain(&["--full"])).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Export { errored: false, full: true, .. }
        ));
    }

    #[test]
    fn env_file_is_global() {
        let cli = Cli::try_parse_from([
            "import-monitor",
            "logs",
            "--job",
            "DIC-1",
            "--failed-only",
            "--env-file",
            "/tmp/site.env",
        ])
        .unwrap();

        assert_eq!(cli.env_file, Some(PathBuf::from("/tmp/site.env")));
        assert!(matches!(
            cli.command,
            Commands::Logs { failed_only: true, page: 1, traceback: None, .. }
        ));
    }

    #[test]
    fn failed_runs_exit_non_zero() {
        use model::job::ImportJob;

        let view = |status| CoordinatorView {
            job: ImportJob::new("DIC-1", "Customer").with_status(status),
            affordance: import_core::affordance::ControlAffordance::None,
            control_enabled: false,
            indicator: status.indicator(),
            progress: None,
            headline: None,
            actions: Vec::new(),
            logs: None,
            error_report: None,
            reload_pending: false,
            gone: false,
        };

        assert_eq!(exit_code(&view(JobStatus::Error)), ExitCode::ImportFailed);
        assert_eq!(exit_code(&view(JobStatus::TimedOut)), ExitCode::ImportFailed);
        assert_eq!(exit_code(&view(JobStatus::Stopped)), ExitCode::Success);
        assert!(!is_settled(&view(JobStatus::Success)));
    }
}
