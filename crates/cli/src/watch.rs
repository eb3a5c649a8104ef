use crate::{
    commands::FeedKind,
    error::CliError,
    output,
    session::{NoticeStream, Session},
};
use import_runtime::{
    actor::ImportCoordinator,
    error::CoordinatorError,
    source::{JsonLinesFeed, StatusPoller},
    view::CoordinatorView,
};
use model::{events::NoticeLevel, job::JobId};
use tokio::{io::BufReader, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Prints progress, headline changes and notices until the job settles in a
/// terminal status. With `after_start`, a terminal status counts only once
/// the job has moved off the status it had when the start was requested.
pub async fn follow(
    session: &Session,
    coordinator: &ImportCoordinator,
    notices: &mut NoticeStream,
    feed: FeedKind,
    after_start: bool,
    cancel_token: &CancellationToken,
) -> Result<CoordinatorView, CliError> {
    let source_token = cancel_token.child_token();
    let source = spawn_source(session, coordinator.job_id(), feed, source_token.clone());

    let result = follow_views(coordinator, notices, after_start, cancel_token).await;

    source_token.cancel();
    if let Err(e) = source.await {
        warn!(job_id = %coordinator.job_id(), error = %e, "Event source task failed");
    }
    result
}

fn spawn_source(
    session: &Session,
    job_id: &JobId,
    feed: FeedKind,
    cancel_token: CancellationToken,
) -> JoinHandle<()> {
    match feed {
        FeedKind::Poll => {
            let poller = StatusPoller::new(
                job_id.clone(),
                session.client.clone(),
                session.bus.clone(),
                session.settings.poll_interval,
            );
            let job_id = job_id.clone();
            tokio::spawn(async move {
                let outcome = poller.run(cancel_token).await;
                debug!(job_id = %job_id, ?outcome, "Status poller finished");
            })
        }
        FeedKind::Stdin => {
            let feed = JsonLinesFeed::new(BufReader::new(tokio::io::stdin()), session.bus.clone());
            tokio::spawn(async move {
                match feed.run(cancel_token).await {
                    Ok(stats) => debug!(
                        published = stats.published,
                        skipped = stats.skipped,
                        "Realtime feed ended"
                    ),
                    Err(e) => warn!(error = %e, "Failed to read realtime feed"),
                }
            })
        }
    }
}

async fn follow_views(
    coordinator: &ImportCoordinator,
    notices: &mut NoticeStream,
    after_start: bool,
    cancel_token: &CancellationToken,
) -> Result<CoordinatorView, CliError> {
    let mut views = coordinator.watch();
    let initial_status = views.borrow().job.status;
    let mut moved = !after_start;
    let mut last_progress: Option<String> = None;
    let mut last_headline: Option<String> = None;

    loop {
        let view = views.borrow_and_update().clone();
        if view.gone {
            return Err(CliError::Gone(view.job.id));
        }
        moved |= view.job.status.is_active() || view.job.status != initial_status;

        if let Some(progress) = &view.progress
            && last_progress.as_deref() != Some(progress.message.as_str())
        {
            println!("[{:>3}%] {}", progress.percent, progress.message);
            last_progress = Some(progress.message.clone());
        }
        if view.headline != last_headline {
            if let Some(headline) = &view.headline {
                println!("{headline}");
            }
            last_headline = view.headline.clone();
        }

        let settled = view.is_terminal() && view.headline.is_some() && !view.reload_pending;
        if settled && moved {
            return Ok(view);
        }

        tokio::select! {
            _ = cancel_token.cancelled() => return Err(CliError::ShutdownRequested),
            changed = views.changed() => {
                if changed.is_err() {
                    return Err(CoordinatorError::Closed.into());
                }
            }
            Some(notice) = notices.recv() => {
                println!("{}", output::render_notice(&notice));
                if notice.level == NoticeLevel::Failure && !moved {
                    return Err(CliError::Failed(notice.message.clone()));
                }
            }
        }
    }
}
