//! Hot-reload supervisor.
//!
//! Watches the app config directory for changes to `.jsonnet`/`.libsonnet`
//! files and restarts the run epoch whenever one changes, coalescing
//! restarts that arrive while a rebuild is already pending into a single
//! pending restart.

use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::Result;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Epoch state, logged at each transition so the supervisor's phase is
/// observable without relying on timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EpochState {
    Registering,
    Running,
    Cancelling,
}

/// Run `body` repeatedly, once per epoch, restarting it whenever a watched
/// config file changes. Returns when `parent` is cancelled or `body`
/// returns a non-cancellation error.
pub async fn run_with_reload<F, Fut>(
    parent: CancellationToken,
    config_dir: PathBuf,
    mut body: F,
) -> Result<()>
where
    F: FnMut(CancellationToken) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let (restart_tx, mut restart_rx) = mpsc::channel::<()>(1);
    let watch_token = parent.child_token();
    let watcher_handle = tokio::spawn(watch_files(watch_token.clone(), config_dir, restart_tx));

    loop {
        if parent.is_cancelled() {
            break;
        }

        let epoch_token = parent.child_token();
        tracing::debug!(state = ?EpochState::Registering, "starting run epoch");

        tracing::debug!(state = ?EpochState::Running, "epoch running");
        let mut body_fut = std::pin::pin!(body(epoch_token.clone()));
        let result = loop {
            tokio::select! {
                _ = restart_rx.recv(), if !epoch_token.is_cancelled() => {
                    tracing::info!("config change detected, cancelling epoch");
                    epoch_token.cancel();
                }
                result = &mut body_fut => break result,
            }
        };

        tracing::debug!(state = ?EpochState::Cancelling, "epoch ended");

        if let Err(err) = result {
            tracing::error!(error = %err, "run epoch failed");
            watch_token.cancel();
            let _ = watcher_handle.await;
            return Err(err);
        }
    }

    watch_token.cancel();
    let _ = watcher_handle.await;
    Ok(())
}

/// Recursively watch `dir` and send a coalesced restart signal whenever a
/// `.jsonnet`/`.libsonnet` file is created, written, or removed.
async fn watch_files(token: CancellationToken, dir: PathBuf, restart_tx: mpsc::Sender<()>) {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = match RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                let _ = event_tx.send(event);
            }
        },
        notify::Config::default(),
    ) {
        Ok(w) => w,
        Err(err) => {
            tracing::error!(error = %err, path = %dir.display(), "failed to create file watcher");
            return;
        }
    };

    if let Err(err) = watcher.watch(&dir, RecursiveMode::Recursive) {
        tracing::error!(error = %err, path = %dir.display(), "failed to watch config directory");
        return;
    }

    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            maybe_event = event_rx.recv() => {
                let Some(event) = maybe_event else { return };
                if is_relevant(&event) {
                    // Coalesce: a full pending channel means a restart is
                    // already queued, so drop this one.
                    let _ = restart_tx.try_send(());
                }
            }
        }
    }
}

fn is_relevant(event: &Event) -> bool {
    let is_write_like = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    );
    is_write_like && event.paths.iter().any(|p| has_app_extension(p))
}

fn has_app_extension(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("jsonnet") | Some("libsonnet")
    )
}
