//! `jobstream-watch` -- follows one server job until it finishes.
//!
//! Connects to the job stream, reconciles it with the REST job detail,
//! and logs every state change. Optionally requests an export first and
//! downloads the result when the job completes.
//!
//! # Environment variables
//!
//! | Variable                 | Required | Default                  | Description                                 |
//! |--------------------------|----------|--------------------------|---------------------------------------------|
//! | `JOBSTREAM_BASE_URL`     | no       | `http://10.0.2.2:8080`   | REST base address; the stream URL is derived from it |
//! | `JOBSTREAM_TOKEN`        | yes      | --                       | Bearer credential                           |
//! | `JOBSTREAM_BACKOFF_MS`   | no       | `1000,2000,4000,8000`    | Reconnect delays in milliseconds            |
//! | `JOBSTREAM_EVENT_BUFFER` | no       | `16`                     | Job event broadcast buffer                  |
//! | `WATCH_JOB_ID`           | one of   | --                       | Existing job to follow                      |
//! | `WATCH_EXPORT_KIND`      | one of   | --                       | `mp4` or `thumbnail`, with `WATCH_REPLAY_ID` |
//! | `WATCH_REPLAY_ID`        | one of   | --                       | Replay to export                            |
//! | `WATCH_DOWNLOAD_DIR`     | no       | --                       | Directory for the completed job's result    |

use std::sync::Arc;

use jobstream_api::JobApi;
use jobstream_core::config::ClientConfig;
use jobstream_core::settings::SettingsStore;
use jobstream_tracker::JobTracker;
use jobstream_watch::options::WatchOptions;
use jobstream_watch::watcher;
use jobstream_ws::{JobChannel, UrlResolver};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jobstream_watch=info,jobstream_ws=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ClientConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid client configuration");
        std::process::exit(1);
    });

    let options = WatchOptions::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid watch options");
        std::process::exit(1);
    });

    let settings = SettingsStore::shared(config.base_url.clone());
    match &config.token {
        Some(token) => settings.save_credential(token.clone()).await,
        None => tracing::warn!("JOBSTREAM_TOKEN is not set; the job stream will not connect"),
    }

    let api = Arc::new(JobApi::new(settings.clone(), settings.clone()));
    let resolver = UrlResolver::new(settings.clone(), settings.clone());
    let channel = JobChannel::from_config(resolver, &config).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid reconnect schedule");
        std::process::exit(1);
    });

    let job_id = watcher::resolve_job(api.as_ref(), &options.selection)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Could not determine the job to watch");
            std::process::exit(1);
        });

    tracing::info!(
        job_id,
        base_url = %config.base_url,
        backoff_steps = config.backoff.len(),
        "Starting jobstream-watch",
    );

    let tracker = JobTracker::new(Arc::new(channel), api);

    tokio::select! {
        view = watcher::follow(&tracker, job_id) => {
            if let Some(dir) = options.download_dir.as_deref() {
                match watcher::download_if_completed(&tracker, &view, dir).await {
                    Ok(Some(path)) => tracing::info!(path = %path.display(), "Result saved"),
                    Ok(None) => {}
                    Err(e) => tracing::error!(error = %e, "Result download failed"),
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted");
        }
    }

    tracker.shutdown();
}
