//! news-relay: one retrieval and delivery cycle per invocation.
//!
//! Meant to be started by cron. Exits 0 on a finished run, on a run that
//! failed or panicked after the lock was taken, and when another instance
//! holds the lock. Only a bad configuration or an unusable lock path exit non-zero.

use std::process::ExitCode;
use std::time::Instant;

use news_relay::config::AppConfig;
use news_relay::lock::{LockOutcome, ProcessLock};
use news_relay::notify::Notifier;
use news_relay::pipeline::Pipeline;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("news_relay=info,warn"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env when present; no-op otherwise.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!(error = ?e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let prom = match &cfg.metrics_textfile {
        Some(_) => match news_relay::metrics::install_recorder() {
            Ok(h) => Some(h),
            Err(e) => {
                warn!(error = ?e, "metrics disabled");
                None
            }
        },
        None => None,
    };

    let guard = match ProcessLock::acquire(&cfg.lock_file) {
        Ok(LockOutcome::Acquired(g)) => g,
        Ok(LockOutcome::AlreadyRunning(pid)) => {
            info!(pid, "another instance is running, exiting");
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            error!(error = ?e, "cannot take process lock");
            return ExitCode::FAILURE;
        }
    };

    let started = Instant::now();
    let outcome = match Pipeline::from_config(&cfg) {
        Ok(pipeline) => pipeline
            .run_detached()
            .await
            .map(|_| ())
            .map_err(|e| ("run failed", e)),
        Err(e) => Err(("pipeline setup failed", e)),
    };
    if let Err((what, e)) = outcome {
        error!(error = ?e, "{what}");
        if let Err(ne) = cfg
            .notifiers()
            .send_notice(&format!("❌ Run failed: {e:#}"))
            .await
        {
            warn!(error = %ne, "operator notice not delivered");
        }
    }

    if let (Some(handle), Some(path)) = (&prom, &cfg.metrics_textfile) {
        let ms = started.elapsed().as_secs_f64() * 1_000.0;
        if let Err(e) = news_relay::metrics::write_textfile(handle, path, ms) {
            warn!(error = ?e, "metrics textfile not written");
        }
    }

    guard.release();
    ExitCode::SUCCESS
}
