use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use doorwatch_api::ClassifierClient;
use doorwatch_config::PathsSection;
use doorwatch_core::{Changelogs, Classifier, GateWatch, HttpClassifier, Pipeline};

use crate::cli::{GlobalOpts, RunArgs};
use crate::error::CliError;
use crate::inbox;
use crate::outbox::{self, Outbox};

pub async fn handle(args: &RunArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = super::load(global)?;
    let pipeline_config = cfg.to_pipeline_config()?;
    let settings = cfg.classifier_settings()?;
    let paths = apply_overrides(cfg.paths, args);

    for dir in [&paths.poll_inbox, &paths.camera_inbox, &paths.outbox] {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(CliError::io(dir))?;
    }

    let client = ClassifierClient::new(settings.endpoint, &settings.transport).map_err(|e| {
        CliError::Classifier {
            message: e.to_string(),
        }
    })?;
    let classifier: Arc<dyn Classifier> = Arc::new(HttpClassifier::new(client));

    let changelogs = if args.ephemeral {
        Changelogs::in_memory()
    } else {
        Changelogs::open(&paths.state_dir)?
    };

    let (pipeline, alerts) = Pipeline::start(pipeline_config, classifier, changelogs)?;
    let writer = tokio::spawn(outbox::deliver(Outbox::new(&paths.outbox), alerts));
    let gate_log = spawn_gate_logger(pipeline.subscribe_gate());

    let result = if args.once {
        run_once(&pipeline, &paths).await
    } else {
        watch_inboxes(&pipeline, &paths, interrupted()).await
    };

    gate_log.abort();
    let written = writer.await.map_err(|e| CliError::Internal {
        message: format!("outbox writer failed: {e}"),
    })?;
    let stats = pipeline.stats();
    info!(?stats, written, "run finished");
    result?;

    if args.once {
        println!(
            "polls: {}, frames: {}, alerts written: {written}",
            stats.polls_received, stats.frames_received
        );
    }
    Ok(())
}

fn apply_overrides(mut paths: PathsSection, args: &RunArgs) -> PathsSection {
    if let Some(dir) = &args.poll_inbox {
        paths.poll_inbox.clone_from(dir);
    }
    if let Some(dir) = &args.camera_inbox {
        paths.camera_inbox.clone_from(dir);
    }
    if let Some(dir) = &args.outbox {
        paths.outbox.clone_from(dir);
    }
    if let Some(dir) = &args.state_dir {
        paths.state_dir.clone_from(dir);
    }
    paths
}

/// Single scan, then process everything queued and stop.
async fn run_once(pipeline: &Pipeline, paths: &PathsSection) -> Result<(), CliError> {
    let scanned = inbox::scan(pipeline, &paths.poll_inbox, &paths.camera_inbox).await;
    pipeline.drain().await;
    let counts = scanned?;
    debug!(polls = counts.polls, frames = counts.frames, "inboxes scanned");
    Ok(())
}

/// Resolves on Ctrl-C. If the handler cannot be installed the process
/// keeps running and has to be stopped some other way.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// Scan on every tick until `interrupt` resolves, then drain. A failed
/// scan is logged and retried on the next tick.
///
/// Inbox files are deleted once queued, so everything already queued is
/// processed before returning.
async fn watch_inboxes(
    pipeline: &Pipeline,
    paths: &PathsSection,
    interrupt: impl Future<Output = ()>,
) -> Result<(), CliError> {
    let mut ticker = tokio::time::interval(paths.scan_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    info!(
        polls = %paths.poll_inbox.display(),
        frames = %paths.camera_inbox.display(),
        every = ?paths.scan_interval(),
        "watching inboxes"
    );

    tokio::pin!(interrupt);
    loop {
        tokio::select! {
            biased;
            () = &mut interrupt => {
                info!("interrupted, finishing queued work");
                break;
            }
            _ = ticker.tick() => {
                match inbox::scan(pipeline, &paths.poll_inbox, &paths.camera_inbox).await {
                    Ok(counts) if counts.polls + counts.frames > 0 => {
                        debug!(polls = counts.polls, frames = counts.frames, "inboxes scanned");
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "inbox scan failed"),
                }
            }
        }
    }

    pipeline.drain().await;
    Ok(())
}

fn spawn_gate_logger(mut gate: GateWatch) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(table) = gate.changed().await {
            for (key, state) in table.iter() {
                info!(gate = %key, %state, "gate state");
            }
        }
    })
}
