use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use postsweep_core::sweep::FanoutSink;
use postsweep_core::{
    ActionExecutor, BrowserLauncher, CancellationSignal, HumanBehaviorSimulator, JournalSink,
    LaunchOverrides, Orchestrator, OrchestratorConfig, RunJournal, RunReport, SweepConfig,
    TracingSink,
};

use crate::{Result, RunArgs};

/// Runs one sweep to completion on a private current-thread runtime.
pub fn execute(config: SweepConfig, args: &RunArgs) -> Result<RunReport> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(sweep(config, args))
}

async fn sweep(config: SweepConfig, args: &RunArgs) -> Result<RunReport> {
    let config = Arc::new(config);
    let settings = OrchestratorConfig::from_config(&config)?;
    let executor = ActionExecutor::from_config(&config, settings.handles_reposts())?;
    let human =
        HumanBehaviorSimulator::new(config.human_simulation.clone(), config.delay_range_ms());
    let journal = open_journal(&config, args)?;
    let run_id = Uuid::new_v4();

    let launcher = BrowserLauncher::new(Arc::clone(&config));
    let overrides = LaunchOverrides {
        headless: args.headless.then_some(true),
    };
    let automation = launcher.launch_with_overrides(overrides).await?;
    let mut page = match automation.new_page().await {
        Ok(page) => page,
        Err(err) => {
            if let Err(shutdown) = automation.shutdown().await {
                warn!(error = %shutdown, "browser shutdown failed");
            }
            return Err(err.into());
        }
    };

    let mut sink = FanoutSink::new().with(Arc::new(TracingSink));
    if let Some(journal) = &journal {
        journal.begin_run(run_id, &settings.handle, settings.dry_run, Utc::now())?;
        sink = sink.with(Arc::new(JournalSink::new(journal.clone(), run_id)));
    }

    let cancel = CancellationSignal::new();
    let watcher = watch_interrupt(cancel.clone());
    let mut orchestrator = Orchestrator::new(settings, executor, human, Arc::new(sink), cancel)
        .with_run_id(run_id);
    let report = orchestrator.run(&mut page).await;
    watcher.abort();

    if let Some(journal) = &journal {
        if let Err(err) = journal.finish_run(&report) {
            warn!(error = %err, run_id = %run_id, "failed to journal run summary");
        }
    }
    drop(page);
    if let Err(err) = automation.shutdown().await {
        warn!(error = %err, "browser shutdown failed");
    }
    Ok(report)
}

fn open_journal(config: &SweepConfig, args: &RunArgs) -> Result<Option<RunJournal>> {
    if !config.journal.enabled || args.no_journal {
        return Ok(None);
    }
    let journal = RunJournal::builder()
        .path(&config.journal.path)
        .create_if_missing(true)
        .build()?;
    journal.initialize()?;
    info!(path = %journal.path().display(), "journal ready");
    Ok(Some(journal))
}

fn watch_interrupt(cancel: CancellationSignal) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current item");
            cancel.cancel();
        }
    })
}
