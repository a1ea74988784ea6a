use crate::report;
use anyhow::Context;
use apscan_lib::{
    AdapterHandle, CaptureScanProvider, ControllerEvent, ScanConfig, ScanController, ScanProvider,
};
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;

/**
 * Run scan cycles on a live interface until `cycles` complete or Ctrl-C
 */
pub async fn monitor(
    interface_name: String,
    config: ScanConfig,
    cycles: Option<u64>,
    out_file: Option<PathBuf>,
    print: bool,
) -> anyhow::Result<()> {
    println!("Starting live scan...");

    let mut provider = CaptureScanProvider::live(config.settle_delay());
    provider
        .init(Some(AdapterHandle::new(&interface_name, "monitor interface")))
        .with_context(|| format!("opening {}", interface_name))?;

    let session = ScanController::new(provider, config).spawn();
    let mut events = session.subscribe();
    session.start().await?;

    let outcome = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break Ok(());
            }
            event = events.recv() => match event {
                Ok(ControllerEvent::CycleComplete(cycle)) => {
                    if print {
                        report::print_cycle(&cycle);
                    }
                    if cycles.is_some_and(|limit| cycle.cycle >= limit) {
                        break Ok(());
                    }
                }
                Ok(ControllerEvent::Error(err)) => break Err(err),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event consumer lagging");
                }
                Err(RecvError::Closed) => break Ok(()),
            }
        }
    };

    let cache = session.cache();
    session.shutdown().await;
    outcome.context("scan failed")?;

    let cache = cache.read();
    report::print_table(&cache);

    if let Some(out_file) = out_file {
        cache
            .to_parquet(out_file.clone())
            .with_context(|| format!("writing {}", out_file.display()))?;
        println!("Samples written to {}", out_file.display());
    }

    println!("Live scan completed!\n");
    Ok(())
}
