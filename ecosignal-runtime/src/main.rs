//! `ecosignal <config.json>`
//!
//! Runs the decision engine against WAQI and TomTom until Ctrl-C. Logging
//! goes to stderr through `env_logger`; set `RUST_LOG` to change the filter.

use std::process::ExitCode;
use std::sync::Arc;

use ecosignal_runtime::{EngineHandle, RuntimeConfig, RuntimeResult, TickDriver};
use log::{error, info};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: ecosignal <config.json>");
        return ExitCode::from(2);
    };

    match run(&path).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(path: &str) -> RuntimeResult<()> {
    let config = RuntimeConfig::load(path)?;
    let air_quality = Arc::new(config.air_quality_provider()?);
    let traffic = Arc::new(config.traffic_provider()?);
    let driver = Arc::new(TickDriver::new(config.engine, air_quality, traffic)?);

    let (stop, shutdown) = watch::channel(false);
    let ticking = tokio::spawn({
        let driver = Arc::clone(&driver);
        async move { driver.run(shutdown).await }
    });
    let reporting = tokio::spawn(report(driver.handle()));

    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received, stopping");
    stop.send_replace(true);

    if let Err(e) = ticking.await {
        error!("Tick driver task failed: {e}");
    }
    reporting.abort();

    let stats = driver.stats();
    info!(
        "{} ticks completed, {} skipped, {} aborted",
        stats.completed, stats.skipped, stats.aborted
    );
    Ok(())
}

async fn report(mut handle: EngineHandle) {
    while handle.changed().await {
        let snapshot = handle.latest_snapshot();
        if let Some(health) = &snapshot.health {
            info!(
                "Air {} (avg AQI {:.0}): {}{}",
                health.level.name(),
                snapshot.average_aqi,
                health.general,
                if health.work_from_home { " Work from home advised." } else { "" }
            );
        }
        for hotspot in &snapshot.hotspots {
            info!(
                "Hotspot {} {:?} {:?}: now {:.2}, avg {:.2}, peak {:.2} over {} samples",
                hotspot.intersection_id,
                hotspot.kind,
                hotspot.pattern,
                hotspot.current,
                hotspot.average,
                hotspot.peak,
                hotspot.samples
            );
        }
        for corridor in &snapshot.corridors {
            info!(
                "Corridor {}: {} offsets {:?}, stops -{:.0}%, emissions -{:.0}%{}",
                corridor.corridor_id,
                corridor
                    .dominant_strategy
                    .map_or("no strategy", |strategy| strategy.name()),
                corridor
                    .offsets
                    .iter()
                    .map(|offset| offset.offset_s)
                    .collect::<Vec<_>>(),
                corridor.stops_reduced_pct,
                corridor.emissions_reduced_pct,
                if corridor.stale { " (stale)" } else { "" }
            );
        }
        for recommendation in &snapshot.recommendations {
            info!("[{:?}] {}", recommendation.severity, recommendation.action);
        }
    }
}
