use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};

use attitude_tracker_rs::logging::init_logger;
use attitude_tracker_rs::record::{classify_row, Row};
use attitude_tracker_rs::stream::{run_engine, SensorEvent};
use attitude_tracker_rs::{AttitudeEstimate, AttitudeEstimator, EstimatorConfig};

#[derive(Parser, Debug)]
#[command(name = "attitude_tracker")]
#[command(about = "Live mounting-attitude estimation from batch-format sensor rows", long_about = None)]
struct Args {
    /// Batch file to follow (reads stdin when omitted)
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Estimator configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sensor event queue depth
    #[arg(long, default_value = "500")]
    queue: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger("info");
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EstimatorConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EstimatorConfig::default(),
    };
    let g_earth = config.g_earth;
    let estimator = AttitudeEstimator::new(config)?;

    let (event_tx, event_rx) = mpsc::channel::<SensorEvent>(args.queue.max(1));
    let (estimate_tx, mut estimate_rx) = watch::channel(AttitudeEstimate::default());

    let engine = tokio::spawn(run_engine(event_rx, estimator, estimate_tx));

    let reader = match &args.input {
        Some(path) => {
            log::info!("Reading sensor rows from {}", path.display());
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening {}", path.display()))?;
            tokio::spawn(read_loop(BufReader::new(file), event_tx, g_earth))
        }
        None => {
            log::info!("Reading sensor rows from stdin");
            tokio::spawn(read_loop(BufReader::new(tokio::io::stdin()), event_tx, g_earth))
        }
    };

    while estimate_rx.changed().await.is_ok() {
        let estimate = *estimate_rx.borrow_and_update();
        println!("{}", estimate_json(&estimate));
    }

    let skipped = reader.await??;
    let estimator = engine.await?;
    let stats = estimator.stats();
    log::info!(
        "Done: {} samples, {} malformed rows skipped, calibrated at {:?}",
        stats.samples,
        skipped,
        stats.calibrated_at
    );
    println!(
        "{}",
        json!({
            "final": estimate_json(&estimator.estimate()),
            "stats": stats,
            "skipped_rows": skipped,
        })
    );
    Ok(())
}

/// Forward parsed rows to the engine; returns the number of malformed rows.
async fn read_loop<R>(reader: R, tx: mpsc::Sender<SensorEvent>, g_earth: f64) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut line = 0usize;
    let mut skipped = 0usize;

    while let Some(text) = lines.next_line().await? {
        line += 1;
        match classify_row(&text, line) {
            Row::Record(record) => {
                for event in SensorEvent::from_record(&record, g_earth) {
                    if tx.send(event).await.is_err() {
                        log::warn!("Engine stopped, dropping remaining input");
                        return Ok(skipped);
                    }
                }
            }
            Row::Malformed => skipped += 1,
            Row::Blank | Row::Header => {}
        }
    }

    Ok(skipped)
}

fn estimate_json(estimate: &AttitudeEstimate) -> serde_json::Value {
    json!({
        "phi_deg": estimate.phi_deg(),
        "theta_deg": estimate.theta_deg(),
        "psi_deg": estimate.psi_deg(),
    })
}
