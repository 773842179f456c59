use std::path::{Path, PathBuf};

use clap::Parser;
use serde_json::{json, Value};

use attitude_tracker_rs::logging::init_logger;
use attitude_tracker_rs::record::open_reader;
use attitude_tracker_rs::{AttitudeEstimator, AttitudeUpdate, EstimatorConfig};

#[derive(Parser, Debug)]
struct Args {
    /// Path to a batch log (*.csv or *.csv.gz)
    #[arg(long, conflicts_with = "golden_dir")]
    log: Option<PathBuf>,

    /// Directory of logs to batch replay (processes *.csv[.gz])
    #[arg(long)]
    golden_dir: Option<PathBuf>,

    /// Estimator configuration (JSON); flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Minimum GPS speed for a usable bearing [km/h]
    #[arg(long)]
    min_speed: Option<f64>,

    /// Event threshold [g]
    #[arg(long)]
    event_threshold: Option<f64>,

    /// Maximum accepted mean yaw residual [g]
    #[arg(long)]
    max_residual: Option<f64>,

    /// Print every attitude update as it happens
    #[arg(long, default_value_t = false)]
    trace: bool,
}

fn build_config(args: &Args) -> anyhow::Result<EstimatorConfig> {
    let mut config = match args.config.as_ref() {
        Some(path) => EstimatorConfig::load_from_file(path)?,
        None => EstimatorConfig::default(),
    };
    if let Some(v) = args.min_speed {
        config.min_gps_speed_kmh = v;
    }
    if let Some(v) = args.event_threshold {
        config.event_threshold_g = v;
    }
    if let Some(v) = args.max_residual {
        config.max_mean_residual_g = v;
    }
    config.validate()?;
    Ok(config)
}

fn run_once(path: &Path, config: &EstimatorConfig, trace: bool) -> anyhow::Result<Value> {
    let mut estimator = AttitudeEstimator::new(config.clone())?;
    let mut reader = open_reader(path)?;
    let mut yaw_history = Vec::new();
    let mut calibrated_contreg = None;

    for record in reader.by_ref() {
        let record = record?;
        let Some(update) = estimator.process_record(&record) else {
            continue;
        };

        match update {
            AttitudeUpdate::RollPitch { phi, theta } => {
                calibrated_contreg = Some(record.contreg);
                if trace {
                    println!(
                        "[CAL] contreg={} phi={:.2}° theta={:.2}°",
                        record.contreg,
                        phi.to_degrees(),
                        theta.to_degrees()
                    );
                }
            }
            AttitudeUpdate::Yaw {
                psi,
                mean_residual,
                samples,
                yaw_variation_deg,
                altitude_variation_m,
            } => {
                yaw_history.push(json!({
                    "contreg": record.contreg,
                    "rtc": record.gps_rtc,
                    "psi_deg": psi.to_degrees(),
                    "mean_residual": mean_residual,
                    "samples": samples,
                    "yaw_variation_deg": yaw_variation_deg,
                    "altitude_variation_m": altitude_variation_m,
                }));
                if trace {
                    println!(
                        "[YAW] contreg={} rtc={:.1} psi={:.2}° residual={:.3} n={} yaw_var={:.2}° alt_var={:.2} m",
                        record.contreg,
                        record.gps_rtc,
                        psi.to_degrees(),
                        mean_residual,
                        samples,
                        yaw_variation_deg,
                        altitude_variation_m
                    );
                }
            }
        }
    }

    let estimate = estimator.estimate();
    Ok(json!({
        "log": path.display().to_string(),
        "phi_deg": estimate.phi_deg(),
        "theta_deg": estimate.theta_deg(),
        "psi_deg": estimate.psi_deg(),
        "calibrated_contreg": calibrated_contreg,
        "stats": estimator.stats(),
        "skipped_rows": reader.skipped(),
        "yaw_updates": yaw_history,
    }))
}

fn is_batch_log(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    name.ends_with(".csv") || name.ends_with(".csv.gz")
}

fn main() -> anyhow::Result<()> {
    init_logger("warn");
    let args = Args::parse();
    let config = build_config(&args)?;
    let mut results = Vec::new();

    if let Some(dir) = args.golden_dir.as_ref() {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && is_batch_log(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        for path in paths {
            match run_once(&path, &config, args.trace) {
                Ok(res) => results.push(res),
                Err(e) => eprintln!("Failed {}: {}", path.display(), e),
            }
        }
    } else if let Some(log) = args.log.as_ref() {
        results.push(run_once(log, &config, args.trace)?);
    } else {
        anyhow::bail!("Provide --log or --golden-dir");
    }

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
