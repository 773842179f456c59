use std::path::PathBuf;

use clap::Parser;

use attitude_tracker_rs::logging::init_logger;
use attitude_tracker_rs::record::{create_writer, RecordWriter};
use attitude_tracker_rs::simulate::Scenario;

/// Write a synthetic drive with a known mounting attitude in batch format
#[derive(Parser, Debug)]
struct Args {
    /// Output file (*.csv or *.csv.gz); stdout when omitted
    #[arg(long)]
    out: Option<PathBuf>,

    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    roll: f64,

    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    pitch: f64,

    /// Mounting yaw [deg]
    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    yaw: f64,

    /// Course over ground [deg]
    #[arg(long, default_value = "0.0")]
    bearing: f64,

    /// Longitudinal acceleration [km/h per second]
    #[arg(long, default_value = "6.0", allow_hyphen_values = true)]
    accel: f64,

    /// Nominal gravity the raw readings are scaled by [m/s²]
    #[arg(long, default_value = "9.8")]
    g_earth: f64,
}

fn main() -> anyhow::Result<()> {
    init_logger("info");
    let args = Args::parse();

    let scenario = Scenario {
        roll_deg: args.roll,
        pitch_deg: args.pitch,
        mount_yaw_deg: args.yaw,
        bearing_deg: args.bearing,
        accel_kmh_per_s: args.accel,
        ..Default::default()
    };
    let records = scenario.records(args.g_earth);

    match args.out.as_ref() {
        Some(path) => {
            let mut writer = create_writer(path)?;
            for record in &records {
                writer.write(record)?;
            }
            writer.finish()?;
            log::info!("Wrote {} rows to {}", records.len(), path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut writer = RecordWriter::new(stdout.lock())?;
            for record in &records {
                writer.write(record)?;
            }
            writer.flush()?;
        }
    }
    Ok(())
}
