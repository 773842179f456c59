use std::io::Write;

use chrono::Local;
use env_logger::Builder;

/// Install the process-wide logger on stderr. `RUST_LOG` overrides
/// `default_filter`.
pub fn init_logger(default_filter: &str) {
    Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {:<5} {}: {}",
                ts_now(),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

/// Local wall-clock timestamp with millisecond precision
pub fn ts_now() -> String {
    Local::now().format("%H:%M:%S%.3f").to_string()
}
