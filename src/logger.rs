use chrono::Local;
use env_logger::{Builder, Env};
use std::io::Write;

/// Timestamped single-line log format. `RUST_LOG` overrides the `info` default.
pub fn init() {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {} - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    log::info!("Logger initialized.");
}
