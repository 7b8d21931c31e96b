use std::io::Write;

use chrono::Local;
use log::SetLoggerError;

/// Installs the global logger. `RUST_LOG`, when set, takes precedence over
/// `level`.
pub fn init(level: &str) -> Result<(), SetLoggerError> {
    let mut builder = env_logger::Builder::new();
    builder
        .parse_filters(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}: {}",
                Local::now().to_rfc3339(),
                record.level(),
                record.target(),
                record.args()
            )
        });

    builder.try_init()?;
    log::info!("Logging initialized");
    Ok(())
}
