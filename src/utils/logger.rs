use chrono::Local;
use eyre::Result;
use fern::Dispatch;
use log::LevelFilter;

/// Sets up the application logger with console output.
///
/// # Arguments
/// * `level` - Minimum level to emit
///
/// # Errors
/// * If a global logger was already installed
pub fn setup_logger(level: LevelFilter) -> Result<()> {
    Dispatch::new()
        .level(level)
        // The HTTP stack is chatty at debug
        .level_for("hyper", LevelFilter::Warn)
        .level_for("reqwest", LevelFilter::Warn)
        .chain(std::io::stderr())
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                message
            ));
        })
        .apply()?;
    Ok(())
}

/// Parses a level name such as `info` or `DEBUG`, falling back to `Info`.
#[must_use]
pub fn level_from_str(raw: &str) -> LevelFilter {
    raw.parse().unwrap_or(LevelFilter::Info)
}
