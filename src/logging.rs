use anyhow::{anyhow, Result};

/// Map a configured level name to a tracing level.
pub fn parse_level(level: &str) -> Result<tracing::Level> {
    match level {
        "error" => Ok(tracing::Level::ERROR),
        "warn" => Ok(tracing::Level::WARN),
        "info" => Ok(tracing::Level::INFO),
        "debug" => Ok(tracing::Level::DEBUG),
        "trace" => Ok(tracing::Level::TRACE),
        other => Err(anyhow!("invalid log level '{}'", other)),
    }
}

/// Install the global subscriber. Logs go to stderr so stdout only carries
/// the report.
pub fn setup_logging(level: &str) -> Result<()> {
    use tracing_subscriber::fmt;

    let subscriber = fmt()
        .with_max_level(parse_level(level)?)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
