use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingSettings};
use crate::error::AppError;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `LOG_LEVEL` when set. sqlx statement logs arrive
/// through the `log` bridge and are filtered like everything else.
pub fn init_logging(settings: &LoggingSettings) -> Result<(), AppError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&settings.level)));

    let result = match settings.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .try_init(),
    };

    result.map_err(|e| AppError::ConfigError(format!("Failed to initialise logging: {}", e)))?;

    info!("Logging initialized with level: {}", settings.level);
    Ok(())
}

fn default_directives(level: &str) -> String {
    let level = match level {
        "trace" | "debug" | "info" | "warn" | "error" => level,
        "warning" => "warn",
        "critical" => "error",
        _ => "info",
    };

    // sqlx echoes statements at debug; keep them out unless debug was asked for.
    if level == "debug" || level == "trace" {
        level.to_string()
    } else {
        format!("{},sqlx=warn", level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        assert_eq!(default_directives("debug"), "debug");
        assert_eq!(default_directives("info"), "info,sqlx=warn");
        assert_eq!(default_directives("warning"), "warn,sqlx=warn");
        assert_eq!(default_directives("loud"), "info,sqlx=warn");
    }
}
