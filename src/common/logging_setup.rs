use crate::app_config::ApplicationConfig;
use env_logger::Builder;
use log::LevelFilter;

pub fn initialize_logging(settings: Option<&ApplicationConfig>, cli_matches: &clap::ArgMatches) {
    let mut builder = Builder::new();

    // Determine log level from CLI, then settings file, then default
    let log_level_str = if cli_matches.get_flag("debug") {
        "debug".to_string()
    } else {
        settings
            .and_then(|s| s.log_level.clone())
            .unwrap_or_else(|| "info".to_string())
    };

    let (level, recognised) = parse_level(&log_level_str);
    builder.filter_level(level);

    builder.try_init().unwrap_or_else(|e| {
        eprintln!("Failed to initialize logger: {}. Logging might not work as expected.", e);
    });
    if !recognised {
        log::warn!("Unrecognized log level '{}', defaulting to info.", log_level_str);
    }
}

fn parse_level(level: &str) -> (LevelFilter, bool) {
    match level.to_lowercase().as_str() {
        "error" => (LevelFilter::Error, true),
        "warn" => (LevelFilter::Warn, true),
        "info" => (LevelFilter::Info, true),
        "debug" => (LevelFilter::Debug, true),
        "trace" => (LevelFilter::Trace, true),
        _ => (LevelFilter::Info, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names_are_case_insensitive() {
        assert_eq!(parse_level("DEBUG"), (LevelFilter::Debug, true));
        assert_eq!(parse_level("loud"), (LevelFilter::Info, false));
    }
}
