use std::fs;
use std::sync::Once;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use crate::config::LoggingConfig;
use crate::error::InspectError;

static INIT: Once = Once::new();

/// Picks the filter: `RUST_LOG` wins, then `--verbose`, then the configured level.
fn filter(config: &LoggingConfig, verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new(&config.level)
        }
    })
}

/// Installs the global subscriber: compact stderr output, plus daily rolling
/// JSON files when `config.dir` is set. Only the first call has any effect.
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<(), InspectError> {
    let mut result = Ok(());

    INIT.call_once(|| {
        let console = fmt::Layer::new()
            .with_writer(std::io::stderr)
            .with_target(verbose)
            .with_ansi(true)
            .with_filter(filter(config, verbose));

        let file = match &config.dir {
            Some(dir) => {
                if let Err(e) = fs::create_dir_all(dir) {
                    result = Err(InspectError::config(format!(
                        "Failed to create log directory {}: {}",
                        dir.display(),
                        e
                    )));
                    return;
                }
                let appender = match tracing_appender::rolling::RollingFileAppender::builder()
                    .rotation(tracing_appender::rolling::Rotation::DAILY)
                    .filename_prefix("rediscluster-inspect")
                    .filename_suffix("log")
                    .build(dir)
                {
                    Ok(appender) => appender,
                    Err(e) => {
                        result = Err(InspectError::config(format!(
                            "Failed to create file appender: {}",
                            e
                        )));
                        return;
                    }
                };
                Some(
                    fmt::Layer::new()
                        .json()
                        .with_writer(appender)
                        .with_file(true)
                        .with_line_number(true)
                        .with_thread_ids(true)
                        .with_target(true)
                        .with_ansi(false)
                        .with_filter(filter(config, verbose)),
                )
            }
            None => None,
        };

        if let Err(e) = tracing_subscriber::registry()
            .with(console)
            .with(file)
            .try_init()
        {
            result = Err(InspectError::config(format!(
                "Failed to set tracing subscriber: {}",
                e
            )));
        }
    });

    result
}
