use log4rs::{
    append::{
        console::ConsoleAppender,
        file::FileAppender,
    },
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
};
use std::fs;

pub const LOG_FILE_NAME: &str = "takeaway-wheel.log";
const LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} | {({l}):5.5} | {f}:{L} - {m}{n}";

pub fn setup_logging(settings: &crate::config::Config) -> Result<(), Box<dyn std::error::Error>> {
    fs::create_dir_all(&settings.log_dir)?;

    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();

    let file = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build(settings.log_dir.join(LOG_FILE_NAME))?;

    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .appender(Appender::builder().build("file", Box::new(file)))
        .build(
            Root::builder()
                .appender("stdout")
                .appender("file")
                .build(settings.log_level),
        )?;

    log4rs::init_config(config)?;

    Ok(())
}

/// Falls back to `env_logger` on stderr when the file appender cannot be set up.
pub fn setup_fallback_logging(settings: &crate::config::Config) {
    if let Err(e) = env_logger::Builder::new()
        .filter_level(settings.log_level)
        .try_init()
    {
        eprintln!("Failed to set up fallback logging: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_logging_tolerates_an_installed_logger() {
        let settings = crate::config::Config::default();
        setup_fallback_logging(&settings);
        // A logger is already installed now; the second call only reports it.
        setup_fallback_logging(&settings);
        log::info!("still logging after a repeated setup");
    }
}
