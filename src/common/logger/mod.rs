use std::{fs, path::Path, sync::OnceLock};

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub mod formatter;
pub mod writer;

pub use formatter::*;
pub use writer::*;

use crate::configs::LoggingConfig;

pub(crate) static GLOBAL_FILE_WRITER: OnceLock<CircularFileWriter> = OnceLock::new();

#[macro_export]
macro_rules! log_println {
    () => {{
        std::println!();
        $crate::common::logger::append_to_file_raw("\n");
    }};
    ($($arg:tt)*) => {{
        let msg = format!($($arg)*);
        std::println!("{}", msg);
        $crate::common::logger::append_to_file_raw(&format!("{}\n", msg));
    }};
}

/// Mirrors a raw line into the log file, if file logging was set up.
pub fn append_to_file_raw(msg: &str) {
    if let Some(mut writer) = GLOBAL_FILE_WRITER.get().cloned() {
        use std::io::Write;
        let clean_msg = strip_ansi_escapes(msg);
        let _ = writer.write_all(clean_msg.as_bytes());
    }
}

/// Builds the directive string handed to `EnvFilter` when `RUST_LOG` is unset.
pub fn filter_directives(config: &LoggingConfig) -> String {
    let level = config.level.as_deref().unwrap_or("info");
    match config.filters.as_deref() {
        Some(filters) if !filters.is_empty() => format!("{},reqwest=warn,{}", level, filters),
        _ => format!("{},reqwest=warn", level),
    }
}

/// Installs the global subscriber.
///
/// Hosts that already own a subscriber can skip this entirely; a second call
/// is a no-op instead of a panic.
pub fn init(config: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(config)));

    let stdout_layer = fmt::layer()
        .event_format(GuildFormatter::new(config.ansi.unwrap_or(true)))
        .with_ansi(config.ansi.unwrap_or(true));

    let file_layer = config.file.as_ref().map(|file_config| {
        if let Some(parent) = Path::new(&file_config.path).parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                eprintln!("Failed to create log directory: {}", e);
            }
        }

        let writer = CircularFileWriter::new(file_config.path.clone(), file_config.max_lines);
        let _ = GLOBAL_FILE_WRITER.set(writer.clone());
        fmt::layer()
            .with_writer(writer)
            .event_format(GuildFormatter::new(false))
            .with_ansi(false)
    });

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives_defaults_to_info() {
        let config = LoggingConfig::default();
        assert_eq!(filter_directives(&config), "info,reqwest=warn");
    }

    #[test]
    fn test_filter_directives_appends_custom_filters() {
        let config = LoggingConfig {
            level: Some("debug".into()),
            filters: Some("guildwave::voice=trace".into()),
            ..Default::default()
        };
        assert_eq!(
            filter_directives(&config),
            "debug,reqwest=warn,guildwave::voice=trace"
        );
    }
}
