use anyhow::Result;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, Event, Subscriber};
use tracing_subscriber::fmt::format::{self, FormatEvent, FormatFields};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const LOG_DIR: &str = "logs";
const DEFAULT_FILTER: &str = "info,reqwest=warn,hyper=warn,rustls=warn";

/// `2026-10-14 09:30:00.123 INFO token:212: message`
struct LineFormat {
    with_lines: bool,
}

fn short_target(target: &str) -> String {
    target
        .strip_prefix("token_launcher::")
        .unwrap_or(target)
        .replace("::", ":")
}

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();
        write!(
            writer,
            "{} {:>5} {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            meta.level(),
            short_target(meta.target())
        )?;
        if self.with_lines {
            if let Some(line) = meta.line() {
                write!(writer, ":{}", line)?;
            }
        }
        write!(writer, ": ")?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

pub fn log_file_name(now: chrono::DateTime<chrono::Local>) -> String {
    format!("launcher_{}.log", now.format("%Y%m%d_%H%M%S"))
}

/// Console plus `logs/launcher_<timestamp>.log`, both filtered by `RUST_LOG`.
/// Returns the log file path.
pub fn init() -> Result<PathBuf> {
    fs::create_dir_all(LOG_DIR)?;
    let path = PathBuf::from(LOG_DIR).join(log_file_name(chrono::Local::now()));
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .event_format(LineFormat { with_lines: false });
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .event_format(LineFormat { with_lines: true });
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .with(filter)
        .try_init()?;

    debug!("logging to {}", path.display());
    Ok(path)
}

#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
