use core::fmt::{self as core_fmt, Write as _};

use time::{OffsetDateTime, format_description::FormatItem, macros::format_description};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    fmt::{
        FmtContext,
        format::{FormatEvent, FormatFields, Writer},
    },
    registry::LookupSpan,
};

const TIMESTAMP: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]");

#[derive(Clone, Copy)]
struct Palette {
    reset: &'static str,
    dim: &'static str,
    bold: &'static str,
}

impl Palette {
    const ANSI: Self = Self {
        reset: "\x1b[0m",
        dim: "\x1b[2m",
        bold: "\x1b[1m",
    };
    const PLAIN: Self = Self {
        reset: "",
        dim: "",
        bold: "",
    };

    fn level(self, level: &Level) -> &'static str {
        if self.reset.is_empty() {
            return "";
        }
        match *level {
            Level::ERROR => "\x1b[1;31m",
            Level::WARN => "\x1b[1;33m",
            Level::INFO => "\x1b[1;32m",
            Level::DEBUG => "\x1b[1;34m",
            Level::TRACE => "\x1b[1;35m",
        }
    }
}

/// One line per event:
/// `[timestamp] LEVEL thread target:line span.. > fields`.
///
/// Entered span names sit between the location and the message.
pub struct GuildFormatter {
    palette: Palette,
}

impl GuildFormatter {
    pub fn new(use_ansi: bool) -> Self {
        Self {
            palette: if use_ansi { Palette::ANSI } else { Palette::PLAIN },
        }
    }
}

impl<S, N> FormatEvent<S, N> for GuildFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> core_fmt::Result {
        let p = self.palette;
        let meta = event.metadata();

        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        match now.format(TIMESTAMP) {
            Ok(ts) => write!(writer, "{}[{}]{} ", p.dim, ts, p.reset)?,
            Err(_) => write!(writer, "{}[-]{} ", p.dim, p.reset)?,
        }

        write!(
            writer,
            "{}{:<5}{} {} ",
            p.level(meta.level()),
            meta.level().as_str(),
            p.reset,
            std::thread::current().name().unwrap_or("worker"),
        )?;

        write!(writer, "{}{}", p.dim, meta.target())?;
        if let Some(line) = meta.line() {
            write!(writer, ":{}", line)?;
        }
        writer.write_str(p.reset)?;
        writer.write_char(' ')?;

        for span in ctx.event_scope().into_iter().flat_map(|s| s.from_root()) {
            write!(writer, "{}{}{} ", p.bold, span.name(), p.reset)?;
        }

        writer.write_str("> ")?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer, "{}", p.reset)
    }
}
