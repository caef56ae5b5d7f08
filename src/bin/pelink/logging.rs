use std::io::{IsTerminal, Write};

use log::{Level, LevelFilter};
use termcolor::{BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

struct CliLogger {
    stdout: BufferWriter,
    stderr: BufferWriter,
    max_level: LevelFilter,
}

impl log::Log for CliLogger {
    #[inline]
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level().to_level_filter() <= self.max_level
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let writer = if record.level() <= Level::Warn {
            &self.stderr
        } else {
            &self.stdout
        };

        let mut buffer = writer.buffer();
        let _ = write!(buffer, "{}: ", env!("CARGO_BIN_NAME"));

        let (color, label) = match record.level() {
            Level::Error => (Color::Red, "error:"),
            Level::Warn => (Color::Yellow, "warning:"),
            Level::Info => (Color::Green, "info:"),
            Level::Debug => (Color::White, "debug:"),
            Level::Trace => (Color::Blue, "trace:"),
        };
        let _ = buffer.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
        let _ = write!(buffer, "{label}");
        let _ = buffer.reset();
        let _ = writeln!(buffer, " {}", record.args());

        let _ = writer.print(&buffer);
    }

    fn flush(&self) {}
}

/// Sets up logging for the cli.
pub fn setup_logger(verbose: u8) -> anyhow::Result<()> {
    let max_level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let color_choice = |terminal: bool| {
        if terminal && std::env::var_os("NO_COLOR").is_none() {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        }
    };

    log::set_boxed_logger(Box::from(CliLogger {
        stdout: BufferWriter::stdout(color_choice(std::io::stdout().is_terminal())),
        stderr: BufferWriter::stderr(color_choice(std::io::stderr().is_terminal())),
        max_level,
    }))
    .map(|()| log::set_max_level(max_level))?;

    Ok(())
}
