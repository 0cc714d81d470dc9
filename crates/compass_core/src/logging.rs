//! Log output wiring for the solver binary.

use std::{fs::File, io::Write, path::Path};

use env_logger::{Builder, Target, WriteStyle, fmt::Formatter};
use log::{Level, LevelFilter};

use crate::{Error, Result};

/// Line layout for emitted log records. Compact drops the module target.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogFormat {
    Compact,
    Pretty,
}

impl LogFormat {
    pub(crate) fn parse(value: &str) -> Result<Self> {
        match value {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            _ => Err(Error::invalid_input(format!(
                "Invalid value for --log-format: {value}"
            ))),
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
        }
    }
}

/// Installs the global logger. Records go to `output` when a path is
/// given, stderr otherwise.
pub fn init_logger(
    level: LevelFilter,
    format: LogFormat,
    timestamp: bool,
    output: Option<&Path>,
) -> Result<()> {
    let target = match output {
        Some(path) => {
            let file = File::create(path).map_err(|e| {
                Error::other(format!(
                    "failed to create log output file {}: {e}",
                    path.display()
                ))
            })?;
            Target::Pipe(Box::new(file))
        }
        None => Target::Stderr,
    };

    Builder::new()
        .filter_level(level)
        .write_style(WriteStyle::Never)
        .format(move |buf: &mut Formatter, record| {
            if timestamp {
                write!(buf, "{} ", buf.timestamp_millis())?;
            }
            let tag = level_tag(record.level());
            match format {
                LogFormat::Compact => writeln!(buf, "{tag} {}", record.args()),
                LogFormat::Pretty => {
                    writeln!(buf, "{tag} [{}] {}", record.target(), record.args())
                }
            }
        })
        .target(target)
        .try_init()
        .map_err(|e| Error::other(format!("logger init failed: {e}")))
}

fn level_tag(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARN",
        Level::Info => "INFO",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}
