use std::{
    env, fmt,
    path::Path,
};

use log::LevelFilter;

use crate::logging::LogFormat;
use crate::{Error, Result};

/// Runtime options for tour construction.
#[derive(Clone, Debug)]
pub struct SolverOptions {
    /// Tour construction heuristic to run.
    pub algorithm: Algorithm,
    /// Edge-length norm applied to the input coordinates.
    pub norm: NormKind,
    /// Starting node for the heuristics that take one.
    pub start: usize,
    /// Random seed for tree construction.
    pub seed: u64,
    /// Structured logging level.
    pub log_level: LogLevel,
    /// Logging output format.
    pub log_format: LogFormat,
    /// Include timestamps in log lines.
    pub log_timestamp: bool,
    /// Optional output file path for logs. Empty means stderr.
    pub log_output: String,
    /// Optional input file path for points. Empty means stdin.
    pub input: String,
    /// Optional output file path for the ordered tour. Empty means stdout.
    pub output: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Algorithm {
    NearestNeighbor,
    Greedy,
    QBoruvka,
    Boruvka,
    FarthestAddition,
}

impl Algorithm {
    fn parse(value: &str) -> Result<Self> {
        match value {
            "nearest" | "nn" => Ok(Self::NearestNeighbor),
            "greedy" => Ok(Self::Greedy),
            "qboruvka" => Ok(Self::QBoruvka),
            "boruvka" => Ok(Self::Boruvka),
            "far-add" | "farthest" => Ok(Self::FarthestAddition),
            _ => Err(Error::invalid_input(format!(
                "Invalid value for --algorithm: {value}"
            ))),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::NearestNeighbor => "nearest",
            Self::Greedy => "greedy",
            Self::QBoruvka => "qboruvka",
            Self::Boruvka => "boruvka",
            Self::FarthestAddition => "far-add",
        }
    }
}

/// The coordinate norms the tree accepts, as named on the command line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NormKind {
    Euclidean,
    EuclideanCeiling,
    Manhattan,
    Max,
}

impl NormKind {
    fn parse(value: &str) -> Result<Self> {
        match value {
            "euclidean" | "euc-2d" => Ok(Self::Euclidean),
            "euclidean-ceiling" | "ceil-2d" => Ok(Self::EuclideanCeiling),
            "manhattan" | "man-2d" => Ok(Self::Manhattan),
            "max" | "max-2d" => Ok(Self::Max),
            _ => Err(Error::invalid_input(format!(
                "Invalid value for --norm: {value}"
            ))),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Euclidean => "euclidean",
            Self::EuclideanCeiling => "euclidean-ceiling",
            Self::Manhattan => "manhattan",
            Self::Max => "max",
        }
    }

    pub fn to_norm(self) -> crate::data::Norm {
        match self {
            Self::Euclidean => crate::data::Norm::Euclidean,
            Self::EuclideanCeiling => crate::data::Norm::EuclideanCeil,
            Self::Manhattan => crate::data::Norm::Manhattan,
            Self::Max => crate::data::Norm::Max,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
    Off,
}

impl LogLevel {
    fn parse(value: &str) -> Result<Self> {
        match value {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            "off" => Ok(Self::Off),
            _ => Err(Error::invalid_input(format!(
                "Invalid value for --log-level: {value}"
            ))),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
            Self::Off => "off",
        }
    }

    pub fn to_filter(self) -> LevelFilter {
        match self {
            Self::Error => LevelFilter::Error,
            Self::Warn => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
            Self::Trace => LevelFilter::Trace,
            Self::Off => LevelFilter::Off,
        }
    }
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Greedy,
            norm: NormKind::Euclidean,
            start: 0,
            seed: 99,
            log_level: LogLevel::Warn,
            log_format: LogFormat::Compact,
            log_timestamp: true,
            log_output: String::new(),
            input: String::new(),
            output: String::new(),
        }
    }
}

impl fmt::Display for SolverOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "algorithm={} norm={} start={} seed={} log-level={} log-format={}",
            self.algorithm.as_str(),
            self.norm.as_str(),
            self.start,
            self.seed,
            self.log_level.as_str(),
            self.log_format.as_str(),
        )
    }
}

impl SolverOptions {
    pub fn from_args() -> Result<Self> {
        Self::parse_from_iter(env::args().skip(1))
    }

    fn parse_from_iter<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = Self::default();
        let mut args = args
            .into_iter()
            .map(|arg| arg.as_ref().to_owned())
            .peekable();

        while let Some(arg) = args.next() {
            if arg == "--help" || arg == "-h" {
                return Err(Error::invalid_input(Self::usage()));
            }

            let Some(raw_name) = arg.strip_prefix("--") else {
                return Err(Error::invalid_input(format!(
                    "Unexpected argument: {arg}\n\n{}",
                    Self::usage()
                )));
            };

            if raw_name.is_empty() {
                return Err(Error::invalid_input(format!(
                    "Invalid option name: {arg}\n\n{}",
                    Self::usage()
                )));
            }

            let (name, value) = split_arg(raw_name, &mut args);

            match name.as_str() {
                "algorithm" => options.algorithm = Algorithm::parse(&required(&name, value)?)?,
                "norm" => options.norm = NormKind::parse(&required(&name, value)?)?,
                "start" => {
                    let value = required(&name, value)?;
                    options.start = value.parse().map_err(|_| {
                        Error::invalid_input(format!("Invalid value for --start: {value}"))
                    })?;
                }
                "seed" => {
                    let value = required(&name, value)?;
                    options.seed = value.parse().map_err(|_| {
                        Error::invalid_input(format!("Invalid value for --seed: {value}"))
                    })?;
                }
                "log-level" => options.log_level = LogLevel::parse(&required(&name, value)?)?,
                "log-format" => options.log_format = LogFormat::parse(&required(&name, value)?)?,
                "log-timestamp" => {
                    options.log_timestamp = match value {
                        Some(v) => parse_bool(&name, &v)?,
                        None => true,
                    };
                }
                "no-log-timestamp" => {
                    if value.is_some() {
                        return Err(Error::invalid_input(format!(
                            "Flag --{name} does not take a value"
                        )));
                    }
                    options.log_timestamp = false;
                }
                "log-output" => options.log_output = required(&name, value)?,
                "input" => options.input = required(&name, value)?,
                "output" => options.output = required(&name, value)?,
                _ => {
                    return Err(Error::invalid_input(format!(
                        "Unknown option: --{name}\n\n{}",
                        Self::usage()
                    )));
                }
            }
        }

        Ok(options)
    }

    pub fn usage() -> &'static str {
        concat!(
            "Usage:\n",
            "  compass [options] [--input points.txt]\n",
            "  compass [options] < points.txt\n\n",
            "Options:\n",
            "  --algorithm <nearest|greedy|qboruvka|boruvka|far-add>\n",
            "  --norm <euclidean|euclidean-ceiling|manhattan|max>\n",
            "  --start <usize>\n",
            "  --seed <u64>\n",
            "  --log-level <error|warn|info|debug|trace|off>\n",
            "  --log-format <compact|pretty>\n",
            "  --log-timestamp[=<bool>]\n",
            "  --no-log-timestamp\n",
            "  --log-output <path>\n",
            "  --input <path>\n",
            "  --output <path>\n",
            "  --help\n",
            "\n",
            "Examples:\n",
            "  compass --algorithm greedy --log-level info < points.txt\n",
            "  compass --algorithm far-add --start 12 --input points.txt --output tour.txt\n",
            "  compass --norm=manhattan --log-level=debug --log-format=pretty < points.txt\n",
        )
    }

    pub fn log_output_path(&self) -> Option<&Path> {
        path_or_default(&self.log_output)
    }

    pub fn input_path(&self) -> Option<&Path> {
        path_or_default(&self.input)
    }

    pub fn output_path(&self) -> Option<&Path> {
        path_or_default(&self.output)
    }
}

fn path_or_default(value: &str) -> Option<&Path> {
    let value = value.trim();
    if value.is_empty() || value == "-" {
        None
    } else {
        Some(Path::new(value))
    }
}

/// Splits `--name=value`, or takes the following argument as the value when
/// it does not look like another option.
fn split_arg<I>(raw_name: &str, args: &mut std::iter::Peekable<I>) -> (String, Option<String>)
where
    I: Iterator<Item = String>,
{
    if let Some((name, value)) = raw_name.split_once('=') {
        return (name.to_owned(), Some(value.to_owned()));
    }
    if args.peek().is_some_and(|next| !next.starts_with("--")) {
        return (raw_name.to_owned(), args.next());
    }
    (raw_name.to_owned(), None)
}

fn required(name: &str, value: Option<String>) -> Result<String> {
    value.ok_or_else(|| Error::invalid_input(format!("Missing value for --{name}")))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value {
        "1" | "true" | "TRUE" | "True" | "yes" | "YES" | "on" | "ON" => Ok(true),
        "0" | "false" | "FALSE" | "False" | "no" | "NO" | "off" | "OFF" => Ok(false),
        _ => Err(Error::invalid_input(format!(
            "Invalid boolean for --{name}: {value} (expected true/false)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use log::LevelFilter;

    use super::{Algorithm, LogFormat, LogLevel, NormKind, SolverOptions, parse_bool};

    #[test]
    fn parse_bool_accepts_common_true_values() {
        assert!(parse_bool("x", "true").expect("parse"));
        assert!(parse_bool("x", "1").expect("parse"));
        assert!(parse_bool("x", "YES").expect("parse"));
        assert!(parse_bool("x", "ON").expect("parse"));
    }

    #[test]
    fn parse_bool_rejects_unknown_values() {
        let err = parse_bool("log-timestamp", "maybe").expect_err("invalid bool should fail");
        assert!(
            err.to_string()
                .contains("Invalid boolean for --log-timestamp: maybe")
        );
    }

    #[test]
    fn log_level_maps_to_expected_filter() {
        assert_eq!(LogLevel::Error.to_filter(), LevelFilter::Error);
        assert_eq!(LogLevel::Warn.to_filter(), LevelFilter::Warn);
        assert_eq!(LogLevel::Info.to_filter(), LevelFilter::Info);
        assert_eq!(LogLevel::Debug.to_filter(), LevelFilter::Debug);
        assert_eq!(LogLevel::Trace.to_filter(), LevelFilter::Trace);
        assert_eq!(LogLevel::Off.to_filter(), LevelFilter::Off);
    }

    #[test]
    fn parse_from_iter_applies_known_options() {
        let options = SolverOptions::parse_from_iter([
            "--algorithm=far-add",
            "--norm=manhattan",
            "--start=7",
            "--seed=123",
            "--log-level=debug",
            "--log-format=pretty",
            "--log-timestamp=false",
            "--log-output=run.log",
            "--input=points.txt",
            "--output=tour.txt",
        ])
        .expect("parse options");

        assert_eq!(options.algorithm, Algorithm::FarthestAddition);
        assert_eq!(options.norm, NormKind::Manhattan);
        assert_eq!(options.start, 7);
        assert_eq!(options.seed, 123);
        assert_eq!(options.log_level, LogLevel::Debug);
        assert_eq!(options.log_format, LogFormat::Pretty);
        assert!(!options.log_timestamp);
        assert_eq!(options.log_output, "run.log");
        assert_eq!(options.input, "points.txt");
        assert_eq!(options.output, "tour.txt");
    }

    #[test]
    fn parse_from_iter_accepts_space_separated_values() {
        let options = SolverOptions::parse_from_iter(["--algorithm", "boruvka", "--start", "3"])
            .expect("parse options");
        assert_eq!(options.algorithm, Algorithm::Boruvka);
        assert_eq!(options.start, 3);
    }

    #[test]
    fn parse_from_iter_accepts_no_log_timestamp_flag() {
        let options = SolverOptions::parse_from_iter(["--no-log-timestamp"]).expect("parse");
        assert!(!options.log_timestamp);
    }

    #[test]
    fn parse_from_iter_rejects_no_log_timestamp_with_value() {
        let err = SolverOptions::parse_from_iter(["--no-log-timestamp=true"])
            .expect_err("expected flag value rejection");
        assert!(err.to_string().contains("does not take a value"));
    }

    #[test]
    fn parse_from_iter_rejects_unknown_option() {
        let err = SolverOptions::parse_from_iter(["--unknown-opt=1"])
            .expect_err("expected unknown option error");
        assert!(err.to_string().contains("Unknown option: --unknown-opt"));
    }

    #[test]
    fn parse_from_iter_rejects_unexpected_positional_argument() {
        let err =
            SolverOptions::parse_from_iter(["points.txt"]).expect_err("expected positional error");
        assert!(err.to_string().contains("Unexpected argument: points.txt"));
    }

    #[test]
    fn parse_from_iter_requires_value_for_algorithm() {
        let err = SolverOptions::parse_from_iter(["--algorithm"])
            .expect_err("missing value should fail");
        assert!(err.to_string().contains("Missing value for --algorithm"));
    }

    #[test]
    fn parse_from_iter_rejects_bad_start() {
        let err = SolverOptions::parse_from_iter(["--start=minus-one"])
            .expect_err("bad start should fail");
        assert!(err.to_string().contains("Invalid value for --start"));
    }

    #[test]
    fn parse_from_iter_help_returns_usage_error() {
        let err =
            SolverOptions::parse_from_iter(["--help"]).expect_err("help should short-circuit");
        assert!(err.to_string().contains("Usage:"));
    }

    #[test]
    fn algorithm_defaults_to_greedy() {
        let options = SolverOptions::default();
        assert_eq!(options.algorithm, Algorithm::Greedy);
        assert_eq!(options.norm, NormKind::Euclidean);
    }

    #[test]
    fn output_path_treats_empty_and_dash_as_stdout() {
        let options = SolverOptions::default();
        assert!(options.output_path().is_none());

        let options = SolverOptions {
            output: "-".to_string(),
            ..SolverOptions::default()
        };
        assert!(options.output_path().is_none());
    }

    #[test]
    fn input_path_returns_path_for_non_empty_value() {
        let options = SolverOptions {
            input: "in/points.txt".to_string(),
            ..SolverOptions::default()
        };
        assert_eq!(
            options.input_path().expect("path should exist"),
            std::path::Path::new("in/points.txt")
        );
    }

    #[test]
    fn norm_kind_maps_to_data_norm() {
        assert_eq!(NormKind::Manhattan.to_norm(), crate::data::Norm::Manhattan);
        assert_eq!(
            NormKind::EuclideanCeiling.to_norm(),
            crate::data::Norm::EuclideanCeil
        );
    }
}
