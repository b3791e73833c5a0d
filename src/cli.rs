//! Command-line interface for the replay binary.
//!
//! Uses lexopt for minimal binary size overhead.

use std::ffi::OsString;
use std::path::PathBuf;

use crate::position::PositioningMethods;

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// JSON file with the readings to replay.
    pub replay: Option<PathBuf>,
    /// Update interval in milliseconds (overrides config file).
    pub interval_ms: Option<u32>,
    /// Single-shot request with this timeout instead of continuous updates.
    pub timeout_ms: Option<u32>,
    /// Preferred positioning methods.
    pub methods: Option<PositioningMethods>,
    /// Application name used as desktop id fallback.
    pub app_name: Option<String>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Neither restore nor save the last position.
    pub no_persist: bool,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('r') | Long("replay") => {
                result.replay = Some(parser.value()?.parse()?);
            }
            Short('i') | Long("interval") => {
                let value: String = parser.value()?.parse()?;
                result.interval_ms = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("interval", value))?,
                );
            }
            Short('t') | Long("timeout") => {
                let value: String = parser.value()?.parse()?;
                result.timeout_ms = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("timeout", value))?,
                );
            }
            Short('m') | Long("methods") => {
                let value: String = parser.value()?.parse()?;
                result.methods = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("methods", value))?,
                );
            }
            Short('a') | Long("app-name") => {
                result.app_name = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Long("no-persist") => {
                result.no_persist = true;
            }
            Value(val) => {
                return Err(ArgsError::UnexpectedArgument(val.to_string_lossy().into()));
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"geoclue-position {version}
Replay location readings through a position source

USAGE:
    geoclue-position [OPTIONS]

OPTIONS:
    -c, --config <FILE>     Path to configuration file (JSON)
    -r, --replay <FILE>     JSON array of location readings to replay
    -i, --interval <MS>     Update interval in milliseconds
    -t, --timeout <MS>      Single-shot request with this timeout (0 = cold start)
    -m, --methods <M>       Preferred methods (all, satellite, non-satellite, none)
    -a, --app-name <NAME>   Application name used as desktop id
    -l, --log-level <LVL>   Log level (error, warn, info, debug, trace)
        --no-persist        Do not restore or save the last position
    -h, --help              Print help
    -V, --version           Print version

ENVIRONMENT VARIABLES:
    GEOCLUE_APP_DESKTOP_ID             Desktop id (overrides application name)
    GEOCLUE_POSITION_UPDATE_INTERVAL   Update interval (overrides config)
    GEOCLUE_POSITION_METHODS           Preferred methods (overrides config)
    GEOCLUE_POSITION_LOG_LEVEL         Log level (overrides config)
    RUST_LOG                           Alternative log level setting

EXAMPLES:
    # Continuous updates every 2 seconds
    geoclue-position -r track.json -i 2000

    # One fix within 5 seconds
    geoclue-position -r track.json -t 5000
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("geoclue-position {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Unexpected positional argument.
    UnexpectedArgument(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
