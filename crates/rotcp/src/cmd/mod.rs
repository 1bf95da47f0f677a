use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use rotcp::definition::ProtocolDefinition;
use rotcp::dispatch::ErrorPolicy;

use crate::exit::{definition_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod inspect;
pub mod send;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve a protocol over TCP and print every decoded message.
    Serve(ServeArgs),
    /// Decode frames from hex text or a binary capture.
    Decode(DecodeArgs),
    /// Encode one message and send it (or print it with --dry-run).
    Send(SendArgs),
    /// Show the frame layout and functions of a protocol file.
    Inspect(InspectArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Inspect(args) => inspect::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum PolicyArg {
    /// Drop the bad frame and keep reading.
    Skip,
    /// Close the connection on the first bad frame.
    Close,
}

impl From<PolicyArg> for ErrorPolicy {
    fn from(policy: PolicyArg) -> Self {
        match policy {
            PolicyArg::Skip => ErrorPolicy::SkipFrame,
            PolicyArg::Close => ErrorPolicy::CloseConnection,
        }
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on (e.g. 0.0.0.0:9000).
    pub addr: String,
    /// Protocol definition file.
    #[arg(long, short = 'p', value_name = "FILE")]
    pub protocol: PathBuf,
    /// What to do with a frame that fails validation or decoding.
    #[arg(long, value_enum, default_value = "skip")]
    pub policy: PolicyArg,
    /// Exit after printing N messages.
    #[arg(long)]
    pub count: Option<u64>,
    /// Largest accepted payload in bytes.
    #[arg(long, value_name = "BYTES")]
    pub max_payload: Option<usize>,
    /// Per-connection read timeout (e.g. 30s, 500ms).
    #[arg(long)]
    pub read_timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Protocol definition file.
    #[arg(long, short = 'p', value_name = "FILE")]
    pub protocol: PathBuf,
    /// Frames as hex text; whitespace is ignored.
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    pub hex: Option<String>,
    /// Binary capture holding one or more frames.
    #[arg(long, conflicts_with = "hex")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Address to connect to. Not needed with --dry-run.
    #[arg(required_unless_present = "dry_run")]
    pub addr: Option<String>,
    /// Protocol definition file.
    #[arg(long, short = 'p', value_name = "FILE")]
    pub protocol: PathBuf,
    /// Function code of the message.
    #[arg(long, short = 'c')]
    pub code: u64,
    /// Field values as a JSON object, keyed by field name.
    #[arg(long, default_value = "{}")]
    pub values: String,
    /// Encryption flag.
    #[arg(long, default_value = "0")]
    pub flag: u64,
    /// Serial number, when the frame layout carries one.
    #[arg(long, default_value = "0")]
    pub serial: u64,
    /// Print the encoded frame as hex instead of sending it.
    #[arg(long)]
    pub dry_run: bool,
    /// Connect and write timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Protocol definition file.
    #[arg(long, short = 'p', value_name = "FILE")]
    pub protocol: PathBuf,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn load_definition(path: &Path) -> CliResult<ProtocolDefinition> {
    ProtocolDefinition::load(path).map_err(|err| definition_error("invalid protocol file", err))
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration(" ").is_err());
    }
}
