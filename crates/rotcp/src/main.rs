mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "rotcp", version, about = "Rules over TCP: binary line protocol toolkit")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_subcommand() {
        let cli = Cli::try_parse_from([
            "rotcp",
            "serve",
            "127.0.0.1:9000",
            "--protocol",
            "demo.json",
            "--policy",
            "close",
            "--count",
            "2",
        ])
        .expect("serve args should parse");

        assert!(matches!(cli.command, Command::Serve(_)));
    }

    #[test]
    fn send_requires_addr_unless_dry_run() {
        let err = Cli::try_parse_from(["rotcp", "send", "-p", "demo.json", "--code", "1"])
            .expect_err("missing addr should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        let cli = Cli::try_parse_from([
            "rotcp",
            "send",
            "-p",
            "demo.json",
            "--code",
            "1",
            "--dry-run",
        ])
        .expect("dry run should not need an address");
        assert!(matches!(cli.command, Command::Send(_)));
    }

    #[test]
    fn rejects_conflicting_decode_inputs() {
        let err = Cli::try_parse_from([
            "rotcp",
            "decode",
            "-p",
            "demo.json",
            "--hex",
            "68",
            "--file",
            "frames.bin",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn global_format_after_subcommand() {
        let cli = Cli::try_parse_from(["rotcp", "inspect", "-p", "demo.json", "--format", "pretty"])
            .expect("inspect args should parse");
        assert!(matches!(cli.format, Some(OutputFormat::Pretty)));
    }
}
