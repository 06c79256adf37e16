//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand, ValueEnum};
use mavlink_bt_core::TransportPolicy;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Connect to a peripheral and forward MAVLink frames to it
    Connect {
        /// Bluetooth address of the peripheral
        #[arg(short, long)]
        address: String,
        /// Transport to use, overriding the configuration
        #[arg(short, long, value_enum)]
        transport: Option<TransportArg>,
        /// UDP address to receive MAVLink datagrams on
        #[arg(short, long, conflicts_with = "stdin")]
        udp: Option<String>,
        /// Read MAVLink bytes from standard input instead of UDP
        #[arg(long)]
        stdin: bool,
    },
    /// Print an example configuration, or write it to a file
    Config {
        /// File to write the example configuration to
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// Transport selection on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportArg {
    Auto,
    Ble,
    Spp,
}

impl From<TransportArg> for TransportPolicy {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Auto => TransportPolicy::Auto,
            TransportArg::Ble => TransportPolicy::Ble,
            TransportArg::Spp => TransportPolicy::Spp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_arguments() {
        let cli = Cli::parse_from([
            "mavbt",
            "-v",
            "connect",
            "--address",
            "AA:BB:CC:DD:EE:FF",
            "--transport",
            "spp",
            "--udp",
            "0.0.0.0:14550",
        ]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Connect {
                address,
                transport,
                udp,
                stdin,
            } => {
                assert_eq!(address, "AA:BB:CC:DD:EE:FF");
                assert_eq!(transport.map(TransportPolicy::from), Some(TransportPolicy::Spp));
                assert_eq!(udp.as_deref(), Some("0.0.0.0:14550"));
                assert!(!stdin);
            }
            Commands::Config { .. } => panic!("expected connect"),
        }
    }

    #[test]
    fn test_udp_and_stdin_conflict() {
        let result = Cli::try_parse_from([
            "mavbt", "connect", "-a", "AA:BB:CC:DD:EE:FF", "--udp", "0.0.0.0:1", "--stdin",
        ]);
        assert!(result.is_err());
    }
}
