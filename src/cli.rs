//! CLI argument parsing

use crate::programmers::{self, ProgrammerParams};
use clap::{Parser, Subcommand};
use picprog_core::device::DeviceFamily;
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Generate dynamic help text for the programmer argument
fn programmer_help() -> String {
    format!(
        "Programmer to use, as name[:key=value,...] [available: {}]",
        programmers::programmer_names_short()
    )
}

#[derive(Parser)]
#[command(name = "picprog")]
#[command(author, version, about = "PIC18F in-circuit serial programmer", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command that talks to a target
#[derive(clap::Args, Debug, Clone)]
pub struct SessionArgs {
    #[arg(short, long, help = programmer_help())]
    pub programmer: ProgrammerParams,

    /// Device family
    #[arg(short, long, default_value = "18f")]
    pub family: DeviceFamily,

    /// Record up to N ICSP transfers and print them when done
    #[arg(long, value_name = "N")]
    pub trace_commands: Option<usize>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read and show the device ID
    #[command(alias = "probe")]
    Id {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Read device memory to a file (.hex for Intel HEX, raw code otherwise)
    Read {
        #[command(flatten)]
        session: SessionArgs,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Code address to start reading at (hex or decimal, even)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        offset: u32,

        /// Number of code bytes to read (hex or decimal, 0 reads to the end)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        size: u32,

        /// Also read the data EEPROM
        #[arg(long)]
        eeprom: bool,
    },

    /// Erase the device and program an Intel HEX file
    Write {
        #[command(flatten)]
        session: SessionArgs,

        /// Input file path (Intel HEX)
        #[arg(short, long)]
        input: PathBuf,

        /// Use bulk erase instead of page-wise erase
        #[arg(long)]
        bulk: bool,

        /// Skip the read-back verification
        #[arg(long)]
        no_verify: bool,

        /// Also program the data EEPROM contents of the file
        #[arg(long)]
        eeprom: bool,
    },

    /// Erase code memory
    Erase {
        #[command(flatten)]
        session: SessionArgs,

        /// Use bulk erase (also clears configuration and EEPROM)
        #[arg(long)]
        bulk: bool,
    },

    /// Verify device contents against an Intel HEX file
    Verify {
        #[command(flatten)]
        session: SessionArgs,

        /// Input file path to verify against
        #[arg(short, long)]
        input: PathBuf,
    },

    /// List supported programmers
    ListProgrammers,

    /// List supported devices
    ListDevices,
}
