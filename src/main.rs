//! picprog - PIC18F in-circuit serial programmer
//!
//! Reads, writes, erases and verifies PIC18F microcontrollers over ICSP.
//!
//! # Architecture
//!
//! All programming logic lives in `picprog-core`, which reaches the target
//! through the `IcspTransport` trait. Programmers (currently the `dummy`
//! emulator) implement that trait; this binary selects one, wraps it in a
//! programming context and maps subcommands onto the context's operations.

mod cli;
mod commands;
mod programmers;

use clap::Parser;
use cli::{Cli, Commands};
use commands::{erase_mode, run_session, Action};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    match cli.command {
        Commands::Id { session } => run_session(&session, Action::Id),
        Commands::Read {
            session,
            output,
            offset,
            size,
            eeprom,
        } => run_session(
            &session,
            Action::Read {
                output,
                offset,
                size: size as usize,
                eeprom,
            },
        ),
        Commands::Write {
            session,
            input,
            bulk,
            no_verify,
            eeprom,
        } => run_session(
            &session,
            Action::Write {
                input,
                mode: erase_mode(bulk),
                verify: !no_verify,
                eeprom,
            },
        ),
        Commands::Erase { session, bulk } => run_session(
            &session,
            Action::Erase {
                mode: erase_mode(bulk),
            },
        ),
        Commands::Verify { session, input } => run_session(&session, Action::Verify { input }),
        Commands::ListProgrammers => {
            commands::list_programmers();
            Ok(())
        }
        Commands::ListDevices => {
            commands::list_devices();
            Ok(())
        }
    }
}
