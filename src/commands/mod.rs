//! CLI command implementations
//!
//! Every command that talks to a target runs inside a session: the
//! programmer is opened, wrapped in a command log when `--trace-commands`
//! is given, and handed to a fresh [`Context`]. The device is identified
//! before the command body runs.

mod erase;
mod id;
mod list;
mod progress;
mod read;
mod verify;
mod write;

use crate::cli::SessionArgs;
use crate::programmers;
use picprog_core::flash::{Context, EraseMode};
use picprog_core::icsp::{IcspTransport, LoggedTransport};
use std::path::PathBuf;

pub use list::{list_devices, list_programmers};
pub use progress::IndicatifProgress;

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// What to do once the device is identified
pub enum Action {
    Id,
    Read {
        output: PathBuf,
        offset: u32,
        size: usize,
        eeprom: bool,
    },
    Write {
        input: PathBuf,
        mode: EraseMode,
        verify: bool,
        eeprom: bool,
    },
    Erase {
        mode: EraseMode,
    },
    Verify {
        input: PathBuf,
    },
}

/// Erase mode selected by the `--bulk` flag
pub fn erase_mode(bulk: bool) -> EraseMode {
    if bulk {
        EraseMode::Bulk
    } else {
        EraseMode::Pages
    }
}

/// Open the programmer and run `action` against the identified device
pub fn run_session(session: &SessionArgs, action: Action) -> CmdResult {
    let transport = programmers::open_programmer(&session.programmer)?;

    match session.trace_commands {
        Some(capacity) => {
            let logged = LoggedTransport::new(transport, capacity);
            let mut ctx = Context::new(logged, session.family);
            let result = run_action(&mut ctx, action);

            let log = ctx.transport().log();
            eprintln!("ICSP command log ({} of {} records):", log.len(), log.capacity());
            eprint!("{}", log);
            result
        }
        None => run_action(&mut Context::new(transport, session.family), action),
    }
}

fn run_action<T: IcspTransport>(ctx: &mut Context<T>, action: Action) -> CmdResult {
    let device = ctx.identify()?;
    println!("Found: {}", device);

    if !matches!(action, Action::Id) {
        ctx.set_progress(Some(Box::new(IndicatifProgress::new())));
    }

    match action {
        Action::Id => id::run_id(ctx),
        Action::Read {
            output,
            offset,
            size,
            eeprom,
        } => read::run_read(ctx, &output, offset, size, eeprom),
        Action::Write {
            input,
            mode,
            verify,
            eeprom,
        } => write::run_write(ctx, &input, mode, verify, eeprom),
        Action::Erase { mode } => erase::run_erase(ctx, mode),
        Action::Verify { input } => verify::run_verify(ctx, &input),
    }
}
