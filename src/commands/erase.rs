//! Erase command implementation

use super::CmdResult;
use picprog_core::flash::{Context, EraseMode};
use picprog_core::icsp::IcspTransport;

/// Run the erase command
pub fn run_erase<T: IcspTransport>(ctx: &mut Context<T>, mode: EraseMode) -> CmdResult {
    let device = ctx.device()?;
    match mode {
        EraseMode::Bulk => println!("Bulk erasing {}...", device.name()),
        EraseMode::Pages => println!(
            "Erasing {} bytes of code memory in {}-byte pages...",
            device.code_memory_size(),
            device.code_erase_page_size()
        ),
    }

    ctx.erase(mode)?;

    println!("Erase complete");
    Ok(())
}
