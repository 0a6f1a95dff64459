//! Verify command implementation

use super::CmdResult;
use picprog_core::flash::Context;
use picprog_core::icsp::IcspTransport;
use picprog_core::image::load_hex_file;
use std::path::Path;

/// Run the verify command
pub fn run_verify<T: IcspTransport>(ctx: &mut Context<T>, input: &Path) -> CmdResult {
    let device = ctx.device()?;
    let image = load_hex_file(input, device.code_memory_size() as usize)?;

    let stats = ctx.verify(&image)?;
    println!(
        "Verification passed: {} code bytes, {} configuration bytes",
        stats.code_bytes, stats.config_bytes
    );
    Ok(())
}
