//! Write command implementation

use super::CmdResult;
use picprog_core::flash::{Context, EraseMode};
use picprog_core::icsp::IcspTransport;
use picprog_core::image::load_hex_file;
use std::path::Path;

/// Run the write command
pub fn run_write<T: IcspTransport>(
    ctx: &mut Context<T>,
    input: &Path,
    mode: EraseMode,
    verify: bool,
    eeprom: bool,
) -> CmdResult {
    let device = ctx.device()?;
    let image = load_hex_file(input, device.code_memory_size() as usize)?;
    println!(
        "Loaded {} code bytes, {} configuration bytes, {} EEPROM bytes from {:?}",
        image.contents_size(),
        image.config_valid().count(),
        image.eeprom().len(),
        input
    );

    log::info!("Erasing ({}) and programming...", mode);
    ctx.write_device(&image, mode)?;

    if eeprom && !image.eeprom().is_empty() {
        ctx.program_eeprom(&image)?;
    } else if !image.eeprom().is_empty() {
        log::info!("File carries EEPROM data, pass --eeprom to program it");
    }

    if verify {
        let stats = ctx.verify(&image)?;
        println!("Verified {} bytes", stats.bytes_compared());
    }

    println!("Write complete");
    Ok(())
}
