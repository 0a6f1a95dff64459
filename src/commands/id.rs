//! Device ID command implementation

use super::CmdResult;
use picprog_core::flash::Context;
use picprog_core::icsp::IcspTransport;

/// Print the identified device and its memory geometry
pub fn run_id<T: IcspTransport>(ctx: &mut Context<T>) -> CmdResult {
    let device = ctx.device()?;
    let geometry = device.geometry();

    println!();
    println!("Device ID:       0x{:04X}", device.id());
    println!("Name:            {}", device.name());
    println!("Revision:        {}", device.revision());
    println!("Family:          {}", device.ops().family_name());
    println!(
        "Code memory:     {} bytes ({} KiB)",
        geometry.code_memory_size,
        geometry.code_memory_size / 1024
    );
    println!("Write buffer:    {} words", geometry.code_words_per_write);
    println!("Erase page:      {} bytes", geometry.code_erase_page_size);
    println!(
        "Configuration:   {} bytes at 0x{:06X}",
        geometry.config_bytes, geometry.config_address
    );
    println!("Data EEPROM:     {} bytes", geometry.eeprom_bytes);

    Ok(())
}
