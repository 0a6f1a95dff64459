//! List commands implementation

use crate::programmers;
use picprog_core::device::{known_parts, DeviceFamily};

/// List all supported programmers
pub fn list_programmers() {
    println!("Supported programmers:");
    println!();
    for p in programmers::available_programmers() {
        let aliases = if p.aliases.is_empty() {
            String::new()
        } else {
            format!(" (aliases: {})", p.aliases.join(", "))
        };
        println!("  {:10} - {}{}", p.name, p.description, aliases);
    }
}

/// List all supported devices
pub fn list_devices() {
    let family = DeviceFamily::Pic18F;
    println!("Supported {} devices:", family);
    println!();
    println!(
        "{:<12} {:<14} {:>8} {:>6} {:>8} {:>8}",
        "Name", "Family", "Code", "Buffer", "Config", "EEPROM"
    );
    println!("{}", "-".repeat(61));

    for (table, part) in known_parts(family) {
        println!(
            "{:<12} {:<14} {:>8} {:>6} {:>8} {:>8}",
            part.name,
            table,
            format_size(part.code_memory_size),
            part.code_words_per_write,
            part.config_bytes,
            part.eeprom_bytes
        );
    }
}

fn format_size(bytes: u32) -> String {
    if bytes >= 1024 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}
