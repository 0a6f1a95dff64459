//! Read command implementation

use super::CmdResult;
use picprog_core::flash::Context;
use picprog_core::icsp::IcspTransport;
use picprog_core::image::{save_hex_file, Image};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Whether `path` names an Intel HEX file
pub fn is_hex_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("hex"))
}

/// Code contents of an image in device address order
pub fn raw_code(image: &Image) -> Vec<u8> {
    (0..image.contents_size())
        .filter_map(|offset| image.code_byte(offset))
        .collect()
}

/// Run the read command
pub fn run_read<T: IcspTransport>(
    ctx: &mut Context<T>,
    output: &Path,
    offset: u32,
    size: usize,
    eeprom: bool,
) -> CmdResult {
    let image = ctx.read_device(offset, size, eeprom)?;
    println!(
        "Read {} code bytes from 0x{:06X}",
        image.contents_size(),
        image.origin()
    );

    if is_hex_path(output) {
        save_hex_file(output, &image)?;
        println!("Wrote Intel HEX to {:?}", output);
    } else {
        if eeprom {
            log::warn!("Raw output holds code memory only, EEPROM contents dropped");
        }
        let data = raw_code(&image);
        let mut file = File::create(output)?;
        file.write_all(&data)?;
        println!("Wrote {} bytes to {:?}", data.len(), output);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_hex_path() {
        assert!(is_hex_path(Path::new("fw.hex")));
        assert!(is_hex_path(Path::new("dir/FW.HEX")));
        assert!(!is_hex_path(Path::new("fw.bin")));
        assert!(!is_hex_path(Path::new("hex")));
    }

    #[test]
    fn test_raw_code_in_address_order() {
        let mut image = Image::new(8);
        image.write_code(0, &[1, 2, 3]).unwrap();
        assert_eq!(raw_code(&image), [1, 2, 3]);
    }
}
