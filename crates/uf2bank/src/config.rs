use std::{fs::File, io::Write, path::Path};

use log::info;
use uf2bank_core::{
    config::{ConfigOptions, CONFIG_BYTES, CONFIG_FLASH_ADDR},
    Family,
};

pub fn write_config<P: AsRef<Path>>(
    output_path: P,
    options: &ConfigOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let output_path = output_path.as_ref();
    let block = options.to_uf2()?;

    let mut output = File::create(output_path)?;
    output.write_all(block.raw_bytes())?;
    output.flush()?;

    info!("Created {}", output_path.display());
    info!("  Family ID: {:#010x} ({:?})", options.family.id(), options.family);
    info!("  Target address: {:#010x}", CONFIG_FLASH_ADDR);
    info!("  Config size: {} bytes", CONFIG_BYTES);
    info!("");
    info!("Configuration settings:");
    info!(
        "  Pico model: {}",
        match options.family {
            Family::RP2040 => "RP2040",
            Family::RP2350_ARM_S => "RP2350",
        }
    );
    info!("  Display driver: {:?}", options.display);
    info!("  CRT scanlines: {}", if options.scanlines { "ON" } else { "OFF" });
    info!("  Scanline sprites: {}", options.scanline_sprites);
    info!("  Clock preset: {}", options.clock_preset);
    info!("  Palette: Default TMS9918A");

    Ok(())
}
