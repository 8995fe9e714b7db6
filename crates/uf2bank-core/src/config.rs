use crate::{uf2::Uf2Block, Family};
use clap::ValueEnum;
use thiserror::Error;

pub const XIP_BASE: u32 = 0x10000000;
/// Top 4KB of 2MB flash
pub const CONFIG_FLASH_OFFSET: u32 = 0x1FF000;
pub const CONFIG_FLASH_ADDR: u32 = XIP_BASE + CONFIG_FLASH_OFFSET;
pub const CONFIG_BYTES: usize = 256;

// Bytes 0-7 are filled in by the firmware at runtime
pub const CONF_PICO_MODEL: usize = 0;
pub const CONF_HW_VERSION: usize = 1;
pub const CONF_SW_VERSION: usize = 2;
pub const CONF_SW_PATCH_VERSION: usize = 3;
pub const CONF_CLOCK_TESTED: usize = 4;
pub const CONF_DISP_DRIVER: usize = 5;
pub const CONF_FLASH_STATUS: usize = 6;

pub const CONF_CRT_SCANLINES: usize = 8;
pub const CONF_SCANLINE_SPRITES: usize = 9;
pub const CONF_CLOCK_PRESET_ID: usize = 10;

pub const CONF_DIAG: usize = 16;
pub const CONF_DIAG_REGISTERS: usize = 17;
pub const CONF_DIAG_PERFORMANCE: usize = 18;
pub const CONF_DIAG_PALETTE: usize = 19;
pub const CONF_DIAG_ADDRESS: usize = 20;

pub const CONF_PALETTE_IDX_0: usize = 128;

/// TMS9918A palette, 0xARGB
pub const DEFAULT_PALETTE: [u16; 16] = [
    0x0000, 0xF000, 0xF2C3, 0xF5D6, 0xF54F, 0xF76F, 0xFD54, 0xF4EF, 0xFF54, 0xFF76, 0xFDC3,
    0xFED6, 0xF2B2, 0xFC5C, 0xFCCC, 0xFFFF,
];

pub const MAX_SCANLINE_SPRITES: u8 = 3;
pub const MAX_CLOCK_PRESET: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
#[repr(u8)]
pub enum DisplayDriver {
    #[default]
    Vga = 0,
    Ntsc = 1,
    Pal = 2,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Scanline sprite limit {0} is out of range (0-3)")]
    ScanlineSprites(u8),
    #[error("Clock preset {0} is out of range (0-2)")]
    ClockPreset(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigOptions {
    pub family: Family,
    pub display: DisplayDriver,
    pub scanlines: bool,
    pub scanline_sprites: u8,
    pub clock_preset: u8,
    pub palette: [u16; 16],
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            family: Family::default(),
            display: DisplayDriver::default(),
            scanlines: false,
            scanline_sprites: 0,
            clock_preset: 0,
            palette: DEFAULT_PALETTE,
        }
    }
}

/// Model byte the firmware compares against the chip it runs on.
pub fn pico_model(family: Family) -> u8 {
    match family {
        Family::RP2040 => 1,
        Family::RP2350_ARM_S => 2,
    }
}

impl ConfigOptions {
    /// Lays out the 256 configuration bytes.
    ///
    /// Hardware and software version bytes stay zero, the firmware rewrites them.
    pub fn to_bytes(&self) -> Result<[u8; CONFIG_BYTES], ConfigError> {
        if self.scanline_sprites > MAX_SCANLINE_SPRITES {
            return Err(ConfigError::ScanlineSprites(self.scanline_sprites));
        }
        if self.clock_preset > MAX_CLOCK_PRESET {
            return Err(ConfigError::ClockPreset(self.clock_preset));
        }

        let mut config = [0u8; CONFIG_BYTES];

        config[CONF_PICO_MODEL] = pico_model(self.family);
        config[CONF_DISP_DRIVER] = self.display as u8;

        config[CONF_CRT_SCANLINES] = u8::from(self.scanlines);
        config[CONF_SCANLINE_SPRITES] = self.scanline_sprites;
        config[CONF_CLOCK_PRESET_ID] = self.clock_preset;

        // entry 0 is always transparent black
        for (i, rgb) in self.palette.iter().enumerate().skip(1) {
            let at = CONF_PALETTE_IDX_0 + i * 2;
            config[at..at + 2].copy_from_slice(&rgb.to_be_bytes());
        }

        Ok(config)
    }

    /// A single block UF2 that overwrites the configuration sector.
    pub fn to_uf2(&self) -> Result<Uf2Block, ConfigError> {
        let config = self.to_bytes()?;
        Ok(Uf2Block::with_payload(
            CONFIG_FLASH_ADDR,
            0,
            1,
            self.family.id(),
            &config,
        ))
    }
}
