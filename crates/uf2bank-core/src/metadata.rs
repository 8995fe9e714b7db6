use crate::{
    packer::{BankCount, BankLayout},
    uf2::UF2_FORMAT,
    Uf2BankError,
};
use assert_into::AssertInto;
use chrono::{DateTime, Datelike, Local, NaiveDate};
use std::{fs, path::Path, time::SystemTime};

/// Firmware version taken from a `-v<major>-<minor>-<patch>` tag in a file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FirmwareVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FirmwareVersion {
    /// Finds the first version tag in `name`, falling back to 0.0.0.
    pub fn from_file_name(name: &str) -> Self {
        name.match_indices("-v")
            .find_map(|(at, _)| Self::parse_tag(&name[at + 2..]))
            .unwrap_or_default()
    }

    fn parse_tag(rest: &str) -> Option<Self> {
        let (major, rest) = leading_number(rest)?;
        let (minor, rest) = leading_number(rest.strip_prefix('-')?)?;
        let (patch, _) = leading_number(rest.strip_prefix('-')?)?;

        Some(Self {
            major,
            minor,
            patch,
        })
    }
}

fn leading_number(s: &str) -> Option<(u32, &str)> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let value = s[..end].parse().ok()?;
    Some((value, &s[end..]))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl BuildDate {
    pub fn from_system_time(time: SystemTime) -> Self {
        DateTime::<Local>::from(time).date_naive().into()
    }
}

impl From<NaiveDate> for BuildDate {
    fn from(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
        }
    }
}

/// What the converter needs to know about the input besides its blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    /// File name as embedded in the header, without directories
    pub file_name: String,
    pub modified: BuildDate,
}

impl SourceInfo {
    pub fn from_path(path: &Path) -> Result<Self, Uf2BankError> {
        let modified = fs::metadata(path)
            .and_then(|meta| meta.modified())
            .map_err(|err| Uf2BankError::FailedToOpen(path.to_owned(), err))?;

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());

        Ok(Self {
            file_name,
            modified: BuildDate::from_system_time(modified),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareMetadata {
    pub version: FirmwareVersion,
    pub build_date: BuildDate,
    pub total_blocks: u32,
    pub total_banks: u32,
    pub blocks_per_bank: u32,
    pub block_size: u32,
}

impl FirmwareMetadata {
    /// `total_blocks` is the block count declared by the first block of the container.
    pub fn new(
        source: &SourceInfo,
        layout: &BankLayout,
        total_blocks: u32,
        bank_count: BankCount,
    ) -> Self {
        Self {
            version: FirmwareVersion::from_file_name(&source.file_name),
            build_date: source.modified,
            total_blocks,
            total_banks: layout.total_banks(total_blocks, bank_count),
            blocks_per_bank: layout.blocks_per_bank(),
            block_size: UF2_FORMAT.serialized_block_len().assert_into(),
        }
    }
}
