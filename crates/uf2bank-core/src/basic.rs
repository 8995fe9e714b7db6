//! Line oriented CVBasic source output.
//!
//! Everything the converters write goes through [`BasicWriter`], which knows
//! how to spell comments, labels, bank markers, constants and `DATA BYTE`
//! statements.

use crate::{metadata::FirmwareMetadata, packer::Placement, uf2::Uf2Block, Uf2BankError};
use std::io::{self, Write};

/// Width the embedded source file name is padded or cut to.
pub const FILE_NAME_FIELD_LEN: usize = 32;

pub const HEADER_GROUP_LEN: usize = 4;
pub const PAYLOAD_GROUP_LEN: usize = 16;

const SEPARATOR: &str = "' ===============================";

pub struct BasicWriter<W> {
    inner: W,
}

impl<W: Write> BasicWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn blank(&mut self) -> io::Result<()> {
        writeln!(self.inner)
    }

    pub fn separator(&mut self) -> io::Result<()> {
        writeln!(self.inner, "{}", SEPARATOR)
    }

    pub fn remark(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.inner, "' {}", text)
    }

    /// A comment line inside a block, one space in.
    pub fn comment(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.inner, " ' {}", text)
    }

    pub fn label(&mut self, name: &str) -> io::Result<()> {
        writeln!(self.inner, "{}:", name)
    }

    pub fn bank(&mut self, bank: u32) -> io::Result<()> {
        writeln!(self.inner, "BANK {}", bank)
    }

    pub fn constant(&mut self, name: &str, value: impl std::fmt::Display) -> io::Result<()> {
        writeln!(self.inner, "CONST {} = {}", name, value)
    }

    /// One `DATA BYTE` statement holding all of `bytes`.
    pub fn data_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        write!(self.inner, "  DATA BYTE ")?;
        for (n, byte) in bytes.iter().enumerate() {
            if n > 0 {
                write!(self.inner, ", ")?;
            }
            write!(self.inner, "${:02x}", byte)?;
        }
        writeln!(self.inner)
    }

    /// One `DATA BYTE` statement per `group_len` bytes.
    pub fn data_groups(&mut self, bytes: &[u8], group_len: usize) -> io::Result<()> {
        bytes
            .chunks(group_len)
            .try_for_each(|group| self.data_bytes(group))
    }

    /// A string literal, which CVBasic cannot escape quotes in.
    pub fn data_string(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.inner, "  DATA BYTE \"{}\"", text.replace('"', "'"))
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Left aligns `name` in a field of `FILE_NAME_FIELD_LEN` bytes, cutting it
/// at the last whole character that fits.
pub fn file_name_field(name: &str) -> String {
    let mut end = name.len().min(FILE_NAME_FIELD_LEN);
    while !name.is_char_boundary(end) {
        end -= 1;
    }

    let mut field = String::with_capacity(FILE_NAME_FIELD_LEN);
    field.push_str(&name[..end]);
    field.extend(std::iter::repeat(' ').take(FILE_NAME_FIELD_LEN - end));
    field
}

/// Writes the header stream: entry marker, source file name and the firmware constants.
pub fn write_header<W: Write>(
    out: &mut BasicWriter<W>,
    file_name: &str,
    metadata: &FirmwareMetadata,
) -> io::Result<()> {
    out.separator()?;
    out.remark("uf2bank firmware header")?;
    out.separator()?;
    out.blank()?;

    out.label("firmwareHeader")?;
    out.blank()?;

    out.label("firmwareFilename")?;
    out.data_string(&file_name_field(file_name))?;
    out.blank()?;

    out.constant("#FIRMWARE_BLOCKS", metadata.total_blocks)?;
    out.constant("FIRMWARE_BANKS", metadata.total_banks)?;
    out.constant("FIRMWARE_BLOCKS_PER_BANK", metadata.blocks_per_bank)?;
    out.constant("#FIRMWARE_BLOCK_BYTES", metadata.block_size)?;
    out.constant("FIRMWARE_VERSION_MAJOR", metadata.version.major)?;
    out.constant("FIRMWARE_VERSION_MINOR", metadata.version.minor)?;
    out.constant("FIRMWARE_VERSION_PATCH", metadata.version.patch)?;
    out.constant("#FIRMWARE_BUILD_YEAR", metadata.build_date.year)?;
    out.constant("FIRMWARE_BUILD_MONTH", metadata.build_date.month)?;
    out.constant("FIRMWARE_BUILD_DAY", metadata.build_date.day)?;

    Ok(())
}

/// Opens a new bank section in the body stream.
///
/// Nothing is written for a bank whose index does not fit its one byte marker.
pub fn write_bank_start<W: Write>(
    out: &mut BasicWriter<W>,
    bank: u32,
) -> Result<(), Uf2BankError> {
    let index = u8::try_from(bank).map_err(|_| Uf2BankError::TooManyBanks(bank))?;
    bank_lines(out, bank, index).map_err(Uf2BankError::FailedToWrite)
}

fn bank_lines<W: Write>(out: &mut BasicWriter<W>, bank: u32, index: u8) -> io::Result<()> {
    out.blank()?;
    out.separator()?;
    out.bank(bank)?;
    out.blank()?;
    out.label(&format!("bank{}Start", bank))?;
    // bank indices start at 1, so this byte is never zero
    out.data_bytes(&[index])?;
    out.label(&format!("bank{}Data", bank))
}

/// Writes one block to the body stream, preceded by its bank header if it starts one.
pub fn write_block<W: Write>(
    out: &mut BasicWriter<W>,
    block: &Uf2Block,
    placement: &Placement,
) -> Result<(), Uf2BankError> {
    if placement.starts_bank {
        write_bank_start(out, placement.bank)?;
    }

    block_lines(out, block, placement).map_err(Uf2BankError::FailedToWrite)
}

fn block_lines<W: Write>(
    out: &mut BasicWriter<W>,
    block: &Uf2Block,
    placement: &Placement,
) -> io::Result<()> {
    out.blank()?;
    out.comment(&format!("Block: {}", block.block_no.get()))?;
    out.comment(&format!("Addr: {:#x}", block.target_addr.get()))?;
    out.comment(&format!("Bank: {}", placement.bank))?;

    out.data_groups(block.header_bytes(), HEADER_GROUP_LEN)?;
    out.data_groups(block.emitted_payload(), PAYLOAD_GROUP_LEN)?;
    out.data_bytes(block.trailer_bytes())
}
