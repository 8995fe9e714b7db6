//! This is the backend library logic for uf2bank.
//!
//! The main entry point is [`uf2_to_basic`], which turns a UF2 firmware image
//! into CVBasic source: a header with the firmware constants and a body with
//! the blocks packed into switchable banks. The smaller converters used around
//! it (raw binary dumps, configuration blocks and cartridge linking) live in
//! their own modules.

use crate::{
    basic::{write_block, write_header, BasicWriter},
    metadata::{FirmwareMetadata, SourceInfo},
    packer::{BankCount, BankLayout, PackState, MAX_BANKS},
    reader::BlockReader,
    uf2::{Uf2Block, UF2_FORMAT},
};
use std::{
    io::{Read, Write},
    iter,
    path::PathBuf,
};

use log::*;
use thiserror::Error;

pub mod basic;
pub mod cart;
pub mod config;
pub mod dump;
pub mod metadata;
pub mod packer;
pub mod reader;
pub mod uf2;

// See https://github.com/microsoft/uf2/blob/master/utils/uf2families.json for list
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[repr(u32)]
#[allow(non_camel_case_types)]
pub enum Family {
    /// Raspberry Pi RP2040
    #[value(name = "rp2040")]
    RP2040 = 0xe48bff56,

    /// Raspberry Pi RP2350, Secure Arm image
    #[value(name = "rp2350")]
    RP2350_ARM_S = 0xe48bff59,
}

impl Family {
    pub fn id(self) -> u32 {
        self as u32
    }
}

impl Default for Family {
    fn default() -> Self {
        Self::RP2040
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertOptions {
    pub bank_size_kib: u32,
    pub bank_count: BankCount,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            bank_size_kib: 8,
            bank_count: BankCount::Legacy,
        }
    }
}

/// What a finished conversion produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionSummary {
    pub metadata: FirmwareMetadata,
    pub blocks_written: u32,
    pub banks_written: u32,
}

#[derive(Error, Debug)]
pub enum Uf2BankError {
    #[error("The file '{0}' was not found")]
    MissingInput(PathBuf),
    #[error("Failed to open '{0}'")]
    FailedToOpen(PathBuf, #[source] std::io::Error),
    #[error("Failed to read from input")]
    FailedToRead(#[source] std::io::Error),
    #[error("Failed to write to output")]
    FailedToWrite(#[source] std::io::Error),
    #[error("{file} is not a UF2 file: block {block} starts with {magic0:#010x} {magic1:#010x}")]
    InvalidStartMagic {
        file: String,
        block: u32,
        magic0: u32,
        magic1: u32,
    },
    #[error("{file} is not a UF2 file: block {block} ends with {magic:#010x}")]
    InvalidEndMagic { file: String, block: u32, magic: u32 },
    #[error("Input ends with a partial block of {len} bytes at offset {offset:#x}")]
    TruncatedBlock { offset: u64, len: usize },
    #[error("{0} contains no UF2 blocks")]
    EmptyContainer(String),
    #[error("A {0} KiB bank cannot hold a single {1} byte block")]
    BankTooSmall(u32, u32),
    #[error("Bank {0} cannot be selected with a one byte bank index")]
    TooManyBanks(u32),
}

/// Checks the framing of the block at `ordinal` of `file`.
pub fn check_framing(block: Uf2Block, ordinal: u32, file: &str) -> Result<Uf2Block, Uf2BankError> {
    if !block.has_start_magic() {
        return Err(Uf2BankError::InvalidStartMagic {
            file: file.to_owned(),
            block: ordinal,
            magic0: block.magic_start0.get(),
            magic1: block.magic_start1.get(),
        });
    }
    if !block.has_end_magic() {
        return Err(Uf2BankError::InvalidEndMagic {
            file: file.to_owned(),
            block: ordinal,
            magic: block.magic_end.get(),
        });
    }
    Ok(block)
}

/// Converts a UF2 container into CVBasic source.
///
/// The firmware constants go to `header`, the banked block data to `body`.
/// Any error aborts the conversion as soon as it is seen; whatever was already
/// written to the outputs is incomplete and should be discarded by the caller.
pub fn uf2_to_basic(
    input: impl Read,
    header: impl Write,
    body: impl Write,
    source: &SourceInfo,
    options: &ConvertOptions,
) -> Result<ConversionSummary, Uf2BankError> {
    let layout = BankLayout::new(options.bank_size_kib)?;
    let file = source.file_name.as_str();

    let mut blocks = BlockReader::new(input)
        .zip(0u32..)
        .map(|(block, ordinal)| block.and_then(|block| check_framing(block, ordinal, file)));

    let first = blocks
        .next()
        .ok_or_else(|| Uf2BankError::EmptyContainer(file.to_owned()))??;

    let metadata = FirmwareMetadata::new(source, &layout, first.num_blocks.get(), options.bank_count);

    let banks_needed = layout.total_banks(metadata.total_blocks, BankCount::Exact);
    if banks_needed > MAX_BANKS {
        return Err(Uf2BankError::TooManyBanks(banks_needed));
    }

    info!(
        "Bank size: {} bytes, block size: {} bytes, blocks per bank: {}",
        layout.bank_size_kib() * 1024,
        metadata.block_size,
        metadata.blocks_per_bank
    );

    let mut header = BasicWriter::new(header);
    write_header(&mut header, file, &metadata).map_err(Uf2BankError::FailedToWrite)?;
    header.flush().map_err(Uf2BankError::FailedToWrite)?;

    let mut body = BasicWriter::new(body);
    let state = iter::once(Ok(first))
        .chain(blocks)
        .try_fold(PackState::default(), |state, block| {
            let block = block?;
            let (state, placement) = state.place(&layout);

            debug!(
                "Block {} / {} {:#010x} -> bank {}",
                block.block_no.get(),
                block.num_blocks.get(),
                block.target_addr.get(),
                placement.bank
            );

            if block.payload_size.get() as usize > UF2_FORMAT.payload_emitted {
                warn!(
                    "Block {} carries {} payload bytes, only the first {} are kept",
                    placement.ordinal,
                    block.payload_size.get(),
                    UF2_FORMAT.payload_emitted
                );
            }

            write_block(&mut body, &block, &placement)?;
            Ok::<_, Uf2BankError>(state)
        })?;
    body.flush().map_err(Uf2BankError::FailedToWrite)?;

    if state.blocks_seen() != metadata.total_blocks {
        warn!(
            "{} declares {} blocks but contains {}",
            file,
            metadata.total_blocks,
            state.blocks_seen()
        );
    }

    info!(
        "Wrote {} blocks in {} banks",
        state.blocks_seen(),
        state.banks_opened()
    );

    Ok(ConversionSummary {
        metadata,
        blocks_written: state.blocks_seen(),
        banks_written: state.banks_opened(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        basic::tests::parse_data_bytes,
        metadata::BuildDate,
        uf2::{UF2_MAGIC_START0, UF2_MAGIC_START1},
    };
    use std::io;
    use zerocopy::{byteorder::little_endian::U32, IntoBytes};

    fn source(name: &str) -> SourceInfo {
        SourceInfo {
            file_name: name.to_string(),
            modified: BuildDate {
                year: 2024,
                month: 12,
                day: 24,
            },
        }
    }

    fn container(count: u32) -> Vec<u8> {
        (0..count)
            .flat_map(|n| {
                let payload: Vec<u8> = (0..256).map(|b| (b as u32 + n) as u8).collect();
                Uf2Block::with_payload(0x1000_0000 + n * 256, n, count, 0xe48bff56, &payload)
                    .as_bytes()
                    .to_vec()
            })
            .collect()
    }

    fn convert(
        bytes: &[u8],
        name: &str,
        options: &ConvertOptions,
    ) -> (Result<ConversionSummary, Uf2BankError>, String, String) {
        let mut header = Vec::new();
        let mut body = Vec::new();
        let result = uf2_to_basic(
            io::Cursor::new(bytes),
            &mut header,
            &mut body,
            &source(name),
            options,
        );
        (
            result,
            String::from_utf8(header).unwrap(),
            String::from_utf8(body).unwrap(),
        )
    }

    fn count_lines_starting(text: &str, prefix: &str) -> usize {
        text.lines().filter(|l| l.starts_with(prefix)).count()
    }

    #[test]
    pub fn single_block_container() {
        let (result, header, body) =
            convert(&container(1), "firmware-v1-2-3.uf2", &ConvertOptions::default());
        let summary = result.unwrap();

        assert_eq!(summary.metadata.total_blocks, 1);
        assert_eq!(summary.metadata.blocks_per_bank, 27);
        assert_eq!(summary.metadata.total_banks, 1);
        assert_eq!(summary.blocks_written, 1);
        assert_eq!(summary.banks_written, 1);

        assert!(header.contains("CONST #FIRMWARE_BLOCKS = 1\n"));
        assert!(header.contains("CONST FIRMWARE_BANKS = 1\n"));
        assert!(header.contains("CONST FIRMWARE_BLOCKS_PER_BANK = 27\n"));
        assert!(header.contains("CONST FIRMWARE_VERSION_MAJOR = 1\n"));
        assert!(header.contains("CONST #FIRMWARE_BUILD_YEAR = 2024\n"));

        assert_eq!(count_lines_starting(&body, "BANK "), 1);
        assert_eq!(count_lines_starting(&body, " ' Block: "), 1);
        assert!(body.contains("bank1Start:\n  DATA BYTE $01\nbank1Data:\n"));
    }

    #[test]
    pub fn blocks_spread_over_banks() {
        let options = ConvertOptions::default();
        let (result, header, body) = convert(&container(60), "firmware.uf2", &options);
        let summary = result.unwrap();

        assert_eq!(summary.blocks_written, 60);
        assert_eq!(summary.banks_written, 3);
        assert!(header.contains("CONST FIRMWARE_VERSION_MINOR = 0\n"));

        assert_eq!(count_lines_starting(&body, "BANK "), 3);
        assert_eq!(count_lines_starting(&body, " ' Block: "), 60);

        // every block reports the bank it was packed into
        let banks: Vec<u32> = body
            .lines()
            .filter_map(|l| l.strip_prefix(" ' Bank: "))
            .map(|b| b.parse().unwrap())
            .collect();
        for (n, bank) in banks.iter().enumerate() {
            assert_eq!(*bank, n as u32 / 27 + 1);
        }

        // bank markers precede the first block of each bank
        let bank2 = body.find("BANK 2\n").unwrap();
        let block27 = body.find(" ' Block: 27\n").unwrap();
        let block26 = body.find(" ' Block: 26\n").unwrap();
        assert!(block26 < bank2 && bank2 < block27);
    }

    #[test]
    pub fn larger_banks_hold_more_blocks() {
        let options = ConvertOptions {
            bank_size_kib: 16,
            ..ConvertOptions::default()
        };
        let (result, header, body) = convert(&container(60), "firmware.uf2", &options);
        let summary = result.unwrap();

        assert_eq!(summary.metadata.blocks_per_bank, 56);
        assert_eq!(summary.banks_written, 2);
        assert!(header.contains("CONST FIRMWARE_BLOCKS_PER_BANK = 56\n"));
        assert_eq!(count_lines_starting(&body, "BANK "), 2);
    }

    #[test]
    pub fn exact_bank_count_option() {
        let bytes = container(54);

        let (legacy, _, _) = convert(&bytes, "firmware.uf2", &ConvertOptions::default());
        let (exact, _, _) = convert(
            &bytes,
            "firmware.uf2",
            &ConvertOptions {
                bank_count: BankCount::Exact,
                ..ConvertOptions::default()
            },
        );

        assert_eq!(legacy.unwrap().metadata.total_banks, 3);
        let exact = exact.unwrap();
        assert_eq!(exact.metadata.total_banks, 2);
        assert_eq!(exact.banks_written, 2);
    }

    #[test]
    pub fn body_reproduces_block_bytes() {
        let bytes = container(3);
        let (result, _, body) = convert(&bytes, "firmware.uf2", &ConvertOptions::default());
        result.unwrap();

        let groups = parse_data_bytes(&body);
        // bank index byte, then 25 groups per block
        assert_eq!(groups.len(), 1 + 3 * 25);

        for (n, block_groups) in groups[1..].chunks(25).enumerate() {
            let emitted = block_groups.concat();
            let record = &bytes[n * 512..(n + 1) * 512];
            assert_eq!(&emitted[..288], &record[..288]);
            assert_eq!(&emitted[288..], &record[508..]);
        }
    }

    #[test]
    pub fn corrupt_first_block() {
        let mut bytes = container(2);
        bytes[0] ^= 0xff;

        let (result, header, body) = convert(&bytes, "bad.uf2", &ConvertOptions::default());
        match result {
            Err(Uf2BankError::InvalidStartMagic { file, block, .. }) => {
                assert_eq!(file, "bad.uf2");
                assert_eq!(block, 0);
            }
            other => panic!("expected invalid start magic, got {:?}", other),
        }
        assert!(header.is_empty());
        assert!(body.is_empty());
    }

    #[test]
    pub fn corrupt_block_stops_the_body() {
        let mut bytes = container(5);
        let third = 2 * 512;
        bytes[third + 4..third + 8].copy_from_slice(&UF2_MAGIC_START0.to_le_bytes());

        let (result, _, body) = convert(&bytes, "bad.uf2", &ConvertOptions::default());
        assert!(matches!(
            result,
            Err(Uf2BankError::InvalidStartMagic { block: 2, magic1, .. }) if magic1 == UF2_MAGIC_START0
        ));
        assert_eq!(count_lines_starting(&body, " ' Block: "), 2);
    }

    #[test]
    pub fn bad_end_magic() {
        let mut block = Uf2Block::with_payload(0, 0, 1, 0, &[]);
        block.magic_end = U32::new(UF2_MAGIC_START1);

        let (result, _, _) = convert(block.as_bytes(), "bad.uf2", &ConvertOptions::default());
        assert!(matches!(
            result,
            Err(Uf2BankError::InvalidEndMagic { block: 0, .. })
        ));
    }

    #[test]
    pub fn truncated_container() {
        let mut bytes = container(2);
        bytes.truncate(512 + 300);

        let (result, _, body) = convert(&bytes, "short.uf2", &ConvertOptions::default());
        assert!(matches!(
            result,
            Err(Uf2BankError::TruncatedBlock { offset: 512, len: 300 })
        ));
        assert_eq!(count_lines_starting(&body, " ' Block: "), 1);
    }

    #[test]
    pub fn empty_container() {
        let (result, header, _) = convert(&[], "empty.uf2", &ConvertOptions::default());
        assert!(matches!(result, Err(Uf2BankError::EmptyContainer(_))));
        assert!(header.is_empty());
    }

    #[test]
    pub fn undersized_bank() {
        let options = ConvertOptions {
            bank_size_kib: 0,
            ..ConvertOptions::default()
        };
        let (result, header, _) = convert(&container(1), "firmware.uf2", &options);
        assert!(matches!(result, Err(Uf2BankError::BankTooSmall(0, _))));
        assert!(header.is_empty());
    }

    #[test]
    pub fn declared_blocks_past_the_last_bank() {
        let blocks = MAX_BANKS * 27 + 1;
        let block = Uf2Block::with_payload(0x1000_0000, 0, blocks, 0xe48bff56, &[0; 256]);

        let (result, header, body) =
            convert(block.as_bytes(), "huge.uf2", &ConvertOptions::default());
        assert!(matches!(result, Err(Uf2BankError::TooManyBanks(256))));
        assert!(header.is_empty());
        assert!(body.is_empty());
    }

    #[test]
    pub fn declared_blocks_filling_the_last_bank() {
        // the legacy header total overshoots to 256, the banks written do not
        let blocks = MAX_BANKS * 27;
        let block = Uf2Block::with_payload(0x1000_0000, 0, blocks, 0xe48bff56, &[0; 256]);

        let (result, header, _) =
            convert(block.as_bytes(), "full.uf2", &ConvertOptions::default());
        let summary = result.unwrap();
        assert_eq!(summary.metadata.total_banks, 256);
        assert_eq!(summary.banks_written, 1);
        assert!(header.contains("CONST FIRMWARE_BANKS = 256\n"));
    }

    #[test]
    pub fn family_ids() {
        assert_eq!(Family::RP2040.id(), 0xe48bff56);
        assert_eq!(Family::RP2350_ARM_S.id(), 0xe48bff59);
    }
}
