//! Links the bank files produced by the CVBasic toolchain into one cartridge image.
//!
//! The first bank file carries the cartridge header and the RAM image the
//! loader copies in. Its RAM data is split over three loader pages, each
//! headed by a copy of the cartridge header. Any further bank files follow as
//! plain 8 KiB pages, and the image is padded to a power of two page count.

use log::*;
use std::{
    io::Write,
    path::{Path, PathBuf},
};
use thiserror::Error;

pub const PAGE_LEN: usize = 8192;
pub const CART_HEADER_LEN: usize = 80;
/// RAM image bytes carried by one loader page
pub const LOADER_CHUNK_LEN: usize = PAGE_LEN - CART_HEADER_LEN;
pub const LOADER_PAGES: usize = 3;
/// Offset of the RAM image in the first bank file
pub const RAM_OFFSET: usize = 16384;
pub const MIN_PAGES: usize = 4;

pub const CART_NAME_LEN: usize = 20;
pub const CART_NAME_MARKER: &[u8] = b"CVBASIC GAME        *";

pub const FILL_BYTE: u8 = 0xff;

#[derive(Error, Debug)]
pub enum CartError {
    #[error("The first bank holds {0} bytes, less than a cartridge header")]
    ShortHeader(usize),
    #[error("Failed to write to output")]
    FailedToWrite(#[from] std::io::Error),
}

/// What [`link_cartridge`] wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartSummary {
    pub pages: usize,
    pub name_patched: bool,
}

impl CartSummary {
    pub fn size_kib(&self) -> usize {
        self.pages * PAGE_LEN / 1024
    }
}

/// Upper cases `name` and fits it to the header's name field.
pub fn cart_name_field(name: &str) -> Vec<u8> {
    let mut field: Vec<u8> = name.to_uppercase().into_bytes();
    field.resize(CART_NAME_LEN, b' ');
    field
}

/// Replaces the default cartridge name in `header`, returning false if it has none.
pub fn patch_cart_name(header: &mut [u8], name: &str) -> bool {
    let Some(at) = header
        .windows(CART_NAME_MARKER.len())
        .position(|window| window == CART_NAME_MARKER)
    else {
        return false;
    };

    header[at..at + CART_NAME_LEN].copy_from_slice(&cart_name_field(name));
    true
}

/// Smallest power of two page count that holds `pages`.
pub fn padded_page_count(pages: usize) -> usize {
    pages.max(MIN_PAGES).next_power_of_two()
}

/// Writes the cartridge image for `first_bank` followed by `extra_banks`.
pub fn link_cartridge<I>(
    first_bank: &[u8],
    extra_banks: I,
    name: Option<&str>,
    mut output: impl Write,
) -> Result<CartSummary, CartError>
where
    I: IntoIterator<Item = Vec<u8>>,
{
    if first_bank.len() < CART_HEADER_LEN {
        return Err(CartError::ShortHeader(first_bank.len()));
    }

    let mut header = first_bank[..CART_HEADER_LEN].to_vec();
    let name_patched = match name {
        Some(name) => {
            let patched = patch_cart_name(&mut header, name);
            if !patched {
                warn!("Could not find cart name to set it");
            }
            patched
        }
        None => false,
    };

    let mut ram = first_bank.get(RAM_OFFSET..).unwrap_or_default().to_vec();
    if ram.len() < LOADER_PAGES * PAGE_LEN {
        ram.resize(LOADER_PAGES * PAGE_LEN, FILL_BYTE);
    }

    // anything beyond the loader pages is dropped
    for chunk in ram.chunks(LOADER_CHUNK_LEN).take(LOADER_PAGES) {
        output.write_all(&header)?;
        output.write_all(chunk)?;
    }
    let mut pages = LOADER_PAGES;

    for mut bank in extra_banks {
        if bank.len() < PAGE_LEN {
            bank.resize(PAGE_LEN, FILL_BYTE);
        }
        output.write_all(&bank)?;
        pages += 1;
    }

    let filler = vec![FILL_BYTE; LOADER_CHUNK_LEN];
    let desired = padded_page_count(pages);
    debug!("Padding {} pages to {}", pages, desired);
    while pages < desired {
        output.write_all(&header)?;
        output.write_all(&filler)?;
        pages += 1;
    }
    output.flush()?;

    Ok(CartSummary {
        pages,
        name_patched,
    })
}

/// Naming scheme of the bank files following a banked build's first file.
///
/// `game_b00.bin` is followed by `game_b03.bin`, `game_b04.bin` and so on: the
/// trailing zeros of the first file's stem give the width of the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankFiles {
    dir: PathBuf,
    base: String,
    width: usize,
    extension: Option<String>,
}

impl BankFiles {
    /// Returns `None` when `first` does not look like the first file of a banked build.
    pub fn from_first(first: &Path) -> Option<Self> {
        let stem = first.file_stem()?.to_str()?;
        let base = stem.trim_end_matches('0');
        let width = stem.len() - base.len();
        if width == 0 {
            return None;
        }

        Some(Self {
            dir: first.parent().map(Path::to_path_buf).unwrap_or_default(),
            base: base.to_owned(),
            width,
            extension: first
                .extension()
                .map(|ext| ext.to_string_lossy().into_owned()),
        })
    }

    pub fn path(&self, index: usize) -> PathBuf {
        let mut name = format!("{}{:0width$}", self.base, index, width = self.width);
        if let Some(ext) = &self.extension {
            name.push('.');
            name.push_str(ext);
        }
        self.dir.join(name)
    }

    /// Paths of the banks following the loader pages, in link order.
    pub fn following(&self) -> impl Iterator<Item = PathBuf> + '_ {
        (LOADER_PAGES..).map(move |index| self.path(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_bank(ram_len: usize) -> Vec<u8> {
        let mut bank = vec![0u8; RAM_OFFSET + ram_len];
        bank[..CART_HEADER_LEN].fill(0xaa);
        bank[10..10 + CART_NAME_MARKER.len()].copy_from_slice(CART_NAME_MARKER);
        for (n, byte) in bank[RAM_OFFSET..].iter_mut().enumerate() {
            *byte = (n % 251) as u8;
        }
        bank
    }

    #[test]
    fn unbanked_cart_is_four_pages() {
        let bank = first_bank(1000);
        let mut out = Vec::new();
        let summary = link_cartridge(&bank, Vec::new(), None, &mut out).unwrap();

        assert_eq!(summary.pages, 4);
        assert_eq!(summary.size_kib(), 32);
        assert!(!summary.name_patched);
        assert_eq!(out.len(), 4 * PAGE_LEN);

        for page in out.chunks(PAGE_LEN) {
            assert_eq!(&page[..CART_HEADER_LEN], &bank[..CART_HEADER_LEN]);
        }
        assert_eq!(
            &out[CART_HEADER_LEN..CART_HEADER_LEN + 1000],
            &bank[RAM_OFFSET..RAM_OFFSET + 1000]
        );
        assert!(out[CART_HEADER_LEN + 1000..PAGE_LEN].iter().all(|&b| b == FILL_BYTE));
        assert!(out[3 * PAGE_LEN + CART_HEADER_LEN..].iter().all(|&b| b == FILL_BYTE));
    }

    #[test]
    fn ram_is_split_over_loader_pages() {
        let bank = first_bank(3 * LOADER_CHUNK_LEN + 500);
        let mut out = Vec::new();
        link_cartridge(&bank, Vec::new(), None, &mut out).unwrap();

        let second = &out[PAGE_LEN + CART_HEADER_LEN..2 * PAGE_LEN];
        let ram = &bank[RAM_OFFSET..];
        assert_eq!(second, &ram[LOADER_CHUNK_LEN..2 * LOADER_CHUNK_LEN]);
    }

    #[test]
    fn extra_banks_are_padded_and_rounded_up() {
        let bank = first_bank(100);
        let extra = vec![vec![1u8; PAGE_LEN], vec![2u8; 100]];
        let mut out = Vec::new();
        let summary = link_cartridge(&bank, extra, None, &mut out).unwrap();

        assert_eq!(summary.pages, 8);
        assert_eq!(out.len(), 8 * PAGE_LEN);
        assert!(out[3 * PAGE_LEN..4 * PAGE_LEN].iter().all(|&b| b == 1));
        assert!(out[4 * PAGE_LEN..4 * PAGE_LEN + 100].iter().all(|&b| b == 2));
        assert!(out[4 * PAGE_LEN + 100..5 * PAGE_LEN].iter().all(|&b| b == FILL_BYTE));
        assert_eq!(&out[5 * PAGE_LEN..5 * PAGE_LEN + CART_HEADER_LEN], &bank[..CART_HEADER_LEN]);
    }

    #[test]
    fn name_is_patched_into_every_header() {
        let bank = first_bank(0);
        let mut out = Vec::new();
        let summary = link_cartridge(&bank, Vec::new(), Some("Pico9918 Config"), &mut out).unwrap();

        assert!(summary.name_patched);
        for page in out.chunks(PAGE_LEN) {
            assert_eq!(&page[10..30], b"PICO9918 CONFIG     ");
            assert_eq!(page[30], b'*');
        }
    }

    #[test]
    fn missing_name_marker() {
        let mut header = vec![0u8; CART_HEADER_LEN];
        assert!(!patch_cart_name(&mut header, "GAME"));
        assert!(header.iter().all(|&b| b == 0));
    }

    #[test]
    fn short_first_bank() {
        let mut out = Vec::new();
        assert!(matches!(
            link_cartridge(&[0; 10], Vec::new(), None, &mut out),
            Err(CartError::ShortHeader(10))
        ));
    }

    #[test]
    fn page_counts() {
        assert_eq!(padded_page_count(3), 4);
        assert_eq!(padded_page_count(4), 4);
        assert_eq!(padded_page_count(5), 8);
        assert_eq!(padded_page_count(17), 32);
        assert_eq!(padded_page_count(65), 128);
    }

    #[test]
    fn bank_file_names() {
        let files = BankFiles::from_first(Path::new("out/game_b00.bin")).unwrap();
        let mut following = files.following();

        assert_eq!(following.next(), Some(PathBuf::from("out/game_b03.bin")));
        assert_eq!(following.next(), Some(PathBuf::from("out/game_b04.bin")));
        assert_eq!(files.path(12), PathBuf::from("out/game_b12.bin"));

        assert_eq!(BankFiles::from_first(Path::new("game.bin")), None);
    }
}
