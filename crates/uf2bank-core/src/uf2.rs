use static_assertions::const_assert;
use std::mem;
use zerocopy::{byteorder::little_endian::U32, FromBytes, Immutable, IntoBytes, KnownLayout};

pub const UF2_MAGIC_START0: u32 = 0x0A324655;
pub const UF2_MAGIC_START1: u32 = 0x9E5D5157;
pub const UF2_MAGIC_END: u32 = 0x0AB16F30;

pub const UF2_FLAG_NOT_MAIN_FLASH: u32 = 0x00000001;
pub const UF2_FLAG_FILE_CONTAINER: u32 = 0x00001000;
pub const UF2_FLAG_FAMILY_ID_PRESENT: u32 = 0x00002000;
pub const UF2_FLAG_MD5_PRESENT: u32 = 0x00004000;

/// Byte layout of a UF2 block, and how much of it ends up in the generated source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Uf2Format {
    pub magic_start0: u32,
    pub magic_start1: u32,
    pub magic_end: u32,
    /// Size of one block on disk
    pub block_len: usize,
    /// The eight header words
    pub header_len: usize,
    pub payload_offset: usize,
    /// Room for payload in a block, of which only `payload_emitted` is carried over
    pub payload_capacity: usize,
    pub payload_emitted: usize,
    pub trailer_offset: usize,
    pub trailer_len: usize,
}

pub const UF2_FORMAT: Uf2Format = Uf2Format {
    magic_start0: UF2_MAGIC_START0,
    magic_start1: UF2_MAGIC_START1,
    magic_end: UF2_MAGIC_END,
    block_len: 512,
    header_len: 32,
    payload_offset: 32,
    payload_capacity: 476,
    payload_emitted: 256,
    trailer_offset: 508,
    trailer_len: 4,
};

impl Uf2Format {
    /// Bytes a single block occupies once rendered: nine words plus the emitted payload.
    pub const fn serialized_block_len(&self) -> usize {
        self.header_len + self.trailer_len + self.payload_emitted
    }
}

pub type Uf2BlockData = [u8; UF2_FORMAT.payload_capacity];

#[repr(C)]
#[derive(Clone, Debug, PartialEq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct Uf2Block {
    // 32 byte header
    pub magic_start0: U32,
    pub magic_start1: U32,
    pub flags: U32,
    pub target_addr: U32,
    pub payload_size: U32,
    pub block_no: U32,
    pub num_blocks: U32,
    pub family_id: U32,
    pub data: Uf2BlockData,
    pub magic_end: U32,
}

const_assert!(mem::size_of::<Uf2Block>() == UF2_FORMAT.block_len);
const_assert!(mem::offset_of!(Uf2Block, data) == UF2_FORMAT.payload_offset);
const_assert!(mem::offset_of!(Uf2Block, magic_end) == UF2_FORMAT.trailer_offset);
const_assert!(UF2_FORMAT.payload_offset == UF2_FORMAT.header_len);
const_assert!(UF2_FORMAT.payload_offset + UF2_FORMAT.payload_capacity == UF2_FORMAT.trailer_offset);
const_assert!(UF2_FORMAT.trailer_offset + UF2_FORMAT.trailer_len == UF2_FORMAT.block_len);
const_assert!(UF2_FORMAT.serialized_block_len() == 9 * 4 + 256);

impl Uf2Block {
    /// Builds a family tagged block carrying `payload` at the start of its data area.
    ///
    /// Panics if `payload` does not fit the data area.
    pub fn with_payload(
        target_addr: u32,
        block_no: u32,
        num_blocks: u32,
        family_id: u32,
        payload: &[u8],
    ) -> Self {
        let mut data: Uf2BlockData = [0; UF2_FORMAT.payload_capacity];
        data[..payload.len()].copy_from_slice(payload);

        Self {
            magic_start0: U32::new(UF2_MAGIC_START0),
            magic_start1: U32::new(UF2_MAGIC_START1),
            flags: U32::new(UF2_FLAG_FAMILY_ID_PRESENT),
            target_addr: U32::new(target_addr),
            payload_size: U32::new(payload.len() as u32),
            block_no: U32::new(block_no),
            num_blocks: U32::new(num_blocks),
            family_id: U32::new(family_id),
            data,
            magic_end: U32::new(UF2_MAGIC_END),
        }
    }

    /// True when both leading magic words match; this is what marks a block as UF2.
    pub fn has_start_magic(&self) -> bool {
        self.magic_start0.get() == UF2_FORMAT.magic_start0
            && self.magic_start1.get() == UF2_FORMAT.magic_start1
    }

    pub fn has_end_magic(&self) -> bool {
        self.magic_end.get() == UF2_FORMAT.magic_end
    }

    /// The block exactly as it is laid out on disk.
    pub fn raw_bytes(&self) -> &[u8] {
        self.as_bytes()
    }

    pub fn header_bytes(&self) -> &[u8] {
        &self.raw_bytes()[..UF2_FORMAT.header_len]
    }

    /// The part of the payload carried into the generated source.
    pub fn emitted_payload(&self) -> &[u8] {
        let start = UF2_FORMAT.payload_offset;
        &self.raw_bytes()[start..start + UF2_FORMAT.payload_emitted]
    }

    pub fn trailer_bytes(&self) -> &[u8] {
        let start = UF2_FORMAT.trailer_offset;
        &self.raw_bytes()[start..start + UF2_FORMAT.trailer_len]
    }
}
