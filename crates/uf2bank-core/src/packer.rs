use crate::{uf2::UF2_FORMAT, Uf2BankError};
use clap::ValueEnum;

/// Bytes of every bank kept back for the bank switching code.
pub const BANK_OVERHEAD: u32 = 16;

/// Highest bank a block can go to; every bank opens with its index as one byte.
pub const MAX_BANKS: u32 = u8::MAX as u32;

/// Bank sizes understood by the CVBasic bank switching schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum BankSize {
    #[default]
    #[value(name = "8")]
    Kib8,
    #[value(name = "16")]
    Kib16,
}

impl BankSize {
    pub fn kib(self) -> u32 {
        match self {
            BankSize::Kib8 => 8,
            BankSize::Kib16 => 16,
        }
    }
}

/// How the bank total announced in the header is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BankCount {
    /// `blocks / blocks_per_bank + 1`, one too many when the blocks fill the
    /// last bank exactly. Existing consumers size their tables from this.
    #[default]
    Legacy,
    /// The number of banks actually emitted.
    Exact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankLayout {
    bank_size_kib: u32,
    blocks_per_bank: u32,
}

impl BankLayout {
    pub fn new(bank_size_kib: u32) -> Result<Self, Uf2BankError> {
        let block_len = UF2_FORMAT.serialized_block_len() as u32;
        let capacity = bank_size_kib.saturating_mul(1024).saturating_sub(BANK_OVERHEAD);

        // one byte of every bank holds its index
        let blocks_per_bank = capacity.saturating_sub(1) / block_len;
        if blocks_per_bank == 0 {
            return Err(Uf2BankError::BankTooSmall(bank_size_kib, block_len));
        }

        Ok(Self {
            bank_size_kib,
            blocks_per_bank,
        })
    }

    pub fn bank_size_kib(&self) -> u32 {
        self.bank_size_kib
    }

    pub fn blocks_per_bank(&self) -> u32 {
        self.blocks_per_bank
    }

    /// 1-based bank holding the block at `ordinal`.
    pub fn bank_of(&self, ordinal: u32) -> u32 {
        ordinal / self.blocks_per_bank + 1
    }

    pub fn total_banks(&self, total_blocks: u32, mode: BankCount) -> u32 {
        match mode {
            BankCount::Legacy => total_blocks / self.blocks_per_bank + 1,
            BankCount::Exact => total_blocks.div_ceil(self.blocks_per_bank),
        }
    }
}

/// Where a block lands, as decided by [`PackState::place`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// 0-based position of the block in the container
    pub ordinal: u32,
    pub bank: u32,
    /// Set on the first block of a bank; the bank header goes out before the block.
    pub starts_bank: bool,
}

/// Running state of the bank packer, threaded through the block stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PackState {
    blocks_seen: u32,
    banks_opened: u32,
}

impl PackState {
    pub fn blocks_seen(&self) -> u32 {
        self.blocks_seen
    }

    pub fn banks_opened(&self) -> u32 {
        self.banks_opened
    }

    /// Assigns the next block to a bank.
    pub fn place(self, layout: &BankLayout) -> (PackState, Placement) {
        let ordinal = self.blocks_seen;
        let starts_bank = ordinal % layout.blocks_per_bank == 0;
        let banks_opened = self.banks_opened + u32::from(starts_bank);

        debug_assert_eq!(banks_opened, layout.bank_of(ordinal));

        let next = PackState {
            blocks_seen: ordinal + 1,
            banks_opened,
        };
        let placement = Placement {
            ordinal,
            bank: banks_opened,
            starts_bank,
        };

        (next, placement)
    }
}
