use crate::{
    uf2::{Uf2Block, UF2_FORMAT},
    Uf2BankError,
};
use log::trace;
use std::{
    fs::File,
    io::{self, Read},
    path::Path,
};
use zerocopy::{FromZeros, IntoBytes};

/// Opens a UF2 container, telling a missing file apart from other open failures.
pub fn open_container(path: &Path) -> Result<File, Uf2BankError> {
    File::open(path).map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            Uf2BankError::MissingInput(path.to_owned())
        } else {
            Uf2BankError::FailedToOpen(path.to_owned(), err)
        }
    })
}

/// Streams the 512 byte blocks of a container in file order.
///
/// Ends cleanly when the input is exhausted on a block boundary. A trailing
/// partial block is reported once as [`Uf2BankError::TruncatedBlock`], as is any
/// read error, after which the iterator is finished.
pub struct BlockReader<R> {
    input: R,
    offset: u64,
    done: bool,
}

impl<R: Read> BlockReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            offset: 0,
            done: false,
        }
    }

    fn fill(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.input.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(filled)
    }
}

impl<R: Read> Iterator for BlockReader<R> {
    type Item = Result<Uf2Block, Uf2BankError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut block = Uf2Block::new_zeroed();
        let read = match self.fill(block.as_mut_bytes()) {
            Ok(read) => read,
            Err(err) => {
                self.done = true;
                return Some(Err(Uf2BankError::FailedToRead(err)));
            }
        };

        if read == 0 {
            self.done = true;
            return None;
        }

        if read < UF2_FORMAT.block_len {
            self.done = true;
            return Some(Err(Uf2BankError::TruncatedBlock {
                offset: self.offset,
                len: read,
            }));
        }

        trace!("Read block at offset {:#x}", self.offset);
        self.offset += read as u64;

        Some(Ok(block))
    }
}
