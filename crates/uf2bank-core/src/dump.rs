use crate::{basic::BasicWriter, Uf2BankError};
use std::io::{self, Read, Write};

/// Bytes per `DATA BYTE` line in a raw dump.
pub const DUMP_GROUP_LEN: usize = 8;

/// Dumps `input` as plain `DATA BYTE` statements, returning the number of bytes written.
pub fn bin_to_basic(mut input: impl Read, output: impl Write) -> Result<u64, Uf2BankError> {
    let mut out = BasicWriter::new(output);
    let mut buf = [0u8; DUMP_GROUP_LEN * 64];
    let mut pending = 0;
    let mut total = 0u64;

    loop {
        let read = match input.read(&mut buf[pending..]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(Uf2BankError::FailedToRead(err)),
        };
        pending += read;
        total += read as u64;

        // only whole groups go out until the input ends
        let whole = pending - pending % DUMP_GROUP_LEN;
        out.data_groups(&buf[..whole], DUMP_GROUP_LEN)
            .map_err(Uf2BankError::FailedToWrite)?;
        buf.copy_within(whole..pending, 0);
        pending -= whole;
    }

    if pending > 0 {
        out.data_bytes(&buf[..pending])
            .map_err(Uf2BankError::FailedToWrite)?;
    }
    out.flush().map_err(Uf2BankError::FailedToWrite)?;

    Ok(total)
}
