use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
};

use log::{error, info};
use uf2bank_core::dump::bin_to_basic;

/// `<input>.bas`, next to the input.
pub fn default_output(input: &Path) -> PathBuf {
    let mut name = input.as_os_str().to_owned();
    name.push(".bas");
    PathBuf::from(name)
}

fn dump_one(input: &Path, output: &Path) -> Result<u64, Box<dyn std::error::Error>> {
    let reader = BufReader::new(File::open(input)?);
    let writer = BufWriter::new(File::create(output)?);
    Ok(bin_to_basic(reader, writer)?)
}

/// Dumps every input, carrying on past the ones that fail.
pub fn dump(inputs: &[PathBuf], output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    if output.is_some() && inputs.len() > 1 {
        return Err("An explicit output file can only be used with a single input".into());
    }

    let mut failed = 0;
    for input in inputs {
        let output = output.map_or_else(|| default_output(input), Path::to_path_buf);

        match dump_one(input, &output) {
            Ok(len) => info!("Wrote {} bytes of {} to {}", len, input.display(), output.display()),
            Err(err) => {
                error!("{}: {}", input.display(), err);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(format!("{} of {} files could not be converted", failed, inputs.len()).into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn dumps_next_to_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("font.bin");
        fs::write(&input, [1u8, 2, 3, 4, 5, 6, 7, 8, 9]).unwrap();

        dump(&[input.clone()], None).unwrap();

        let text = fs::read_to_string(dir.path().join("font.bin.bas")).unwrap();
        assert_eq!(
            text,
            "  DATA BYTE $01, $02, $03, $04, $05, $06, $07, $08\n  DATA BYTE $09\n"
        );
    }

    #[test]
    fn missing_input_does_not_stop_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("a.bin");
        fs::write(&present, [0xffu8]).unwrap();

        let result = dump(&[dir.path().join("missing.bin"), present], None);

        assert!(result.is_err());
        assert!(dir.path().join("a.bin.bas").exists());
    }

    #[test]
    fn explicit_output_needs_single_input() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.bas");
        let inputs = [dir.path().join("a.bin"), dir.path().join("b.bin")];

        assert!(dump(&inputs, Some(&out)).is_err());
        assert!(!out.exists());
    }
}
