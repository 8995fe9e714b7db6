use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Read},
    path::{Path, PathBuf},
};

use log::{info, warn, LevelFilter};
use uf2bank_core::{
    metadata::SourceInfo, reader::open_container, uf2_to_basic, ConversionSummary, ConvertOptions,
};

use crate::reporter::ProgressBarReporter;

/// `<base>.bas` for the banked data and `<base>.h.bas` for the header.
pub fn output_paths(base: &str) -> (PathBuf, PathBuf) {
    (
        PathBuf::from(format!("{}.bas", base)),
        PathBuf::from(format!("{}.h.bas", base)),
    )
}

pub fn convert<P: AsRef<Path>>(
    input_path: P,
    output_base: &str,
    options: &ConvertOptions,
) -> Result<ConversionSummary, Box<dyn std::error::Error>> {
    let input_path = input_path.as_ref();

    // a missing input is reported before any output is created
    let input = open_container(input_path)?;
    let source = SourceInfo::from_path(input_path)?;
    let input_len = input.metadata()?.len();
    let input = BufReader::new(input);

    let (body_path, header_path) = output_paths(output_base);
    info!(
        "Converting {} to {} and {}",
        input_path.display(),
        body_path.display(),
        header_path.display()
    );

    let result = if progress_enabled() {
        let mut reporter = ProgressBarReporter::new(input_len, input);
        let result = write_outputs(&mut reporter, &header_path, &body_path, &source, options);
        reporter.finish();
        println!();
        result
    } else {
        write_outputs(input, &header_path, &body_path, &source, options)
    };

    if result.is_err() {
        remove_partial_outputs(&[header_path, body_path]);
    }

    result
}

fn write_outputs(
    input: impl Read,
    header_path: &Path,
    body_path: &Path,
    source: &SourceInfo,
    options: &ConvertOptions,
) -> Result<ConversionSummary, Box<dyn std::error::Error>> {
    let header = BufWriter::new(File::create(header_path)?);
    let body = BufWriter::new(File::create(body_path)?);

    Ok(uf2_to_basic(input, header, body, source, options)?)
}

fn progress_enabled() -> bool {
    log::max_level() >= LevelFilter::Info
}

fn remove_partial_outputs(paths: &[PathBuf]) {
    for path in paths.iter().filter(|path| path.exists()) {
        if let Err(err) = fs::remove_file(path) {
            warn!("Failed to remove {}: {}", path.display(), err);
        }
    }
}
