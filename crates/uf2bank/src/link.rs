use std::{
    fs::{self, File},
    io::BufWriter,
    path::Path,
};

use log::info;
use uf2bank_core::cart::{link_cartridge, BankFiles, CartSummary};

pub fn link<P1: AsRef<Path>, P2: AsRef<Path>>(
    first_bank_path: P1,
    output_path: P2,
    name: Option<&str>,
) -> Result<CartSummary, Box<dyn std::error::Error>> {
    let first_bank_path = first_bank_path.as_ref();
    let first_bank = fs::read(first_bank_path)?;

    // only a first file whose name ends in 0 has banks following it
    let mut extra = Vec::new();
    match BankFiles::from_first(first_bank_path) {
        Some(files) => {
            info!("Banked cart detected...");
            for path in files.following().take_while(|path| path.is_file()) {
                info!("Adding {}", path.display());
                extra.push(fs::read(&path)?);
            }
        }
        None => info!("Banking not detected - finishing cart..."),
    }

    let output = BufWriter::new(File::create(output_path.as_ref())?);
    let summary = link_cartridge(&first_bank, extra, name, output)?;

    info!("Wrote final cart size: {} KB", summary.size_kib());

    Ok(summary)
}
