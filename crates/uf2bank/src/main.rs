use clap::{Parser, ValueEnum};
use env_logger::Env;
use log::*;
use uf2bank_core::{
    config::{ConfigOptions, DisplayDriver},
    packer::{BankCount, BankSize},
    ConvertOptions, Family,
};

use std::{io::Write, path::PathBuf};

use crate::{config::write_config, convert::convert, dump::dump, link::link};

mod config;
mod convert;
mod dump;
mod link;
mod reporter;

#[derive(Parser, Debug)]
enum Command {
    /// Convert a UF2 file to banked CVBasic data
    #[command(arg_required_else_help = true)]
    Convert {
        /// Input UF2 file
        input: PathBuf,

        /// Bank size in KiB
        #[clap(short, long, value_enum, default_value_t = BankSize::default())]
        bank_size: BankSize,

        /// Output base name, writes <OUTPUT>.bas and <OUTPUT>.h.bas
        #[clap(short, long, default_value = "firmware")]
        output: String,

        /// Declare the number of banks actually written instead of the legacy estimate
        #[clap(long)]
        exact_bank_count: bool,
    },
    /// Convert binary files to CVBasic DATA statements
    #[command(arg_required_else_help = true)]
    Dump {
        /// Binary files to convert
        #[clap(required = true)]
        inputs: Vec<PathBuf>,

        /// Output file, defaults to the input file name with .bas appended
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
    /// Generate a UF2 file that resets the device configuration
    #[command(arg_required_else_help = true)]
    Config {
        /// Output UF2 file
        #[clap(short, long)]
        output: PathBuf,

        /// Target chip
        #[clap(short, long, value_enum, default_value_t = Family::default())]
        family: Family,

        /// Display driver
        #[clap(short, long, value_enum, default_value_t = DisplayDriver::default())]
        display: DisplayDriver,

        /// Enable CRT scanlines
        #[clap(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
        scanlines: u8,

        /// Scanline sprite limit
        #[clap(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=3))]
        scanline_sprites: u8,

        /// Clock preset id
        #[clap(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=2))]
        clock_preset: u8,
    },
    /// Link CVBasic bank files into a cartridge image
    #[command(arg_required_else_help = true)]
    Link {
        /// First bank file (ie: game_b00.bin)
        first_bank: PathBuf,

        /// Output cartridge image
        output: PathBuf,

        /// Cartridge name
        name: Option<String>,
    },
}

#[derive(Parser, Debug, Default)]
#[clap(version, about, long_about = None)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Set the logging verbosity
    #[clap(short, long, value_enum, global = true, default_value_t = LogLevel::Info)]
    verbose: LogLevel,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
            LogLevel::Off => LevelFilter::Off,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(Env::default())
        .filter_level(cli.verbose.into())
        .target(env_logger::Target::Stdout)
        .format(|buf, record| {
            let level = record.level();
            if level == Level::Info {
                writeln!(buf, "{}", record.args())
            } else {
                writeln!(buf, "{}: {}", record.level(), record.args())
            }
        })
        .init();

    let command = match cli.command {
        Some(command) => command,
        None => return Ok(()),
    };

    match command {
        Command::Convert {
            input,
            bank_size,
            output,
            exact_bank_count,
        } => {
            let options = ConvertOptions {
                bank_size_kib: bank_size.kib(),
                bank_count: if exact_bank_count {
                    BankCount::Exact
                } else {
                    BankCount::Legacy
                },
            };

            convert(&input, &output, &options).map(|_| ())
        }
        Command::Dump { inputs, output } => dump(&inputs, output.as_deref()),
        Command::Config {
            output,
            family,
            display,
            scanlines,
            scanline_sprites,
            clock_preset,
        } => {
            let options = ConfigOptions {
                family,
                display,
                scanlines: scanlines != 0,
                scanline_sprites,
                clock_preset,
                ..ConfigOptions::default()
            };

            write_config(&output, &options)
        }
        Command::Link {
            first_bank,
            output,
            name,
        } => link(&first_bank, &output, name.as_deref()).map(|_| ()),
    }
}
