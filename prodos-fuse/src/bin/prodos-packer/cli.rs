use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Pack a host directory into a ProDOS-order image
    Pack {
        /// Host directory backing the volume
        #[arg(long, short)]
        source: PathBuf,

        /// Output directory
        #[arg(long, short = 'O')]
        out_dir: PathBuf,

        /// Volume size in blocks
        #[arg(long, short, default_value_t = u16::MAX)]
        capacity: u16,

        /// Volume name, defaults to the source directory name
        #[arg(long, short)]
        name: Option<String>,
    },

    /// Print one synthesized block
    Dump {
        /// Host directory backing the volume
        #[arg(long, short)]
        source: PathBuf,

        /// Block number
        #[arg(long, short)]
        block: u32,
    },
}
