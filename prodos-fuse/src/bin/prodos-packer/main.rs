mod cli;

use std::fs::File;
use std::io::{self, BufWriter, ErrorKind, Write};
use std::path::Path;

use clap::Parser;
use cli::{Cli, Command};
use prodos::{BLOCK_SIZE, SharedVolume, Volume, VolumeOptions};
use prodos_fuse::{StdFs, hex_dump, io_error, pack};
use typed_bytesize::ByteSizeIec;

fn main() -> io::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Pack {
            source,
            out_dir,
            capacity,
            name,
        } => {
            let options = VolumeOptions {
                capacity,
                volume_name: name,
            };
            let volume = Volume::new(StdFs, utf8(&source)?, options).map_err(io_error)?;
            let name = volume
                .node(volume.root())
                .map_or_else(|| String::from("VOLUME"), |root| root.name().to_owned());

            let image = out_dir.join(format!("{name}.po"));
            let mut out = BufWriter::new(File::create(&image)?);
            let size = pack(&SharedVolume::new(volume), &mut out)?;
            out.flush()?;

            println!(
                "source={source:?}\nimage={image:?}\nsize={}",
                ByteSizeIec(size)
            );
        }
        Command::Dump { source, block } => {
            let mut volume =
                Volume::new(StdFs, utf8(&source)?, VolumeOptions::default()).map_err(io_error)?;
            let mut buf = [0; BLOCK_SIZE];
            volume.read_block(block, &mut buf).map_err(io_error)?;

            println!("block {block}:");
            print!("{}", hex_dump(&buf));
        }
    }

    Ok(())
}

fn utf8(path: &Path) -> io::Result<&str> {
    path.to_str().ok_or_else(|| {
        io::Error::new(
            ErrorKind::InvalidInput,
            format!("source path {path:?} is not valid UTF-8"),
        )
    })
}
