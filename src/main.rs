#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::{io::prelude::*, path::PathBuf};

use anyhow::Result;
use env_logger::Builder;
use log::{Level, LevelFilter};
use owo_colors::OwoColorize;
use scmaptool_scmap::prelude::*;

mod menu;
use menu::Commands;

fn color_level(level: Level) -> String {
    match level {
        Level::Error => level.red().to_string(),
        Level::Warn => level.yellow().to_string(),
        Level::Info => level.green().to_string(),
        Level::Debug => level.blue().to_string(),
        Level::Trace => level.purple().to_string(),
    }
}

const fn level_filter(verbose: usize) -> LevelFilter {
    match verbose {
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        5 => LevelFilter::Trace,
        //default to off
        _ => LevelFilter::Off,
    }
}

/// The explicit output path, or the input with its extension swapped.
fn output_or(output: Option<String>, input: &str, extension: &str) -> String {
    output.unwrap_or_else(|| {
        let mut new_path = PathBuf::from(input);
        new_path.set_extension(extension);
        new_path.to_string_lossy().into_owned()
    })
}

fn main() -> Result<()> {
    let args: menu::ScmapTool = argp::parse_args_or_exit(argp::DEFAULT);

    if args.verbose != 0 {
        Builder::new()
            .format(|buf, record| {
                writeln!(buf, "[{}] {}", color_level(record.level()), record.args())
            })
            .filter(None, level_filter(args.verbose))
            .init();
    }

    match args.nested {
        Commands::Info(params) => {
            let map = Scmap::open(&params.input)?;
            print!("{}", map.map_info());
        }
        Commands::Resize(params) => {
            log::info!("Loading map {}", &params.input);
            let mut map = Scmap::open(&params.input)?;
            log::info!(
                "Resizing {}x{} to {}x{}",
                map.width,
                map.height,
                params.width,
                params.height
            );
            map.resize(params.width, params.height)?;

            let output = output_or(params.output, &params.input, "resized.scmap");
            log::info!("Writing map {}", output);
            map.save_to(output)?;
        }
        Commands::Import(params) => {
            log::info!("Loading target map {}", &params.target);
            let mut target = Scmap::open(&params.target)?;
            log::info!("Loading source map {}", &params.input);
            let source = Scmap::open(&params.input)?;
            log::info!(
                "Importing {}x{} region at column {}, row {}",
                source.width,
                source.height,
                params.column,
                params.row
            );
            target.import(&source, params.column, params.row, params.additive)?;

            let output = output_or(params.output, &params.target, "merged.scmap");
            log::info!("Writing map {}", output);
            target.save_to(output)?;
        }
        Commands::Dump(params) => {
            let map = Scmap::open(&params.input)?;
            let prefix = params.prefix.unwrap_or_default();
            log::info!("Extracting textures to {}*", prefix);
            map.dump_textures(&prefix)?;
        }
    }
    Ok(())
}
