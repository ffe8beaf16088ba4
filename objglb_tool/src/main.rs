use std::{io, path::PathBuf, process::ExitCode};

use clap::{Args, Parser};
use color_eyre as ey;
use ey::eyre::Context;
use objglb_content::{convert_batch, convert_file, ConversionConfig, LogObserver, ThumbnailSize};
use objglb_shared::log::{self, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
enum CommandLineArguments {
    /// Convert a single OBJ file
    Convert(Convert),
    /// Convert all OBJ files in a directory
    Batch(Batch),
}

#[derive(Parser, Debug)]
struct Convert {
    /// Source OBJ file
    input: PathBuf,

    /// Destination GLB file (defaults to the source file with a .glb extension)
    output: Option<PathBuf>,

    #[command(flatten)]
    options: Options,
}

#[derive(Parser, Debug)]
struct Batch {
    /// Directory containing the OBJ files
    input_dir: PathBuf,

    /// Directory for the GLB files
    output_dir: PathBuf,

    /// Search subdirectories and keep the directory structure in the output
    #[arg(short, long)]
    recursive: bool,

    #[command(flatten)]
    options: Options,
}

#[derive(Args, Debug)]
struct Options {
    /// Overwrite existing output files
    #[arg(short, long)]
    overwrite: bool,

    /// Generate a PNG thumbnail next to every GLB file
    #[arg(short, long)]
    thumbnail: bool,

    /// Size of the thumbnails as WIDTHxHEIGHT
    #[arg(long)]
    thumbnail_size: Option<ThumbnailSize>,

    /// Generate an HTML preview next to every GLB file
    #[arg(long)]
    preview: bool,

    /// Search the directory tree of the OBJ file for textures that can't be found otherwise
    #[arg(long)]
    recursive_texture_search: bool,

    /// YAML file with default options. Flags given on the command line take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long)]
    verbose: bool,
}

impl Options {
    fn conversion_config(&self) -> ey::Result<ConversionConfig> {
        let mut config = match &self.config {
            Some(path) => ConversionConfig::import(path).wrap_err_with(|| format!("Failed to read config file {}", path.display()))?,
            None => ConversionConfig::default(),
        };
        config.overwrite |= self.overwrite;
        config.thumbnail |= self.thumbnail;
        config.preview |= self.preview;
        config.recursive_texture_search |= self.recursive_texture_search;
        if let Some(thumbnail_size) = self.thumbnail_size {
            config.thumbnail_size = thumbnail_size;
        }
        Ok(config)
    }
}

fn setup_logging(verbose: bool) -> ey::Result<()> {
    let level = if verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                objglb_shared::chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(io::stdout())
        .apply()
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
    Ok(())
}

fn main() -> ey::Result<ExitCode> {
    color_eyre::install()?;

    let command_line_arguments = CommandLineArguments::parse();
    let success = match &command_line_arguments {
        CommandLineArguments::Convert(convert) => {
            setup_logging(convert.options.verbose)?;
            let config = convert.options.conversion_config()?;
            let output = convert.output.clone().unwrap_or_else(|| convert.input.with_extension("glb"));
            convert_file(&convert.input, &output, &config, &LogObserver).is_ok()
        }
        CommandLineArguments::Batch(batch) => {
            setup_logging(batch.options.verbose)?;
            let mut config = batch.options.conversion_config()?;
            config.recursive |= batch.recursive;
            let report = convert_batch(&batch.input_dir, &batch.output_dir, &config, &LogObserver);
            if report.total() == 0 {
                for message in &report.messages {
                    warn!("{message}");
                }
            }
            for (category, count) in &report.failures_by_category {
                info!("Failed with {category}: {count}");
            }
            report.is_success()
        }
    };

    Ok(if success { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
