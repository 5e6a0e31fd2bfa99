use std::{io::BufWriter, path::PathBuf};

use anyhow::{anyhow, Context};
use clap::Parser;
use log::info;
use m2_lib::blp::Blp;
use m2_model::texture::ImageTexture;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// The input .blp file.
    input: String,
    /// The output .dds or image file. Defaults to the input with the .dds extension.
    output: Option<String>,
    /// The mipmap to save for image formats.
    #[arg(long, default_value_t = 0)]
    mipmap: u32,
}

fn main() -> anyhow::Result<()> {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()?;

    let cli = Cli::parse();

    let input = PathBuf::from(&cli.input);

    // Default to DDS since it supports more formats.
    let output = cli
        .output
        .map(PathBuf::from)
        .unwrap_or(input.with_extension("dds"));

    let start = std::time::Instant::now();

    let blp = Blp::from_file(&input).with_context(|| format!("failed to read {input:?}"))?;
    let texture = ImageTexture::from_blp(&blp, Some(cli.input.clone()))?;
    info!(
        "{}x{} {:?} with {} mipmaps",
        texture.width, texture.height, texture.image_format, texture.mipmap_count
    );

    // Handle all conversions by using DDS as an intermediate format.
    let dds = texture.to_dds()?;

    let extension = output
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| anyhow!("output {output:?} has no extension"))?;
    match extension {
        "dds" => {
            let mut writer = BufWriter::new(std::fs::File::create(&output)?);
            dds.write(&mut writer)?;
        }
        _ => {
            // Assume other formats are image formats.
            let image = image_dds::image_from_dds(&dds, cli.mipmap)?;
            image.save(&output)?;
        }
    }

    info!("Saved {output:?} in {:?}", start.elapsed());
    Ok(())
}
