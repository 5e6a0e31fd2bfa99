use std::path::Path;

use clap::Parser;
use log::{error, info};
use m2_lib::{
    blp::Blp,
    m2::M2,
    skin::Skin,
    version::{Layout, VERSION_WRATH},
};
use m2_model::{DirectoryFetcher, load_model_blocking};
use rayon::prelude::*;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// The root folder of the extracted game files.
    root_folder: String,

    /// Process .m2 files.
    #[arg(long)]
    m2: bool,

    /// Process .skin files.
    #[arg(long)]
    skin: bool,

    /// Process .blp files.
    #[arg(long)]
    blp: bool,

    /// Load each model with its skins, textures, and animations.
    #[arg(long)]
    load: bool,

    /// Process all file types.
    #[arg(long)]
    all: bool,
}

fn main() {
    // Ignore most logs to avoid flooding the console.
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Warn)
        .init()
        .unwrap();

    let cli = Cli::parse();
    let root = Path::new(&cli.root_folder);

    let start = std::time::Instant::now();

    if cli.m2 || cli.all {
        println!("Checking M2 files ...");
        check_all(root, &["*.m2"], |path| {
            M2::from_file(path).map(|_| ()).map_err(|e| e.to_string())
        });
    }

    if cli.skin || cli.all {
        // Only newer versions store skins in separate files.
        let layout = Layout::from_version(VERSION_WRATH);
        println!("Checking SKIN files ...");
        check_all(root, &["*.skin"], |path| {
            let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
            Skin::from_bytes(bytes, layout)
                .map(|_| ())
                .map_err(|e| e.to_string())
        });
    }

    if cli.blp || cli.all {
        println!("Checking BLP files ...");
        check_all(root, &["*.blp"], check_blp);
    }

    if cli.load || cli.all {
        println!("Loading models ...");
        let fetcher = DirectoryFetcher::new(root);
        check_all(root, &["*.m2"], |path| check_load_model(&fetcher, root, path));
    }

    println!("Finished in {:?}", start.elapsed());
}

fn check_all<F>(root: &Path, patterns: &[&str], check: F)
where
    F: Fn(&Path) -> Result<(), String> + Sync,
{
    globwalk::GlobWalkerBuilder::from_patterns(root, patterns)
        .case_insensitive(true)
        .build()
        .unwrap()
        .par_bridge()
        .for_each(|entry| {
            let path = entry.as_ref().unwrap().path();
            if let Err(e) = check(path) {
                error!("Error reading {path:?}: {e}");
            }
        });
}

fn check_blp(path: &Path) -> Result<(), String> {
    let blp = Blp::from_file(path).map_err(|e| e.to_string())?;
    if let Err(e) = blp.decode() {
        info!("Skipping {path:?}: {e}");
    }
    Ok(())
}

fn check_load_model(fetcher: &DirectoryFetcher, root: &Path, path: &Path) -> Result<(), String> {
    let name = path
        .strip_prefix(root)
        .map_err(|e| e.to_string())?
        .to_string_lossy()
        .replace('\\', "/");

    let mut model = load_model_blocking(fetcher, &name).map_err(|e| format!("{e:?}"))?;

    // Hydrate every sequence to check the external animation files.
    let keys: Vec<_> = model
        .sequences
        .sequences()
        .iter()
        .map(|s| (s.id, s.variation_index))
        .collect();
    for (id, variation_index) in keys {
        futures::executor::block_on(model.sequences.play_with(fetcher, id, variation_index))
            .map_err(|e| format!("{e:?}"))?;
        model.sequences.stop(id, variation_index);
    }
    model.sequences.play_global();
    model.sequences.update(0.5);
    model.sequences.evaluate();

    Ok(())
}
