//! Binary entry point for the vportsync harness.

mod config;
mod content;
mod fling;
mod harness;
mod ui;

use std::error::Error;
use std::path::PathBuf;

use config::Settings;

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--print-config") {
        print!("{}", Settings::default_toml()?);
        return Ok(());
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("vportsync {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("vportsync {}", env!("CARGO_PKG_VERSION"));
        println!("Drives the viewport synchronizer through a scripted fling\n");
        println!("USAGE:");
        println!("    vportsync [OPTIONS]\n");
        println!("OPTIONS:");
        println!("    --config <PATH>   Load settings from a TOML file");
        println!("    --print-config    Print the default configuration to stdout");
        println!("    --version, -V     Print version information");
        println!("    --help, -h        Print this help message");
        println!("\nSet RUST_LOG (e.g. RUST_LOG=debug) for more detail.");
        return Ok(());
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = match config_path(&args) {
        Some(path) => {
            log::info!("loading {}", path.display());
            Settings::load(&path)?
        }
        None => Settings::default(),
    };

    let summary = harness::run(&settings)?;
    summary.log();
    Ok(())
}

/// The value following `--config`, if any.
fn config_path(args: &[String]) -> Option<PathBuf> {
    args.iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
}
