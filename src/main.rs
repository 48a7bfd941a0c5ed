use std::{env, fs, path::PathBuf};

use anyhow::Result;
use clap::Parser;
use crater_motor::{
    crater::motor::{self, Motor},
    parameters,
};
use log::info;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Parameter file with a `motor` table
    #[arg(short, long, default_value = "config/motor.toml")]
    params: PathBuf,

    /// Write the motor thrust curve to this .eng file
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Motor name used in the exported file
    #[arg(short, long, default_value = "CRATER")]
    name: String,
}

fn main() -> Result<()> {
    // Default log level to "info"
    if env::var("RUST_LOG").is_err() {
        unsafe { env::set_var("RUST_LOG", "info") }
    }

    pretty_env_logger::init();

    let args = Args::parse();

    info!("Reading parameters from '{}'", args.params.display());
    let params = parameters::parse_string(fs::read_to_string(&args.params)?)?;

    let motor = motor::from_params(params.get_map("motor")?)?;

    info!("\n{}", motor.summary());

    if let Some(path) = args.export {
        motor.export_eng(&path, &args.name)?;
    }

    Ok(())
}
