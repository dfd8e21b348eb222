//! Generate a new API key and store it for the service to pick up.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use certverify_api::constants::DEFAULT_API_KEY_FILE;
use certverify_api::services::api_key::{generate_api_key, write_api_key_file};

#[derive(Parser, Debug)]
#[command(name = "generate_key", about = "Generate an API key for the verification service")]
struct Cli {
    /// File the key is written to
    #[arg(long, default_value = DEFAULT_API_KEY_FILE)]
    output: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let key = generate_api_key();
    write_api_key_file(&cli.output, &key)
        .with_context(|| format!("Failed to write {}", cli.output.display()))?;

    println!("Generated API key: {key}");
    println!("Saved to {}", cli.output.display());
    println!();
    println!("Export it before starting the service:");
    println!("  export API_KEY={key}");
    println!("Send it with every /verify request:");
    println!("  X-API-Key: {key}");
    Ok(())
}
