//! Exercise a running service: post one image to /verify, then check /health.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::PathBuf;

use certverify_api::client::VerifierClient;

#[derive(Parser, Debug)]
#[command(name = "smoke_test", about = "Smoke-test a running verification service")]
struct Cli {
    /// Certificate image to upload
    image_path: PathBuf,

    /// Base URL of the service
    #[arg(long, default_value = "http://localhost:5000")]
    url: String,

    /// Shared secret sent as X-API-Key
    #[arg(long, env = "API_KEY")]
    api_key: String,
}

fn main() -> Result<()> {
    certverify::logging::init();
    let cli = Cli::parse();

    if !cli.image_path.exists() {
        bail!("Image file '{}' not found", cli.image_path.display());
    }

    let client = VerifierClient::new(&cli.url, &cli.api_key)?;

    let (status, body) = client
        .verify(&cli.image_path)
        .context("Verify request failed")?;
    println!("POST /verify -> {status}");
    println!("{}", serde_json::to_string_pretty(&body)?);

    let (status, body) = client.health().context("Health request failed")?;
    println!("GET /health -> {status}");
    println!("{}", serde_json::to_string_pretty(&body)?);

    Ok(())
}
