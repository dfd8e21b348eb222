//! Classify a single certificate image from the command line.
//!
//! Exits with status 1 when the image argument is missing or the file does not exist.

use anyhow::Result;
use clap::Parser;
use clap::error::ErrorKind;
use std::path::PathBuf;
use std::process::ExitCode;

use certverify::{CandleClassifier, CertificateClassifier, DEFAULT_MODEL_PATH, logging};

#[derive(Parser, Debug)]
#[command(name = "verify", version, about = "Verify a medical certificate image")]
struct Cli {
    /// Certificate image to classify
    image_path: PathBuf,

    /// Trained model artifact
    #[arg(long, env = "MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
    model: PathBuf,
}

fn main() -> Result<ExitCode> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            let _ = e.print();
            return Ok(ExitCode::FAILURE);
        }
    };

    logging::init();

    if !cli.image_path.exists() {
        println!("Error: Image file '{}' not found", cli.image_path.display());
        return Ok(ExitCode::FAILURE);
    }

    let classifier = CandleClassifier::load(&cli.model)?;
    let verdict = classifier.verify(&cli.image_path)?;

    println!("Result: {}", verdict.label());
    println!("Confidence: {:.2}%", verdict.confidence * 100.0);
    Ok(ExitCode::SUCCESS)
}
