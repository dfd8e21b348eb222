//! Process configuration, read once from the environment at startup.
//!
//! ## Environment Variables
//! - `API_KEY` - shared secret expected in `X-API-Key`
//! - `API_KEY_FILE` - file read when `API_KEY` is unset (default: `.api_key`)
//! - `UPLOAD_FOLDER` - temp directory for uploads (default: `/tmp/uploads`)
//! - `MODEL_PATH` - trained model artifact (default: `medical_certificate_verifier.safetensors`)
//! - `PORT` - port to listen on (default: `5000`)
//! - `PRELOAD_MODEL` - load the model at startup instead of on first request

use anyhow::Context;
use log::{info, warn};
use std::env;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::constants::{
    DEFAULT_API_KEY_FILE, DEFAULT_PORT, DEFAULT_UPLOAD_FOLDER, MAX_UPLOAD_SIZE,
};
use crate::services::api_key::generate_api_key;

pub struct Config {
    pub api_key: String,
    pub upload_dir: PathBuf,
    pub model_path: PathBuf,
    pub port: u16,
    pub max_upload_size: usize,
    pub preload_model: bool,
}

/// Where the API key came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKeySource {
    Environment,
    File,
    Generated,
}

impl Config {
    /// Config with defaults for everything except the key and paths
    pub fn new(api_key: impl Into<String>, upload_dir: PathBuf, model_path: PathBuf) -> Self {
        Self {
            api_key: api_key.into(),
            upload_dir,
            model_path,
            port: DEFAULT_PORT,
            max_upload_size: MAX_UPLOAD_SIZE,
            preload_model: false,
        }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let key_file = env::var("API_KEY_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_API_KEY_FILE));

        let (api_key, source) = resolve_api_key(env::var("API_KEY").ok(), &key_file)?;
        match source {
            ApiKeySource::Environment => info!("API key loaded from environment"),
            ApiKeySource::File => info!("API key loaded from {}", key_file.display()),
            ApiKeySource::Generated => warn!(
                "API_KEY not found in environment variables. Generated new key: {}",
                api_key
            ),
        }

        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("Invalid PORT value {:?}", raw))?,
            Err(_) => DEFAULT_PORT,
        };

        let upload_dir = env::var("UPLOAD_FOLDER")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_UPLOAD_FOLDER));
        let model_path = env::var("MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(certverify::DEFAULT_MODEL_PATH));
        let preload_model = env::var("PRELOAD_MODEL")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        Ok(Self {
            api_key,
            upload_dir,
            model_path,
            port,
            max_upload_size: MAX_UPLOAD_SIZE,
            preload_model,
        })
    }
}

/// Pick the API key: explicit value, then the key file, then a freshly generated one.
pub fn resolve_api_key(
    from_env: Option<String>,
    key_file: &Path,
) -> anyhow::Result<(String, ApiKeySource)> {
    if let Some(key) = from_env
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
    {
        return Ok((key, ApiKeySource::Environment));
    }

    match std::fs::read_to_string(key_file) {
        Ok(contents) => {
            let key = contents.trim();
            if !key.is_empty() {
                return Ok((key.to_string(), ApiKeySource::File));
            }
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", key_file.display()));
        }
    }

    Ok((generate_api_key(), ApiKeySource::Generated))
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(name: &str) -> PathBuf {
        env::temp_dir().join(format!("certverify-api-{}-{}", name, uuid::Uuid::new_v4()))
    }

    #[test]
    fn environment_key_wins() {
        let file = scratch_file("key-env");
        std::fs::write(&file, "from-file").unwrap();

        let (key, source) = resolve_api_key(Some(" secret \n".to_string()), &file).unwrap();
        assert_eq!(key, "secret");
        assert_eq!(source, ApiKeySource::Environment);

        std::fs::remove_file(file).ok();
    }

    #[test]
    fn key_file_is_used_when_env_is_blank() {
        let file = scratch_file("key-file");
        std::fs::write(&file, "from-file\n").unwrap();

        let (key, source) = resolve_api_key(Some("   ".to_string()), &file).unwrap();
        assert_eq!(key, "from-file");
        assert_eq!(source, ApiKeySource::File);

        std::fs::remove_file(file).ok();
    }

    #[test]
    fn missing_key_is_generated() {
        let (key, source) = resolve_api_key(None, &scratch_file("key-absent")).unwrap();
        assert_eq!(source, ApiKeySource::Generated);
        assert_eq!(key.len(), 43);
    }

    #[test]
    fn flags() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" 1 "));
        assert!(parse_flag("YES"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag(""));
    }
}
