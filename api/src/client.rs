use std::fmt;
use std::path::Path;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, multipart};
use serde_json::Value;

use crate::constants::{API_KEY_HEADER, UPLOAD_FIELD};

/// Errors that can occur while talking to a running verification service.
#[derive(Debug)]
pub enum ClientError {
    Http(reqwest::Error),
    Io(std::io::Error),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Http(err) => write!(f, "http error: {err}"),
            ClientError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    fn from(value: reqwest::Error) -> Self {
        ClientError::Http(value)
    }
}

impl From<std::io::Error> for ClientError {
    fn from(value: std::io::Error) -> Self {
        ClientError::Io(value)
    }
}

/// Blocking client for the verification endpoints.
#[derive(Debug, Clone)]
pub struct VerifierClient {
    base_url: String,
    http: Client,
    api_key: String,
}

impl VerifierClient {
    /// Create a new client targeting the provided base URL.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(Duration::from_secs(60)).build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            api_key: api_key.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET /health
    pub fn health(&self) -> Result<(StatusCode, Value), ClientError> {
        let response = self.http.get(format!("{}/health", self.base_url)).send()?;
        let status = response.status();
        Ok((status, response.json()?))
    }

    /// POST the image at `path` to /verify. Non-2xx responses are returned, not raised,
    /// since the service answers errors with a JSON body too.
    pub fn verify(&self, path: &Path) -> Result<(StatusCode, Value), ClientError> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let part = multipart::Part::bytes(std::fs::read(path)?).file_name(filename);
        let form = multipart::Form::new().part(UPLOAD_FIELD, part);

        let response = self
            .http
            .post(format!("{}/verify", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .multipart(form)
            .send()?;
        let status = response.status();
        Ok((status, response.json()?))
    }
}
