//! Response bodies shared by the server and the client

use certverify::Verdict;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `{status, message}` envelope used by /health and every error response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

impl StatusResponse {
    pub fn new(status: &str, message: impl Into<String>) -> Self {
        Self {
            status: status.to_string(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new("error", message)
    }
}

/// Successful /verify result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub status: String,
    pub prediction: bool,
    pub confidence: f32,
    pub message: String,
}

impl From<Verdict> for VerifyResponse {
    fn from(verdict: Verdict) -> Self {
        let message = if verdict.prediction {
            "Certificate appears to be valid"
        } else {
            "Certificate appears to be invalid"
        };

        Self {
            status: "success".to_string(),
            prediction: verdict.prediction,
            confidence: verdict.confidence,
            message: message.to_string(),
        }
    }
}

/// Body of GET /
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexResponse {
    pub status: String,
    pub message: String,
    pub endpoints: BTreeMap<String, String>,
}
