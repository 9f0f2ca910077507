use serde::Deserialize;

/// Reply body of `POST /batch`.
#[derive(Debug, Deserialize)]
pub struct BatchEnvelope {
    #[serde(default)]
    pub response: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<RemoteError>,
}

#[derive(Debug, Deserialize)]
pub struct RemoteError {
    pub message: String,
    #[serde(default)]
    pub retryable: Option<bool>,
}
