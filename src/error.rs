use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced while setting up or running the demo
#[derive(Debug, Error)]
pub enum DriveError {
    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("invalid config value {field}: {reason}")]
    Invalid { field: String, reason: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("asset {url} failed to load: {reason}")]
    Asset { url: String, reason: String },

    #[error("physics setup failed: {0}")]
    Physics(String),

    #[error("GPU init failed: {0}")]
    Gpu(String),

    #[error("browser call failed: {0}")]
    Js(String),
}

impl DriveError {
    pub fn asset(url: impl Into<String>, reason: impl ToString) -> Self {
        DriveError::Asset {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(target_arch = "wasm32")]
impl From<wasm_bindgen::JsValue> for DriveError {
    fn from(value: wasm_bindgen::JsValue) -> Self {
        DriveError::Js(format!("{value:?}"))
    }
}

#[cfg(target_arch = "wasm32")]
impl From<DriveError> for wasm_bindgen::JsValue {
    fn from(err: DriveError) -> Self {
        wasm_bindgen::JsValue::from_str(&err.to_string())
    }
}

pub type Result<T, E = DriveError> = std::result::Result<T, E>;
