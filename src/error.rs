//! Error taxonomy shared by the fetch and storage stages.

use thiserror::Error;

/// Errors raised while fetching a price or persisting its history.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The search page failed to load.
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    /// No price locator matched before the wait timeout.
    #[error("market price element for {item} not found within {timeout_secs}s")]
    ElementNotFound { item: String, timeout_secs: u64 },

    /// The price element was found but held no usable number.
    #[error("could not parse a price for {item} from {text:?}")]
    Parse { item: String, text: String },

    /// The browser session could not be started, queried or closed.
    #[error("browser session error: {0}")]
    Session(String),

    /// Reading the stored history failed.
    #[error("reading {blob} failed: {message}")]
    StorageRead { blob: String, message: String },

    /// Writing the history back failed.
    #[error("writing {blob} failed: {message}")]
    StorageWrite { blob: String, message: String },

    /// The stored document changed between download and upload.
    #[error("{blob} was modified by another writer since it was read")]
    Conflict { blob: String },

    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl TrackerError {
    /// Returns the pipeline stage this error belongs to.
    pub fn stage(&self) -> &'static str {
        match self {
            TrackerError::Navigation { .. }
            | TrackerError::ElementNotFound { .. }
            | TrackerError::Parse { .. }
            | TrackerError::Session(_) => "fetch",
            TrackerError::StorageRead { .. }
            | TrackerError::StorageWrite { .. }
            | TrackerError::Conflict { .. } => "store",
            TrackerError::Config(_) => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_item() {
        let err = TrackerError::ElementNotFound { item: "Iono".to_string(), timeout_secs: 15 };
        assert_eq!(err.to_string(), "market price element for Iono not found within 15s");

        let err = TrackerError::Parse { item: "Iono".to_string(), text: "N/A".to_string() };
        assert!(err.to_string().contains("Iono"));
        assert!(err.to_string().contains("\"N/A\""));
    }

    #[test]
    fn test_stage() {
        assert_eq!(TrackerError::Session("boom".into()).stage(), "fetch");
        assert_eq!(TrackerError::Conflict { blob: "Iono.json".into() }.stage(), "store");
        assert_eq!(TrackerError::Config("missing key".into()).stage(), "config");
    }
}
