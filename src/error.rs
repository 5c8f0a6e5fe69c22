//! Error types shared across the graph, page and messaging layers.

use crate::audio::ContextId;
use crate::dom::ElementId;
use crate::messaging::PageId;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by audio contexts and the gain graph.
#[derive(Debug, Error)]
pub enum AudioError {
    /// The page has no audio capability; contexts cannot be constructed.
    #[error("audio context construction is unavailable on this page")]
    Unavailable,

    /// The element is already routed into an audio context.
    #[error("element {element} is already captured by context {owner}")]
    AlreadyCaptured { element: ElementId, owner: ContextId },

    /// A media source was requested for a non-media element.
    #[error("element {0} is not a media element")]
    NotMedia(ElementId),

    /// A node handle that does not belong to the context graph.
    #[error("unknown node {0}")]
    UnknownNode(u32),

    /// Nodes belonging to different contexts cannot be connected.
    #[error("cannot connect nodes across audio contexts")]
    ForeignNode,

    /// The connection would feed into a source or create a cycle.
    #[error("invalid connection from node {from} to node {to}")]
    InvalidConnection { from: u32, to: u32 },

    /// The context has been closed.
    #[error("audio context {0} is closed")]
    Closed(ContextId),
}

/// Errors from the cross-context message bus.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No page with this identity is attached to the bus.
    #[error("no such page: {0}")]
    NoSuchPage(PageId),

    /// The page exists but nothing listens for messages on it.
    #[error("could not establish connection: receiving end does not exist")]
    NoReceiver,

    /// The receiver dropped the request without replying.
    #[error("message channel closed before a response was received")]
    Disconnected,

    /// The page does not allow script execution (browser-internal pages).
    #[error("cannot access contents of page {0}")]
    Restricted(PageId),

    /// The caller's deadline elapsed.
    #[error("request timed out")]
    Timeout,
}

/// Errors from loading and saving the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform has no config directory.
    #[error("could not determine config directory")]
    NoConfigDir,

    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create directory
    #[error("failed to create directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse or serialize JSON
    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConfigError {
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::ReadFile {
            path: path.into(),
            source,
        }
    }

    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::WriteFile {
            path: path.into(),
            source,
        }
    }

    pub fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::CreateDir {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn mock_io_err() -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::NotFound, "mock")
    }

    #[test]
    fn already_captured_display_names_both_ids() {
        let err = AudioError::AlreadyCaptured {
            element: ElementId::from_raw(7),
            owner: ContextId::from_raw(2),
        };
        let msg = err.to_string();
        assert!(msg.contains("element #7"), "got: {msg}");
        assert!(msg.contains("context ctx-2"), "got: {msg}");
    }

    #[test]
    fn no_receiver_matches_browser_wording() {
        assert_eq!(
            TransportError::NoReceiver.to_string(),
            "could not establish connection: receiving end does not exist"
        );
    }

    #[test]
    fn read_file_exposes_io_source() {
        let err = ConfigError::read_file("/x/config.json", mock_io_err());
        assert!(err.to_string().contains("/x/config.json"));
        assert!(err.source().is_some(), "ReadFile must expose I/O source");
    }

    #[test]
    fn no_config_dir_has_no_source() {
        assert!(ConfigError::NoConfigDir.source().is_none());
    }
}
