//! Error types for Gantry

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using GantryError
pub type Result<T> = std::result::Result<T, GantryError>;

/// Main error type for Gantry operations
#[derive(Debug, Error)]
pub enum GantryError {
    /// Configuration-related errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Graph construction errors
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Tracker session errors
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    /// Blob store errors
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Local content cache errors
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Artifact naming errors
    #[error(transparent)]
    ArtifactName(#[from] ArtifactNameError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

/// Configuration-related errors
///
/// These abort before anything runs, so there is never partial state to
/// reconcile.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found at {0}")]
    NotFound(PathBuf),

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {message}")]
    InvalidValue { field: String, message: String },

    /// Missing required field
    #[error("Missing required configuration field: {0}")]
    MissingField(String),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// IO error
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors during action graph construction
#[derive(Debug, Error)]
pub enum GraphError {
    /// An action with the same group, type, and configuration already exists
    #[error("Duplicate action: '{0}' is already registered with an identical configuration")]
    DuplicateAction(String),

    /// Two actions claim the same output artifact name
    #[error("Output '{output}' is already produced by action '{producer}'")]
    DuplicateOutput { output: String, producer: String },

    /// A parent handle does not belong to this graph
    #[error("Parent handle {0} is not registered in this graph")]
    InvalidParent(usize),

    /// Actions must declare at least one output
    #[error("Action '{0}' declares no outputs")]
    NoOutputs(String),
}

/// Errors raised inside a tracker session
///
/// These are scoped to the failing action; the scheduler decides what happens
/// to its dependents.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// An action declared an output name missing from its static output list
    #[error("Action '{action}' tried to declare undeclared output '{name}'")]
    ArtifactConflict { action: String, name: String },

    /// An input name could not be resolved to any parent output or catalog entry
    #[error("Could not resolve input artifact '{0}'")]
    UnresolvedArtifact(String),

    /// The tracking backend rejected or failed an operation
    #[error("Tracking backend error: {0}")]
    Backend(String),

    /// declare_output needs at least one local file
    #[error("Output '{0}' has no local files to store")]
    EmptyOutput(String),
}

/// Blob store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Object not found in the store
    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// Requested version of an object not found
    #[error("Version '{version}' not found for {bucket}/{key}")]
    VersionNotFound {
        bucket: String,
        key: String,
        version: String,
    },

    /// IO error
    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Local content cache errors
#[derive(Debug, Error)]
pub enum CacheError {
    /// IO error
    #[error("Cache IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Index serialization error
    #[error("Cache index error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal invariant violation
    #[error("Cache internal error: {0}")]
    Internal(String),
}

/// Artifact naming errors
#[derive(Debug, Error)]
pub enum ArtifactNameError {
    /// A name component has characters outside the allowed set
    #[error(
        "Invalid {role} name: '{name}' (can only include alphanumeric characters, \
         underscores, dashes, and/or dots)"
    )]
    InvalidName { role: String, name: String },

    /// A descriptor string has too many components to parse
    #[error("Cannot parse artifact descriptor: '{0}'")]
    Unparseable(String),
}
