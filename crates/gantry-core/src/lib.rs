//! Gantry Core - foundational types for the Gantry pipeline runner
//!
//! This crate provides the error taxonomy, configuration system, artifact
//! reference model, content fingerprinting, and git provenance capture shared
//! by the rest of the workspace.

pub mod artifact;
pub mod config;
pub mod digest;
pub mod error;
pub mod provenance;

pub use artifact::{
    validate_name_component, ArtifactName, ArtifactRef, StoreKey, StoredObject,
    VersionedStoreKey, LATEST_VERSION,
};
pub use config::{
    find_config, load_config, load_config_from_dir, read_config, validate_config, Config,
    RuntimeConfig,
};
pub use digest::{digest_bytes, digest_file, digest_value, to_canonical_json};
pub use error::{
    ArtifactNameError, CacheError, ConfigError, GantryError, GraphError, Result, StoreError,
    TrackerError,
};
pub use provenance::Provenance;
