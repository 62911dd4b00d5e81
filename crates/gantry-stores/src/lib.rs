//! Gantry Stores - storage clients for the Gantry pipeline runner
//!
//! This crate provides the trait boundaries to the two external storage
//! collaborators (the versioned blob store and the tracking backend), local
//! filesystem implementations of both for development and tests, and the
//! shared content-addressed cache that sits in front of the blob store.

pub mod blob;
pub mod cache;
pub mod tracking;

pub use blob::{BlobStore, FsBlobStore};
pub use cache::{CacheEntry, ContentCache};
pub use tracking::{
    ArtifactDirection, FsTrackingBackend, MemoryTrackingBackend, MetricRecord, RunDescriptor,
    RunHandle, RunRecord, RunStatus, TrackingBackend,
};
