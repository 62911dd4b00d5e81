//! Gantry Tracker - run-scoped artifact and metric mediation
//!
//! Every executing action gets a tracker session: the only sanctioned path
//! for reading and writing versioned artifacts and emitting metrics. The
//! backend-bound tracker talks to the blob store and tracking backend; the
//! development tracker keeps the same resolution contract entirely local.

pub mod backend;
pub mod catalog;
pub mod dev;
pub mod session;
pub mod tracker;

pub use backend::BackendTracker;
pub use catalog::{DevArtifactStore, RunCatalog};
pub use dev::{DevTracker, DEV_VERSION};
pub use session::{SessionFactory, SessionSpec, TrackerSession};
pub use tracker::{OutputSpec, Tracker};
