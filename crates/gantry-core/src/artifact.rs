//! Artifact references: validated names and versioned store locations
//!
//! An artifact is a set of externally stored, versioned objects produced by
//! one action and consumed by its dependents. The types here carry enough
//! information to locate the objects in a blob store and to register the
//! artifact with a tracking backend.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ArtifactNameError;

/// Default version label meaning "the newest registered version".
pub const LATEST_VERSION: &str = "latest";

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_\-.]+$").expect("static pattern"))
}

/// Ensure a name component conforms to artifact naming constraints.
///
/// Components must be non-empty combinations of alphanumeric characters,
/// underscores, dashes, and/or dots. `role` describes the component for error
/// messages ("artifact", "project", "artifact type", ...).
pub fn validate_name_component(name: &str, role: &str) -> Result<(), ArtifactNameError> {
    if name_pattern().is_match(name) {
        Ok(())
    } else {
        Err(ArtifactNameError::InvalidName {
            role: role.to_string(),
            name: name.to_string(),
        })
    }
}

/// A parsed artifact name: optional project qualifier plus optional version.
///
/// Supported string forms:
///
/// - `name`
/// - `project/name`
/// - `project/name:version`
///
/// Missing fields stay `None` until resolution fills them in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactName {
    /// Project namespace, if qualified
    pub project: Option<String>,
    /// The artifact name proper
    pub name: String,
    /// Version label (e.g. "latest", "v3")
    pub version: Option<String>,
}

impl ArtifactName {
    /// Create a validated artifact name.
    pub fn new(
        project: Option<String>,
        name: impl Into<String>,
        version: Option<String>,
    ) -> Result<Self, ArtifactNameError> {
        let name = name.into();
        validate_name_component(&name, "artifact")?;
        if let Some(project) = &project {
            validate_name_component(project, "project")?;
        }
        if let Some(version) = &version {
            validate_name_component(version, "version")?;
        }
        Ok(Self {
            project,
            name,
            version,
        })
    }

    /// Parse an artifact descriptor string.
    pub fn parse(descriptor: &str) -> Result<Self, ArtifactNameError> {
        let mut pieces: Vec<&str> = descriptor.split('/').collect();
        let mut version = None;

        // If there's a version, pull it off the last piece.
        if let Some(&last) = pieces.last() {
            if let Some((base, ver)) = last.rsplit_once(':') {
                version = Some(ver.to_string());
                if let Some(slot) = pieces.last_mut() {
                    *slot = base;
                }
            }
        }

        match pieces.as_slice() {
            [name] => Self::new(None, *name, version),
            [project, name] => Self::new(Some(project.to_string()), *name, version),
            _ => Err(ArtifactNameError::Unparseable(descriptor.to_string())),
        }
    }

    /// Test whether this and another artifact name are compatible.
    ///
    /// Names match when all set fields match, ignoring versions. This differs
    /// from equality in that unset fields match anything.
    pub fn matches(&self, other: &ArtifactName) -> bool {
        if let (Some(a), Some(b)) = (&self.project, &other.project) {
            if a != b {
                return false;
            }
        }
        self.name == other.name
    }

    /// Fill in defaults and fold in any version overrides.
    ///
    /// The project defaults to `default_project`, the version to `latest`.
    /// If an override in `overrides` matches this name and this name has no
    /// explicit version yet, the override's version wins. Resolution works
    /// without network access; `latest` stays symbolic until a backend or
    /// store pins it.
    pub fn resolve(mut self, default_project: Option<&str>, overrides: &[ArtifactName]) -> Self {
        if self.project.is_none() {
            self.project = default_project.map(str::to_string);
        }
        if self.version.is_none() {
            for override_name in overrides {
                if self.matches(override_name) {
                    self.version = override_name.version.clone();
                    break;
                }
            }
        }
        if self.version.is_none() {
            self.version = Some(LATEST_VERSION.to_string());
        }
        self
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(project) = &self.project {
            write!(f, "{}/", project)?;
        }
        write!(f, "{}", self.name)?;
        if let Some(version) = &self.version {
            write!(f, ":{}", version)?;
        }
        Ok(())
    }
}

/// Path to an object in a blob store: bucket plus key.
///
/// Keys are slash-separated and treated as pseudo-directories for joining,
/// even though the store itself is flat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoreKey {
    /// Bucket name
    pub bucket: String,
    /// Object key within the bucket
    pub key: String,
}

impl StoreKey {
    /// Create a new store key.
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Join a path suffix onto the key, treating the key as a directory.
    ///
    /// A leading slash on the suffix is stripped so joins never reset to an
    /// absolute path.
    pub fn join(&self, suffix: &str) -> StoreKey {
        let suffix = suffix.trim_start_matches('/');
        let key = if self.key.is_empty() {
            suffix.to_string()
        } else {
            format!("{}/{}", self.key.trim_end_matches('/'), suffix)
        };
        StoreKey::new(self.bucket.clone(), key)
    }

    /// Attach a version id, producing a versioned key.
    pub fn with_version(&self, version_id: impl Into<String>) -> VersionedStoreKey {
        VersionedStoreKey {
            bucket: self.bucket.clone(),
            key: self.key.clone(),
            version_id: version_id.into(),
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Path to a specific version of a stored object.
///
/// A `(bucket, key, version_id)` triple is immutable once minted: storing
/// different content under the same key mints a new version rather than
/// overwriting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionedStoreKey {
    /// Bucket name
    pub bucket: String,
    /// Object key within the bucket
    pub key: String,
    /// Opaque version token assigned by the store
    pub version_id: String,
}

impl VersionedStoreKey {
    /// Create a new versioned store key.
    pub fn new(
        bucket: impl Into<String>,
        key: impl Into<String>,
        version_id: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            version_id: version_id.into(),
        }
    }

    /// The unversioned location of this object.
    pub fn unversioned(&self) -> StoreKey {
        StoreKey::new(self.bucket.clone(), self.key.clone())
    }
}

impl fmt::Display for VersionedStoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.bucket, self.key, self.version_id)
    }
}

/// One stored file backing an artifact: its location plus content fingerprint.
///
/// The fingerprint travels with the reference so consumers can satisfy reads
/// from the local content cache without touching the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    /// Versioned location in the blob store
    pub location: VersionedStoreKey,
    /// SHA-256 fingerprint of the stored bytes
    pub fingerprint: String,
}

impl StoredObject {
    /// Create a new stored object record.
    pub fn new(location: VersionedStoreKey, fingerprint: impl Into<String>) -> Self {
        Self {
            location,
            fingerprint: fingerprint.into(),
        }
    }
}

/// A versioned, externally stored artifact produced or consumed by an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Artifact name (validated against naming constraints)
    pub name: String,
    /// Free-form classification string (e.g. "dataset", "predictions")
    pub artifact_type: String,
    /// Stored objects backing this artifact, one per file
    pub objects: Vec<StoredObject>,
    /// Arbitrary metadata recorded alongside the artifact
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl ArtifactRef {
    /// Create a validated artifact reference.
    pub fn new(
        name: impl Into<String>,
        artifact_type: impl Into<String>,
        objects: Vec<StoredObject>,
        metadata: serde_json::Value,
    ) -> Result<Self, ArtifactNameError> {
        let name = name.into();
        let artifact_type = artifact_type.into();
        validate_name_component(&name, "artifact")?;
        validate_name_component(&artifact_type, "artifact type")?;
        Ok(Self {
            name,
            artifact_type,
            objects,
            metadata,
        })
    }

    /// The version token of this artifact.
    ///
    /// All objects in one artifact share a version; the first object's
    /// version id is authoritative.
    pub fn version(&self) -> Option<&str> {
        self.objects.first().map(|o| o.location.version_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name_component() {
        assert!(validate_name_component("valid-name_1.2", "artifact").is_ok());
        for bad in ["with/slashes", "with spaces", "illegal!", "", "****"] {
            assert!(validate_name_component(bad, "artifact").is_err(), "{bad}");
        }
    }

    #[test]
    fn test_parse_bare_name() {
        let name = ArtifactName::parse("corpus").unwrap();
        assert_eq!(name.project, None);
        assert_eq!(name.name, "corpus");
        assert_eq!(name.version, None);
    }

    #[test]
    fn test_parse_qualified_name() {
        let name = ArtifactName::parse("nlp/corpus:v3").unwrap();
        assert_eq!(name.project.as_deref(), Some("nlp"));
        assert_eq!(name.name, "corpus");
        assert_eq!(name.version.as_deref(), Some("v3"));
    }

    #[test]
    fn test_parse_too_many_components() {
        assert!(ArtifactName::parse("a/b/c/d").is_err());
    }

    #[test]
    fn test_display_round_trip() {
        for s in ["corpus", "nlp/corpus", "nlp/corpus:latest"] {
            assert_eq!(ArtifactName::parse(s).unwrap().to_string(), s);
        }
    }

    #[test]
    fn test_matches_ignores_version() {
        let a = ArtifactName::parse("nlp/corpus:v1").unwrap();
        let b = ArtifactName::parse("nlp/corpus:v2").unwrap();
        assert!(a.matches(&b));
    }

    #[test]
    fn test_matches_unset_project_is_wildcard() {
        let bare = ArtifactName::parse("corpus").unwrap();
        let qualified = ArtifactName::parse("nlp/corpus").unwrap();
        assert!(bare.matches(&qualified));
        assert!(qualified.matches(&bare));

        let other = ArtifactName::parse("vision/corpus").unwrap();
        assert!(!qualified.matches(&other));
    }

    #[test]
    fn test_resolve_defaults() {
        let resolved = ArtifactName::parse("corpus").unwrap().resolve(Some("nlp"), &[]);
        assert_eq!(resolved.project.as_deref(), Some("nlp"));
        assert_eq!(resolved.version.as_deref(), Some(LATEST_VERSION));
    }

    #[test]
    fn test_resolve_honors_override() {
        let overrides = vec![ArtifactName::parse("nlp/corpus:v7").unwrap()];
        let resolved = ArtifactName::parse("corpus")
            .unwrap()
            .resolve(Some("nlp"), &overrides);
        assert_eq!(resolved.version.as_deref(), Some("v7"));
    }

    #[test]
    fn test_resolve_explicit_version_beats_override() {
        let overrides = vec![ArtifactName::parse("nlp/corpus:v7").unwrap()];
        let resolved = ArtifactName::parse("corpus:v2")
            .unwrap()
            .resolve(Some("nlp"), &overrides);
        assert_eq!(resolved.version.as_deref(), Some("v2"));
    }

    #[test]
    fn test_store_key_join() {
        let key = StoreKey::new("bucket", "runs");
        assert_eq!(key.join("model.bin").key, "runs/model.bin");
        assert_eq!(key.join("/model.bin").key, "runs/model.bin");

        let root = StoreKey::new("bucket", "");
        assert_eq!(root.join("model.bin").key, "model.bin");
    }

    #[test]
    fn test_versioned_key_unversioned() {
        let versioned = VersionedStoreKey::new("bucket", "runs/model.bin", "v2");
        assert_eq!(versioned.unversioned(), StoreKey::new("bucket", "runs/model.bin"));
    }

    #[test]
    fn test_artifact_ref_validation() {
        let object = StoredObject::new(VersionedStoreKey::new("bucket", "key", "v0"), "abc123");
        assert!(ArtifactRef::new("ok-name", "dataset", vec![object.clone()], serde_json::Value::Null).is_ok());
        assert!(ArtifactRef::new("bad name", "dataset", vec![object], serde_json::Value::Null).is_err());
    }

    #[test]
    fn test_artifact_ref_version() {
        let artifact = ArtifactRef::new(
            "corpus",
            "dataset",
            vec![
                StoredObject::new(VersionedStoreKey::new("bucket", "a", "v4"), "fp-a"),
                StoredObject::new(VersionedStoreKey::new("bucket", "b", "v4"), "fp-b"),
            ],
            serde_json::Value::Null,
        )
        .unwrap();
        assert_eq!(artifact.version(), Some("v4"));
    }
}
