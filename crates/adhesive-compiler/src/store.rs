//! Process-wide registry of compiled unit artifacts.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::debug;

use adhesive_config::RegistryConfig;

/// Bytes registered under a unit name, stamped with the generation at which
/// they were registered. Generations increase with every registration, so a
/// re-registered name always carries a newer stamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArtifact {
    name: Arc<str>,
    bytes: Bytes,
    generation: u64,
}

impl CompiledArtifact {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    entries: HashMap<String, CompiledArtifact>,
    next_generation: u64,
}

/// Maps fully qualified unit names to compiled artifact bytes.
///
/// Registration replaces any previous entry for the name. Readers never
/// observe a partially written entry. Artifacts are kept until replaced, or
/// until evicted when a maximum size is configured.
#[derive(Debug, Default)]
pub struct ArtifactStore {
    inner: RwLock<StoreInner>,
    max_artifacts: Option<usize>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that evicts its oldest registrations beyond `max` entries.
    pub fn with_max_artifacts(max: usize) -> Self {
        Self {
            inner: RwLock::default(),
            max_artifacts: Some(max.max(1)),
        }
    }

    pub fn from_config(config: &RegistryConfig) -> Self {
        match config.max_artifacts {
            Some(max) => Self::with_max_artifacts(max),
            None => Self::new(),
        }
    }

    /// Registers `bytes` under `name`, replacing any previous entry.
    pub fn register(&self, name: &str, bytes: impl Into<Bytes>) -> CompiledArtifact {
        let mut inner = self.inner.write();
        inner.next_generation += 1;
        let artifact = CompiledArtifact {
            name: Arc::from(name),
            bytes: bytes.into(),
            generation: inner.next_generation,
        };
        inner.entries.insert(name.to_string(), artifact.clone());

        if let Some(max) = self.max_artifacts {
            while inner.entries.len() > max {
                let Some(oldest) = inner
                    .entries
                    .values()
                    .min_by_key(|a| a.generation)
                    .map(|a| a.name.to_string())
                else {
                    break;
                };
                inner.entries.remove(&oldest);
                debug!(event = "artifact_evicted", unit = %oldest);
            }
        }

        debug!(
            event = "artifact_registered",
            unit = name,
            generation = artifact.generation,
            bytes = artifact.len(),
        );
        artifact
    }

    /// Returns the bytes registered under `name`.
    pub fn resolve(&self, name: &str) -> Option<Bytes> {
        self.inner.read().entries.get(name).map(|a| a.bytes.clone())
    }

    /// Returns the full entry registered under `name`.
    pub fn artifact(&self, name: &str) -> Option<CompiledArtifact> {
        self.inner.read().entries.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.inner.read().entries.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn max_artifacts(&self) -> Option<usize> {
        self.max_artifacts
    }
}
