//! Resolution of unit names to loadable unit types.
//!
//! The [`Loader`] consults the [`ArtifactStore`] first and defines a type
//! from the registered bytes; names the store does not know are delegated to
//! a parent [`TypeResolver`], typically the [`NativeTypes`] registered by the
//! host application.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use adhesive_config::{CompilerConfig, ExecutionMode, OptLevel};
use adhesive_core::{AdhesiveError, ComputationUnit, Result};

use crate::artifact;
use crate::expr::Program;
use crate::jit::{compile_program, JitFn};
use crate::store::{ArtifactStore, CompiledArtifact};
use crate::unit::{CompiledUnit, LoadedProgram};

/// Creates a fresh instance of a native unit type.
pub type UnitConstructor = Arc<dyn Fn() -> Arc<dyn ComputationUnit> + Send + Sync>;

/// Fallback lookup for names the artifact store does not know.
pub trait TypeResolver: Send + Sync {
    fn resolve_type(&self, name: &str) -> Option<UnitType>;
}

#[derive(Clone)]
enum TypeOrigin {
    Compiled(Arc<LoadedProgram>),
    Native(UnitConstructor),
}

/// A loaded unit type from which instances are created.
#[derive(Clone)]
pub struct UnitType {
    name: Arc<str>,
    origin: TypeOrigin,
}

impl UnitType {
    /// A type implemented by host code.
    pub fn native(name: &str, constructor: UnitConstructor) -> Self {
        Self {
            name: Arc::from(name),
            origin: TypeOrigin::Native(constructor),
        }
    }

    fn compiled(loaded: LoadedProgram) -> Self {
        Self {
            name: Arc::from(loaded.program().name.as_str()),
            origin: TypeOrigin::Compiled(Arc::new(loaded)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_compiled(&self) -> bool {
        matches!(self.origin, TypeOrigin::Compiled(_))
    }

    /// Artifact generation the type was defined from; `None` for native types.
    pub fn generation(&self) -> Option<u64> {
        match &self.origin {
            TypeOrigin::Compiled(loaded) => Some(loaded.generation()),
            TypeOrigin::Native(_) => None,
        }
    }

    /// Creates a new unit instance of this type.
    pub fn instantiate(&self) -> Arc<dyn ComputationUnit> {
        match &self.origin {
            TypeOrigin::Compiled(loaded) => Arc::new(CompiledUnit::new(Arc::clone(loaded))),
            TypeOrigin::Native(constructor) => constructor(),
        }
    }
}

impl fmt::Debug for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("UnitType");
        s.field("name", &self.name);
        match &self.origin {
            TypeOrigin::Compiled(loaded) => s.field("loaded", loaded),
            TypeOrigin::Native(_) => s.field("native", &true),
        };
        s.finish()
    }
}

/// Unit types implemented by host code, keyed by fully qualified name.
#[derive(Default)]
pub struct NativeTypes {
    types: RwLock<HashMap<String, UnitConstructor>>,
}

impl NativeTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a native unit type, replacing any previous one.
    pub fn register<F>(&self, name: &str, constructor: F)
    where
        F: Fn() -> Arc<dyn ComputationUnit> + Send + Sync + 'static,
    {
        self.types
            .write()
            .insert(name.to_string(), Arc::new(constructor));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.read().contains_key(name)
    }
}

impl fmt::Debug for NativeTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.types.read().keys().cloned().collect();
        names.sort();
        f.debug_struct("NativeTypes").field("names", &names).finish()
    }
}

impl TypeResolver for NativeTypes {
    fn resolve_type(&self, name: &str) -> Option<UnitType> {
        let constructor = self.types.read().get(name).cloned()?;
        Some(UnitType::native(name, constructor))
    }
}

/// Backend selection for loaded programs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    pub execution: ExecutionMode,
    pub opt_level: OptLevel,
}

impl From<&CompilerConfig> for LoadOptions {
    fn from(config: &CompilerConfig) -> Self {
        Self {
            execution: config.execution,
            opt_level: config.opt_level,
        }
    }
}

/// A verified program bound to its backend but not yet registered.
pub struct PreparedType {
    program: Program,
    jit: Option<JitFn>,
}

impl PreparedType {
    pub fn name(&self) -> &str {
        &self.program.name
    }

    fn into_unit_type(self, generation: u64) -> UnitType {
        let loaded = match self.jit {
            Some(jit) => LoadedProgram::jit(self.program, jit, generation),
            None => LoadedProgram::interpreted(self.program, generation),
        };
        UnitType::compiled(loaded)
    }
}

impl fmt::Debug for PreparedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedType")
            .field("name", &self.program.name)
            .field("jit", &self.jit.is_some())
            .finish()
    }
}

/// Defines unit types from registered artifacts.
///
/// Each name is defined once per artifact generation; re-registering a name
/// makes the next lookup define a new type while instances of the old type
/// keep working. Types whose artifacts have left the store are dropped from
/// the cache whenever a type is added to it.
pub struct Loader {
    store: Arc<ArtifactStore>,
    parent: Arc<dyn TypeResolver>,
    options: LoadOptions,
    cache: Mutex<HashMap<String, UnitType>>,
}

impl Loader {
    pub fn new(store: Arc<ArtifactStore>, parent: Arc<dyn TypeResolver>, options: LoadOptions) -> Self {
        Self {
            store,
            parent,
            options,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    pub fn options(&self) -> LoadOptions {
        self.options
    }

    /// Number of defined types currently cached.
    pub fn cached_types(&self) -> usize {
        self.cache.lock().len()
    }

    /// Resolves `name`: the artifact store first, then the parent resolver.
    pub fn load_type(&self, name: &str) -> Result<UnitType> {
        let Some(artifact) = self.store.artifact(name) else {
            self.cache.lock().remove(name);
            return self
                .parent
                .resolve_type(name)
                .ok_or_else(|| AdhesiveError::type_not_found(name));
        };

        if let Some(cached) = self.cache.lock().get(name) {
            if cached.generation() == Some(artifact.generation()) {
                return Ok(cached.clone());
            }
        }

        let unit_type = self.define(&artifact)?;
        self.cache_type(name, &unit_type);
        Ok(unit_type)
    }

    /// Decodes, verifies and binds one artifact to the configured backend.
    pub fn define(&self, artifact: &CompiledArtifact) -> Result<UnitType> {
        let program = artifact::decode(artifact.name(), artifact.bytes())?;
        let unit_type = self.prepare(program)?.into_unit_type(artifact.generation());
        self.log_defined(&unit_type);
        Ok(unit_type)
    }

    /// Binds a verified program to the configured backend. The store is not
    /// touched, so a failure here leaves every registration as it was.
    pub fn prepare(&self, program: Program) -> Result<PreparedType> {
        let jit = match self.options.execution {
            ExecutionMode::Jit => Some(compile_program(&program, self.options.opt_level).map_err(
                |e| {
                    AdhesiveError::Internal(format!(
                        "code generation failed for `{}`: {e}",
                        program.name
                    ))
                },
            )?),
            ExecutionMode::Interpreted => None,
        };
        Ok(PreparedType { program, jit })
    }

    /// Registers `bytes` as the artifact of `prepared` and defines its type.
    ///
    /// `bytes` must encode the prepared program. Nothing can fail once the
    /// store has changed.
    pub fn install(&self, bytes: Bytes, prepared: PreparedType) -> (CompiledArtifact, UnitType) {
        let artifact = self.store.register(prepared.name(), bytes);
        let unit_type = prepared.into_unit_type(artifact.generation());
        self.log_defined(&unit_type);
        self.cache_type(artifact.name(), &unit_type);
        (artifact, unit_type)
    }

    fn cache_type(&self, name: &str, unit_type: &UnitType) {
        let mut cache = self.cache.lock();
        cache.insert(name.to_string(), unit_type.clone());
        cache.retain(|cached, _| self.store.contains(cached));
    }

    fn log_defined(&self, unit_type: &UnitType) {
        debug!(
            event = "unit_defined",
            unit = unit_type.name(),
            generation = unit_type.generation(),
            execution = ?self.options.execution,
        );
    }
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("store", &self.store)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
