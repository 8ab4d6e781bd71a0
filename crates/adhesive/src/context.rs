//! The explicit context shared by compile and bridge calls.

use std::sync::Arc;

use arrow::datatypes::DataType;
use tracing::info;

use adhesive_compiler::{ArtifactStore, DynamicCompiler, LoadOptions, Loader, NativeTypes};
use adhesive_config::AdhesiveConfig;
use adhesive_core::{AdhesiveError, ComputationUnit, Diagnostic, Result};

use crate::function::{AdhesiveFunction, FunctionDefinition};

/// Owns the artifact store, the native unit registry and the compiler.
///
/// Create one per process (or per isolated tenant) and share it; cloning is
/// cheap and clones see the same registry.
#[derive(Debug, Clone)]
pub struct AdhesiveContext {
    config: Arc<AdhesiveConfig>,
    natives: Arc<NativeTypes>,
    compiler: Arc<DynamicCompiler>,
}

impl AdhesiveContext {
    /// Creates a context with the default configuration.
    pub fn new() -> Self {
        Self::build(AdhesiveConfig::default())
    }

    /// Creates a context from a validated configuration.
    pub fn with_config(config: AdhesiveConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| AdhesiveError::Config(e.to_string()))?;
        Ok(Self::build(config))
    }

    /// Creates a context from TOML configuration text.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config =
            AdhesiveConfig::from_toml_str(s).map_err(|e| AdhesiveError::Config(e.to_string()))?;
        Ok(Self::build(config))
    }

    fn build(config: AdhesiveConfig) -> Self {
        let store = Arc::new(ArtifactStore::from_config(&config.registry));
        let natives = Arc::new(NativeTypes::new());
        let loader = Loader::new(
            store,
            natives.clone(),
            LoadOptions::from(&config.compiler),
        );
        let compiler = DynamicCompiler::new(Arc::new(loader), config.compiler.clone());

        info!(
            event = "context_created",
            execution = ?config.compiler.execution,
            opt_level = ?config.compiler.opt_level,
            max_artifacts = ?config.registry.max_artifacts,
        );
        Self {
            config: Arc::new(config),
            natives,
            compiler: Arc::new(compiler),
        }
    }

    pub fn config(&self) -> &AdhesiveConfig {
        &self.config
    }

    pub fn compiler(&self) -> &DynamicCompiler {
        &self.compiler
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        self.compiler.loader().store()
    }

    /// Compiles `source`, which must declare the unit `qualified_name`.
    pub fn compile(&self, qualified_name: &str, source: &str) -> Result<Arc<dyn ComputationUnit>> {
        self.compiler.compile(qualified_name, source)
    }

    /// Compiles `source` and also returns its warnings.
    pub fn compile_with_diagnostics(
        &self,
        qualified_name: &str,
        source: &str,
    ) -> Result<(Arc<dyn ComputationUnit>, Vec<Diagnostic>)> {
        self.compiler.compile_with_diagnostics(qualified_name, source)
    }

    /// Compiles `source` under a generated package name.
    pub fn compile_anonymous(&self, source: &str) -> Result<Arc<dyn ComputationUnit>> {
        self.compiler.compile_anonymous(source)
    }

    /// Instantiates a compiled or native unit by name.
    pub fn create_unit(&self, qualified_name: &str) -> Result<Arc<dyn ComputationUnit>> {
        self.compiler.create_unit(qualified_name)
    }

    /// Makes a Rust implemented unit resolvable by name.
    ///
    /// Compiled units registered under the same name take precedence.
    pub fn register_native<F>(&self, qualified_name: &str, constructor: F)
    where
        F: Fn() -> Arc<dyn ComputationUnit> + Send + Sync + 'static,
    {
        self.natives.register(qualified_name, constructor);
    }

    /// Builds a callable function over `input_types` producing `return_type`.
    pub fn create_function(
        &self,
        definition: FunctionDefinition,
        input_types: Vec<DataType>,
        return_type: DataType,
    ) -> Result<AdhesiveFunction> {
        let unit = match &definition {
            FunctionDefinition::Source(source) => self.compile_anonymous(source)?,
            FunctionDefinition::Name(name) => self.create_unit(name)?,
        };
        AdhesiveFunction::new(unit, input_types, return_type)
    }
}

impl Default for AdhesiveContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests;
