//! Runtime compilation of unit source text.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use adhesive_config::CompilerConfig;
use adhesive_core::{has_errors, AdhesiveError, ComputationUnit, Diagnostic, Result};

use crate::artifact;
use crate::front::{self, naming, CheckOptions};
use crate::loader::Loader;

/// Compiles unit source, registers the artifact and instantiates the unit.
///
/// Compilations may run concurrently. Registration happens only after the
/// program has been verified and bound to its backend, and is serialized so
/// that every caller instantiates the artifact it registered.
#[derive(Debug)]
pub struct DynamicCompiler {
    loader: Arc<Loader>,
    config: CompilerConfig,
    registration: Mutex<()>,
}

impl DynamicCompiler {
    pub fn new(loader: Arc<Loader>, config: CompilerConfig) -> Self {
        Self {
            loader,
            config,
            registration: Mutex::new(()),
        }
    }

    pub fn loader(&self) -> &Arc<Loader> {
        &self.loader
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compiles `source`, which must declare the unit `qualified_name`, and
    /// returns a new instance of it.
    pub fn compile(&self, qualified_name: &str, source: &str) -> Result<Arc<dyn ComputationUnit>> {
        self.compile_with_diagnostics(qualified_name, source)
            .map(|(unit, _)| unit)
    }

    /// Like [`compile`](Self::compile), also returning the warnings produced.
    pub fn compile_with_diagnostics(
        &self,
        qualified_name: &str,
        source: &str,
    ) -> Result<(Arc<dyn ComputationUnit>, Vec<Diagnostic>)> {
        debug!(
            event = "compile_start",
            unit = qualified_name,
            "Compiling unit `{qualified_name}`:\n{source}"
        );

        let options = CheckOptions {
            warnings_as_errors: self.config.warnings_as_errors,
        };
        let compilation = front::compile(qualified_name, source, &options);
        let diagnostics = compilation.diagnostics;
        let program = match compilation.program {
            Some(program) if !has_errors(&diagnostics) => program,
            _ => {
                for diagnostic in &diagnostics {
                    error!(event = "compile_diagnostic", unit = qualified_name, "{diagnostic}");
                }
                return Err(AdhesiveError::CompilationFailed { diagnostics });
            }
        };
        for diagnostic in &diagnostics {
            warn!(event = "compile_diagnostic", unit = qualified_name, "{diagnostic}");
        }

        // Everything that can fail happens before the store is touched.
        let bytes = artifact::encode(&program)?;
        let program = artifact::decode(qualified_name, &bytes)?;
        let prepared = self.loader.prepare(program)?;

        let _guard = self.registration.lock();
        let (registered, unit_type) = self.loader.install(bytes, prepared);

        info!(
            event = "compile_end",
            unit = qualified_name,
            generation = registered.generation(),
            bytes = registered.len(),
            warnings = diagnostics.len(),
        );
        Ok((unit_type.instantiate(), diagnostics))
    }

    /// Compiles `source` under a freshly generated package.
    ///
    /// The unit's simple name is taken from the source; any package it
    /// declares is replaced.
    pub fn compile_anonymous(&self, source: &str) -> Result<Arc<dyn ComputationUnit>> {
        let unit_name = naming::find_unit_name(source).ok_or_else(|| {
            AdhesiveError::CompilationFailed {
                diagnostics: vec![Diagnostic::error("cannot find a unit declaration in source", None)],
            }
        })?;
        let package = naming::generate_package(&self.config.generated_namespace);
        let qualified_name = format!("{package}.{unit_name}");
        self.compile(&qualified_name, &naming::with_package(source, &package))
    }

    /// Instantiates a unit already known to the loader, compiled or native.
    pub fn create_unit(&self, qualified_name: &str) -> Result<Arc<dyn ComputationUnit>> {
        let unit_type = self.loader.load_type(qualified_name)?;
        debug!(
            event = "unit_created",
            unit = qualified_name,
            compiled = unit_type.is_compiled(),
        );
        Ok(unit_type.instantiate())
    }
}
