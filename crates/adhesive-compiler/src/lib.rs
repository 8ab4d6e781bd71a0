//! Runtime compilation and loading of adhesive computation units.
//!
//! Unit source text is compiled by the [`front`] end into a typed
//! [`Program`], serialized into an [`artifact`], registered in the
//! [`ArtifactStore`] and turned back into a unit type by the [`Loader`],
//! which runs it either as native code ([`jit`]) or through the
//! [`eval`] interpreter.
//!
//! ```
//! use std::sync::Arc;
//!
//! use adhesive_compiler::{ArtifactStore, DynamicCompiler, LoadOptions, Loader, NativeTypes};
//! use adhesive_config::CompilerConfig;
//! use adhesive_core::ComputationUnit;
//!
//! let loader = Loader::new(
//!     Arc::new(ArtifactStore::new()),
//!     Arc::new(NativeTypes::new()),
//!     LoadOptions::default(),
//! );
//! let compiler = DynamicCompiler::new(Arc::new(loader), CompilerConfig::default());
//! let unit = compiler
//!     .compile(
//!         "demo.Double",
//!         "package demo; unit Double -> i64 { row.i64(0) * 2 }",
//!     )
//!     .unwrap();
//! assert_eq!(unit.name(), "demo.Double");
//! ```

pub mod artifact;
pub mod compiler;
pub mod eval;
pub mod expr;
pub mod front;
pub mod jit;
pub mod loader;
pub mod store;
pub mod unit;

#[cfg(test)]
mod test_utils;

pub use compiler::DynamicCompiler;
pub use expr::Program;
pub use loader::{
    LoadOptions, Loader, NativeTypes, PreparedType, TypeResolver, UnitConstructor, UnitType,
};
pub use store::{ArtifactStore, CompiledArtifact};
pub use unit::{CompiledUnit, LoadedProgram};
