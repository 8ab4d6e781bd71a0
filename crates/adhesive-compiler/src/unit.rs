//! Computation units backed by compiled programs.

use std::fmt;
use std::sync::Arc;

use arrow::datatypes::DataType;
use smallvec::SmallVec;

use adhesive_config::ExecutionMode;
use adhesive_core::{AdhesiveError, ComputationUnit, Result, RowView, Scalar, ScalarType};

use crate::eval::eval_program;
use crate::expr::{Accessor, Program, STATUS_DIVIDE_BY_ZERO, STATUS_FAIL_BASE, STATUS_NULL, STATUS_VALUE};
use crate::jit::JitFn;

/// Slot buffers live on the stack for units reading up to this many columns.
const INLINE_SLOTS: usize = 8;

enum Backend {
    Jit(JitFn),
    Interpreted,
}

/// A verified program bound to an execution backend. Shared by every unit
/// instantiated from the same artifact generation.
pub struct LoadedProgram {
    program: Program,
    backend: Backend,
    generation: u64,
}

impl LoadedProgram {
    pub(crate) fn interpreted(program: Program, generation: u64) -> Self {
        Self {
            program,
            backend: Backend::Interpreted,
            generation,
        }
    }

    pub(crate) fn jit(program: Program, jit: JitFn, generation: u64) -> Self {
        Self {
            program,
            backend: Backend::Jit(jit),
            generation,
        }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn execution(&self) -> ExecutionMode {
        match self.backend {
            Backend::Jit(_) => ExecutionMode::Jit,
            Backend::Interpreted => ExecutionMode::Interpreted,
        }
    }

    fn run(&self, slots: &[i64], nulls: &[u8]) -> (i64, i64) {
        match &self.backend {
            Backend::Jit(f) => {
                let mut out = 0;
                let status = f.call(slots, nulls, &mut out);
                (status, out)
            }
            Backend::Interpreted => eval_program(&self.program, slots, nulls),
        }
    }
}

impl fmt::Debug for LoadedProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedProgram")
            .field("name", &self.program.name)
            .field("generation", &self.generation)
            .field("execution", &self.execution())
            .finish_non_exhaustive()
    }
}

/// A unit instance created from a compiled artifact.
#[derive(Debug, Clone)]
pub struct CompiledUnit {
    loaded: Arc<LoadedProgram>,
}

impl CompiledUnit {
    pub fn new(loaded: Arc<LoadedProgram>) -> Self {
        Self { loaded }
    }

    pub fn generation(&self) -> u64 {
        self.loaded.generation
    }

    fn failure(&self, message: impl Into<String>) -> AdhesiveError {
        AdhesiveError::computation(&self.loaded.program.name, message)
    }

    fn to_scalar(&self, bits: i64) -> Result<Scalar> {
        let scalar = match self.loaded.program.result {
            ScalarType::Int64 => Scalar::Int64(bits),
            ScalarType::Int32 => Scalar::Int32(
                i32::try_from(bits)
                    .map_err(|_| self.failure(format!("result {bits} does not fit in i32")))?,
            ),
            ScalarType::Float64 => Scalar::Float64(f64::from_bits(bits as u64)),
            ScalarType::Float32 => Scalar::Float32(f64::from_bits(bits as u64) as f32),
        };
        Ok(scalar)
    }
}

impl ComputationUnit for CompiledUnit {
    fn name(&self) -> &str {
        &self.loaded.program.name
    }

    fn compute(&self, row: &RowView<'_>) -> Result<Option<Scalar>> {
        let columns = &self.loaded.program.columns;
        let mut slots: SmallVec<[i64; INLINE_SLOTS]> = SmallVec::with_capacity(columns.len());
        let mut nulls: SmallVec<[u8; INLINE_SLOTS]> = SmallVec::with_capacity(columns.len());
        for slot in columns {
            let value = match slot.accessor {
                Accessor::I32 | Accessor::I64 => row.get_i64(slot.column)?,
                Accessor::F32 | Accessor::F64 => {
                    row.get_f64(slot.column)?.map(|v| v.to_bits() as i64)
                }
                Accessor::Bool => row.get_bool(slot.column)?.map(i64::from),
            };
            slots.push(value.unwrap_or(0));
            nulls.push(u8::from(value.is_none()));
        }

        match self.loaded.run(&slots, &nulls) {
            (STATUS_NULL, _) => Ok(None),
            (STATUS_VALUE, bits) => self.to_scalar(bits).map(Some),
            (STATUS_DIVIDE_BY_ZERO, _) => Err(self.failure("division by zero")),
            (status, _) => {
                let message = usize::try_from(status - STATUS_FAIL_BASE)
                    .ok()
                    .and_then(|code| self.loaded.program.messages.get(code));
                match message {
                    Some(message) => Err(self.failure(message.clone())),
                    None => Err(AdhesiveError::Internal(format!(
                        "unit `{}` returned unknown status {status}",
                        self.name()
                    ))),
                }
            }
        }
    }

    fn result_type(&self) -> Option<ScalarType> {
        Some(self.loaded.program.result)
    }

    fn check_input(&self, data_types: &[DataType]) -> Result<()> {
        for slot in &self.loaded.program.columns {
            let Some(actual) = data_types.get(slot.column) else {
                return Err(AdhesiveError::SchemaMismatch(format!(
                    "unit `{}` reads column {} but the input has {} columns",
                    self.name(),
                    slot.column,
                    data_types.len()
                )));
            };
            let expected = slot.accessor.data_type();
            if *actual != expected {
                return Err(AdhesiveError::SchemaMismatch(format!(
                    "unit `{}` reads column {} as {expected}, but the input column is {actual}",
                    self.name(),
                    slot.column
                )));
            }
        }
        Ok(())
    }
}
