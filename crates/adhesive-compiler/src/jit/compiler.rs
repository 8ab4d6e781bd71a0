//! Cranelift code generation for unit programs.
//!
//! # Calling Convention
//!
//! Every compiled unit has the native signature
//!
//! ```text
//! fn(slots: *const i64, nulls: *const u8, out: *mut i64) -> i64
//! ```
//!
//! `slots[i]` holds the value of column slot `i` (integers and booleans as
//! i64, floats as their f64 bit pattern), `nulls[i]` is non-zero when that
//! cell is absent. The return value is a status code from [`crate::expr`];
//! the result is written to `out` when the status is `STATUS_VALUE`.
//!
//! # Dataflow
//!
//! The generated code is a single basic block. Each expression yields a
//! value, a null flag and an error status, and control constructs pick
//! between fully evaluated alternatives with `select`. Division operands
//! are sanitised so that no trapping instruction is ever executed.

use cranelift_codegen::ir::condcodes::{FloatCC, IntCC};
use cranelift_codegen::ir::types::{F32, F64, I32, I64, I8};
use cranelift_codegen::ir::{AbiParam, Function, InstBuilder, MemFlags, UserFuncName, Value};
use cranelift_codegen::settings::{self, Configurable};
use cranelift_codegen::Context;
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext};
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{Linkage, Module};
use thiserror::Error;

use adhesive_config::OptLevel;

use crate::expr::{
    Cast, ColumnSlot, Expr, Literal, Program, ValueType, STATUS_DIVIDE_BY_ZERO, STATUS_FAIL_BASE,
};

/// A compiled unit. Owns the Cranelift module (code memory) and holds the
/// raw function pointer.
pub struct JitFn {
    _module: JITModule,
    ptr: *const u8,
    slots: usize,
}

// SAFETY: JITModule owns the code memory. ptr is valid for the module's lifetime
// and the generated code keeps no state between calls.
unsafe impl Send for JitFn {}
unsafe impl Sync for JitFn {}

impl JitFn {
    /// Runs the unit on one row. Returns the status code.
    #[inline]
    pub fn call(&self, slots: &[i64], nulls: &[u8], out: &mut i64) -> i64 {
        assert!(
            slots.len() >= self.slots && nulls.len() >= self.slots,
            "JitFn::call: expected {} slots, got {}/{}",
            self.slots,
            slots.len(),
            nulls.len()
        );
        let f: unsafe extern "C" fn(*const i64, *const u8, *mut i64) -> i64 =
            unsafe { std::mem::transmute(self.ptr) };
        unsafe { f(slots.as_ptr(), nulls.as_ptr(), out) }
    }

    pub fn slot_count(&self) -> usize {
        self.slots
    }
}

impl std::fmt::Debug for JitFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JitFn")
            .field("ptr", &self.ptr)
            .field("slots", &self.slots)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("cranelift setting: {0}")]
    Setting(#[from] settings::SetError),

    #[error("cranelift ISA: {0}")]
    Isa(String),

    #[error("module: {0}")]
    Module(Box<cranelift_module::ModuleError>),
}

impl From<cranelift_module::ModuleError> for CodegenError {
    fn from(e: cranelift_module::ModuleError) -> Self {
        CodegenError::Module(Box::new(e))
    }
}

/// Compiles a verified program to native code.
pub fn compile_program(program: &Program, opt_level: OptLevel) -> Result<JitFn, CodegenError> {
    let mut module = make_jit_module(opt_level)?;
    let ptr_type = module.target_config().pointer_type();

    let mut sig = module.make_signature();
    sig.params.push(AbiParam::new(ptr_type));
    sig.params.push(AbiParam::new(ptr_type));
    sig.params.push(AbiParam::new(ptr_type));
    sig.returns.push(AbiParam::new(I64));

    let func_id = module.declare_function("unit_compute", Linkage::Local, &sig)?;
    let mut func = Function::with_name_signature(UserFuncName::user(0, 0), sig);
    let mut func_ctx = FunctionBuilderContext::new();

    {
        let mut builder = FunctionBuilder::new(&mut func, &mut func_ctx);
        let entry = builder.create_block();
        builder.append_block_params_for_function_params(entry);
        builder.switch_to_block(entry);
        builder.seal_block(entry);

        let params = builder.block_params(entry).to_vec();
        let (slots_ptr, nulls_ptr, out_ptr) = (params[0], params[1], params[2]);

        let mut emitter = Emitter {
            builder: &mut builder,
            slots_ptr,
            nulls_ptr,
            columns: &program.columns,
            locals: Vec::with_capacity(program.locals.len()),
        };
        let zero = emitter.iconst(0);
        let mut err = zero;
        for local in &program.locals {
            let emitted = emitter.emit(local);
            err = emitter.first_error(err, emitted.err);
            emitter.locals.push(emitted);
        }
        let body = emitter.emit(&program.body);
        let err = emitter.first_error(err, body.err);

        let one = emitter.iconst(1);
        let ok_status = emitter.builder.ins().bxor(body.null, one);
        let status = emitter.builder.ins().select(err, err, ok_status);
        emitter
            .builder
            .ins()
            .store(MemFlags::trusted(), body.value, out_ptr, 0);
        builder.ins().return_(&[status]);
        builder.finalize();
    }

    let mut ctx = Context::for_function(func);
    module.define_function(func_id, &mut ctx)?;
    module.clear_context(&mut ctx);
    module.finalize_definitions()?;

    let ptr = module.get_finalized_function(func_id);
    Ok(JitFn {
        _module: module,
        ptr,
        slots: program.columns.len(),
    })
}

fn make_jit_module(opt_level: OptLevel) -> Result<JITModule, CodegenError> {
    let mut flag_builder = settings::builder();
    flag_builder.set("use_colocated_libcalls", "false")?;
    flag_builder.set("is_pic", "false")?;
    flag_builder.set("opt_level", opt_level.as_cranelift_setting())?;
    let isa_builder = cranelift_native::builder().map_err(|e| CodegenError::Isa(e.to_string()))?;
    let isa = isa_builder
        .finish(settings::Flags::new(flag_builder))
        .map_err(|e| CodegenError::Isa(e.to_string()))?;
    let builder = JITBuilder::with_isa(isa, cranelift_module::default_libcall_names());
    Ok(JITModule::new(builder))
}

/// Value, null flag (i64 0/1) and error status (i64, 0 for none) of one
/// expression.
#[derive(Debug, Clone, Copy)]
struct Emitted {
    value: Value,
    null: Value,
    err: Value,
    ty: ValueType,
}

struct Emitter<'a, 'f> {
    builder: &'a mut FunctionBuilder<'f>,
    slots_ptr: Value,
    nulls_ptr: Value,
    columns: &'a [ColumnSlot],
    locals: Vec<Emitted>,
}

impl Emitter<'_, '_> {
    fn iconst(&mut self, v: i64) -> Value {
        self.builder.ins().iconst(I64, v)
    }

    fn zero_of(&mut self, ty: ValueType) -> Value {
        match ty {
            ValueType::Float => self.builder.ins().f64const(0.0),
            ValueType::Int | ValueType::Bool => self.iconst(0),
        }
    }

    fn not(&mut self, flag: Value) -> Value {
        let one = self.iconst(1);
        self.builder.ins().bxor(flag, one)
    }

    /// `a` if it is an error, otherwise `b`.
    fn first_error(&mut self, a: Value, b: Value) -> Value {
        self.builder.ins().select(a, a, b)
    }

    fn constant(&mut self, value: Value, ty: ValueType) -> Emitted {
        let zero = self.iconst(0);
        Emitted {
            value,
            null: zero,
            err: zero,
            ty,
        }
    }

    /// Combines two operands of a strict (null-propagating) operation.
    fn strict(&mut self, l: Emitted, r: Emitted, value: Value, ty: ValueType) -> Emitted {
        let null = self.builder.ins().bor(l.null, r.null);
        let err = self.first_error(l.err, r.err);
        Emitted {
            value,
            null,
            err,
            ty,
        }
    }

    fn emit(&mut self, expr: &Expr) -> Emitted {
        match expr {
            Expr::Literal(Literal::Int(n)) => {
                let v = self.iconst(*n);
                self.constant(v, ValueType::Int)
            }
            Expr::Literal(Literal::Float(x)) => {
                let v = self.builder.ins().f64const(*x);
                self.constant(v, ValueType::Float)
            }
            Expr::Literal(Literal::Bool(b)) => {
                let v = self.iconst(*b as i64);
                self.constant(v, ValueType::Bool)
            }
            Expr::Literal(Literal::Null(ty)) => {
                let value = self.zero_of(*ty);
                let null = self.iconst(1);
                let err = self.iconst(0);
                Emitted {
                    value,
                    null,
                    err,
                    ty: *ty,
                }
            }

            Expr::Column(slot) => {
                let ty = self.columns[*slot].accessor.value_type();
                let offset = (*slot as i32) * 8;
                let flags = MemFlags::trusted();
                let value = match ty {
                    ValueType::Float => self.builder.ins().load(F64, flags, self.slots_ptr, offset),
                    ValueType::Int | ValueType::Bool => {
                        self.builder.ins().load(I64, flags, self.slots_ptr, offset)
                    }
                };
                let byte = self
                    .builder
                    .ins()
                    .load(I8, flags, self.nulls_ptr, *slot as i32);
                let raw = self.builder.ins().uextend(I64, byte);
                let null = self.builder.ins().icmp_imm(IntCC::NotEqual, raw, 0);
                let null = self.builder.ins().uextend(I64, null);
                let err = self.iconst(0);
                Emitted {
                    value,
                    null,
                    err,
                    ty,
                }
            }
            Expr::Local(idx) => self.locals[*idx],

            Expr::Add(l, r) => self.arith(l, r, |b, x, y| b.ins().iadd(x, y), |b, x, y| b.ins().fadd(x, y)),
            Expr::Sub(l, r) => self.arith(l, r, |b, x, y| b.ins().isub(x, y), |b, x, y| b.ins().fsub(x, y)),
            Expr::Mul(l, r) => self.arith(l, r, |b, x, y| b.ins().imul(x, y), |b, x, y| b.ins().fmul(x, y)),
            Expr::Div(l, r) => self.division(l, r, false),
            Expr::Rem(l, r) => self.division(l, r, true),
            Expr::Neg(inner) => {
                let a = self.emit(inner);
                let value = match a.ty {
                    ValueType::Float => self.builder.ins().fneg(a.value),
                    _ => self.builder.ins().ineg(a.value),
                };
                Emitted { value, ..a }
            }
            Expr::Abs(inner) => {
                let a = self.emit(inner);
                let value = match a.ty {
                    ValueType::Float => self.builder.ins().fabs(a.value),
                    _ => {
                        let neg = self.builder.ins().ineg(a.value);
                        let is_neg = self.builder.ins().icmp_imm(IntCC::SignedLessThan, a.value, 0);
                        self.builder.ins().select(is_neg, neg, a.value)
                    }
                };
                Emitted { value, ..a }
            }
            Expr::Min(l, r) => self.select_op(l, r, IntCC::SignedLessThan, FloatCC::LessThan),
            Expr::Max(l, r) => self.select_op(l, r, IntCC::SignedGreaterThan, FloatCC::GreaterThan),

            Expr::Eq(l, r) => self.compare(l, r, IntCC::Equal, FloatCC::Equal),
            Expr::Ne(l, r) => self.compare(l, r, IntCC::NotEqual, FloatCC::NotEqual),
            Expr::Lt(l, r) => self.compare(l, r, IntCC::SignedLessThan, FloatCC::LessThan),
            Expr::Le(l, r) => {
                self.compare(l, r, IntCC::SignedLessThanOrEqual, FloatCC::LessThanOrEqual)
            }
            Expr::Gt(l, r) => self.compare(l, r, IntCC::SignedGreaterThan, FloatCC::GreaterThan),
            Expr::Ge(l, r) => self.compare(
                l,
                r,
                IntCC::SignedGreaterThanOrEqual,
                FloatCC::GreaterThanOrEqual,
            ),

            Expr::And(l, r) => self.logic(l, r, true),
            Expr::Or(l, r) => self.logic(l, r, false),
            Expr::Not(inner) => {
                let a = self.emit(inner);
                let value = self.not(a.value);
                Emitted { value, ..a }
            }

            Expr::Cast(cast, inner) => {
                let a = self.emit(inner);
                let ins = self.builder.ins();
                let (value, ty) = match cast {
                    Cast::IntToFloat => (ins.fcvt_from_sint(F64, a.value), ValueType::Float),
                    Cast::IntToFloat32 => {
                        let single = ins.fcvt_from_sint(F32, a.value);
                        (self.builder.ins().fpromote(F64, single), ValueType::Float)
                    }
                    Cast::FloatToInt => (ins.fcvt_to_sint_sat(I64, a.value), ValueType::Int),
                    Cast::FloatToInt32 => {
                        let narrow = ins.fcvt_to_sint_sat(I32, a.value);
                        (self.builder.ins().sextend(I64, narrow), ValueType::Int)
                    }
                    Cast::WrapI32 => {
                        let narrow = ins.ireduce(I32, a.value);
                        (self.builder.ins().sextend(I64, narrow), ValueType::Int)
                    }
                    Cast::RoundF32 => {
                        let single = ins.fdemote(F32, a.value);
                        (self.builder.ins().fpromote(F64, single), ValueType::Float)
                    }
                };
                Emitted { value, ty, ..a }
            }
            Expr::IsNull(inner) => {
                let a = self.emit(inner);
                let null = self.iconst(0);
                Emitted {
                    value: a.null,
                    null,
                    err: a.err,
                    ty: ValueType::Bool,
                }
            }
            Expr::Coalesce(l, r) => {
                let a = self.emit(l);
                let b = self.emit(r);
                let value = self.builder.ins().select(a.null, b.value, a.value);
                let null = self.builder.ins().band(a.null, b.null);
                let zero = self.iconst(0);
                let b_err = self.builder.ins().select(a.null, b.err, zero);
                let err = self.first_error(a.err, b_err);
                Emitted {
                    value,
                    null,
                    err,
                    ty: a.ty,
                }
            }
            Expr::If {
                cond,
                then_expr,
                else_expr,
            } => {
                let c = self.emit(cond);
                let t = self.emit(then_expr);
                let e = self.emit(else_expr);
                let present = self.not(c.null);
                let taken = self.builder.ins().band(c.value, present);
                let value = self.builder.ins().select(taken, t.value, e.value);
                let null = self.builder.ins().select(taken, t.null, e.null);
                let branch_err = self.builder.ins().select(taken, t.err, e.err);
                let err = self.first_error(c.err, branch_err);
                Emitted {
                    value,
                    null,
                    err,
                    ty: t.ty,
                }
            }
            Expr::Fail { code, ty } => {
                let value = self.zero_of(*ty);
                let null = self.iconst(1);
                let err = self.iconst(STATUS_FAIL_BASE + i64::from(*code));
                Emitted {
                    value,
                    null,
                    err,
                    ty: *ty,
                }
            }
        }
    }

    fn arith(
        &mut self,
        left: &Expr,
        right: &Expr,
        int_op: impl FnOnce(&mut FunctionBuilder, Value, Value) -> Value,
        float_op: impl FnOnce(&mut FunctionBuilder, Value, Value) -> Value,
    ) -> Emitted {
        let l = self.emit(left);
        let r = self.emit(right);
        let value = match l.ty {
            ValueType::Float => float_op(self.builder, l.value, r.value),
            _ => int_op(self.builder, l.value, r.value),
        };
        self.strict(l, r, value, l.ty)
    }

    fn division(&mut self, left: &Expr, right: &Expr, remainder: bool) -> Emitted {
        let l = self.emit(left);
        let r = self.emit(right);
        if l.ty == ValueType::Float {
            let value = self.builder.ins().fdiv(l.value, r.value);
            return self.strict(l, r, value, ValueType::Float);
        }

        let ins = self.builder.ins();
        let zero_div = ins.icmp_imm(IntCC::Equal, r.value, 0);
        let min_lhs = self.builder.ins().icmp_imm(IntCC::Equal, l.value, i64::MIN);
        let neg_one = self.builder.ins().icmp_imm(IntCC::Equal, r.value, -1);
        let overflow = self.builder.ins().band(min_lhs, neg_one);
        let unsafe_divisor = self.builder.ins().bor(zero_div, overflow);
        let one = self.iconst(1);
        let divisor = self.builder.ins().select(unsafe_divisor, one, r.value);
        let value = if remainder {
            self.builder.ins().srem(l.value, divisor)
        } else {
            self.builder.ins().sdiv(l.value, divisor)
        };

        let mut out = self.strict(l, r, value, ValueType::Int);
        let zero_div = self.builder.ins().uextend(I64, zero_div);
        let present = self.not(out.null);
        let raise = self.builder.ins().band(zero_div, present);
        let status = self.iconst(STATUS_DIVIDE_BY_ZERO);
        let zero = self.iconst(0);
        let div_err = self.builder.ins().select(raise, status, zero);
        out.err = self.first_error(out.err, div_err);
        out
    }

    fn compare(&mut self, left: &Expr, right: &Expr, icc: IntCC, fcc: FloatCC) -> Emitted {
        let l = self.emit(left);
        let r = self.emit(right);
        let cmp = match l.ty {
            ValueType::Float => self.builder.ins().fcmp(fcc, l.value, r.value),
            _ => self.builder.ins().icmp(icc, l.value, r.value),
        };
        let value = self.builder.ins().uextend(I64, cmp);
        self.strict(l, r, value, ValueType::Bool)
    }

    fn select_op(&mut self, left: &Expr, right: &Expr, icc: IntCC, fcc: FloatCC) -> Emitted {
        let l = self.emit(left);
        let r = self.emit(right);
        let cmp = match l.ty {
            ValueType::Float => self.builder.ins().fcmp(fcc, l.value, r.value),
            _ => self.builder.ins().icmp(icc, l.value, r.value),
        };
        let value = self.builder.ins().select(cmp, l.value, r.value);
        self.strict(l, r, value, l.ty)
    }

    /// Three-valued `&&` (`conjunction`) or `||`. The right operand's error
    /// is ignored when the left operand alone decides the result.
    fn logic(&mut self, left: &Expr, right: &Expr, conjunction: bool) -> Emitted {
        let l = self.emit(left);
        let r = self.emit(right);

        // A "decisive" operand is a present false for `&&`, a present true for `||`.
        let l_present = self.not(l.null);
        let r_present = self.not(r.null);
        let (l_decides, r_decides) = if conjunction {
            let l_false = self.not(l.value);
            let r_false = self.not(r.value);
            (
                self.builder.ins().band(l_false, l_present),
                self.builder.ins().band(r_false, r_present),
            )
        } else {
            (
                self.builder.ins().band(l.value, l_present),
                self.builder.ins().band(r.value, r_present),
            )
        };
        let decided = self.builder.ins().bor(l_decides, r_decides);
        let undecided = self.not(decided);
        let any_null = self.builder.ins().bor(l.null, r.null);
        let null = self.builder.ins().band(undecided, any_null);
        let value = if conjunction { undecided } else { decided };

        let zero = self.iconst(0);
        let r_err = self.builder.ins().select(l_decides, zero, r.err);
        let err = self.first_error(l.err, r_err);
        Emitted {
            value,
            null,
            err,
            ty: ValueType::Bool,
        }
    }
}
