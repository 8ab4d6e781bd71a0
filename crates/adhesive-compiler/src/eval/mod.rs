//! Tree-walking evaluation of unit programs.
//!
//! Produces the same statuses and results as the JIT backend for every
//! input, and reads the same slot/null buffers.


use crate::expr::{
    Cast, ColumnSlot, Expr, Literal, Program, ValueType, STATUS_DIVIDE_BY_ZERO, STATUS_FAIL_BASE,
    STATUS_NULL, STATUS_VALUE,
};

/// A runtime value. `Null` is the absent value of any type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RowValue {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl RowValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RowValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RowValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RowValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RowValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Bit pattern written to the output slot.
    fn to_bits(self) -> i64 {
        match self {
            RowValue::Null => 0,
            RowValue::Int(v) => v,
            RowValue::Float(v) => v.to_bits() as i64,
            RowValue::Bool(v) => v as i64,
        }
    }
}

/// A runtime error raised while evaluating a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    DivideByZero,
    /// `fail` with the message at this index.
    Fail(u32),
}

impl Fault {
    pub fn status(&self) -> i64 {
        match self {
            Fault::DivideByZero => STATUS_DIVIDE_BY_ZERO,
            Fault::Fail(code) => STATUS_FAIL_BASE + i64::from(*code),
        }
    }
}

/// Inputs of one row plus the `let` values computed so far.
pub struct EvalContext<'a> {
    columns: &'a [ColumnSlot],
    slots: &'a [i64],
    nulls: &'a [u8],
    locals: Vec<RowValue>,
}

impl<'a> EvalContext<'a> {
    pub fn new(columns: &'a [ColumnSlot], slots: &'a [i64], nulls: &'a [u8]) -> Self {
        Self {
            columns,
            slots,
            nulls,
            locals: Vec::new(),
        }
    }

    fn column(&self, slot: usize) -> RowValue {
        if self.nulls[slot] != 0 {
            return RowValue::Null;
        }
        let raw = self.slots[slot];
        match self.columns[slot].accessor.value_type() {
            ValueType::Int => RowValue::Int(raw),
            ValueType::Float => RowValue::Float(f64::from_bits(raw as u64)),
            ValueType::Bool => RowValue::Bool(raw != 0),
        }
    }
}

/// Runs a program on one row, returning `(status, result bits)`.
pub fn eval_program(program: &Program, slots: &[i64], nulls: &[u8]) -> (i64, i64) {
    let mut ctx = EvalContext::new(&program.columns, slots, nulls);
    let result = program
        .locals
        .iter()
        .try_for_each(|local| {
            let value = eval_expr(local, &ctx)?;
            ctx.locals.push(value);
            Ok(())
        })
        .and_then(|()| eval_expr(&program.body, &ctx));

    match result {
        Ok(RowValue::Null) => (STATUS_NULL, 0),
        Ok(value) => (STATUS_VALUE, value.to_bits()),
        Err(fault) => (fault.status(), 0),
    }
}

/// Evaluates an expression in the given context.
pub fn eval_expr(expr: &Expr, ctx: &EvalContext) -> Result<RowValue, Fault> {
    use RowValue::{Bool, Float, Int, Null};

    let value = match expr {
        Expr::Literal(Literal::Int(v)) => Int(*v),
        Expr::Literal(Literal::Float(v)) => Float(*v),
        Expr::Literal(Literal::Bool(v)) => Bool(*v),
        Expr::Literal(Literal::Null(_)) => Null,
        Expr::Column(slot) => ctx.column(*slot),
        Expr::Local(idx) => ctx.locals[*idx],

        Expr::Add(l, r) => arith(l, r, ctx, i64::wrapping_add, |a, b| a + b)?,
        Expr::Sub(l, r) => arith(l, r, ctx, i64::wrapping_sub, |a, b| a - b)?,
        Expr::Mul(l, r) => arith(l, r, ctx, i64::wrapping_mul, |a, b| a * b)?,
        Expr::Div(l, r) => match (eval_expr(l, ctx)?, eval_expr(r, ctx)?) {
            (Int(_), Int(0)) => return Err(Fault::DivideByZero),
            (Int(a), Int(b)) => Int(a.wrapping_div(b)),
            (Float(a), Float(b)) => Float(a / b),
            _ => Null,
        },
        Expr::Rem(l, r) => match (eval_expr(l, ctx)?, eval_expr(r, ctx)?) {
            (Int(_), Int(0)) => return Err(Fault::DivideByZero),
            (Int(a), Int(b)) => Int(a.wrapping_rem(b)),
            _ => Null,
        },
        Expr::Neg(inner) => match eval_expr(inner, ctx)? {
            Int(v) => Int(v.wrapping_neg()),
            Float(v) => Float(-v),
            _ => Null,
        },
        Expr::Abs(inner) => match eval_expr(inner, ctx)? {
            Int(v) => Int(v.wrapping_abs()),
            Float(v) => Float(v.abs()),
            _ => Null,
        },
        Expr::Min(l, r) => match (eval_expr(l, ctx)?, eval_expr(r, ctx)?) {
            (Int(a), Int(b)) => Int(if a < b { a } else { b }),
            (Float(a), Float(b)) => Float(if a < b { a } else { b }),
            _ => Null,
        },
        Expr::Max(l, r) => match (eval_expr(l, ctx)?, eval_expr(r, ctx)?) {
            (Int(a), Int(b)) => Int(if a > b { a } else { b }),
            (Float(a), Float(b)) => Float(if a > b { a } else { b }),
            _ => Null,
        },

        Expr::Eq(l, r) => compare(l, r, ctx, |o| o == Some(std::cmp::Ordering::Equal))?,
        Expr::Ne(l, r) => compare(l, r, ctx, |o| o != Some(std::cmp::Ordering::Equal))?,
        Expr::Lt(l, r) => compare(l, r, ctx, |o| o == Some(std::cmp::Ordering::Less))?,
        Expr::Le(l, r) => compare(l, r, ctx, |o| {
            matches!(o, Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal))
        })?,
        Expr::Gt(l, r) => compare(l, r, ctx, |o| o == Some(std::cmp::Ordering::Greater))?,
        Expr::Ge(l, r) => compare(l, r, ctx, |o| {
            matches!(o, Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal))
        })?,

        Expr::And(l, r) => match eval_expr(l, ctx)? {
            Bool(false) => Bool(false),
            left => match (left, eval_expr(r, ctx)?) {
                (_, Bool(false)) => Bool(false),
                (Bool(true), Bool(true)) => Bool(true),
                _ => Null,
            },
        },
        Expr::Or(l, r) => match eval_expr(l, ctx)? {
            Bool(true) => Bool(true),
            left => match (left, eval_expr(r, ctx)?) {
                (_, Bool(true)) => Bool(true),
                (Bool(false), Bool(false)) => Bool(false),
                _ => Null,
            },
        },
        Expr::Not(inner) => match eval_expr(inner, ctx)? {
            Bool(v) => Bool(!v),
            _ => Null,
        },

        Expr::Cast(cast, inner) => match (cast, eval_expr(inner, ctx)?) {
            (_, Null) => Null,
            (Cast::IntToFloat, Int(v)) => Float(v as f64),
            (Cast::IntToFloat32, Int(v)) => Float(v as f32 as f64),
            (Cast::FloatToInt, Float(v)) => Int(v as i64),
            (Cast::FloatToInt32, Float(v)) => Int(v as i32 as i64),
            (Cast::WrapI32, Int(v)) => Int(v as i32 as i64),
            (Cast::RoundF32, Float(v)) => Float(v as f32 as f64),
            _ => Null,
        },
        Expr::IsNull(inner) => Bool(eval_expr(inner, ctx)?.is_null()),
        Expr::Coalesce(l, r) => match eval_expr(l, ctx)? {
            Null => eval_expr(r, ctx)?,
            value => value,
        },
        Expr::If {
            cond,
            then_expr,
            else_expr,
        } => match eval_expr(cond, ctx)? {
            Bool(true) => eval_expr(then_expr, ctx)?,
            _ => eval_expr(else_expr, ctx)?,
        },
        Expr::Fail { code, .. } => return Err(Fault::Fail(*code)),
    };
    Ok(value)
}

fn arith(
    left: &Expr,
    right: &Expr,
    ctx: &EvalContext,
    int_op: fn(i64, i64) -> i64,
    float_op: fn(f64, f64) -> f64,
) -> Result<RowValue, Fault> {
    let value = match (eval_expr(left, ctx)?, eval_expr(right, ctx)?) {
        (RowValue::Int(a), RowValue::Int(b)) => RowValue::Int(int_op(a, b)),
        (RowValue::Float(a), RowValue::Float(b)) => RowValue::Float(float_op(a, b)),
        _ => RowValue::Null,
    };
    Ok(value)
}

/// Comparisons follow IEEE semantics for floats: NaN is unordered, so only
/// `!=` holds.
fn compare(
    left: &Expr,
    right: &Expr,
    ctx: &EvalContext,
    test: fn(Option<std::cmp::Ordering>) -> bool,
) -> Result<RowValue, Fault> {
    let ordering = match (eval_expr(left, ctx)?, eval_expr(right, ctx)?) {
        (RowValue::Int(a), RowValue::Int(b)) => a.partial_cmp(&b),
        (RowValue::Float(a), RowValue::Float(b)) => a.partial_cmp(&b),
        (RowValue::Bool(a), RowValue::Bool(b)) => a.partial_cmp(&b),
        _ => return Ok(RowValue::Null),
    };
    Ok(RowValue::Bool(test(ordering)))
}
