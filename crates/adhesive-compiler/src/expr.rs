//! Typed expression trees for compiled units.
//!
//! Every tree stored in an artifact is well typed: operands of a binary node
//! share one [`ValueType`], mixed arithmetic has already been rewritten with
//! explicit [`Cast`]s, and literal nulls carry the type they stand in for.
//! [`Program::verify`] re-establishes these facts for bytes read back from
//! the artifact store, so both backends may rely on them.

use arrow::datatypes::DataType;
use serde::{Deserialize, Serialize};

use adhesive_core::ScalarType;

/// Row completed with an absent result.
pub const STATUS_NULL: i64 = 0;
/// Row completed with a present result.
pub const STATUS_VALUE: i64 = 1;
/// Integer division or remainder by zero.
pub const STATUS_DIVIDE_BY_ZERO: i64 = 2;
/// `fail(message)` raised; the message index is added to this base.
pub const STATUS_FAIL_BASE: i64 = 3;

/// Maximum tree depth accepted by [`Program::verify`].
pub const MAX_TREE_DEPTH: usize = 320;

/// Runtime value kinds. Booleans are carried as 0/1 integers by the JIT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Int,
    Float,
    Bool,
}

impl ValueType {
    /// Name used in diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            ValueType::Int => "i64",
            ValueType::Float => "f64",
            ValueType::Bool => "bool",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Int | ValueType::Float)
    }
}

/// How a unit reads one input column (`row.i64(0)` and friends).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Accessor {
    I32,
    I64,
    F32,
    F64,
    Bool,
}

impl Accessor {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "i32" => Some(Accessor::I32),
            "i64" => Some(Accessor::I64),
            "f32" => Some(Accessor::F32),
            "f64" => Some(Accessor::F64),
            "bool" => Some(Accessor::Bool),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Accessor::I32 => "i32",
            Accessor::I64 => "i64",
            Accessor::F32 => "f32",
            Accessor::F64 => "f64",
            Accessor::Bool => "bool",
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Accessor::I32 | Accessor::I64 => ValueType::Int,
            Accessor::F32 | Accessor::F64 => ValueType::Float,
            Accessor::Bool => ValueType::Bool,
        }
    }

    /// The Arrow type an input column must have to be read this way.
    pub fn data_type(&self) -> DataType {
        match self {
            Accessor::I32 => DataType::Int32,
            Accessor::I64 => DataType::Int64,
            Accessor::F32 => DataType::Float32,
            Accessor::F64 => DataType::Float64,
            Accessor::Bool => DataType::Boolean,
        }
    }
}

/// One input column a program reads. Programs address columns by slot
/// index, the position of the slot in [`Program::columns`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSlot {
    pub column: usize,
    pub accessor: Accessor,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
    Null(ValueType),
}

impl Literal {
    pub fn value_type(&self) -> ValueType {
        match self {
            Literal::Int(_) => ValueType::Int,
            Literal::Float(_) => ValueType::Float,
            Literal::Bool(_) => ValueType::Bool,
            Literal::Null(ty) => *ty,
        }
    }
}

/// Explicit numeric conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cast {
    /// Int to Float, rounding to nearest.
    IntToFloat,
    /// Int to the nearest single precision value.
    IntToFloat32,
    /// Float to Int, saturating; NaN becomes 0.
    FloatToInt,
    /// Float to Int saturating at the 32-bit bounds; NaN becomes 0.
    FloatToInt32,
    /// Int truncated to 32 bits and sign-extended back.
    WrapI32,
    /// Float rounded through single precision.
    RoundF32,
}

impl Cast {
    /// `(operand type, result type)`.
    pub fn signature(&self) -> (ValueType, ValueType) {
        match self {
            Cast::IntToFloat | Cast::IntToFloat32 => (ValueType::Int, ValueType::Float),
            Cast::FloatToInt | Cast::FloatToInt32 => (ValueType::Float, ValueType::Int),
            Cast::WrapI32 => (ValueType::Int, ValueType::Int),
            Cast::RoundF32 => (ValueType::Float, ValueType::Float),
        }
    }
}

/// An expression tree node of a compiled unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Literal(Literal),
    /// Value of an input column slot.
    Column(usize),
    /// Value of an earlier `let` binding.
    Local(usize),

    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Rem(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Abs(Box<Expr>),
    Min(Box<Expr>, Box<Expr>),
    Max(Box<Expr>, Box<Expr>),

    Eq(Box<Expr>, Box<Expr>),
    Ne(Box<Expr>, Box<Expr>),
    Lt(Box<Expr>, Box<Expr>),
    Le(Box<Expr>, Box<Expr>),
    Gt(Box<Expr>, Box<Expr>),
    Ge(Box<Expr>, Box<Expr>),

    /// Three-valued conjunction.
    And(Box<Expr>, Box<Expr>),
    /// Three-valued disjunction.
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),

    Cast(Cast, Box<Expr>),
    IsNull(Box<Expr>),
    Coalesce(Box<Expr>, Box<Expr>),

    If {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },

    /// Raises the failure message at index `code`. Typed so that it can
    /// stand wherever a value of `ty` is expected.
    Fail {
        code: u32,
        ty: ValueType,
    },
}

impl Expr {
    pub fn int(value: i64) -> Self {
        Expr::Literal(Literal::Int(value))
    }

    pub fn float(value: f64) -> Self {
        Expr::Literal(Literal::Float(value))
    }

    pub fn bool(value: bool) -> Self {
        Expr::Literal(Literal::Bool(value))
    }

    pub fn null(ty: ValueType) -> Self {
        Expr::Literal(Literal::Null(ty))
    }

    pub fn column(slot: usize) -> Self {
        Expr::Column(slot)
    }

    pub fn local(idx: usize) -> Self {
        Expr::Local(idx)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn add(left: Expr, right: Expr) -> Self {
        Expr::Add(Box::new(left), Box::new(right))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn sub(left: Expr, right: Expr) -> Self {
        Expr::Sub(Box::new(left), Box::new(right))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn mul(left: Expr, right: Expr) -> Self {
        Expr::Mul(Box::new(left), Box::new(right))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn div(left: Expr, right: Expr) -> Self {
        Expr::Div(Box::new(left), Box::new(right))
    }

    pub fn rem(left: Expr, right: Expr) -> Self {
        Expr::Rem(Box::new(left), Box::new(right))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn neg(expr: Expr) -> Self {
        Expr::Neg(Box::new(expr))
    }

    pub fn abs(expr: Expr) -> Self {
        Expr::Abs(Box::new(expr))
    }

    pub fn min(left: Expr, right: Expr) -> Self {
        Expr::Min(Box::new(left), Box::new(right))
    }

    pub fn max(left: Expr, right: Expr) -> Self {
        Expr::Max(Box::new(left), Box::new(right))
    }

    pub fn eq(left: Expr, right: Expr) -> Self {
        Expr::Eq(Box::new(left), Box::new(right))
    }

    pub fn ne(left: Expr, right: Expr) -> Self {
        Expr::Ne(Box::new(left), Box::new(right))
    }

    pub fn lt(left: Expr, right: Expr) -> Self {
        Expr::Lt(Box::new(left), Box::new(right))
    }

    pub fn le(left: Expr, right: Expr) -> Self {
        Expr::Le(Box::new(left), Box::new(right))
    }

    pub fn gt(left: Expr, right: Expr) -> Self {
        Expr::Gt(Box::new(left), Box::new(right))
    }

    pub fn ge(left: Expr, right: Expr) -> Self {
        Expr::Ge(Box::new(left), Box::new(right))
    }

    pub fn and(left: Expr, right: Expr) -> Self {
        Expr::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Expr, right: Expr) -> Self {
        Expr::Or(Box::new(left), Box::new(right))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(expr: Expr) -> Self {
        Expr::Not(Box::new(expr))
    }

    pub fn cast(cast: Cast, expr: Expr) -> Self {
        Expr::Cast(cast, Box::new(expr))
    }

    pub fn is_null(expr: Expr) -> Self {
        Expr::IsNull(Box::new(expr))
    }

    pub fn coalesce(left: Expr, right: Expr) -> Self {
        Expr::Coalesce(Box::new(left), Box::new(right))
    }

    pub fn if_then_else(cond: Expr, then_expr: Expr, else_expr: Expr) -> Self {
        Expr::If {
            cond: Box::new(cond),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
        }
    }

    pub fn fail(code: u32, ty: ValueType) -> Self {
        Expr::Fail { code, ty }
    }
}

/// A checked unit: the content of one compiled artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// Fully qualified unit name.
    pub name: String,
    /// Declared result type.
    pub result: ScalarType,
    /// Input column slots, in first-use order.
    pub columns: Vec<ColumnSlot>,
    /// `fail` messages indexed by code.
    pub messages: Vec<String>,
    /// `let` bindings, evaluated in order; each may read earlier ones.
    pub locals: Vec<Expr>,
    pub body: Expr,
}

impl Program {
    /// Value type the body must have for the declared result.
    pub fn body_type(&self) -> ValueType {
        if self.result.is_integer() {
            ValueType::Int
        } else {
            ValueType::Float
        }
    }

    /// Type-checks the whole program.
    ///
    /// Returns a description of the first problem found.
    pub fn verify(&self) -> Result<(), String> {
        let mut local_types = Vec::with_capacity(self.locals.len());
        for (idx, local) in self.locals.iter().enumerate() {
            let ty = self
                .infer(local, &local_types, 0)
                .map_err(|e| format!("local {idx}: {e}"))?;
            local_types.push(ty);
        }
        let body = self
            .infer(&self.body, &local_types, 0)
            .map_err(|e| format!("body: {e}"))?;
        if body != self.body_type() {
            return Err(format!(
                "body has type {} but result is declared {}",
                body.describe(),
                self.result
            ));
        }
        Ok(())
    }

    fn infer(&self, expr: &Expr, locals: &[ValueType], depth: usize) -> Result<ValueType, String> {
        if depth > MAX_TREE_DEPTH {
            return Err("expression nesting too deep".to_string());
        }
        let infer = |e: &Expr| self.infer(e, locals, depth + 1);
        let same = |l: &Expr, r: &Expr| -> Result<ValueType, String> {
            let lt = infer(l)?;
            let rt = infer(r)?;
            if lt != rt {
                return Err(format!(
                    "operand types differ: {} and {}",
                    lt.describe(),
                    rt.describe()
                ));
            }
            Ok(lt)
        };
        let numeric = |ty: ValueType| -> Result<ValueType, String> {
            if ty.is_numeric() {
                Ok(ty)
            } else {
                Err(format!("expected a numeric operand, found {}", ty.describe()))
            }
        };

        match expr {
            Expr::Literal(lit) => Ok(lit.value_type()),
            Expr::Column(slot) => self
                .columns
                .get(*slot)
                .map(|s| s.accessor.value_type())
                .ok_or_else(|| format!("column slot {slot} out of range")),
            Expr::Local(idx) => locals
                .get(*idx)
                .copied()
                .ok_or_else(|| format!("local {idx} used before definition")),

            Expr::Add(l, r)
            | Expr::Sub(l, r)
            | Expr::Mul(l, r)
            | Expr::Div(l, r)
            | Expr::Min(l, r)
            | Expr::Max(l, r) => numeric(same(l, r)?),
            Expr::Rem(l, r) => match same(l, r)? {
                ValueType::Int => Ok(ValueType::Int),
                other => Err(format!("remainder of {} operands", other.describe())),
            },
            Expr::Neg(inner) | Expr::Abs(inner) => numeric(infer(inner)?),

            Expr::Eq(l, r) | Expr::Ne(l, r) => {
                same(l, r)?;
                Ok(ValueType::Bool)
            }
            Expr::Lt(l, r) | Expr::Le(l, r) | Expr::Gt(l, r) | Expr::Ge(l, r) => {
                numeric(same(l, r)?)?;
                Ok(ValueType::Bool)
            }

            Expr::And(l, r) | Expr::Or(l, r) => match same(l, r)? {
                ValueType::Bool => Ok(ValueType::Bool),
                other => Err(format!("logical operator on {}", other.describe())),
            },
            Expr::Not(inner) => match infer(inner)? {
                ValueType::Bool => Ok(ValueType::Bool),
                other => Err(format!("negation of {}", other.describe())),
            },

            Expr::Cast(cast, inner) => {
                let (from, to) = cast.signature();
                let ty = infer(inner)?;
                if ty != from {
                    return Err(format!("{cast:?} applied to {}", ty.describe()));
                }
                Ok(to)
            }
            Expr::IsNull(inner) => {
                infer(inner)?;
                Ok(ValueType::Bool)
            }
            Expr::Coalesce(l, r) => same(l, r),
            Expr::If {
                cond,
                then_expr,
                else_expr,
            } => {
                if infer(cond)? != ValueType::Bool {
                    return Err("`if` condition is not bool".to_string());
                }
                same(then_expr, else_expr)
            }
            Expr::Fail { code, ty } => {
                if (*code as usize) < self.messages.len() {
                    Ok(*ty)
                } else {
                    Err(format!("failure code {code} has no message"))
                }
            }
        }
    }
}
