//! Name resolution and type checking.
//!
//! Turns a parsed [`SourceFile`] into a typed [`Program`]. Errors are
//! collected rather than returned early; an operand whose type could not be
//! determined is typed as an error and silences follow-up diagnostics.

use std::collections::HashMap;

use adhesive_core::{Diagnostic, Position, ScalarType};

use super::ast::{BinOp, CastTarget, LetStmt, Node, NodeKind, SourceFile, UnOp, UnitDecl};
use crate::expr::{Accessor, Cast, ColumnSlot, Expr, Program, ValueType};

/// Highest column index a unit may read.
const MAX_COLUMN: i64 = u16::MAX as i64;

#[derive(Debug, Clone, Copy, Default)]
pub struct CheckOptions {
    pub warnings_as_errors: bool,
}

/// Checks `file` as the definition of `requested`.
///
/// The program is returned only when no error diagnostic was produced.
pub fn check(
    file: &SourceFile,
    requested: &str,
    options: &CheckOptions,
) -> (Option<Program>, Vec<Diagnostic>) {
    let mut checker = Checker::default();
    let program = match file.units.as_slice() {
        [] => {
            checker.diagnostics.push(Diagnostic::error(
                format!("source declares no unit; expected `{requested}`"),
                None,
            ));
            None
        }
        [unit, rest @ ..] => {
            if let Some(extra) = rest.first() {
                checker.error(
                    format!(
                        "only one unit may be declared per source, found {}",
                        file.units.len()
                    ),
                    extra.name_pos,
                );
            }
            let declared = qualified_name(file.package.as_deref(), &unit.name);
            if declared != requested {
                checker.error(
                    format!("unit `{requested}` is not declared in this source (found `{declared}`)"),
                    unit.name_pos,
                );
            }
            Some(checker.unit(unit, declared))
        }
    };

    let mut diagnostics = checker.diagnostics;
    if options.warnings_as_errors {
        for diagnostic in &mut diagnostics {
            if diagnostic.severity == adhesive_core::Severity::Warning {
                diagnostic.severity = adhesive_core::Severity::Error;
            }
        }
    }
    if adhesive_core::has_errors(&diagnostics) {
        return (None, diagnostics);
    }
    (program, diagnostics)
}

pub fn qualified_name(package: Option<&[String]>, unit: &str) -> String {
    match package {
        Some(path) if !path.is_empty() => format!("{}.{unit}", path.join(".")),
        _ => unit.to_string(),
    }
}

/// Checker-internal type: value types plus the types of `null` and `fail`,
/// which adapt to whatever their context expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ty {
    Value(ValueType),
    Null,
    Never,
    Error,
}

impl Ty {
    fn describe(&self) -> &'static str {
        match self {
            Ty::Value(ty) => ty.describe(),
            Ty::Null => "null",
            Ty::Never => "!",
            Ty::Error => "{error}",
        }
    }
}

struct Typed {
    expr: Expr,
    ty: Ty,
}

impl Typed {
    fn new(expr: Expr, ty: Ty) -> Self {
        Self { expr, ty }
    }

    fn value(expr: Expr, ty: ValueType) -> Self {
        Self::new(expr, Ty::Value(ty))
    }

    fn error() -> Self {
        Self::new(Expr::null(ValueType::Int), Ty::Error)
    }
}

struct Binding {
    name: String,
    local: usize,
    ty: Ty,
    pos: Position,
    used: bool,
}

#[derive(Default)]
struct Checker {
    diagnostics: Vec<Diagnostic>,
    columns: Vec<ColumnSlot>,
    slots: HashMap<usize, usize>,
    messages: Vec<String>,
    scope: Vec<Binding>,
    locals: Vec<Expr>,
}

impl Checker {
    fn error(&mut self, message: impl Into<String>, pos: Position) {
        self.diagnostics.push(Diagnostic::error(message, Some(pos)));
    }

    fn unit(&mut self, unit: &UnitDecl, name: String) -> Program {
        for stmt in &unit.lets {
            self.let_stmt(stmt);
        }

        let body = self.node(&unit.body);
        let body = self.result(body, unit, &name);

        let unused: Vec<_> = self
            .scope
            .iter()
            .filter(|b| !b.used && !b.name.starts_with('_'))
            .map(|b| Diagnostic::warning(format!("unused variable `{}`", b.name), Some(b.pos)))
            .collect();
        self.diagnostics.extend(unused);

        Program {
            name,
            result: unit.result,
            columns: std::mem::take(&mut self.columns),
            messages: std::mem::take(&mut self.messages),
            locals: std::mem::take(&mut self.locals),
            body,
        }
    }

    fn let_stmt(&mut self, stmt: &LetStmt) {
        let typed = self.node(&stmt.value);
        let (expr, ty) = match typed.ty {
            Ty::Null | Ty::Never => (retype(typed.expr, ValueType::Int), Ty::Value(ValueType::Int)),
            Ty::Error => (Expr::null(ValueType::Int), Ty::Error),
            Ty::Value(_) => (typed.expr, typed.ty),
        };
        let local = self.locals.len();
        self.locals.push(expr);
        self.scope.push(Binding {
            name: stmt.name.clone(),
            local,
            ty,
            pos: stmt.pos,
            used: false,
        });
    }

    fn result(&mut self, body: Typed, unit: &UnitDecl, name: &str) -> Expr {
        let result = unit.result;
        let target = if result.is_integer() {
            ValueType::Int
        } else {
            ValueType::Float
        };
        match body.ty {
            Ty::Value(ValueType::Float) if result.is_integer() => {
                self.error(
                    format!(
                        "unit `{name}` declares result `{result}` but its body has type `f64`; convert it with `as {result}`"
                    ),
                    unit.body.pos,
                );
                Expr::null(target)
            }
            Ty::Value(ValueType::Bool) => {
                self.error(
                    format!("unit `{name}` declares result `{result}` but its body has type `bool`"),
                    unit.body.pos,
                );
                Expr::null(target)
            }
            _ => self.coerce(body, target, unit.body.pos, "unit body"),
        }
    }

    /// Converts `typed` to `target`, widening Int to Float where needed.
    fn coerce(&mut self, typed: Typed, target: ValueType, pos: Position, context: &str) -> Expr {
        match typed.ty {
            Ty::Value(ty) if ty == target => typed.expr,
            Ty::Value(ValueType::Int) if target == ValueType::Float => {
                Expr::cast(Cast::IntToFloat, typed.expr)
            }
            Ty::Null | Ty::Never => retype(typed.expr, target),
            Ty::Error => Expr::null(target),
            Ty::Value(ty) => {
                self.error(
                    format!(
                        "mismatched types in {context}: expected `{}`, found `{}`",
                        target.describe(),
                        ty.describe()
                    ),
                    pos,
                );
                Expr::null(target)
            }
        }
    }

    fn node(&mut self, node: &Node) -> Typed {
        let pos = node.pos;
        match &node.kind {
            NodeKind::Int(v) => Typed::value(Expr::int(*v), ValueType::Int),
            NodeKind::Float(v) => Typed::value(Expr::float(*v), ValueType::Float),
            NodeKind::Bool(v) => Typed::value(Expr::bool(*v), ValueType::Bool),
            NodeKind::Null => Typed::new(Expr::null(ValueType::Int), Ty::Null),
            NodeKind::Str(_) => {
                self.error(
                    "string literals are only allowed as the message of `fail`",
                    pos,
                );
                Typed::error()
            }
            NodeKind::Var(name) => self.var(name, pos),
            NodeKind::Column { accessor, index } => self.column(*accessor, *index, pos),
            NodeKind::Unary(UnOp::Neg, operand) => {
                let typed = self.node(operand);
                self.numeric_unary(typed, "-", pos, Expr::neg)
            }
            NodeKind::Unary(UnOp::Not, operand) => {
                let typed = self.node(operand);
                if typed.ty == Ty::Error {
                    return Typed::error();
                }
                let expr = self.coerce(typed, ValueType::Bool, operand.pos, "operand of `!`");
                Typed::value(Expr::not(expr), ValueType::Bool)
            }
            NodeKind::Binary(op, left, right) => self.binary(*op, left, right, pos),
            NodeKind::Cast(operand, target) => self.cast(operand, *target, pos),
            NodeKind::Call { name, args } => self.call(name, args, pos),
            NodeKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let c = self.node(cond);
                let c = self.coerce(c, ValueType::Bool, cond.pos, "`if` condition");
                let t = self.node(then_branch);
                let e = self.node(else_branch);
                let (t, e, ty) = self.unify(t, e, pos, "`if` branches");
                Typed::new(Expr::if_then_else(c, t, e), ty)
            }
        }
    }

    fn var(&mut self, name: &str, pos: Position) -> Typed {
        match self.scope.iter_mut().rev().find(|b| b.name == name) {
            Some(binding) => {
                binding.used = true;
                match binding.ty {
                    Ty::Error => Typed::error(),
                    ty => Typed::new(Expr::local(binding.local), ty),
                }
            }
            None => {
                self.error(format!("cannot find value `{name}` in this scope"), pos);
                Typed::error()
            }
        }
    }

    fn column(&mut self, accessor: Accessor, index: i64, pos: Position) -> Typed {
        if !(0..=MAX_COLUMN).contains(&index) {
            self.error(format!("column index {index} is too large"), pos);
            return Typed::error();
        }
        let column = index as usize;
        let slot = match self.slots.get(&column) {
            Some(&slot) => {
                let existing = self.columns[slot].accessor;
                if existing != accessor {
                    self.error(
                        format!(
                            "column {column} is read as both `{}` and `{}`",
                            existing.keyword(),
                            accessor.keyword()
                        ),
                        pos,
                    );
                    return Typed::error();
                }
                slot
            }
            None => {
                let slot = self.columns.len();
                self.columns.push(ColumnSlot { column, accessor });
                self.slots.insert(column, slot);
                slot
            }
        };
        Typed::value(Expr::column(slot), accessor.value_type())
    }

    fn numeric_unary(
        &mut self,
        typed: Typed,
        what: &str,
        pos: Position,
        build: fn(Expr) -> Expr,
    ) -> Typed {
        match typed.ty {
            Ty::Error => Typed::error(),
            Ty::Value(ValueType::Bool) => {
                self.error(format!("`{what}` cannot be applied to `bool`"), pos);
                Typed::error()
            }
            Ty::Null | Ty::Never => {
                Typed::value(build(retype(typed.expr, ValueType::Int)), ValueType::Int)
            }
            Ty::Value(ty) => Typed::value(build(typed.expr), ty),
        }
    }

    /// Brings two numeric operands to a common type.
    fn numeric_pair(
        &mut self,
        left: Typed,
        right: Typed,
        what: &str,
        pos: Position,
    ) -> Option<(ValueType, Expr, Expr)> {
        if left.ty == Ty::Error || right.ty == Ty::Error {
            return None;
        }
        if left.ty == Ty::Value(ValueType::Bool) || right.ty == Ty::Value(ValueType::Bool) {
            self.error(format!("`{what}` cannot be applied to `bool`"), pos);
            return None;
        }
        let target = if left.ty == Ty::Value(ValueType::Float)
            || right.ty == Ty::Value(ValueType::Float)
        {
            ValueType::Float
        } else {
            ValueType::Int
        };
        let l = self.coerce(left, target, pos, what);
        let r = self.coerce(right, target, pos, what);
        Some((target, l, r))
    }

    fn binary(&mut self, op: BinOp, left: &Node, right: &Node, pos: Position) -> Typed {
        let l = self.node(left);
        let r = self.node(right);
        let symbol = op.symbol();

        match op {
            BinOp::And | BinOp::Or => {
                if l.ty == Ty::Error || r.ty == Ty::Error {
                    return Typed::error();
                }
                let context = format!("operand of `{symbol}`");
                let l = self.coerce(l, ValueType::Bool, left.pos, &context);
                let r = self.coerce(r, ValueType::Bool, right.pos, &context);
                let expr = if op == BinOp::And {
                    Expr::and(l, r)
                } else {
                    Expr::or(l, r)
                };
                Typed::value(expr, ValueType::Bool)
            }
            BinOp::Eq | BinOp::Ne
                if l.ty == Ty::Value(ValueType::Bool) || r.ty == Ty::Value(ValueType::Bool) =>
            {
                if l.ty == Ty::Error || r.ty == Ty::Error {
                    return Typed::error();
                }
                let context = format!("operands of `{symbol}`");
                let le = self.coerce(l, ValueType::Bool, left.pos, &context);
                let re = self.coerce(r, ValueType::Bool, right.pos, &context);
                let expr = if op == BinOp::Eq {
                    Expr::eq(le, re)
                } else {
                    Expr::ne(le, re)
                };
                Typed::value(expr, ValueType::Bool)
            }
            _ => {
                let Some((ty, l, r)) = self.numeric_pair(l, r, symbol, pos) else {
                    return Typed::error();
                };
                if op.is_comparison() {
                    let expr = match op {
                        BinOp::Eq => Expr::eq(l, r),
                        BinOp::Ne => Expr::ne(l, r),
                        BinOp::Lt => Expr::lt(l, r),
                        BinOp::Le => Expr::le(l, r),
                        BinOp::Gt => Expr::gt(l, r),
                        _ => Expr::ge(l, r),
                    };
                    return Typed::value(expr, ValueType::Bool);
                }
                let expr = match op {
                    BinOp::Add => Expr::add(l, r),
                    BinOp::Sub => Expr::sub(l, r),
                    BinOp::Mul => Expr::mul(l, r),
                    BinOp::Div => Expr::div(l, r),
                    _ if ty == ValueType::Float => {
                        self.error("`%` is not supported for `f64` operands", pos);
                        return Typed::error();
                    }
                    _ => Expr::rem(l, r),
                };
                Typed::value(expr, ty)
            }
        }
    }

    fn cast(&mut self, operand: &Node, target: CastTarget, pos: Position) -> Typed {
        let typed = self.node(operand);
        let target = match target {
            CastTarget::Scalar(ty) => ty,
            CastTarget::Bool => {
                if typed.ty != Ty::Error {
                    self.error(
                        format!("cannot cast `{}` as `bool`", typed.ty.describe()),
                        pos,
                    );
                }
                return Typed::error();
            }
        };
        let value_type = if target.is_integer() {
            ValueType::Int
        } else {
            ValueType::Float
        };

        let expr = match typed.ty {
            Ty::Error => return Typed::error(),
            Ty::Null | Ty::Never => retype(typed.expr, value_type),
            Ty::Value(ValueType::Bool) => {
                self.error(format!("cannot cast `bool` as `{target}`"), pos);
                return Typed::error();
            }
            Ty::Value(ValueType::Int) => match target {
                ScalarType::Int64 => typed.expr,
                ScalarType::Int32 => Expr::cast(Cast::WrapI32, typed.expr),
                ScalarType::Float64 => Expr::cast(Cast::IntToFloat, typed.expr),
                ScalarType::Float32 => Expr::cast(Cast::IntToFloat32, typed.expr),
            },
            Ty::Value(ValueType::Float) => match target {
                ScalarType::Int64 => Expr::cast(Cast::FloatToInt, typed.expr),
                ScalarType::Int32 => Expr::cast(Cast::FloatToInt32, typed.expr),
                ScalarType::Float64 => typed.expr,
                ScalarType::Float32 => Expr::cast(Cast::RoundF32, typed.expr),
            },
        };
        Typed::value(expr, value_type)
    }

    fn call(&mut self, name: &str, args: &[Node], pos: Position) -> Typed {
        let expected = match name {
            "is_null" | "abs" | "fail" => 1,
            "coalesce" | "min" | "max" => 2,
            _ => {
                self.error(format!("unknown function `{name}`"), pos);
                return Typed::error();
            }
        };
        if args.len() != expected {
            let plural = if expected == 1 { "" } else { "s" };
            self.error(
                format!(
                    "`{name}` expects {expected} argument{plural}, found {}",
                    args.len()
                ),
                pos,
            );
            return Typed::error();
        }

        match name {
            "fail" => match &args[0].kind {
                NodeKind::Str(message) => {
                    let code = self.messages.len() as u32;
                    self.messages.push(message.clone());
                    Typed::new(Expr::fail(code, ValueType::Int), Ty::Never)
                }
                _ => {
                    self.error("`fail` expects a string literal message", args[0].pos);
                    Typed::error()
                }
            },
            "is_null" => {
                let typed = self.node(&args[0]);
                let expr = match typed.ty {
                    Ty::Error => return Typed::error(),
                    Ty::Null | Ty::Never => retype(typed.expr, ValueType::Int),
                    Ty::Value(_) => typed.expr,
                };
                Typed::value(Expr::is_null(expr), ValueType::Bool)
            }
            "abs" => {
                let typed = self.node(&args[0]);
                self.numeric_unary(typed, "abs", pos, Expr::abs)
            }
            "coalesce" => {
                let a = self.node(&args[0]);
                let b = self.node(&args[1]);
                let (a, b, ty) = self.unify(a, b, pos, "`coalesce` arguments");
                Typed::new(Expr::coalesce(a, b), ty)
            }
            _ => {
                let a = self.node(&args[0]);
                let b = self.node(&args[1]);
                let Some((ty, a, b)) = self.numeric_pair(a, b, name, pos) else {
                    return Typed::error();
                };
                let expr = if name == "min" {
                    Expr::min(a, b)
                } else {
                    Expr::max(a, b)
                };
                Typed::value(expr, ty)
            }
        }
    }

    /// Finds the common type of two alternatives (`if` branches, `coalesce`).
    fn unify(&mut self, a: Typed, b: Typed, pos: Position, what: &str) -> (Expr, Expr, Ty) {
        match (a.ty, b.ty) {
            (Ty::Error, _) | (_, Ty::Error) => (a.expr, b.expr, Ty::Error),
            (Ty::Value(x), Ty::Value(y)) if x == y => (a.expr, b.expr, a.ty),
            (Ty::Value(ValueType::Int), Ty::Value(ValueType::Float)) => (
                Expr::cast(Cast::IntToFloat, a.expr),
                b.expr,
                Ty::Value(ValueType::Float),
            ),
            (Ty::Value(ValueType::Float), Ty::Value(ValueType::Int)) => (
                a.expr,
                Expr::cast(Cast::IntToFloat, b.expr),
                Ty::Value(ValueType::Float),
            ),
            (Ty::Value(x), Ty::Value(y)) => {
                self.error(
                    format!(
                        "{what} have incompatible types `{}` and `{}`",
                        x.describe(),
                        y.describe()
                    ),
                    pos,
                );
                (a.expr, b.expr, Ty::Error)
            }
            (Ty::Value(x), _) => (a.expr, retype(b.expr, x), a.ty),
            (_, Ty::Value(y)) => (retype(a.expr, y), b.expr, b.ty),
            (Ty::Never, Ty::Never) => (a.expr, b.expr, Ty::Never),
            _ => (a.expr, b.expr, Ty::Null),
        }
    }
}

/// Gives a `null`/`fail` typed expression the concrete type `ty`.
fn retype(expr: Expr, ty: ValueType) -> Expr {
    match expr {
        Expr::Literal(crate::expr::Literal::Null(_)) => Expr::null(ty),
        Expr::Fail { code, .. } => Expr::fail(code, ty),
        Expr::If {
            cond,
            then_expr,
            else_expr,
        } => Expr::if_then_else(*cond, retype(*then_expr, ty), retype(*else_expr, ty)),
        Expr::Coalesce(a, b) => Expr::coalesce(retype(*a, ty), retype(*b, ty)),
        other => other,
    }
}
