//! Untyped syntax tree produced by the parser.

use adhesive_core::{Position, ScalarType};

use crate::expr::Accessor;

#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub package: Option<Vec<String>>,
    pub units: Vec<UnitDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitDecl {
    pub name: String,
    pub name_pos: Position,
    pub result: ScalarType,
    pub lets: Vec<LetStmt>,
    pub body: Node,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LetStmt {
    pub name: String,
    pub pos: Position,
    pub value: Node,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub pos: Position,
    /// Levels in this subtree; a leaf has height 1.
    pub height: usize,
}

impl Node {
    pub fn new(kind: NodeKind, pos: Position) -> Self {
        let children = match &kind {
            NodeKind::Unary(_, inner) | NodeKind::Cast(inner, _) => inner.height,
            NodeKind::Binary(_, left, right) => left.height.max(right.height),
            NodeKind::Call { args, .. } => args.iter().map(|a| a.height).max().unwrap_or(0),
            NodeKind::If {
                cond,
                then_branch,
                else_branch,
            } => cond.height.max(then_branch.height).max(else_branch.height),
            _ => 0,
        };
        Self {
            kind,
            pos,
            height: children + 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    Str(String),
    Var(String),
    Column {
        accessor: Accessor,
        index: i64,
    },
    Unary(UnOp, Box<Node>),
    Binary(BinOp, Box<Node>, Box<Node>),
    Cast(Box<Node>, CastTarget),
    Call {
        name: String,
        args: Vec<Node>,
    },
    If {
        cond: Box<Node>,
        then_branch: Box<Node>,
        else_branch: Box<Node>,
    },
}

/// Right-hand side of `as`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastTarget {
    Scalar(ScalarType),
    Bool,
}
