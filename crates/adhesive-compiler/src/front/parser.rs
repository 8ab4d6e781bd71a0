//! Recursive-descent parser. Stops at the first syntax error.
//!
//! ```text
//! source  := ("package" path ";")? unit*
//! unit    := "unit" IDENT "->" type "{" let* expr "}"
//! let     := "let" IDENT "=" expr ";"
//! expr    := or
//! or      := and ("||" and)*
//! and     := cmp ("&&" cmp)*
//! cmp     := sum (("==" | "!=" | "<" | "<=" | ">" | ">=") sum)?
//! sum     := product (("+" | "-") product)*
//! product := cast (("*" | "/" | "%") cast)*
//! cast    := unary ("as" type)*
//! unary   := ("-" | "!") unary | primary
//! primary := literal | IDENT | IDENT "(" args ")" | "row" "." IDENT "(" INT ")"
//!          | "(" expr ")" | if
//! if      := "if" expr "{" expr "}" "else" ("{" expr "}" | if)
//! ```

use adhesive_core::{Diagnostic, Position, ScalarType};

use super::ast::{BinOp, CastTarget, LetStmt, Node, NodeKind, SourceFile, UnOp, UnitDecl};
use super::lexer::{Token, TokenKind};
use crate::expr::Accessor;

/// Maximum recursion through parentheses, unary operators, calls and
/// `if`. Each level costs one full descent of the precedence ladder.
pub const MAX_NESTING: usize = 32;

/// Maximum height of an expression tree. Operator chains build the tree in
/// a loop, but later passes recurse once per level.
pub const MAX_EXPR_DEPTH: usize = 128;

type ParseResult<T> = Result<T, Diagnostic>;

/// Parses a token stream ending in [`TokenKind::Eof`].
pub fn parse(tokens: &[Token]) -> ParseResult<SourceFile> {
    let mut parser = Parser {
        tokens,
        cursor: 0,
        nesting: 0,
    };
    parser.source_file()
}

struct Parser<'a> {
    tokens: &'a [Token],
    cursor: usize,
    nesting: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &'a Token {
        let tokens = self.tokens;
        &tokens[self.cursor.min(tokens.len().saturating_sub(1))]
    }

    fn advance(&mut self) -> &'a Token {
        let token = self.peek();
        if token.kind != TokenKind::Eof {
            self.cursor += 1;
        }
        token
    }

    fn at(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, context: &str) -> ParseResult<&'a Token> {
        if self.at(&kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("{} {context}", kind.describe())))
        }
    }

    fn expect_ident(&mut self, context: &str) -> ParseResult<(String, Position)> {
        let token = self.peek();
        match &token.kind {
            TokenKind::Ident(name) => {
                self.advance();
                Ok((name.clone(), token.pos))
            }
            _ => Err(self.unexpected(&format!("identifier {context}"))),
        }
    }

    fn unexpected(&self, expected: &str) -> Diagnostic {
        let token = self.peek();
        Diagnostic::error(
            format!("expected {expected}, found {}", token.kind.describe()),
            Some(token.pos),
        )
    }

    fn source_file(&mut self) -> ParseResult<SourceFile> {
        let package = if self.eat(&TokenKind::Package) {
            let mut path = vec![self.expect_ident("after `package`")?.0];
            while self.eat(&TokenKind::Dot) {
                path.push(self.expect_ident("in package path")?.0);
            }
            self.expect(TokenKind::Semi, "after package declaration")?;
            Some(path)
        } else {
            None
        };

        let mut units = Vec::new();
        while !self.at(&TokenKind::Eof) {
            if !self.at(&TokenKind::Unit) {
                return Err(self.unexpected("`unit`"));
            }
            units.push(self.unit()?);
        }
        Ok(SourceFile { package, units })
    }

    fn unit(&mut self) -> ParseResult<UnitDecl> {
        self.expect(TokenKind::Unit, "")?;
        let (name, name_pos) = self.expect_ident("after `unit`")?;
        self.expect(TokenKind::Arrow, "after unit name")?;
        let result = match self.type_name()? {
            (CastTarget::Scalar(ty), _) => ty,
            (CastTarget::Bool, pos) => {
                return Err(Diagnostic::error(
                    "unit result type must be one of i32, i64, f32, f64",
                    Some(pos),
                ))
            }
        };
        self.expect(TokenKind::LBrace, "before unit body")?;

        let mut lets = Vec::new();
        while self.at(&TokenKind::Let) {
            lets.push(self.let_stmt()?);
        }
        let body = self.expr()?;
        self.expect(TokenKind::RBrace, "after unit body")?;
        Ok(UnitDecl {
            name,
            name_pos,
            result,
            lets,
            body,
        })
    }

    fn let_stmt(&mut self) -> ParseResult<LetStmt> {
        self.expect(TokenKind::Let, "")?;
        let (name, pos) = self.expect_ident("after `let`")?;
        self.expect(TokenKind::Assign, "in `let` binding")?;
        let value = self.expr()?;
        self.expect(TokenKind::Semi, "after `let` binding")?;
        Ok(LetStmt { name, pos, value })
    }

    fn type_name(&mut self) -> ParseResult<(CastTarget, Position)> {
        let (name, pos) = self.expect_ident("type name")?;
        let target = match ScalarType::from_keyword(&name) {
            Some(ty) => CastTarget::Scalar(ty),
            None if name == "bool" => CastTarget::Bool,
            None => {
                return Err(Diagnostic::error(
                    format!("unknown type `{name}`"),
                    Some(pos),
                ))
            }
        };
        Ok((target, pos))
    }

    fn descend(&mut self, pos: Position) -> ParseResult<()> {
        self.nesting += 1;
        if self.nesting > MAX_NESTING {
            return Err(Diagnostic::error("expression nesting too deep", Some(pos)));
        }
        Ok(())
    }

    fn expr(&mut self) -> ParseResult<Node> {
        self.descend(self.peek().pos)?;
        let node = self.or()?;
        self.nesting -= 1;
        Ok(node)
    }

    fn or(&mut self) -> ParseResult<Node> {
        let mut left = self.and()?;
        while self.at(&TokenKind::OrOr) {
            let pos = self.advance().pos;
            let right = self.and()?;
            left = bounded(binary(BinOp::Or, left, right, pos))?;
        }
        Ok(left)
    }

    fn and(&mut self) -> ParseResult<Node> {
        let mut left = self.comparison()?;
        while self.at(&TokenKind::AndAnd) {
            let pos = self.advance().pos;
            let right = self.comparison()?;
            left = bounded(binary(BinOp::And, left, right, pos))?;
        }
        Ok(left)
    }

    fn comparison(&mut self) -> ParseResult<Node> {
        let left = self.sum()?;
        let Some(op) = comparison_op(&self.peek().kind) else {
            return Ok(left);
        };
        let pos = self.advance().pos;
        let right = self.sum()?;
        if comparison_op(&self.peek().kind).is_some() {
            return Err(Diagnostic::error(
                "comparison operators cannot be chained",
                Some(self.peek().pos),
            ));
        }
        bounded(binary(op, left, right, pos))
    }

    fn sum(&mut self) -> ParseResult<Node> {
        let mut left = self.product()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            let pos = self.advance().pos;
            let right = self.product()?;
            left = bounded(binary(op, left, right, pos))?;
        }
        Ok(left)
    }

    fn product(&mut self) -> ParseResult<Node> {
        let mut left = self.cast()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Rem,
                _ => break,
            };
            let pos = self.advance().pos;
            let right = self.cast()?;
            left = bounded(binary(op, left, right, pos))?;
        }
        Ok(left)
    }

    fn cast(&mut self) -> ParseResult<Node> {
        let mut node = self.unary()?;
        while self.at(&TokenKind::As) {
            let pos = self.advance().pos;
            let (target, _) = self.type_name()?;
            node = bounded(Node::new(NodeKind::Cast(Box::new(node), target), pos))?;
        }
        Ok(node)
    }

    fn unary(&mut self) -> ParseResult<Node> {
        let op = match self.peek().kind {
            TokenKind::Minus => UnOp::Neg,
            TokenKind::Bang => UnOp::Not,
            _ => return self.primary(),
        };
        let pos = self.advance().pos;
        self.descend(pos)?;
        let operand = self.unary()?;
        self.nesting -= 1;
        bounded(Node::new(NodeKind::Unary(op, Box::new(operand)), pos))
    }

    fn primary(&mut self) -> ParseResult<Node> {
        let token = self.peek();
        let pos = token.pos;
        let kind = match &token.kind {
            TokenKind::Int(v) => {
                self.advance();
                NodeKind::Int(*v)
            }
            TokenKind::Float(v) => {
                self.advance();
                NodeKind::Float(*v)
            }
            TokenKind::True => {
                self.advance();
                NodeKind::Bool(true)
            }
            TokenKind::False => {
                self.advance();
                NodeKind::Bool(false)
            }
            TokenKind::Null => {
                self.advance();
                NodeKind::Null
            }
            TokenKind::Str(s) => {
                self.advance();
                NodeKind::Str(s.clone())
            }
            TokenKind::Ident(name) => {
                self.advance();
                if self.eat(&TokenKind::LParen) {
                    NodeKind::Call {
                        name: name.clone(),
                        args: self.args()?,
                    }
                } else {
                    NodeKind::Var(name.clone())
                }
            }
            TokenKind::Row => {
                self.advance();
                return self.column(pos);
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.expr()?;
                self.expect(TokenKind::RParen, "to close `(`")?;
                return Ok(inner);
            }
            TokenKind::If => {
                self.advance();
                return self.if_expr(pos);
            }
            _ => return Err(self.unexpected("expression")),
        };
        bounded(Node::new(kind, pos))
    }

    fn args(&mut self) -> ParseResult<Vec<Node>> {
        let mut args = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            if self.eat(&TokenKind::RParen) {
                return Ok(args);
            }
            self.expect(TokenKind::Comma, "between arguments")?;
        }
    }

    fn column(&mut self, pos: Position) -> ParseResult<Node> {
        self.expect(TokenKind::Dot, "after `row`")?;
        let (name, name_pos) = self.expect_ident("row accessor")?;
        let accessor = Accessor::from_keyword(&name).ok_or_else(|| {
            Diagnostic::error(
                format!("unknown row accessor `{name}`; expected one of i32, i64, f32, f64, bool"),
                Some(name_pos),
            )
        })?;
        self.expect(TokenKind::LParen, "after row accessor")?;
        let index = match self.peek().kind {
            TokenKind::Int(v) => {
                self.advance();
                v
            }
            _ => return Err(self.unexpected("column index")),
        };
        self.expect(TokenKind::RParen, "after column index")?;
        Ok(Node::new(NodeKind::Column { accessor, index }, pos))
    }

    fn if_expr(&mut self, pos: Position) -> ParseResult<Node> {
        let cond = self.expr()?;
        let then_branch = self.block()?;
        self.expect(TokenKind::Else, "after `if` branch; `if` needs an `else`")?;
        let else_branch = if self.at(&TokenKind::If) {
            let nested = self.advance().pos;
            self.descend(nested)?;
            let node = self.if_expr(nested)?;
            self.nesting -= 1;
            node
        } else {
            self.block()?
        };
        bounded(Node::new(
            NodeKind::If {
                cond: Box::new(cond),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            },
            pos,
        ))
    }

    fn block(&mut self) -> ParseResult<Node> {
        self.expect(TokenKind::LBrace, "to open block")?;
        let inner = self.expr()?;
        self.expect(TokenKind::RBrace, "to close block")?;
        Ok(inner)
    }
}

fn comparison_op(kind: &TokenKind) -> Option<BinOp> {
    match kind {
        TokenKind::EqEq => Some(BinOp::Eq),
        TokenKind::NotEq => Some(BinOp::Ne),
        TokenKind::Lt => Some(BinOp::Lt),
        TokenKind::Le => Some(BinOp::Le),
        TokenKind::Gt => Some(BinOp::Gt),
        TokenKind::Ge => Some(BinOp::Ge),
        _ => None,
    }
}

fn binary(op: BinOp, left: Node, right: Node, pos: Position) -> Node {
    Node::new(NodeKind::Binary(op, Box::new(left), Box::new(right)), pos)
}

fn bounded(node: Node) -> ParseResult<Node> {
    if node.height > MAX_EXPR_DEPTH {
        return Err(Diagnostic::error("expression too deep", Some(node.pos)));
    }
    Ok(node)
}

#[cfg(test)]
mod tests;
