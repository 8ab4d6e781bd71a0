//! Unit name discovery and package rewriting for anonymous compilation.

use rand::Rng;

use super::lexer::{tokenize, TokenKind};

const SUFFIX_LEN: usize = 6;

/// Returns the simple name of the first unit declared in `source`.
pub fn find_unit_name(source: &str) -> Option<String> {
    let (tokens, _) = tokenize(source);
    tokens.windows(2).find_map(|pair| match (&pair[0].kind, &pair[1].kind) {
        (TokenKind::Unit, TokenKind::Ident(name)) => Some(name.clone()),
        _ => None,
    })
}

/// Generates a fresh package name `<namespace>.p<6 lowercase letters>`.
pub fn generate_package(namespace: &str) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| rng.random_range(b'a'..=b'z') as char)
        .collect();
    format!("{namespace}.p{suffix}")
}

/// Rewrites `source` to declare `package`, replacing any existing package
/// declaration.
///
/// The declaration is spliced into the first line so that diagnostic line
/// numbers still match the caller's text.
pub fn with_package(source: &str, package: &str) -> String {
    let (tokens, _) = tokenize(source);
    if tokens.first().map(|t| &t.kind) == Some(&TokenKind::Package) {
        if let Some(semi) = tokens.iter().find(|t| t.kind == TokenKind::Semi) {
            return format!(
                "{}package {package};{}",
                &source[..tokens[0].start],
                &source[semi.end..]
            );
        }
    }
    format!("package {package}; {source}")
}
