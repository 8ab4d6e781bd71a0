//! Binary artifact format for compiled units.
//!
//! ```text
//! +--------+-----------------+------------------------+
//! | "ADHU" | version: u16 LE | program (JSON, UTF-8)  |
//! +--------+-----------------+------------------------+
//! ```
//!
//! Decoding re-verifies the program, so bytes registered by hand are held to
//! the same typing rules as compiler output.

use bytes::{BufMut, Bytes, BytesMut};
use serde::Deserialize;

use adhesive_core::{AdhesiveError, Result};

use crate::expr::{Program, MAX_TREE_DEPTH};

pub const MAGIC: &[u8; 4] = b"ADHU";
pub const FORMAT_VERSION: u16 = 1;

const HEADER_LEN: usize = MAGIC.len() + 2;

/// JSON nesting allowed in a body. Every tree level takes at most two JSON
/// levels, plus the program's own object and arrays.
const MAX_JSON_DEPTH: usize = 2 * MAX_TREE_DEPTH + 8;

/// Serializes a checked program.
pub fn encode(program: &Program) -> Result<Bytes> {
    let body = serde_json::to_vec(program).map_err(|e| {
        AdhesiveError::Internal(format!("failed to encode unit `{}`: {e}", program.name))
    })?;
    let mut buf = BytesMut::with_capacity(HEADER_LEN + body.len());
    buf.put_slice(MAGIC);
    buf.put_u16_le(FORMAT_VERSION);
    buf.put_slice(&body);
    Ok(buf.freeze())
}

/// Decodes and verifies the artifact registered under `name`.
pub fn decode(name: &str, bytes: &[u8]) -> Result<Program> {
    let invalid = |reason: String| AdhesiveError::invalid_artifact(name, reason);

    if bytes.len() < HEADER_LEN || &bytes[..MAGIC.len()] != MAGIC {
        return Err(invalid("missing artifact header".to_string()));
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != FORMAT_VERSION {
        return Err(invalid(format!(
            "unsupported format version {version}, expected {FORMAT_VERSION}"
        )));
    }

    let body = &bytes[HEADER_LEN..];
    if json_depth(body) > MAX_JSON_DEPTH {
        return Err(invalid("body nested too deeply".to_string()));
    }
    let mut deserializer = serde_json::Deserializer::from_slice(body);
    deserializer.disable_recursion_limit();
    let program = Program::deserialize(&mut deserializer)
        .and_then(|program| deserializer.end().map(|()| program))
        .map_err(|e| invalid(format!("malformed body: {e}")))?;
    if program.name != name {
        return Err(invalid(format!("artifact defines `{}`", program.name)));
    }
    program.verify().map_err(invalid)?;
    Ok(program)
}

/// Deepest bracket nesting in `json`, ignoring brackets inside strings.
fn json_depth(json: &[u8]) -> usize {
    let mut depth = 0usize;
    let mut deepest = 0;
    let mut in_string = false;
    let mut escaped = false;
    for &byte in json {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' | b'[' => {
                depth += 1;
                deepest = deepest.max(depth);
            }
            b'}' | b']' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    deepest
}
