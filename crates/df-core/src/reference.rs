//! Deferred references embedded in generated SQL.
//!
//! `ref()`, `resolve()` and `self()` run while files are still being
//! evaluated, before every action is known. They therefore emit a marker in
//! place of the final identifier. The session substitutes markers once all
//! registrations are in, which makes resolution independent of file order.

use crate::target::TargetRef;
use serde::{Deserialize, Serialize};

const MARKER_START: char = '\u{1}';
const MARKER_END: char = '\u{2}';

/// What a marker stands for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Deferred {
    /// Quoted runtime target of another action
    Target { target: TargetRef },
    /// Quoted runtime target of the owning action
    SelfTarget,
    /// Runtime schema of the owning action
    SelfSchema,
    /// Runtime database of the owning action
    SelfDatabase,
}

impl Deferred {
    /// Encode as an in-text marker
    pub fn encode(&self) -> String {
        let body = serde_json::to_string(self).unwrap_or_default();
        format!("{}{}{}", MARKER_START, body, MARKER_END)
    }
}

/// True if `text` contains at least one marker
pub fn has_markers(text: &str) -> bool {
    text.contains(MARKER_START)
}

/// Replace every marker in `text` with the resolver's output.
///
/// Malformed markers are left in place.
pub fn substitute<F>(text: &str, mut resolve: F) -> String
where
    F: FnMut(&Deferred) -> String,
{
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(MARKER_START) {
        out.push_str(&rest[..start]);
        let after = &rest[start + MARKER_START.len_utf8()..];
        match after.find(MARKER_END) {
            Some(end) => {
                let body = &after[..end];
                match serde_json::from_str::<Deferred>(body) {
                    Ok(deferred) => out.push_str(&resolve(&deferred)),
                    Err(_) => {
                        out.push(MARKER_START);
                        out.push_str(body);
                        out.push(MARKER_END);
                    }
                }
                rest = &after[end + MARKER_END.len_utf8()..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
#[path = "reference_test.rs"]
mod tests;
