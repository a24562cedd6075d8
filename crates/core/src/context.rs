use serde::{Deserialize, Serialize};

/// Separator used when persisting a context path as a flat string.
pub const CONTEXT_JOIN: &str = "; ";

/// An environmental compartment path, e.g. `["Emissions", "to air", "urban"]`.
///
/// Canonicalization against a live index happens outside this crate (the
/// index is an external collaborator, see `tarjan_query::ContextManager`);
/// this type only knows how to serialize/deserialize the path itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct ContextKey(pub Vec<String>);

impl ContextKey {
    pub fn new(segments: impl IntoIterator<Item = impl Into<String>>) -> Self {
        ContextKey(segments.into_iter().map(Into::into).collect())
    }

    /// Join the path into the legacy-compatible `"; "`-separated string form
    /// used by `TermRef::term_ref` for exterior entries.
    pub fn to_joined(&self) -> String {
        self.0.join(CONTEXT_JOIN)
    }

    /// Parse the `"; "`-joined legacy form back into a path.
    pub fn from_joined(s: &str) -> Self {
        if s.is_empty() {
            ContextKey(Vec::new())
        } else {
            ContextKey(s.split(CONTEXT_JOIN).map(str::to_string).collect())
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for ContextKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_joined())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_round_trip() {
        let ctx = ContextKey::new(["Emissions", "to air", "urban"]);
        let joined = ctx.to_joined();
        assert_eq!(joined, "Emissions; to air; urban");
        assert_eq!(ContextKey::from_joined(&joined), ctx);
    }

    #[test]
    fn empty_round_trip() {
        let ctx = ContextKey::default();
        assert_eq!(ctx.to_joined(), "");
        assert_eq!(ContextKey::from_joined(""), ctx);
    }
}
