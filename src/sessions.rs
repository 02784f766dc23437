//! Sessions

use std::fmt;

/// Opaque caller identity partitioning cart and order ownership.
///
/// A session id is supplied by the calling layer (typically a cookie or
/// header value) and is never validated or parsed here; the engine only uses
/// it as a partition key. Callers without an identity share the
/// [`SessionId::anonymous`] session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    /// Identity used when the caller supplies none.
    pub const ANONYMOUS: &'static str = "anonymous";

    /// Create a session id from a raw identity string.
    pub fn new(id: impl Into<String>) -> Self {
        SessionId(id.into())
    }

    /// The shared fallback session for callers with no identity.
    #[must_use]
    pub fn anonymous() -> Self {
        SessionId(Self::ANONYMOUS.to_owned())
    }

    /// Resolve an optional caller-supplied identity, falling back to the
    /// anonymous session.
    #[must_use]
    pub fn resolve(id: Option<&str>) -> Self {
        match id {
            Some(id) if !id.is_empty() => SessionId(id.to_owned()),
            _ => Self::anonymous(),
        }
    }

    /// The raw identity string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        SessionId::new(id)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        SessionId(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_falls_back_to_anonymous() {
        assert_eq!(SessionId::resolve(None), SessionId::anonymous());
        assert_eq!(SessionId::resolve(Some("")), SessionId::anonymous());
        assert_eq!(SessionId::resolve(Some("s-1")), SessionId::new("s-1"));
    }

    #[test]
    fn anonymous_is_a_stable_named_session() {
        assert_eq!(SessionId::anonymous().as_str(), "anonymous");
    }
}
