use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Opaque cursor marking a position in a paginated remote sequence
///
/// Only equality and hashing are available. The wire form is exposed solely so
/// the transport can place it in a request body.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ContinuationToken(Arc<str>);

impl ContinuationToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Arc::from(token.into()))
    }

    pub fn as_wire(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Tokens can be several hundred bytes long
        let head: String = self.0.chars().take(16).collect();
        if head.len() < self.0.len() {
            write!(f, "ContinuationToken({}…)", head)
        } else {
            write!(f, "ContinuationToken({})", head)
        }
    }
}

/// Opaque key into the entity store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey(Arc<str>);

impl EntityKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(Arc::from(key.into()))
    }
}

/// A continuation token together with the tracking parameter the remote expects back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Continuation {
    pub token: ContinuationToken,
    pub tracking: Option<String>,
}

impl Continuation {
    pub fn new(token: ContinuationToken) -> Self {
        Self {
            token,
            tracking: None,
        }
    }
}

/// Deduplication key for a reply token
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey(Vec<u8>);

/// A reply collection discovered during traversal
#[derive(Debug, Clone)]
pub struct ReplyTokenDescriptor {
    /// Canonical token string, when the remote provided one
    pub token: Option<ContinuationToken>,

    /// The raw continuation value as it appeared on the wire
    pub raw: Value,

    pub tracking: Option<String>,

    /// Identity of the record these replies belong to
    pub parent_id: String,
}

impl ReplyTokenDescriptor {
    pub fn new(continuation: Continuation, parent_id: impl Into<String>) -> Self {
        let raw = Value::String(continuation.token.as_wire().to_string());
        Self {
            token: Some(continuation.token),
            raw,
            tracking: continuation.tracking,
            parent_id: parent_id.into(),
        }
    }

    /// Stable dedup key: the canonical token when present, otherwise the
    /// structural serialization of the raw value with object keys sorted.
    pub fn dedup_key(&self) -> DedupKey {
        match &self.token {
            Some(token) => {
                let mut key = b"t:".to_vec();
                key.extend_from_slice(token.as_wire().as_bytes());
                DedupKey(key)
            }
            None => {
                let mut key = b"s:".to_vec();
                write_canonical(&self.raw, &mut key);
                DedupKey(key)
            }
        }
    }

    /// The continuation to request, if the descriptor carries a usable token
    pub fn continuation(&self) -> Option<Continuation> {
        self.token.as_ref().map(|token| Continuation {
            token: token.clone(),
            tracking: self.tracking.clone(),
        })
    }
}

/// Serializes `value` with object keys in sorted order regardless of how the
/// map was built.
fn write_canonical(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push(b'{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                out.extend_from_slice(Value::String(key.clone()).to_string().as_bytes());
                out.push(b':');
                write_canonical(item, out);
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out);
            }
            out.push(b']');
        }
        scalar => out.extend_from_slice(scalar.to_string().as_bytes()),
    }
}
