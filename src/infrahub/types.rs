use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// --- GraphQL wire types ---

#[derive(Debug, Serialize)]
pub(crate) struct GraphqlRequest<'a> {
    pub query: &'a str,
    pub variables: &'a Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphqlResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Vec<GraphqlErrorEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphqlErrorEntry {
    pub message: String,
}

// --- Errors ---

/// Failures talking to Infrahub, kept typed so callers can tell
/// "already exists" and missing objects apart from transport problems.
#[derive(Debug, thiserror::Error)]
pub enum InfrahubError {
    #[error("Failed to connect to Infrahub: {0}")]
    Connection(String),
    #[error("Infrahub API error {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Invalid response from Infrahub: {0}")]
    InvalidResponse(String),
    #[error("GraphQL errors: {}", .0.join("; "))]
    Graphql(Vec<String>),
    #[error("{kind} not found: {key}")]
    NotFound { kind: String, key: String },
}

impl InfrahubError {
    pub fn not_found(kind: &str, key: &str) -> Self {
        Self::NotFound {
            kind: kind.to_string(),
            key: key.to_string(),
        }
    }

    /// True when the platform rejected a create because the object exists
    pub fn is_already_exists(&self) -> bool {
        match self {
            Self::Graphql(messages) => messages.iter().any(|m| {
                let m = m.to_lowercase();
                m.contains("already exists") || m.contains("uniqueness constraint")
            }),
            Self::Http { body, .. } => body.to_lowercase().contains("already exists"),
            _ => false,
        }
    }
}

/// Check an anyhow error chain for an "already exists" rejection
pub fn is_already_exists(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<InfrahubError>() {
        Some(e) => e.is_already_exists(),
        None => err.to_string().to_lowercase().contains("already exists"),
    }
}

// --- Results ---

/// Object returned by a create/upsert mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedNode {
    pub id: String,
    #[serde(default)]
    pub display_label: Option<String>,
}

/// Address handed out by an IP address pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocatedAddress {
    pub id: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub sync_with_git: bool,
}

// --- Mutation payload helpers ---

/// Attribute input: `{"value": v}`
pub fn attr<T: Serialize>(value: T) -> Value {
    json!({ "value": value })
}

/// Single relationship input: `{"id": id}`
pub fn rel(id: &str) -> Value {
    json!({ "id": id })
}

/// Many-relationship input: `[{"id": ..}, ..]`
pub fn rels<I, S>(ids: I) -> Value
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Value::Array(ids.into_iter().map(|id| rel(id.as_ref())).collect())
}

/// Attribute value drawn from a resource pool
pub fn from_pool(pool_id: &str) -> Value {
    json!({ "from_pool": { "id": pool_id } })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_helpers() {
        assert_eq!(attr("active"), json!({"value": "active"}));
        assert_eq!(rel("abc"), json!({"id": "abc"}));
        assert_eq!(rels(["a", "b"]), json!([{"id": "a"}, {"id": "b"}]));
        assert_eq!(from_pool("p1"), json!({"from_pool": {"id": "p1"}}));
    }

    #[test]
    fn test_already_exists_detection() {
        let err = InfrahubError::Graphql(vec!["An object already exists with name=main".to_string()]);
        assert!(err.is_already_exists());

        let err = InfrahubError::Graphql(vec!["Violates uniqueness constraint".to_string()]);
        assert!(err.is_already_exists());

        let err = InfrahubError::Connection("refused".to_string());
        assert!(!err.is_already_exists());

        let wrapped = anyhow::Error::new(InfrahubError::Graphql(vec!["already exists".into()]));
        assert!(is_already_exists(&wrapped));
    }
}
