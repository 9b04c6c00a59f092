use {
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
};

// ── Endpoints ────────────────────────────────────────────────────────────────

/// HTTP verb an endpoint answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Get,
    Post,
    Delete,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::Post => "post",
            Verb::Delete => "delete",
        }
    }
}

/// A (verb, name) pair scoped to one extension.
///
/// Routed as `/api/{extension.id}/{endpoint.name}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub verb: Verb,
    pub name: String,
}

impl Endpoint {
    pub fn new(verb: Verb, name: impl Into<String>) -> Self {
        Self {
            verb,
            name: name.into(),
        }
    }

    pub fn get(name: impl Into<String>) -> Self {
        Self::new(Verb::Get, name)
    }

    pub fn post(name: impl Into<String>) -> Self {
        Self::new(Verb::Post, name)
    }

    pub fn delete(name: impl Into<String>) -> Self {
        Self::new(Verb::Delete, name)
    }
}

// ── Query parameters ─────────────────────────────────────────────────────────

/// Multi-valued query parameters, in wire order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    pairs: Vec<(String, String)>,
}

impl Params {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }

    /// First value for `key`, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All values for `key`, in wire order.
    pub fn all(&self, key: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Flatten to a single-valued JSON object; the last value wins.
    pub fn to_json_object(&self) -> Map<String, Value> {
        let mut map = Map::new();
        for (key, value) in &self.pairs {
            map.insert(key.clone(), Value::String(value.clone()));
        }
        map
    }
}

// ── Replies ──────────────────────────────────────────────────────────────────

/// Body of an extension reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ReplyBody {
    #[default]
    Empty,
    Json(Value),
}

/// What an extension returns for a handled request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: ReplyBody,
}

impl Default for Reply {
    fn default() -> Self {
        Self {
            status: 200,
            body: ReplyBody::Empty,
        }
    }
}

impl Reply {
    /// `200` with a JSON body.
    pub fn json(value: Value) -> Self {
        Self {
            status: 200,
            body: ReplyBody::Json(value),
        }
    }

    /// Explicit status with a JSON body.
    pub fn with_status(status: u16, value: Value) -> Self {
        Self {
            status,
            body: ReplyBody::Json(value),
        }
    }

    /// Explicit status, no body.
    pub fn status_only(status: u16) -> Self {
        Self {
            status,
            body: ReplyBody::Empty,
        }
    }
}
