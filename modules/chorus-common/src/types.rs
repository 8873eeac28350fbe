use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ChorusError;

// --- Identity ---

/// Deterministic id for an arbitrary string key. Stable across processes,
/// so anything keyed by it survives restarts.
pub fn string_to_uuid(key: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes())
}

// --- Platform types ---

/// A social-platform account. Owned by the platform; read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub display_name: String,
}

/// A single post (activity item) on the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub text: String,
    pub author_id: Option<String>,
    pub username: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

// --- Persona ---

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

#[derive(Deserialize, Default)]
struct RawStyle {
    #[serde(default)]
    all: Vec<String>,
    #[serde(default)]
    post: Vec<String>,
}

#[derive(Deserialize)]
struct RawCharacter {
    name: String,
    bio: Option<OneOrMany>,
    #[serde(default)]
    style: RawStyle,
    #[serde(default)]
    topics: Vec<String>,
}

/// The character the agent speaks as: who it is, how it posts, what it cares about.
#[derive(Debug, Clone, PartialEq)]
pub struct Persona {
    pub name: String,
    pub bio: Vec<String>,
    pub post_directions: Vec<String>,
    pub topics: Vec<String>,
}

impl Persona {
    /// Parse a character definition. `style.all` and `style.post` both count
    /// as posting directions.
    pub fn from_json(raw: &str) -> Result<Self, ChorusError> {
        let c: RawCharacter =
            serde_json::from_str(raw).map_err(|e| ChorusError::Persona(e.to_string()))?;
        if c.name.trim().is_empty() {
            return Err(ChorusError::Persona("character name is empty".into()));
        }

        let mut post_directions = c.style.all;
        post_directions.extend(c.style.post);

        Ok(Self {
            name: c.name,
            bio: c.bio.map(OneOrMany::into_vec).unwrap_or_default(),
            post_directions,
            topics: c.topics,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, ChorusError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Stable agent id derived from the character name.
    pub fn agent_id(&self) -> Uuid {
        string_to_uuid(&self.name)
    }

    pub fn bio_text(&self) -> String {
        self.bio.join("\n")
    }

    pub fn post_directions_text(&self) -> String {
        self.post_directions.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persona_accepts_string_bio() {
        let p = Persona::from_json(
            r#"{"name": "Ada", "username": "ada_bot", "bio": "Builds compilers.", "topics": ["rust", "llvm"]}"#,
        )
        .unwrap();
        assert_eq!(p.bio, vec!["Builds compilers."]);
        assert_eq!(p.topics.len(), 2);
        assert!(p.post_directions.is_empty());
    }

    #[test]
    fn persona_merges_style_sections() {
        let p = Persona::from_json(
            r#"{
                "name": "Ada",
                "bio": ["one", "two"],
                "style": {"all": ["be terse"], "post": ["no hashtags"], "chat": ["ignored"]}
            }"#,
        )
        .unwrap();
        assert_eq!(p.bio_text(), "one\ntwo");
        assert_eq!(p.post_directions_text(), "be terse\nno hashtags");
    }

    #[test]
    fn empty_name_is_rejected() {
        let err = Persona::from_json(r#"{"name": "  "}"#).unwrap_err();
        assert!(matches!(err, ChorusError::Persona(_)));
    }

    #[test]
    fn agent_id_is_deterministic() {
        let a = Persona::from_json(r#"{"name": "Ada"}"#).unwrap();
        let b = Persona::from_json(r#"{"name": "Ada", "topics": ["x"]}"#).unwrap();
        assert_eq!(a.agent_id(), b.agent_id());
        assert_ne!(a.agent_id(), string_to_uuid("Grace"));
    }

    #[test]
    fn persona_loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ada.json");
        std::fs::write(&path, r#"{"name": "Ada", "topics": ["rust"]}"#).unwrap();
        let p = Persona::from_file(&path).unwrap();
        assert_eq!(p.name, "Ada");
    }
}
