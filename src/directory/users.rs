use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    #[serde(rename = "Userkey", alias = "userkey")]
    pub key: String,
    #[serde(rename = "LDAP", alias = "ldap", alias = "display_name")]
    pub display_name: String,
    #[serde(rename = "Team", alias = "team", default)]
    pub team: String,
    #[serde(rename = "Region", alias = "region", default)]
    pub region: String,
    #[serde(rename = "SubRegion", alias = "sub_region", default)]
    pub sub_region: String,
    #[serde(rename = "Role", alias = "role", default)]
    pub role: String,
}

impl Participant {
    pub fn new(key: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            display_name: display_name.into(),
            team: String::new(),
            region: String::new(),
            sub_region: String::new(),
            role: String::new(),
        }
    }
}

#[derive(Deserialize)]
struct UsersBlob {
    users: Vec<Participant>,
}

/// Read-only mapping of participant key to participant.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    users: HashMap<String, Participant>,
}

impl UserDirectory {
    pub fn new(participants: impl IntoIterator<Item = Participant>) -> Self {
        Self {
            users: participants
                .into_iter()
                .map(|p| (p.key.clone(), p))
                .collect(),
        }
    }

    /// Load `{"users": [...]}` from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let blob: UsersBlob = super::read_json(path.as_ref())?;
        let directory = Self::new(blob.users);
        tracing::info!(path = %path.as_ref().display(), participants = directory.len(), "Loaded user directory");
        Ok(directory)
    }

    pub fn get(&self, key: &str) -> Option<&Participant> {
        self.users.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.users.contains_key(key)
    }

    /// Display name for `key`, empty when unknown.
    pub fn display_name(&self, key: &str) -> String {
        self.users
            .get(key)
            .map(|p| p.display_name.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_original_field_names() {
        let json = r#"{"users": [
            {"Userkey": "k1", "LDAP": "alice", "Team": "t", "Region": "emea", "SubRegion": "uk", "Role": "ce"},
            {"userkey": "k2", "ldap": "bob"}
        ]}"#;
        let blob: UsersBlob = serde_json::from_str(json).unwrap();
        let dir = UserDirectory::new(blob.users);

        assert_eq!(dir.len(), 2);
        assert_eq!(dir.display_name("k1"), "alice");
        assert_eq!(dir.get("k1").unwrap().region, "emea");
        assert_eq!(dir.display_name("k2"), "bob");
        assert_eq!(dir.get("k2").unwrap().team, "");
    }

    #[test]
    fn unknown_key_has_empty_display_name() {
        let dir = UserDirectory::new(vec![Participant::new("k1", "alice")]);
        assert!(dir.contains("k1"));
        assert!(!dir.contains("k9"));
        assert_eq!(dir.display_name("k9"), "");
    }
}
