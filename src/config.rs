//! Configuration for the `nntpd` demo binary
//!
//! TOML-backed; a missing config file is created with defaults so the
//! server starts usefully out of the box.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::memory::MemoryBackend;
use crate::types::PostingStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address the listener binds to
    #[serde(default = "defaults::listen_addr")]
    pub listen_addr: String,

    /// Whether POST/IHAVE are accepted at all
    #[serde(default = "defaults::allow_post")]
    pub allow_post: bool,

    /// When set, sessions must pass AUTHINFO USER/PASS with these
    /// credentials before the backend reports itself authorised
    #[serde(default)]
    pub auth: Option<AuthConfig>,

    /// Groups seeded into the in-memory backend at startup
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// `y`, `n`, or `m` (defaults to `y`)
    #[serde(default = "defaults::posting")]
    pub posting: String,
}

mod defaults {
    pub fn listen_addr() -> String {
        "0.0.0.0:1119".to_string()
    }

    pub fn allow_post() -> bool {
        true
    }

    pub fn posting() -> String {
        "y".to_string()
    }
}

impl GroupConfig {
    fn posting_status(&self) -> PostingStatus {
        match self.posting.as_str() {
            "n" => PostingStatus::NotPermitted,
            "m" => PostingStatus::Moderated,
            _ => PostingStatus::Permitted,
        }
    }
}

impl Config {
    /// Build the in-memory backend this config describes.
    #[must_use]
    pub fn build_backend(&self) -> MemoryBackend {
        let mut backend = MemoryBackend::new();
        if let Some(auth) = &self.auth {
            backend = backend.with_credentials(&auth.username, &auth.password);
        }
        if !self.allow_post {
            backend = backend.read_only();
        }
        for group in &self.groups {
            backend.add_group(&group.name, &group.description, group.posting_status());
        }
        backend
    }
}

/// Load a config file from disk.
pub fn load_config(path: &str) -> Result<Config> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("failed to read config file '{path}'"))?;
    toml::from_str(&contents).with_context(|| format!("failed to parse config file '{path}'"))
}

/// The configuration written when no config file exists: two test groups,
/// posting enabled, no authentication.
#[must_use]
pub fn create_default_config() -> Config {
    Config {
        listen_addr: defaults::listen_addr(),
        allow_post: defaults::allow_post(),
        auth: None,
        groups: vec![
            GroupConfig {
                name: "misc.test".to_string(),
                description: "More testing.".to_string(),
                posting: "y".to_string(),
            },
            GroupConfig {
                name: "alt.test".to_string(),
                description: "A test.".to_string(),
                posting: "n".to_string(),
            },
        ],
    }
}
