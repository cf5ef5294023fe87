//! Profile directory.
//!
//! Profiles are named workspaces that partition tasks. The directory is a
//! context object: load it once with [`ProfileDirectory::load`], mutate it in
//! place, and every mutation is written straight through to storage.
//!
//! Deleting a profile only hides it; its task partitions stay in the store
//! and reappear when a profile of the same name is created again.
//!
//! Active profile resolution order:
//! 1) explicit `--profile`
//! 2) `DAYBOOK_PROFILE` environment variable
//! 3) last selected profile, if still listed
//! 4) the default profile

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::kv::KeyValueStore;
use crate::partition::{
    is_default_profile, validate_profile_name, DEFAULT_PROFILE, PROFILES_KEY,
    SELECTED_PROFILE_KEY,
};

pub const PROFILE_ENV: &str = "DAYBOOK_PROFILE";

pub struct ProfileDirectory {
    kv: Arc<dyn KeyValueStore>,
    names: Vec<String>,
    selected: Option<String>,
}

impl ProfileDirectory {
    /// Load the directory; empty or corrupt storage yields `[Default]`.
    pub async fn load(kv: Arc<dyn KeyValueStore>) -> Result<Self> {
        let names = match kv.get(PROFILES_KEY).await? {
            Some(raw) => parse_names(&raw),
            None => default_names(),
        };
        let selected = kv
            .get(SELECTED_PROFILE_KEY)
            .await?
            .map(|raw| raw.trim().to_string())
            .filter(|name| !name.is_empty());

        Ok(Self {
            kv,
            names,
            selected,
        })
    }

    /// Profile names in display (insertion) order.
    pub fn list(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|existing| existing == name)
    }

    /// Add a profile. Returns `false` when it already exists.
    pub async fn create(&mut self, name: &str) -> Result<bool> {
        let name = validate_profile_name(name)?;
        if self.contains(&name) {
            return Ok(false);
        }
        self.names.push(name);
        self.persist_names().await?;
        Ok(true)
    }

    /// Hide a profile. The default profile cannot be deleted; that and
    /// unknown names are a no-op returning `false`.
    pub async fn delete(&mut self, name: &str) -> Result<bool> {
        let name = name.trim();
        if is_default_profile(name) || !self.contains(name) {
            return Ok(false);
        }
        self.names.retain(|existing| existing != name);
        self.persist_names().await?;

        if self.selected.as_deref() == Some(name) {
            self.selected = None;
            self.kv.delete(SELECTED_PROFILE_KEY).await?;
        }
        Ok(true)
    }

    /// Last selected profile, falling back to the default.
    pub fn selected(&self) -> &str {
        match self.selected.as_deref() {
            Some(name) if self.contains(name) => name,
            _ => DEFAULT_PROFILE,
        }
    }

    /// Remember `name` as the last used profile.
    pub async fn select(&mut self, name: &str) -> Result<()> {
        let name = name.trim();
        if !self.contains(name) {
            return Err(Error::ProfileNotFound(name.to_string()));
        }
        self.kv.set(SELECTED_PROFILE_KEY, name).await?;
        self.selected = Some(name.to_string());
        Ok(())
    }

    /// Pick the active profile for this invocation.
    pub fn resolve(&self, cli_profile: Option<&str>) -> Result<String> {
        if let Some(name) = non_empty(cli_profile) {
            return self.require(name);
        }
        if let Ok(env_profile) = std::env::var(PROFILE_ENV) {
            if let Some(name) = non_empty(Some(env_profile.as_str())) {
                return self.require(name);
            }
        }
        Ok(self.selected().to_string())
    }

    fn require(&self, name: &str) -> Result<String> {
        if self.contains(name) {
            Ok(name.to_string())
        } else {
            Err(Error::ProfileNotFound(name.to_string()))
        }
    }

    async fn persist_names(&self) -> Result<()> {
        let json = serde_json::to_string(&self.names)?;
        self.kv.set(PROFILES_KEY, &json).await
    }
}

impl std::fmt::Debug for ProfileDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileDirectory")
            .field("names", &self.names)
            .field("selected", &self.selected)
            .finish()
    }
}

fn default_names() -> Vec<String> {
    vec![DEFAULT_PROFILE.to_string()]
}

fn parse_names(raw: &str) -> Vec<String> {
    let parsed: Vec<String> = match serde_json::from_str(raw) {
        Ok(names) => names,
        Err(err) => {
            tracing::warn!(error = %err, "ignoring unparseable profile directory");
            return default_names();
        }
    };

    let mut names: Vec<String> = Vec::with_capacity(parsed.len() + 1);
    for raw_name in parsed {
        let name = match validate_profile_name(&raw_name) {
            Ok(name) => name,
            Err(err) => {
                tracing::warn!(error = %err, "skipping stored profile");
                continue;
            }
        };
        if !names.contains(&name) {
            names.push(name);
        }
    }
    if !names.iter().any(|name| is_default_profile(name)) {
        names.insert(0, DEFAULT_PROFILE.to_string());
    }
    names
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
