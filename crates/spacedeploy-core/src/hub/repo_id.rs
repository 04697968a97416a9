//! `owner/name` repository identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoId {
    owner: String,
    name: String,
}

impl RepoId {
    pub fn new(owner: &str, name: &str) -> anyhow::Result<Self> {
        for part in [owner, name] {
            if part.is_empty() {
                anyhow::bail!("Repository id parts must not be empty: {}/{}", owner, name);
            }
            if let Some(bad) = part
                .chars()
                .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
            {
                anyhow::bail!(
                    "Invalid character '{}' in repository id: {}/{}",
                    bad,
                    owner,
                    name
                );
            }
            if part == "." || part == ".." {
                anyhow::bail!("Invalid repository id: {}/{}", owner, name);
            }
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl FromStr for RepoId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (owner, name) = s
            .split_once('/')
            .ok_or_else(|| anyhow::anyhow!("Repository id must look like owner/name: {}", s))?;
        if name.contains('/') {
            anyhow::bail!("Repository id must contain exactly one '/': {}", s);
        }
        Self::new(owner, name)
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl<'de> Deserialize<'de> for RepoId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
