//! Target-bone → source-bone association.
//!
//! A mapping is a partial injective function over bone names: each target
//! bone copies at most one source bone, and no source bone drives two
//! targets. Target bones absent from the mapping are left untouched.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::error::RetargetError;
use crate::skeleton::Skeleton;
use crate::Result;

/// Serialises as a plain `{ "target": "source" }` object; loading goes
/// through [`BoneMapping::insert`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "HashMap<String, String>",
    into = "HashMap<String, String>"
)]
pub struct BoneMapping {
    /// target name → source name
    entries: HashMap<String, String>,
}

impl BoneMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `target` onto `source`. Re-mapping a target, or reusing a source
    /// for a second target, is rejected.
    pub fn insert(&mut self, target: impl Into<String>, source: impl Into<String>) -> Result<()> {
        let target = target.into();
        let source = source.into();
        if let Some(existing) = self.entries.get(&target) {
            return Err(RetargetError::InvalidMapping {
                reason: format!("target '{target}' already maps to '{existing}'"),
            });
        }
        if let Some((other, _)) = self.entries.iter().find(|(_, s)| **s == source) {
            return Err(RetargetError::InvalidMapping {
                reason: format!("source '{source}' already drives '{other}'"),
            });
        }
        self.entries.insert(target, source);
        Ok(())
    }

    pub fn with(mut self, target: impl Into<String>, source: impl Into<String>) -> Result<Self> {
        self.insert(target, source)?;
        Ok(self)
    }

    /// Build from `(bone name, origin tag)` pairs, skipping untagged bones.
    pub fn from_origin_tags<I, N, T>(tags: I) -> Result<Self>
    where
        I: IntoIterator<Item = (N, Option<T>)>,
        N: Into<String>,
        T: Into<String>,
    {
        let mut mapping = Self::new();
        for (name, tag) in tags {
            if let Some(origin) = tag {
                mapping.insert(name, origin)?;
            }
        }
        Ok(mapping)
    }

    /// Map every bone of `target` onto the equally named bone of `source`.
    /// Target bones with no namesake are left unmapped.
    pub fn by_name(target: &Skeleton, source: &Skeleton) -> Self {
        let entries = target
            .bones()
            .iter()
            .filter(|b| source.find(&b.name).is_some())
            .map(|b| (b.name.clone(), b.name.clone()))
            .collect();
        Self { entries }
    }

    pub fn source_for(&self, target: &str) -> Option<&str> {
        self.entries.get(target).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(t, s)| (t.as_str(), s.as_str()))
    }

    /// Check that every target name exists on `target`.
    pub fn validate_targets(&self, target: &Skeleton) -> Result<()> {
        let mut missing: Vec<&str> = self
            .entries
            .keys()
            .filter(|name| target.find(name).is_none())
            .map(String::as_str)
            .collect();
        missing.sort_unstable();
        match missing.first() {
            Some(bone) => Err(RetargetError::UnresolvedBoneMapping {
                bone: (*bone).to_string(),
            }),
            None => Ok(()),
        }
    }
}

impl TryFrom<HashMap<String, String>> for BoneMapping {
    type Error = RetargetError;

    fn try_from(entries: HashMap<String, String>) -> Result<Self> {
        let mut pairs: Vec<_> = entries.into_iter().collect();
        pairs.sort();
        let mut mapping = Self::new();
        for (target, source) in pairs {
            mapping.insert(target, source)?;
        }
        Ok(mapping)
    }
}

impl From<BoneMapping> for HashMap<String, String> {
    fn from(mapping: BoneMapping) -> Self {
        mapping.entries
    }
}
