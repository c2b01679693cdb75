//! Profile Resolver
//!
//! A profile is a named parameter bundle that may extend one parent profile.
//! Resolution walks the chain from the requested profile up to its root with
//! an explicit visited list, then folds the layers from the most distant
//! ancestor down to the entity's own overrides. Each resolution builds a
//! fresh map, so resolving one entity never touches another entity's data.

use crate::error::{RgdError, RgdResult};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Ordered parameter map
pub type Params = Map<String, Value>;

/// Field naming the parent of a profile.
pub const PROFILE_PARENT_FIELD: &str = "extends_profile_ref_str";

/// Field naming the profile an instance uses.
pub const PROFILE_USE_FIELD: &str = "use_profile_ref_str";

/// A named, inheritable parameter bundle
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Profile {
    pub name: String,
    pub extends: Option<String>,
    pub params: Params,
}

impl Profile {
    pub fn new(name: impl Into<String>, params: Params) -> Self {
        Self {
            name: name.into(),
            extends: None,
            params,
        }
    }

    pub fn extending(mut self, parent: impl Into<String>) -> Self {
        self.extends = Some(parent.into());
        self
    }

    /// Read a profile from its JSON object; the parent field is lifted out
    /// of the parameters.
    pub fn from_value(name: &str, value: &Value) -> Self {
        let mut params = value.as_object().cloned().unwrap_or_default();
        let extends = params
            .remove(PROFILE_PARENT_FIELD)
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|s| !s.is_empty());
        Self {
            name: name.to_string(),
            extends,
            params,
        }
    }

    /// JSON object form, parent field included.
    pub fn to_value(&self) -> Value {
        let mut obj = self.params.clone();
        if let Some(parent) = &self.extends {
            obj.insert(PROFILE_PARENT_FIELD.to_string(), Value::String(parent.clone()));
        }
        Value::Object(obj)
    }
}

/// All profiles known to a model, keyed by name
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProfileSet {
    profiles: BTreeMap<String, Profile>,
}

impl ProfileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a `control_profiles_map` object.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let profiles = map
            .iter()
            .map(|(name, value)| (name.clone(), Profile::from_value(name, value)))
            .collect();
        Self { profiles }
    }

    pub fn insert(&mut self, profile: Profile) {
        self.profiles.insert(profile.name.clone(), profile);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.values()
    }

    /// Check every chain for missing parents and cycles.
    pub fn validate(&self) -> RgdResult<()> {
        for name in self.profiles.keys() {
            self.chain(name)?;
        }
        Ok(())
    }

    /// The inheritance chain of `name`, most distant ancestor first.
    pub fn chain(&self, name: &str) -> RgdResult<Vec<&Profile>> {
        let mut visited: Vec<&str> = Vec::new();
        let mut chain: Vec<&Profile> = Vec::new();
        let mut current = name;

        loop {
            if let Some(pos) = visited.iter().position(|v| *v == current) {
                let mut path: Vec<String> = visited[pos..].iter().map(|s| s.to_string()).collect();
                path.push(current.to_string());
                return Err(RgdError::Cycle { path });
            }
            visited.push(current);

            let profile = self.profiles.get(current).ok_or_else(|| match visited.len() {
                1 => RgdError::reference(current, "profile", current, "unknown profile"),
                n => RgdError::reference(
                    visited[n - 2],
                    PROFILE_PARENT_FIELD,
                    current,
                    "unknown parent profile",
                ),
            })?;
            chain.push(profile);

            match profile.extends.as_deref() {
                Some(parent) => current = parent,
                None => break,
            }
        }

        chain.reverse();
        Ok(chain)
    }

    /// Effective parameters of an entity: profile chain layers, then the
    /// entity's own overrides on top.
    pub fn resolve(&self, owner: &str, profile: Option<&str>, overrides: &Params) -> RgdResult<Params> {
        let mut effective = Params::new();

        if let Some(name) = profile {
            if !self.contains(name) {
                return Err(RgdError::reference(
                    owner,
                    PROFILE_USE_FIELD,
                    name,
                    "unknown profile",
                ));
            }
            for layer in self.chain(name)? {
                deep_merge(&mut effective, &layer.params);
            }
        }

        deep_merge(&mut effective, overrides);
        Ok(effective)
    }
}

/// Merge `layer` into `base`. Nested objects merge key by key; anything
/// else in `layer` replaces the value in `base`.
pub fn deep_merge(base: &mut Params, layer: &Params) {
    for (key, value) in layer {
        match (base.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                deep_merge(existing, incoming);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}
