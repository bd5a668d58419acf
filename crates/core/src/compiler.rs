//! Source maps as keyed in the output of the compile service.
//!
//! Runtime maps are stored under `<path>:deployed:<Contract>` and creation maps under
//! `<path>:<Contract>`. Older outputs use keys containing `deployedSourceMap` instead.

use crate::sourcemap::RawSourceMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, btree_map};

const DEPLOYED_SEPARATOR: &str = ":deployed:";
const DEPLOYED_MARKER: &str = "deployedSourceMap";

/// One source map of the compiler output with its key taken apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContractSourceMap<'a> {
    /// The file that defines the contract.
    pub path: &'a str,
    pub contract: &'a str,
    /// Whether the map describes the runtime rather than the creation code.
    pub deployed: bool,
    pub map: &'a RawSourceMap,
}

/// All source maps of a compilation, by key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompilerSourceMaps(BTreeMap<String, RawSourceMap>);

impl CompilerSourceMaps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, map: RawSourceMap) {
        self.0.insert(key.into(), map);
    }

    pub fn get(&self, key: &str) -> Option<&RawSourceMap> {
        self.0.get(key)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, RawSourceMap> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every map whose key could be taken apart, in key order.
    pub fn contracts(&self) -> impl Iterator<Item = ContractSourceMap<'_>> {
        self.0.iter().filter_map(|(key, map)| {
            let parsed = parse_key(key);
            if parsed.is_none() {
                trace!(key, "ignoring unrecognized source map key");
            }
            let (path, contract, deployed) = parsed?;
            Some(ContractSourceMap { path, contract, deployed, map })
        })
    }

    /// The runtime source maps, in key order.
    pub fn deployed(&self) -> impl Iterator<Item = ContractSourceMap<'_>> {
        self.contracts().filter(|contract| contract.deployed)
    }

    /// Returns the runtime source map of `contract`.
    ///
    /// Without a name, the only runtime map is returned, if there is exactly one.
    pub fn deployed_for(&self, contract: Option<&str>) -> Option<ContractSourceMap<'_>> {
        match contract {
            Some(name) => self.deployed().find(|map| map.contract == name),
            None => {
                let mut deployed = self.deployed();
                let first = deployed.next()?;
                deployed.next().is_none().then_some(first)
            }
        }
    }
}

impl FromIterator<(String, RawSourceMap)> for CompilerSourceMaps {
    fn from_iter<I: IntoIterator<Item = (String, RawSourceMap)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Splits a source map key into owning path, contract name and whether it is a runtime map.
pub fn parse_key(key: &str) -> Option<(&str, &str, bool)> {
    if let Some((path, contract)) = key.split_once(DEPLOYED_SEPARATOR) {
        return Some((path, contract, true));
    }
    if key.contains(DEPLOYED_MARKER) {
        let (path, rest) = key.split_once(':').unwrap_or((key, ""));
        let contract =
            rest.split(':').find(|part| !part.is_empty() && *part != DEPLOYED_MARKER).unwrap_or("");
        return Some((path, contract, true));
    }
    key.rsplit_once(':').map(|(path, contract)| (path, contract, false))
}
