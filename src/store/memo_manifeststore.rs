// SPDX-License-Identifier: Apache-2.0

use super::IManifestStore;
use crate::errors::Error;
use base64::{engine::general_purpose, Engine as _};
use serde::{de, Deserialize, Deserializer};
use std::collections::HashMap;
use std::sync::RwLock;

/// One manifest record: the component identifier it provisions and the
/// opaque pre-encoded manifest body, base64url in the JSON document.
#[derive(Clone, Debug, Deserialize)]
pub struct ManifestEntry {
    #[serde(rename = "component-id", with = "hex")]
    pub component_id: Vec<u8>,

    #[serde(deserialize_with = "from_b64url")]
    pub manifest: Vec<u8>,
}

fn from_b64url<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;

    general_purpose::URL_SAFE_NO_PAD
        .decode(s)
        .map_err(de::Error::custom)
}

/// The store where the active manifests are stashed.  Manifests are indexed
/// by their component identifier.
#[derive(Debug, Default)]
pub struct MemoManifestStore {
    m: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemoManifestStore {
    /// Returns a new empty MemoManifestStore
    pub fn new() -> Self {
        Self {
            m: Default::default(),
        }
    }

    /// Add to an existing (and possibly empty) MemoManifestStore the
    /// manifests loaded from the given JSON document
    pub fn load_json(&mut self, j: &str) -> Result<(), Error> {
        let entries: Vec<ManifestEntry> =
            serde_json::from_str(j).map_err(|e| Error::MalformedMessage(e.to_string()))?;

        for e in entries {
            self.m.write().unwrap().insert(e.component_id, e.manifest);
        }

        Ok(())
    }

    /// Register a single manifest for the given component identifier
    pub fn add(&mut self, component_id: &[u8], manifest: &[u8]) {
        self.m
            .write()
            .unwrap()
            .insert(component_id.to_vec(), manifest.to_vec());
    }
}

impl IManifestStore for MemoManifestStore {
    fn lookup(&self, component_id: &[u8]) -> Option<Vec<u8>> {
        self.m.read().unwrap().get(component_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    const TEST_JSON_MANIFESTS_OK: &str = r#"[
        {
            "component-id": "aabb",
            "manifest": "3q2-7w"
        }
    ]"#;

    const TEST_JSON_MANIFESTS_BAD_B64: &str = r#"[
        {
            "component-id": "aabb",
            "manifest": "not base64url!"
        }
    ]"#;

    #[test]
    fn load_json_and_lookup_ok() {
        let mut s: MemoManifestStore = Default::default();

        s.load_json(TEST_JSON_MANIFESTS_OK).unwrap();

        let m = s.lookup(&hex!("aabb"));
        assert_eq!(m, Some(hex!("deadbeef").to_vec()));
    }

    #[test]
    fn load_json_rejects_bad_manifest_encoding() {
        let mut s = MemoManifestStore::new();

        let r = s.load_json(TEST_JSON_MANIFESTS_BAD_B64);

        assert!(matches!(r, Err(Error::MalformedMessage(_))));
        assert!(s.lookup(&hex!("aabb")).is_none());
    }

    #[test]
    fn lookup_unknown_component_is_none() {
        let s = MemoManifestStore::new();

        assert!(s.lookup(&hex!("0102")).is_none());
    }

    #[test]
    fn add_then_lookup() {
        let mut s = MemoManifestStore::new();

        s.add(&hex!("01"), &hex!("cafe"));

        assert_eq!(s.lookup(&hex!("01")), Some(hex!("cafe").to_vec()));
    }
}
