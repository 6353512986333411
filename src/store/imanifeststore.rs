// SPDX-License-Identifier: Apache-2.0

/// Interface to the store where installable-package manifests are stashed.
/// Manifests are opaque signed descriptors; the engine only fetches and
/// embeds them, never parses their internals.
pub trait IManifestStore {
    /// Lookup the pre-encoded manifest for the given component identifier.
    fn lookup(&self, component_id: &[u8]) -> Option<Vec<u8>>;
}
