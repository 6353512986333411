// SPDX-License-Identifier: Apache-2.0

pub use self::imanifeststore::IManifestStore;
pub use self::memo_manifeststore::ManifestEntry;
pub use self::memo_manifeststore::MemoManifestStore;

mod imanifeststore;
mod memo_manifeststore;
