//! Digest maps and their on-disk snapshots.

pub mod digest_map;
pub mod store;

pub use digest_map::DigestMap;
pub use store::SnapshotStore;
