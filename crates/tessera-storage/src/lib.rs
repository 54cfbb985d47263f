//! Tessera Storage — the gateway's three storage tiers.
//!
//! # Tier 1: Cache Key-Value ([`KvStore`])
//!
//! Byte-level `get`/`set`/`delete` over namespaced keys. The production
//! implementation is an in-process [`MemoryKvStore`] backed by `DashMap`;
//! `set` replaces the whole value atomically per key, which is what makes
//! a deploy racing a lookup safe. [`ScopedKvStore`] confines a consumer to
//! a single namespace, the tenant-scoping primitive handed to sandboxed
//! handlers.
//!
//! # Tier 2: Durable Database ([`Database`])
//!
//! Embedded `SurrealDB`, `mem://` for tests and `surrealkv://` on disk. The
//! durable tier is the source of truth for tenants, handler code, file
//! metadata and the audit log; the cache tier is a performance-only
//! derivative.
//!
//! # Tier 3: Object Store ([`ObjectStore`])
//!
//! Binary blobs addressed by storage key: [`MemoryObjectStore`] for tests,
//! [`FsObjectStore`] rooted at a data directory in production.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod db;
pub mod error;
pub mod kv;
pub mod object;

pub use db::Database;
pub use error::{StorageError, StorageResult};
pub use kv::{DbKvStore, KvStore, MemoryKvStore, ScopedKvStore};
pub use object::{FsObjectStore, MemoryObjectStore, ObjectStore, StoredObject};
