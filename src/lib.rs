//! Remote GATT database discovery and caching.
//!
//! A Bluetooth LE client learns the shape of a peer's attribute table one
//! request/response round trip at a time. [`gatt::DbBuilder`] assembles the
//! partial discovery results into a [`gatt::Db`], the ordered
//! service/characteristic/descriptor hierarchy, while telling the caller
//! which handle range to request next. A finished database can be flattened
//! into [`gatt::StoredAttribute`] records and persisted across connections
//! via [`store::CacheStore`].
//!
//! This crate models the attribute table only. The ATT transport that
//! actually exchanges PDUs with the peer, and the per-connection lifecycle
//! that owns one builder per peer, are external collaborators.

#![warn(missing_debug_implementations)]
#![warn(non_ascii_idents)]
#![warn(single_use_lifetimes)]
#![warn(unused_crate_dependencies)]
#![warn(unused_extern_crates)]
#![warn(unused_import_braces)]
#![warn(unused_lifetimes)]
#![warn(unused_qualifications)]
#![warn(clippy::pedantic)]
#![allow(clippy::enum_glob_use)]
#![allow(clippy::inline_always)]
#![allow(clippy::module_name_repetitions)]

pub use crate::uuid::{Uuid, Uuid16};

pub mod att;
pub mod gatt;
#[cfg(feature = "fs")]
pub mod store;
mod uuid;
