//! Object storage backends.
//!
//! The [`backend::ObjectStore`] trait abstracts over where bytes physically
//! live.  Implementations include a process-local memory store and a
//! single-file SQLite store.

pub mod backend;
pub mod memory;
pub mod sqlite;
