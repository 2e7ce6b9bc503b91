//! MemGate Core Library
//!
//! This crate provides the fundamental types and error handling shared by
//! the MemGate admission system.
//!
//! # Overview
//!
//! MemGate gates admission of agent-generated memory records into a durable
//! store. Records whose confidence falls in an uncertain band are staged for
//! review; approved records are indexed into the durable store and become
//! queryable with bi-temporal semantics.
//!
//! # Modules
//!
//! - `error` - Error types and result aliases
//! - `id` - Memory record identification

pub mod error;
pub mod id;

pub use error::{Error, Result};
pub use id::MemoryId;
