//! # Domain Model
//!
//! Core entities for the emulated identity service: pools, users, groups,
//! and app clients. These are plain data types; the behaviour that mutates
//! them lives in [`crate::pool_store`] and [`crate::auth`].

pub mod entities;

pub use entities::*;
