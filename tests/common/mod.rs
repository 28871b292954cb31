//! Shared test utilities for controller, property and integration tests.
//!
//! This module provides:
//! - CouchDB testcontainer setup
//! - Seeding helpers for the in-memory server

#![allow(dead_code)]

pub mod containers;
pub mod fixtures;

pub use containers::*;
pub use fixtures::*;
