//! # Engine Module
//!
//! This module holds the stateful machinery that sits between the stateless
//! [`crate::core`] layer and the public [`crate::molecular`] API.
//!
//! ## Architecture
//!
//! - **Identity Tables** ([`cache`]) - Weak construct-or-fetch tables that make equal
//!   construction arguments resolve to one shared object
//! - **Configuration** ([`config`]) - Assembly parameters and their validating builder
//! - **Error Handling** ([`error`]) - Error and warning types for units, cages, and records
//! - **Topologies** ([`topology`]) - Polyhedral templates that place and bond units into cages
//!
//! The identity tables are the only process-wide mutable state in the
//! library; everything else here is computed once per construction.

pub mod cache;
pub mod config;
pub mod error;
pub mod topology;
