//! Wire types for the branch portal API
//!
//! - `common`: entities as the admin client sees them after normalization
//! - `api`: request bodies sent on write endpoints

pub mod api;
pub mod common;
