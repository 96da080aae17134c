//! API DTOs module
//!
//! Request bodies for the write endpoints, organized by domain:
//! - `material`: study materials and legacy subjects
//! - `syllabus`: syllabus metadata
//! - `payment`: admin transaction updates

pub mod material;
pub mod payment;
pub mod syllabus;

pub use material::*;
pub use payment::*;
pub use syllabus::*;
