//! Shared building blocks: static metadata, number formatting and errors.

pub mod error;
pub mod format;
pub mod metadata;
