//! Save-format primitives

pub mod tag;

pub use tag::{Tag, TagCompound, TagError};
