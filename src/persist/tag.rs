//! Structured tag compounds used for colony persistence
//!
//! A compound is a string-keyed map of typed tags. Lenient getters follow the
//! usual save-format convention of returning a zero value for absent keys,
//! which lets sparse fields (such as an unclaimed work order) be omitted.
//! Strict getters report missing or mistyped keys for callers that must
//! reject incomplete records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::util::vec3::BlockPos;

/// A single tag value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Tag {
    Int(i32),
    Long(i64),
    String(String),
    Compound(TagCompound),
    List(Vec<TagCompound>),
}

impl Tag {
    fn kind(&self) -> &'static str {
        match self {
            Tag::Int(_) => "int",
            Tag::Long(_) => "long",
            Tag::String(_) => "string",
            Tag::Compound(_) => "compound",
            Tag::List(_) => "list",
        }
    }
}

/// Errors from strict tag reads
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TagError {
    #[error("Missing key '{0}'")]
    MissingKey(String),
    #[error("Key '{key}' holds a {found}, expected {expected}")]
    WrongType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// String-keyed map of tags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagCompound {
    entries: BTreeMap<String, Tag>,
}

impl TagCompound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Tag> {
        self.entries.remove(key)
    }

    pub fn set_int(&mut self, key: &str, value: i32) {
        self.entries.insert(key.to_string(), Tag::Int(value));
    }

    pub fn set_long(&mut self, key: &str, value: i64) {
        self.entries.insert(key.to_string(), Tag::Long(value));
    }

    pub fn set_string(&mut self, key: &str, value: impl Into<String>) {
        self.entries.insert(key.to_string(), Tag::String(value.into()));
    }

    pub fn set_compound(&mut self, key: &str, value: TagCompound) {
        self.entries.insert(key.to_string(), Tag::Compound(value));
    }

    pub fn set_list(&mut self, key: &str, value: Vec<TagCompound>) {
        self.entries.insert(key.to_string(), Tag::List(value));
    }

    /// Integer value, or 0 when absent or mistyped
    pub fn get_int(&self, key: &str) -> i32 {
        match self.entries.get(key) {
            Some(Tag::Int(v)) => *v,
            _ => 0,
        }
    }

    /// Long value, or 0 when absent or mistyped
    pub fn get_long(&self, key: &str) -> i64 {
        match self.entries.get(key) {
            Some(Tag::Long(v)) => *v,
            _ => 0,
        }
    }

    /// String value, or "" when absent or mistyped
    pub fn get_string(&self, key: &str) -> &str {
        match self.entries.get(key) {
            Some(Tag::String(v)) => v.as_str(),
            _ => "",
        }
    }

    /// List value, or an empty slice when absent or mistyped
    pub fn get_list(&self, key: &str) -> &[TagCompound] {
        match self.entries.get(key) {
            Some(Tag::List(v)) => v.as_slice(),
            _ => &[],
        }
    }

    pub fn try_get_int(&self, key: &str) -> Result<i32, TagError> {
        match self.require(key)? {
            Tag::Int(v) => Ok(*v),
            other => Err(Self::wrong_type(key, "int", other)),
        }
    }

    pub fn try_get_string(&self, key: &str) -> Result<&str, TagError> {
        match self.require(key)? {
            Tag::String(v) => Ok(v.as_str()),
            other => Err(Self::wrong_type(key, "string", other)),
        }
    }

    pub fn try_get_compound(&self, key: &str) -> Result<&TagCompound, TagError> {
        match self.require(key)? {
            Tag::Compound(v) => Ok(v),
            other => Err(Self::wrong_type(key, "compound", other)),
        }
    }

    /// Store a block position as an `{x, y, z}` compound
    pub fn set_block_pos(&mut self, key: &str, pos: BlockPos) {
        let mut inner = TagCompound::new();
        inner.set_int("x", pos.x);
        inner.set_int("y", pos.y);
        inner.set_int("z", pos.z);
        self.set_compound(key, inner);
    }

    pub fn try_get_block_pos(&self, key: &str) -> Result<BlockPos, TagError> {
        let inner = self.try_get_compound(key)?;
        Ok(BlockPos::new(
            inner.try_get_int("x")?,
            inner.try_get_int("y")?,
            inner.try_get_int("z")?,
        ))
    }

    fn require(&self, key: &str) -> Result<&Tag, TagError> {
        self.entries
            .get(key)
            .ok_or_else(|| TagError::MissingKey(key.to_string()))
    }

    fn wrong_type(key: &str, expected: &'static str, found: &Tag) -> TagError {
        TagError::WrongType {
            key: key.to_string(),
            expected,
            found: found.kind(),
        }
    }
}
