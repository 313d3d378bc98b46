//! Stream schema and derived index locators.
//!
//! A stream's schema is an ordered list of tag families, each an ordered list
//! of [`TagSpec`]s. From the schema plus its index rules the registry derives
//! [`IndexRuleLocators`]: a per-family map from tag name to the rule covering
//! it, and the set of tag names forming the series identity. The write path
//! consults the locators for every tag of every element, so they are
//! published as an immutable snapshot ([`IndexSchema`]) and swapped whole
//! when the schema changes.
//!
//! Publish-time invariant: `locators.tag_family_rules` has exactly one entry
//! per schema tag family. The batcher refuses to write when the two disagree.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Declared type of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagType {
    Int,
    Str,
    DataBinary,
    IntArray,
    StrArray,
}

/// One tag declaration. `indexed_only` tags are projected into the index and
/// never reach column storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSpec {
    pub name: String,
    pub tag_type: TagType,
    #[serde(default)]
    pub indexed_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFamilySpec {
    pub name: String,
    pub tags: Vec<TagSpec>,
}

/// Registry-distributed definition of one stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSchema {
    pub group: String,
    pub name: String,
    pub tag_families: Vec<TagFamilySpec>,
}

/// The two indexing modes: inverted for term lookup, skipping for
/// block-skipping range filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexRuleType {
    Inverted,
    Skipping,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRule {
    pub rule_id: u32,
    pub rule_type: IndexRuleType,
    #[serde(default)]
    pub analyzer: String,
    #[serde(default)]
    pub no_sort: bool,
}

/// Derived lookup structures the batcher reads per tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRuleLocators {
    /// One map per schema tag family, positionally aligned with it.
    pub tag_family_rules: Vec<HashMap<String, IndexRule>>,
    /// Tag names participating in the series identity.
    pub entity_set: HashSet<String>,
}

/// The atomically published snapshot of a stream's index configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSchema {
    pub locators: IndexRuleLocators,
}
