//! crates/imagene_core/src/domain.rs
//!
//! Defines the pure, core data structures for the gallery client.
//! These structs are independent of any transport or wire format; the
//! HTTP adapter owns the mapping to the backend's JSON shapes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dna::Gene;

/// Derived index: keyword grouping key -> keywords observed in the
/// current group scope, de-duplicated by keyword id.
pub type KeywordIndex = BTreeMap<String, BTreeMap<i64, Keyword>>;

/// A prompt keyword as the backend stores it.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub id: i64,
    pub key: String,
    pub value: String,
    /// Positive values feed the positive prompt, negative the negative
    /// prompt, zero marks a generation parameter.
    pub direction: f64,
    pub weight: Option<f64>,
}

/// A server-owned image record. The store never mutates one locally,
/// it only replaces whole collections after a backend round-trip.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub id: i64,
    /// Resource path relative to the backend base URL.
    pub url: String,
    pub title: Option<String>,
    pub model: Option<String>,
    pub steps: Option<i64>,
    pub cfg: Option<f64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub seed: Option<i64>,
    /// Serialized gene list, see [`crate::dna`].
    pub dna: Option<String>,
    pub keywords: Vec<Keyword>,
}

/// A lightweight group summary for sidebar display. Rebuilt in full on
/// every preview refresh, never partially patched.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupPreview {
    pub id: i64,
    pub name: String,
    pub item_count: u64,
    pub thumbnails: Vec<ImageRecord>,
    pub keywords: Vec<Keyword>,
}

/// Sort keys the backend understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    Score,
    Steps,
    Cfg,
    Height,
    Width,
    Random,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::Score => "score",
            SortField::Steps => "steps",
            SortField::Cfg => "cfg",
            SortField::Height => "height",
            SortField::Width => "width",
            SortField::Random => "random",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// The current query parameters sent to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCriteria {
    /// Empty means "images outside every group".
    pub group_ids: Vec<i64>,
    /// Comma-delimited token list matched against title and prompt.
    pub search_value: String,
    pub limit: u32,
    pub offset: u32,
    /// The currently selected keywords, keyed by keyword id.
    pub keywords: BTreeMap<i64, Keyword>,
    pub sort_by: Option<SortField>,
    pub sort_order: SortOrder,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            group_ids: Vec::new(),
            search_value: String::new(),
            limit: 1000,
            offset: 0,
            keywords: BTreeMap::new(),
            sort_by: None,
            sort_order: SortOrder::Desc,
        }
    }
}

impl FilterCriteria {
    /// Merges the set fields of `patch` into `self`; unset fields keep
    /// their previous values.
    pub fn apply(&mut self, patch: FilterPatch) {
        if let Some(group_ids) = patch.group_ids {
            self.group_ids = group_ids;
        }
        if let Some(search_value) = patch.search_value {
            self.search_value = search_value;
        }
        if let Some(limit) = patch.limit {
            self.limit = limit;
        }
        if let Some(offset) = patch.offset {
            self.offset = offset;
        }
        if let Some(keywords) = patch.keywords {
            self.keywords = keywords;
        }
        if let Some(sort_by) = patch.sort_by {
            self.sort_by = sort_by;
        }
        if let Some(sort_order) = patch.sort_order {
            self.sort_order = sort_order;
        }
    }
}

/// Partial update for [`FilterCriteria`]. Every field is optional; the
/// store forwards whatever it is given without validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterPatch {
    pub group_ids: Option<Vec<i64>>,
    pub search_value: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub keywords: Option<BTreeMap<i64, Keyword>>,
    /// `Some(None)` clears the sort key.
    pub sort_by: Option<Option<SortField>>,
    pub sort_order: Option<SortOrder>,
}

/// Target of a group assignment: an existing group by id, or a group
/// named on the spot (the backend creates it if needed). Exactly one of
/// the two is always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupRef {
    ById(i64),
    ByName(String),
}

impl GroupRef {
    /// A name of only whitespace addresses nothing; assignment treats it
    /// as a no-op.
    pub fn is_blank(&self) -> bool {
        match self {
            GroupRef::ById(_) => false,
            GroupRef::ByName(name) => name.trim().is_empty(),
        }
    }
}

/// One image-generation request for the generation backend.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub keywords: Vec<Gene>,
    pub group_ids: Vec<i64>,
    pub model: String,
    pub seed: i64,
    pub steps: u32,
    pub cfg: f64,
    pub width: u32,
    pub height: u32,
}

/// Client-side generation defaults. Cached on disk as a JSON blob; any
/// unreadable cache falls back to these defaults field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationProfile {
    pub model: String,
    pub seed_range: (i64, i64),
    pub steps_range: (u32, u32),
    pub cfg_range: (f64, f64),
    /// (width, height) pairs to draw from.
    pub resolution_options: Vec<(u32, u32)>,
    pub positive_prompt_length_range: (usize, usize),
    pub negative_prompt_length_range: (usize, usize),
    /// Fixed `(key:value)` entries, comma-delimited. Empty means the
    /// positive prompt is bred from the current pool instead.
    pub positive_keywords: String,
    /// Fixed comma-delimited values. Empty means the negative prompt is
    /// drawn from the keyword index.
    pub negative_keywords: String,
    /// How many random lexicon genes are spliced into each offspring.
    pub mutation: usize,
    /// Batch size per generation call.
    pub n_gen: usize,
    /// Prompt lexicon: key type -> comma-delimited value lists.
    pub lexicon: BTreeMap<String, Vec<String>>,
}

impl Default for GenerationProfile {
    fn default() -> Self {
        Self {
            model: "stable-diffusion/default".to_string(),
            seed_range: (0, 1_000_000),
            steps_range: (20, 50),
            cfg_range: (5.0, 10.0),
            resolution_options: vec![(768, 1280), (1024, 1024), (1280, 768)],
            positive_prompt_length_range: (1, 30),
            negative_prompt_length_range: (1, 20),
            positive_keywords: String::new(),
            negative_keywords: String::new(),
            mutation: 10,
            n_gen: 2,
            lexicon: BTreeMap::new(),
        }
    }
}
