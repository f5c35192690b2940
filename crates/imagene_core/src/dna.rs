//! crates/imagene_core/src/dna.rs
//!
//! The DNA blob attached to a generated image is the JSON serialization
//! of its gene list: the (key, value, direction) triples the image was
//! generated from. This module owns the blob format and the intersection
//! used to find what a set of selected images has in common.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// One attribute triple from an image's DNA blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gene {
    pub key: String,
    pub value: String,
    /// Same polarity convention as [`crate::domain::Keyword::direction`].
    pub direction: f64,
}

impl Gene {
    pub fn new(key: impl Into<String>, value: impl Into<String>, direction: f64) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            direction,
        }
    }
}

/// Decodes a serialized DNA blob.
pub fn parse_dna(blob: &str) -> Result<Vec<Gene>, serde_json::Error> {
    serde_json::from_str(blob)
}

/// Encodes a gene list into the blob form the backend stores.
pub fn encode_dna(genes: &[Gene]) -> Result<String, serde_json::Error> {
    serde_json::to_string(genes)
}

/// The (key, value) pairs present in *every* list, in the order the
/// first list carries them. An empty input yields an empty result.
pub fn intersect_genes(lists: &[Vec<Gene>]) -> Vec<Gene> {
    let Some((first, rest)) = lists.split_first() else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    first
        .iter()
        .filter(|gene| {
            rest.iter().all(|list| {
                list.iter()
                    .any(|other| other.key == gene.key && other.value == gene.value)
            })
        })
        .filter(|gene| seen.insert((gene.key.clone(), gene.value.clone())))
        .cloned()
        .collect()
}
