//! crates/imagene_core/src/genetics.rs
//!
//! Prompt genetics: breeding new generation requests out of the current
//! image pool, the keyword index and a fixed lexicon of prompt keywords.
//! Everything here is pure; callers pass the RNG so tests can seed it.

use std::collections::{BTreeMap, HashSet};

use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;

use crate::dna::Gene;
use crate::domain::{GenerationProfile, GenerationRequest, ImageRecord, KeywordIndex};

/// Which side of the prompt a keyword feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Positive,
    Negative,
}

impl Polarity {
    fn matches_direction(self, direction: f64) -> bool {
        match self {
            Polarity::Positive => direction > 0.0,
            Polarity::Negative => direction < 0.0,
        }
    }

    /// Lexicon entries are keyed by type; only the `negative` key feeds
    /// the negative prompt.
    fn matches_key(self, key: &str) -> bool {
        match self {
            Polarity::Positive => key != "negative",
            Polarity::Negative => key == "negative",
        }
    }
}

/// Flattens a key -> comma-delimited-values map into a gene list.
pub fn flatten_lexicon(raw: &BTreeMap<String, Vec<String>>) -> Vec<Gene> {
    let mut lexicon = Vec::new();
    for (key, entries) in raw {
        let direction = if key == "negative" { -1.0 } else { 1.0 };
        for entry in entries {
            for value in entry.split(',') {
                let value = value.trim();
                if !value.is_empty() {
                    lexicon.push(Gene::new(key.clone(), value, direction));
                }
            }
        }
    }
    lexicon
}

/// Each image's structured keyword list as a gene list, forming the
/// breeding pool.
pub fn dna_pool(images: &[ImageRecord]) -> Vec<Vec<Gene>> {
    images
        .iter()
        .map(|image| {
            image
                .keywords
                .iter()
                .map(|kw| Gene::new(kw.key.clone(), kw.value.clone(), kw.direction))
                .collect()
        })
        .collect()
}

/// Breeds `n_gen` children. Each child combines two random parents with
/// `mutation` random lexicon genes, is shuffled, cut to a jittered mean
/// parent length and de-duplicated.
pub fn offsprings(
    pool: &[Vec<Gene>],
    lexicon: &[Gene],
    mutation: usize,
    n_gen: usize,
    rng: &mut impl Rng,
) -> Vec<Vec<Gene>> {
    let mut children = Vec::with_capacity(n_gen);
    for _ in 0..n_gen {
        let parent_a = pool.choose(rng).map(Vec::as_slice).unwrap_or(&[]);
        let parent_b = pool.choose(rng).map(Vec::as_slice).unwrap_or(&[]);

        let mean = (parent_a.len() + parent_b.len()) / 2;
        let jitter = if mutation == 0 {
            0
        } else {
            rng.random_range(0..mutation as i64) - mutation as i64 / 2
        };
        let target = (mean as i64 + jitter).max(0) as usize;

        let mut child = Vec::with_capacity(parent_a.len() + parent_b.len() + mutation);
        child.extend_from_slice(parent_a);
        child.extend_from_slice(parent_b);
        for _ in 0..mutation {
            if let Some(gene) = lexicon.choose(rng) {
                child.push(gene.clone());
            }
        }
        child.shuffle(rng);
        child.truncate(target);
        dedup_genes(&mut child);
        children.push(child);
    }
    children
}

/// Draws up to `count` keywords of the given polarity from the index,
/// splices in up to `mutation` lexicon genes and shuffles.
pub fn random_keywords(
    index: &KeywordIndex,
    lexicon: &[Gene],
    polarity: Polarity,
    count: usize,
    mutation: usize,
    rng: &mut impl Rng,
) -> Vec<Gene> {
    let mut drawn: Vec<Gene> = index
        .values()
        .flat_map(|by_id| by_id.values())
        .filter(|kw| polarity.matches_direction(kw.direction))
        .map(|kw| Gene::new(kw.key.clone(), kw.value.clone(), kw.direction))
        .collect();
    drawn.shuffle(rng);
    drawn.truncate(count);

    let candidates: Vec<&Gene> = lexicon
        .iter()
        .filter(|gene| polarity.matches_key(&gene.key))
        .collect();
    if !candidates.is_empty() {
        let splice = mutation.min(drawn.len());
        for slot in drawn.iter_mut().take(splice) {
            if let Some(gene) = candidates.choose(rng) {
                *slot = (*gene).clone();
            }
        }
    }
    drawn.shuffle(rng);
    drawn
}

/// Parses fixed positive entries of the form `(key:value), (key:value)`.
/// Entries without a `key:value` core are dropped.
pub fn parse_fixed_positive(spec: &str) -> Vec<Gene> {
    spec.split(',')
        .filter_map(|entry| {
            let inner = entry.trim().trim_start_matches('(').trim_end_matches(')');
            let (key, value) = inner.split_once(':')?;
            let (key, value) = (key.trim(), value.trim());
            if key.is_empty() || value.is_empty() {
                return None;
            }
            Some(Gene::new(key, value, 1.0))
        })
        .collect()
}

/// Parses fixed negative entries: a plain comma-delimited value list.
pub fn parse_fixed_negative(spec: &str) -> Vec<Gene> {
    spec.split(',')
        .filter_map(|entry| {
            let value = entry.trim();
            if value.is_empty() {
                return None;
            }
            Some(Gene::new("negative", value, -1.0))
        })
        .collect()
}

/// Builds a full generation batch: steps, cfg and resolution are drawn
/// once per batch, the seed and the prompts per request. Fixed keyword
/// lists in the profile short-circuit the random draws.
pub fn build_generation_batch(
    profile: &GenerationProfile,
    pool: &[Vec<Gene>],
    index: &KeywordIndex,
    group_ids: &[i64],
    rng: &mut impl Rng,
) -> Vec<GenerationRequest> {
    let lexicon = flatten_lexicon(&profile.lexicon);

    let steps = sample_u32(profile.steps_range, rng);
    let cfg = round_tenth(sample_f64(profile.cfg_range, rng));
    let (width, height) = profile
        .resolution_options
        .choose(rng)
        .copied()
        .unwrap_or((1024, 1024));

    let fixed_positive = parse_fixed_positive(&profile.positive_keywords);
    let positives: Vec<Vec<Gene>> = if fixed_positive.is_empty() {
        offsprings(pool, &lexicon, profile.mutation, profile.n_gen, rng)
    } else {
        vec![fixed_positive; profile.n_gen]
    };
    let fixed_negative = parse_fixed_negative(&profile.negative_keywords);

    positives
        .into_iter()
        .map(|mut positive| {
            let positive_len = sample_usize(profile.positive_prompt_length_range, rng);
            positive.truncate(positive_len);

            let negative = if fixed_negative.is_empty() {
                let negative_len = sample_usize(profile.negative_prompt_length_range, rng);
                random_keywords(
                    index,
                    &lexicon,
                    Polarity::Negative,
                    negative_len,
                    profile.mutation,
                    rng,
                )
            } else {
                fixed_negative.clone()
            };

            let mut keywords = positive;
            keywords.extend(negative);

            GenerationRequest {
                keywords,
                group_ids: group_ids.to_vec(),
                model: profile.model.clone(),
                seed: sample_i64(profile.seed_range, rng),
                steps,
                cfg,
                width,
                height,
            }
        })
        .collect()
}

fn dedup_genes(genes: &mut Vec<Gene>) {
    let mut seen = HashSet::new();
    genes.retain(|gene| seen.insert((gene.key.clone(), gene.value.clone())));
}

fn sample_u32((lo, hi): (u32, u32), rng: &mut impl Rng) -> u32 {
    if lo >= hi {
        lo
    } else {
        rng.random_range(lo..=hi)
    }
}

fn sample_i64((lo, hi): (i64, i64), rng: &mut impl Rng) -> i64 {
    if lo >= hi {
        lo
    } else {
        rng.random_range(lo..=hi)
    }
}

fn sample_usize((lo, hi): (usize, usize), rng: &mut impl Rng) -> usize {
    if lo >= hi {
        lo
    } else {
        rng.random_range(lo..=hi)
    }
}

fn sample_f64((lo, hi): (f64, f64), rng: &mut impl Rng) -> f64 {
    if lo >= hi {
        lo
    } else {
        rng.random_range(lo..=hi)
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
