//! crates/imagene_core/src/store.rs
//!
//! The filter-and-selection store: single source of truth for the current
//! filter criteria, the fetched image collection, the user's selections and
//! the derived group/keyword state for one browsing session.
//!
//! Collaborator failures never escape an operation; they are recorded as the
//! store's last error and the view layer decides how to render them. There is
//! no retry, no request queuing and no cancellation of in-flight fetches:
//! the backend serves a single user at human pace and last-write-wins is
//! acceptable.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::dna::{intersect_genes, parse_dna, Gene};
use crate::domain::{
    FilterCriteria, FilterPatch, GroupPreview, GroupRef, ImageRecord, Keyword, KeywordIndex,
};
use crate::ports::CatalogService;

//=========================================================================================
// FilterStore
//=========================================================================================

pub struct FilterStore {
    catalog: Arc<dyn CatalogService>,

    criteria: FilterCriteria,
    images: Vec<ImageRecord>,
    group_previews: Vec<GroupPreview>,
    /// Keyword source per group id, rebuilt from the previews.
    group_keywords: HashMap<i64, BTreeMap<i64, Keyword>>,
    /// Derived from `group_keywords` and the criteria's group scope.
    keywords_by_key: KeywordIndex,
    selected_images: HashSet<i64>,

    loading: bool,
    last_error: Option<String>,
}

impl FilterStore {
    pub fn new(catalog: Arc<dyn CatalogService>) -> Self {
        Self {
            catalog,
            criteria: FilterCriteria::default(),
            images: Vec::new(),
            group_previews: Vec::new(),
            group_keywords: HashMap::new(),
            keywords_by_key: BTreeMap::new(),
            selected_images: HashSet::new(),
            loading: false,
            last_error: None,
        }
    }

    //-------------------------------------------------------------------------------------
    // Read interface (views hold no copies, they read through these)
    //-------------------------------------------------------------------------------------

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn images(&self) -> &[ImageRecord] {
        &self.images
    }

    pub fn group_previews(&self) -> &[GroupPreview] {
        &self.group_previews
    }

    pub fn keyword_index(&self) -> &KeywordIndex {
        &self.keywords_by_key
    }

    pub fn selected_images(&self) -> &HashSet<i64> {
        &self.selected_images
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    //-------------------------------------------------------------------------------------
    // Criteria and refresh
    //-------------------------------------------------------------------------------------

    /// Merges `patch` into the criteria and refetches. No validation: the
    /// merged criteria are forwarded to the backend as given.
    pub async fn set_criteria(&mut self, patch: FilterPatch) {
        self.criteria.apply(patch);
        self.rebuild_keyword_index();
        self.refresh(None).await;
    }

    /// Fetches with the stored criteria, or a one-off override. On success
    /// the image collection is replaced wholesale and the selection cleared
    /// unconditionally; on failure the previous collection stays as a
    /// stale-but-consistent read.
    pub async fn refresh(&mut self, override_criteria: Option<&FilterCriteria>) {
        self.loading = true;
        self.last_error = None;

        let criteria = match override_criteria {
            Some(criteria) => criteria.clone(),
            None => self.criteria.clone(),
        };
        let result = self.catalog.filter_images(&criteria).await;
        match result {
            Ok(images) => {
                debug!(count = images.len(), "image list refreshed");
                self.images = images;
                self.selected_images.clear();
            }
            Err(err) => {
                warn!(error = %err, "image refresh failed");
                self.last_error = Some(err.to_string());
            }
        }

        self.loading = false;
    }

    /// Reloads the group previews and rebuilds the keyword source and index
    /// from them. A failure is recorded but the previous previews stay.
    pub async fn refresh_group_previews(&mut self) {
        let result = self.catalog.group_previews().await;
        match result {
            Ok(previews) => {
                let mut group_keywords: HashMap<i64, BTreeMap<i64, Keyword>> = HashMap::new();
                for group in &previews {
                    let entry = group_keywords.entry(group.id).or_default();
                    for keyword in &group.keywords {
                        entry.insert(keyword.id, keyword.clone());
                    }
                }
                self.group_keywords = group_keywords;
                self.group_previews = previews;
                self.rebuild_keyword_index();
            }
            Err(err) => {
                warn!(error = %err, "group preview refresh failed");
                self.last_error = Some(err.to_string());
            }
        }
    }

    /// Flips `group_id` in the criteria's group scope, resets the pagination
    /// offset and refetches.
    pub async fn toggle_group(&mut self, group_id: i64) {
        if let Some(position) = self.criteria.group_ids.iter().position(|id| *id == group_id) {
            self.criteria.group_ids.remove(position);
        } else {
            self.criteria.group_ids.push(group_id);
        }
        self.criteria.offset = 0;
        self.rebuild_keyword_index();
        self.refresh(None).await;
    }

    //-------------------------------------------------------------------------------------
    // Selection
    //-------------------------------------------------------------------------------------

    /// Flips membership of `image_id` in the selection. No bounds check: an
    /// id absent from the last fetch dangles until the next refresh clears it.
    pub fn toggle_selection(&mut self, image_id: i64) {
        if !self.selected_images.remove(&image_id) {
            self.selected_images.insert(image_id);
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected_images.clear();
    }

    /// Flips `keyword` in the criteria's keyword selection. Does not refetch
    /// by itself; callers refresh when they are done toggling.
    pub fn toggle_keyword(&mut self, keyword: Keyword) {
        if self.criteria.keywords.remove(&keyword.id).is_none() {
            self.criteria.keywords.insert(keyword.id, keyword);
        }
    }

    //-------------------------------------------------------------------------------------
    // Bulk operations
    //-------------------------------------------------------------------------------------

    /// Deletes the selected images. No-op on an empty selection. On failure
    /// the selection is left intact for a retry by the user.
    pub async fn bulk_delete(&mut self) {
        if self.selected_images.is_empty() {
            return;
        }
        let ids = self.sorted_selection();
        let result = self.catalog.delete_images(&ids).await;
        match result {
            Ok(()) => {
                self.clear_selection();
                self.refresh(None).await;
                self.refresh_group_previews().await;
            }
            Err(err) => {
                warn!(error = %err, "bulk delete failed");
                self.last_error = Some(err.to_string());
            }
        }
    }

    /// Assigns the selected images to `group`. No-op on an empty selection
    /// or a blank group name.
    pub async fn bulk_assign_group(&mut self, group: GroupRef) {
        if self.selected_images.is_empty() || group.is_blank() {
            return;
        }
        let ids = self.sorted_selection();
        let result = self.catalog.assign_group(&group, &ids).await;
        match result {
            Ok(()) => {
                self.clear_selection();
                self.refresh(None).await;
                self.refresh_group_previews().await;
            }
            Err(err) => {
                warn!(error = %err, "group assignment failed");
                self.last_error = Some(err.to_string());
            }
        }
    }

    /// Removes the selected images from the criteria's current groups.
    /// No-op when either the selection or the group scope is empty.
    pub async fn bulk_unassign_group(&mut self) {
        if self.selected_images.is_empty() || self.criteria.group_ids.is_empty() {
            return;
        }
        let group_ids = self.criteria.group_ids.clone();
        let ids = self.sorted_selection();
        let result = self.catalog.unassign_groups(&group_ids, &ids).await;
        match result {
            Ok(()) => {
                self.clear_selection();
                self.refresh(None).await;
                self.refresh_group_previews().await;
            }
            Err(err) => {
                warn!(error = %err, "group unassignment failed");
                self.last_error = Some(err.to_string());
            }
        }
    }

    /// Deletes the currently selected keywords from the catalog, then resets
    /// the keyword selection, the search text and the offset before
    /// refetching. No-op when no keywords are selected.
    pub async fn bulk_delete_keywords(&mut self) {
        if self.criteria.keywords.is_empty() {
            return;
        }
        let keyword_ids: Vec<i64> = self.criteria.keywords.keys().copied().collect();
        let result = self.catalog.delete_keywords(&keyword_ids).await;
        match result {
            Ok(()) => {
                self.criteria.keywords.clear();
                self.criteria.search_value.clear();
                self.criteria.offset = 0;
                self.refresh(None).await;
            }
            Err(err) => {
                warn!(error = %err, "keyword deletion failed");
                self.last_error = Some(err.to_string());
            }
        }
    }

    //-------------------------------------------------------------------------------------
    // Derived state
    //-------------------------------------------------------------------------------------

    /// Rebuilds the keyword index for the current scope: the selected
    /// groups, or every known group when none are selected. Full rebuild
    /// every time, no incremental patching.
    fn rebuild_keyword_index(&mut self) {
        let scope: Vec<i64> = if self.criteria.group_ids.is_empty() {
            self.group_keywords.keys().copied().collect()
        } else {
            self.criteria.group_ids.clone()
        };

        let mut index: KeywordIndex = BTreeMap::new();
        for group_id in scope {
            let Some(keywords) = self.group_keywords.get(&group_id) else {
                continue;
            };
            for keyword in keywords.values() {
                index
                    .entry(keyword.key.clone())
                    .or_default()
                    .insert(keyword.id, keyword.clone());
            }
        }
        self.keywords_by_key = index;
    }

    /// Replaces the keyword selection with the genes every selected image's
    /// DNA has in common. Images whose blob fails to parse are skipped with
    /// a warning. An empty selection or an empty intersection clears the
    /// keyword selection.
    pub fn select_common_dna(&mut self) {
        if self.selected_images.is_empty() {
            self.criteria.keywords.clear();
            return;
        }

        let mut gene_lists: Vec<Vec<Gene>> = Vec::new();
        for image in &self.images {
            if !self.selected_images.contains(&image.id) {
                continue;
            }
            let Some(blob) = image.dna.as_deref() else {
                continue;
            };
            match parse_dna(blob) {
                Ok(genes) => gene_lists.push(genes),
                Err(err) => {
                    warn!(image_id = image.id, error = %err, "skipping undecodable dna blob");
                }
            }
        }

        let common = intersect_genes(&gene_lists);
        self.criteria.keywords.clear();
        for gene in common {
            match self.resolve_keyword(&gene) {
                Some(keyword) => {
                    self.criteria.keywords.insert(keyword.id, keyword);
                }
                None => {
                    debug!(key = %gene.key, value = %gene.value, "common gene has no catalog keyword");
                }
            }
        }
    }

    /// Looks a gene up in the keyword index. Genes without a catalog id
    /// cannot be addressed by keyword operations and are dropped.
    fn resolve_keyword(&self, gene: &Gene) -> Option<Keyword> {
        self.keywords_by_key
            .get(&gene.key)?
            .values()
            .find(|keyword| keyword.value == gene.value)
            .cloned()
    }

    fn sorted_selection(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.selected_images.iter().copied().collect();
        ids.sort_unstable();
        ids
    }
}

//=========================================================================================
// Tests
//=========================================================================================
