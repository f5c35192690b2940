//! crates/imagene_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the gallery client's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to stay independent of the concrete REST transport.

use async_trait::async_trait;

use crate::domain::{FilterCriteria, GenerationRequest, GroupPreview, GroupRef, ImageRecord};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// The store treats every variant identically: record the message, leave
/// the rest of the state untouched.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("backend is unavailable: {0}")]
    Unavailable(String),
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("an unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The catalog backend: fetching, deleting and regrouping images, and
/// pruning keywords. Acknowledgement bodies are ignored.
#[async_trait]
pub trait CatalogService: Send + Sync {
    async fn filter_images(&self, criteria: &FilterCriteria) -> PortResult<Vec<ImageRecord>>;

    async fn group_previews(&self) -> PortResult<Vec<GroupPreview>>;

    async fn delete_images(&self, image_ids: &[i64]) -> PortResult<()>;

    async fn assign_group(&self, group: &GroupRef, image_ids: &[i64]) -> PortResult<()>;

    async fn unassign_groups(&self, group_ids: &[i64], image_ids: &[i64]) -> PortResult<()>;

    async fn delete_keywords(&self, keyword_ids: &[i64]) -> PortResult<()>;
}

/// The image-generation backend.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Submits a batch of generation requests and returns the created
    /// records once the backend has rendered them.
    async fn create_images(&self, batch: &[GenerationRequest]) -> PortResult<Vec<ImageRecord>>;
}
