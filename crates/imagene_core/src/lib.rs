pub mod dna;
pub mod domain;
pub mod genetics;
pub mod ports;
pub mod store;

pub use dna::{encode_dna, intersect_genes, parse_dna, Gene};
pub use domain::{
    FilterCriteria, FilterPatch, GenerationProfile, GenerationRequest, GroupPreview, GroupRef,
    ImageRecord, Keyword, KeywordIndex, SortField, SortOrder,
};
pub use ports::{CatalogService, GenerationService, PortError, PortResult};
pub use store::FilterStore;
