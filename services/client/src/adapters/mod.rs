pub mod http;
pub mod prefs;

pub use http::HttpCatalogAdapter;
