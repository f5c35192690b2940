//! services/client/src/adapters/http.rs
//!
//! This module contains the HTTP adapter, which is the concrete
//! implementation of the `CatalogService` and `GenerationService` ports
//! from the `core` crate. It handles all interactions with the REST
//! backend using `reqwest`.

use async_trait::async_trait;
use imagene_core::dna::Gene;
use imagene_core::domain::{
    FilterCriteria, GenerationRequest, GroupPreview, GroupRef, ImageRecord, Keyword,
};
use imagene_core::ports::{CatalogService, GenerationService, PortError, PortResult};
use serde::{Deserialize, Serialize};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An HTTP adapter that implements the catalog and generation ports.
#[derive(Clone)]
pub struct HttpCatalogAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCatalogAdapter {
    /// Creates a new `HttpCatalogAdapter` for the given backend base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Posts a payload and ignores the acknowledgement body.
    async fn post_ack<T>(&self, path: &str, payload: &T) -> PortResult<()>
    where
        T: Serialize + ?Sized + Sync,
    {
        let response = self
            .client
            .post(self.endpoint(path))
            .json(payload)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response).await?;
        Ok(())
    }
}

/// Connection failures are reported separately so the view layer can tell
/// "backend down" apart from everything else.
fn transport_error(err: reqwest::Error) -> PortError {
    if err.is_connect() {
        PortError::Unavailable(err.to_string())
    } else {
        PortError::Unexpected(err.to_string())
    }
}

async fn check_status(response: reqwest::Response) -> PortResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(PortError::Rejected(format!("{status}: {body}")))
}

//=========================================================================================
// "Impure" Wire Record Structs
//=========================================================================================

#[derive(Serialize)]
struct KeywordPayload {
    id: i64,
    key: String,
    value: String,
    direction: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    weight: Option<f64>,
}

impl From<&Keyword> for KeywordPayload {
    fn from(keyword: &Keyword) -> Self {
        Self {
            id: keyword.id,
            key: keyword.key.clone(),
            value: keyword.value.clone(),
            direction: keyword.direction,
            weight: keyword.weight,
        }
    }
}

#[derive(Serialize)]
struct FilterPayload {
    group_ids: Vec<i64>,
    search_value: String,
    keywords: Vec<KeywordPayload>,
    limit: u32,
    offset: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    sort_by: Option<&'static str>,
    sort_order: &'static str,
}

impl From<&FilterCriteria> for FilterPayload {
    fn from(criteria: &FilterCriteria) -> Self {
        Self {
            group_ids: criteria.group_ids.clone(),
            search_value: criteria.search_value.clone(),
            keywords: criteria.keywords.values().map(KeywordPayload::from).collect(),
            limit: criteria.limit,
            offset: criteria.offset,
            sort_by: criteria.sort_by.map(|field| field.as_str()),
            sort_order: criteria.sort_order.as_str(),
        }
    }
}

#[derive(Serialize)]
struct AssignGroupPayload<'a> {
    group_id: Option<i64>,
    group_name: Option<&'a str>,
    image_ids: &'a [i64],
}

impl<'a> AssignGroupPayload<'a> {
    fn new(group: &'a GroupRef, image_ids: &'a [i64]) -> Self {
        match group {
            GroupRef::ById(id) => Self {
                group_id: Some(*id),
                group_name: None,
                image_ids,
            },
            GroupRef::ByName(name) => Self {
                group_id: None,
                group_name: Some(name),
                image_ids,
            },
        }
    }
}

#[derive(Serialize)]
struct UnassignGroupPayload<'a> {
    group_ids: &'a [i64],
    image_ids: &'a [i64],
}

#[derive(Serialize)]
struct GenerationPayload<'a> {
    keywords: &'a [Gene],
    group_ids: &'a [i64],
    model: &'a str,
    seed: i64,
    steps: u32,
    cfg: f64,
    width: u32,
    height: u32,
}

impl<'a> From<&'a GenerationRequest> for GenerationPayload<'a> {
    fn from(request: &'a GenerationRequest) -> Self {
        Self {
            keywords: &request.keywords,
            group_ids: &request.group_ids,
            model: &request.model,
            seed: request.seed,
            steps: request.steps,
            cfg: request.cfg,
            width: request.width,
            height: request.height,
        }
    }
}

#[derive(Deserialize)]
struct KeywordRow {
    id: i64,
    key: String,
    value: String,
    direction: f64,
    #[serde(default)]
    weight: Option<f64>,
}

impl KeywordRow {
    fn into_domain(self) -> Keyword {
        Keyword {
            id: self.id,
            key: self.key,
            value: self.value,
            direction: self.direction,
            weight: self.weight,
        }
    }
}

#[derive(Deserialize)]
struct ImageRow {
    id: i64,
    url: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    steps: Option<i64>,
    #[serde(default)]
    cfg: Option<f64>,
    #[serde(default)]
    width: Option<i64>,
    #[serde(default)]
    height: Option<i64>,
    #[serde(default)]
    seed: Option<i64>,
    #[serde(default)]
    dna: Option<String>,
    #[serde(default)]
    keywords: Vec<KeywordRow>,
}

impl ImageRow {
    fn into_domain(self) -> ImageRecord {
        ImageRecord {
            id: self.id,
            url: self.url,
            title: self.title,
            model: self.model,
            steps: self.steps,
            cfg: self.cfg,
            width: self.width,
            height: self.height,
            seed: self.seed,
            dna: self.dna,
            keywords: self.keywords.into_iter().map(KeywordRow::into_domain).collect(),
        }
    }
}

#[derive(Deserialize)]
struct GroupPreviewRow {
    id: i64,
    name: String,
    #[serde(default)]
    item_count: u64,
    #[serde(default)]
    thumbnails: Vec<ImageRow>,
    #[serde(default)]
    keywords: Vec<KeywordRow>,
}

impl GroupPreviewRow {
    fn into_domain(self) -> GroupPreview {
        GroupPreview {
            id: self.id,
            name: self.name,
            item_count: self.item_count,
            thumbnails: self.thumbnails.into_iter().map(ImageRow::into_domain).collect(),
            keywords: self.keywords.into_iter().map(KeywordRow::into_domain).collect(),
        }
    }
}

//=========================================================================================
// Port Implementations
//=========================================================================================

#[async_trait]
impl CatalogService for HttpCatalogAdapter {
    async fn filter_images(&self, criteria: &FilterCriteria) -> PortResult<Vec<ImageRecord>> {
        let response = self
            .client
            .post(self.endpoint("/images/filter"))
            .json(&FilterPayload::from(criteria))
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;
        let rows: Vec<ImageRow> = response.json().await.map_err(transport_error)?;
        Ok(rows.into_iter().map(ImageRow::into_domain).collect())
    }

    async fn group_previews(&self) -> PortResult<Vec<GroupPreview>> {
        let response = self
            .client
            .get(self.endpoint("/images/get-group-preview-batch"))
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;
        let rows: Vec<GroupPreviewRow> = response.json().await.map_err(transport_error)?;
        Ok(rows.into_iter().map(GroupPreviewRow::into_domain).collect())
    }

    async fn delete_images(&self, image_ids: &[i64]) -> PortResult<()> {
        self.post_ack("/images/delete-batch", image_ids).await
    }

    async fn assign_group(&self, group: &GroupRef, image_ids: &[i64]) -> PortResult<()> {
        let payload = AssignGroupPayload::new(group, image_ids);
        self.post_ack("/images/set-group-batch", &payload).await
    }

    async fn unassign_groups(&self, group_ids: &[i64], image_ids: &[i64]) -> PortResult<()> {
        let payload = UnassignGroupPayload {
            group_ids,
            image_ids,
        };
        self.post_ack("/images/unset-group-batch", &payload).await
    }

    async fn delete_keywords(&self, keyword_ids: &[i64]) -> PortResult<()> {
        self.post_ack("/keywords/delete-batch", keyword_ids).await
    }
}

#[async_trait]
impl GenerationService for HttpCatalogAdapter {
    async fn create_images(&self, batch: &[GenerationRequest]) -> PortResult<Vec<ImageRecord>> {
        let payload: Vec<GenerationPayload<'_>> =
            batch.iter().map(GenerationPayload::from).collect();
        let response = self
            .client
            .post(self.endpoint("/images/create-batch"))
            .json(&payload)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;
        let rows: Vec<ImageRow> = response.json().await.map_err(transport_error)?;
        Ok(rows.into_iter().map(ImageRow::into_domain).collect())
    }
}

//=========================================================================================
// Tests
//=========================================================================================

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::Uri;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};

    use super::*;

    /// Requests seen by the mock backend: (path, body).
    #[derive(Clone, Default)]
    struct Recorded {
        requests: Arc<Mutex<Vec<(String, Value)>>>,
    }

    impl Recorded {
        fn push(&self, path: &str, body: Value) {
            self.requests.lock().unwrap().push((path.to_string(), body));
        }

        fn take(&self) -> Vec<(String, Value)> {
            self.requests.lock().unwrap().clone()
        }
    }

    async fn filter_handler(State(recorded): State<Recorded>, Json(body): Json<Value>) -> Json<Value> {
        recorded.push("/images/filter", body);
        Json(json!([
            {
                "id": 1,
                "url": "images/1.png",
                "steps": 30,
                "dna": "[]",
                "keywords": [
                    {"id": 9, "key": "style", "value": "noir", "direction": 1.0, "weight": 1.2}
                ]
            }
        ]))
    }

    async fn previews_handler(State(recorded): State<Recorded>) -> Json<Value> {
        recorded.push("/images/get-group-preview-batch", Value::Null);
        Json(json!([
            {
                "id": 4,
                "name": "favorites",
                "item_count": 12,
                "thumbnails": [{"id": 1, "url": "images/1.png"}],
                "keywords": [{"id": 9, "key": "style", "value": "noir", "direction": 1.0}]
            }
        ]))
    }

    async fn create_handler(State(recorded): State<Recorded>, Json(body): Json<Value>) -> Json<Value> {
        recorded.push("/images/create-batch", body);
        Json(json!([{"id": 7, "url": "images/7.png"}]))
    }

    /// Every acknowledgement-style route shares this recorder.
    async fn ack_handler(
        State(recorded): State<Recorded>,
        uri: Uri,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        recorded.push(uri.path(), body);
        Json(json!("ok"))
    }

    /// Spawn the mock backend on an ephemeral port.
    /// Keep the shutdown handle alive for the duration of the test.
    async fn spawn_backend(app: Router) -> (String, tokio::sync::oneshot::Sender<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await
                .unwrap();
        });
        (format!("http://127.0.0.1:{port}"), tx)
    }

    async fn spawn_catalog_backend() -> (String, Recorded, tokio::sync::oneshot::Sender<()>) {
        let recorded = Recorded::default();
        let app = Router::new()
            .route("/images/filter", post(filter_handler))
            .route("/images/get-group-preview-batch", get(previews_handler))
            .route("/images/create-batch", post(create_handler))
            .route("/images/delete-batch", post(ack_handler))
            .route("/images/set-group-batch", post(ack_handler))
            .route("/images/unset-group-batch", post(ack_handler))
            .route("/keywords/delete-batch", post(ack_handler))
            .with_state(recorded.clone());
        let (base_url, shutdown) = spawn_backend(app).await;
        (base_url, recorded, shutdown)
    }

    // -- request and response mapping --

    #[tokio::test]
    async fn filter_posts_criteria_and_parses_rows() {
        let (base_url, recorded, _shutdown) = spawn_catalog_backend().await;
        let adapter = HttpCatalogAdapter::new(base_url);

        let criteria = FilterCriteria {
            search_value: "cat".to_string(),
            ..FilterCriteria::default()
        };
        let images = adapter.filter_images(&criteria).await.unwrap();

        let (path, body) = recorded.take().remove(0);
        assert_eq!(path, "/images/filter");
        assert_eq!(
            body,
            json!({
                "group_ids": [],
                "search_value": "cat",
                "keywords": [],
                "limit": 1000,
                "offset": 0,
                "sort_order": "desc"
            })
        );

        assert_eq!(images.len(), 1);
        assert_eq!(images[0].id, 1);
        assert_eq!(images[0].steps, Some(30));
        assert_eq!(images[0].keywords[0].value, "noir");
        assert_eq!(images[0].keywords[0].weight, Some(1.2));
    }

    #[tokio::test]
    async fn selected_keywords_travel_with_the_criteria() {
        let (base_url, recorded, _shutdown) = spawn_catalog_backend().await;
        let adapter = HttpCatalogAdapter::new(base_url);

        let mut criteria = FilterCriteria::default();
        criteria.keywords.insert(
            9,
            Keyword {
                id: 9,
                key: "style".to_string(),
                value: "noir".to_string(),
                direction: 1.0,
                weight: None,
            },
        );
        adapter.filter_images(&criteria).await.unwrap();

        let (_, body) = recorded.take().remove(0);
        assert_eq!(
            body["keywords"],
            json!([{"id": 9, "key": "style", "value": "noir", "direction": 1.0}])
        );
    }

    #[tokio::test]
    async fn group_previews_parse_embedded_keywords() {
        let (base_url, _recorded, _shutdown) = spawn_catalog_backend().await;
        let adapter = HttpCatalogAdapter::new(base_url);

        let previews = adapter.group_previews().await.unwrap();

        assert_eq!(previews.len(), 1);
        assert_eq!(previews[0].name, "favorites");
        assert_eq!(previews[0].item_count, 12);
        assert_eq!(previews[0].thumbnails[0].url, "images/1.png");
        assert_eq!(previews[0].keywords[0].key, "style");
    }

    #[tokio::test]
    async fn delete_posts_a_bare_id_list() {
        let (base_url, recorded, _shutdown) = spawn_catalog_backend().await;
        let adapter = HttpCatalogAdapter::new(base_url);

        adapter.delete_images(&[1, 2, 3]).await.unwrap();

        let (path, body) = recorded.take().remove(0);
        assert_eq!(path, "/images/delete-batch");
        assert_eq!(body, json!([1, 2, 3]));
    }

    #[tokio::test]
    async fn assign_by_id_and_by_name_use_the_dual_wire_shape() {
        let (base_url, recorded, _shutdown) = spawn_catalog_backend().await;
        let adapter = HttpCatalogAdapter::new(base_url);

        adapter.assign_group(&GroupRef::ById(4), &[1]).await.unwrap();
        adapter
            .assign_group(&GroupRef::ByName("favorites".to_string()), &[2])
            .await
            .unwrap();

        let requests = recorded.take();
        assert_eq!(
            requests[0].1,
            json!({"group_id": 4, "group_name": null, "image_ids": [1]})
        );
        assert_eq!(
            requests[1].1,
            json!({"group_id": null, "group_name": "favorites", "image_ids": [2]})
        );
    }

    #[tokio::test]
    async fn unassign_posts_both_id_lists() {
        let (base_url, recorded, _shutdown) = spawn_catalog_backend().await;
        let adapter = HttpCatalogAdapter::new(base_url);

        adapter.unassign_groups(&[4, 5], &[1, 2]).await.unwrap();

        let (path, body) = recorded.take().remove(0);
        assert_eq!(path, "/images/unset-group-batch");
        assert_eq!(body, json!({"group_ids": [4, 5], "image_ids": [1, 2]}));
    }

    #[tokio::test]
    async fn keyword_deletion_posts_a_bare_id_list() {
        let (base_url, recorded, _shutdown) = spawn_catalog_backend().await;
        let adapter = HttpCatalogAdapter::new(base_url);

        adapter.delete_keywords(&[9, 11]).await.unwrap();

        let (path, body) = recorded.take().remove(0);
        assert_eq!(path, "/keywords/delete-batch");
        assert_eq!(body, json!([9, 11]));
    }

    #[tokio::test]
    async fn create_images_posts_the_batch_and_parses_rows() {
        let (base_url, recorded, _shutdown) = spawn_catalog_backend().await;
        let adapter = HttpCatalogAdapter::new(base_url);

        let request = GenerationRequest {
            keywords: vec![Gene::new("style", "noir", 1.0)],
            group_ids: vec![4],
            model: "stable-diffusion/default".to_string(),
            seed: 1234,
            steps: 30,
            cfg: 7.5,
            width: 1024,
            height: 1024,
        };
        let created = adapter.create_images(&[request]).await.unwrap();

        let (path, body) = recorded.take().remove(0);
        assert_eq!(path, "/images/create-batch");
        assert_eq!(body[0]["model"], "stable-diffusion/default");
        assert_eq!(body[0]["keywords"][0]["value"], "noir");
        assert_eq!(created[0].id, 7);
    }

    // -- error mapping --

    #[tokio::test]
    async fn non_success_status_maps_to_rejected() {
        let app = Router::new().route(
            "/images/delete-batch",
            post(|| async {
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "keyword in use",
                )
            }),
        );
        let (base_url, _shutdown) = spawn_backend(app).await;
        let adapter = HttpCatalogAdapter::new(base_url);

        let err = adapter.delete_images(&[1]).await.unwrap_err();

        match err {
            PortError::Rejected(message) => {
                assert!(message.contains("500"));
                assert!(message.contains("keyword in use"));
            }
            other => panic!("expected Rejected, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn connection_refused_maps_to_unavailable() {
        // Port 1 is reserved and nothing listens on it.
        let adapter = HttpCatalogAdapter::new("http://127.0.0.1:1");

        let err = adapter.group_previews().await.unwrap_err();

        assert!(matches!(err, PortError::Unavailable(_)));
    }

    #[tokio::test]
    async fn trailing_slash_in_base_url_is_tolerated() {
        let (base_url, recorded, _shutdown) = spawn_catalog_backend().await;
        let adapter = HttpCatalogAdapter::new(format!("{base_url}/"));

        adapter.delete_images(&[1]).await.unwrap();

        let (path, _) = recorded.take().remove(0);
        assert_eq!(path, "/images/delete-batch");
    }
}
