use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{ApiResult, PipelineApi};
use crate::error::{Result, TransportError};
use crate::models::{DraftPayload, RunRecord, TopicPreset, TriggerRequest, TriggerResponse};

const USER_AGENT: &str = "pipeline-console/1.0";

/// JSON-over-HTTP transport to the pipeline backend. Every call hits the network.
#[derive(Clone)]
pub struct TransportClient {
    client: Client,
    base_url: String,
}

impl TransportClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(TransportError::from)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue a request and decode the JSON body.
    ///
    /// `Ok(None)` for 204 and for a literal `null` body. Non-success statuses
    /// carry the response text, or the status reason when the body is empty.
    pub async fn request<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> ApiResult<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self
            .client
            .request(method.clone(), &url)
            .header(CONTENT_TYPE, "application/json")
            .header(CACHE_CONTROL, "no-store");

        if let Some(body) = body {
            let bytes = serde_json::to_vec(body)
                .map_err(|e| TransportError::malformed(format!("Failed to encode request: {}", e)))?;
            builder = builder.body(bytes);
        }

        tracing::debug!("{} {}", method, url);
        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = if text.is_empty() {
                status
                    .canonical_reason()
                    .map(str::to_string)
                    .unwrap_or_else(|| status.as_str().to_string())
            } else {
                text
            };
            return Err(TransportError::status(status.as_u16(), message));
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice::<Option<T>>(&bytes).map_err(|e| {
            TransportError::malformed(format!("Malformed response from {}: {}", path, e))
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<Option<T>> {
        self.request::<(), T>(Method::GET, path, None).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> ApiResult<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::POST, path, Some(body)).await
    }
}

/// [`PipelineApi`] backed by the real REST endpoints.
pub struct HttpPipelineApi {
    transport: TransportClient,
}

impl HttpPipelineApi {
    pub fn new(transport: TransportClient) -> Self {
        Self { transport }
    }
}

fn required<T>(value: Option<T>, path: &str) -> ApiResult<T> {
    value.ok_or_else(|| TransportError::malformed(format!("Empty response from {}", path)))
}

#[async_trait]
impl PipelineApi for HttpPipelineApi {
    async fn get_topics(&self) -> ApiResult<Vec<TopicPreset>> {
        Ok(self.transport.get("/topics/").await?.unwrap_or_default())
    }

    async fn upsert_topic(&self, preset: &TopicPreset) -> ApiResult<TopicPreset> {
        required(self.transport.post("/topics/", preset).await?, "/topics/")
    }

    async fn get_runs(&self) -> ApiResult<Vec<RunRecord>> {
        Ok(self.transport.get("/runs/").await?.unwrap_or_default())
    }

    async fn trigger_run(&self, request: &TriggerRequest) -> ApiResult<TriggerResponse> {
        required(self.transport.post("/runs/", request).await?, "/runs/")
    }

    async fn get_latest_draft(&self) -> ApiResult<Option<DraftPayload>> {
        self.transport.get("/runs/latest").await
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};

    use super::*;
    use crate::error::TransportErrorKind;
    use crate::models::RunStatus;

    async fn serve(router: Router) -> TransportClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        TransportClient::new(&format!("http://{}/", addr)).unwrap()
    }

    fn backend() -> Router {
        Router::new()
            .route(
                "/runs/",
                get(|| async {
                    Json(json!([
                        {"id": "r2", "status": "running", "created_at": "2026-01-02T00:00:00Z"},
                        {"id": "r1", "status": "mystery"}
                    ]))
                })
                .post(|Json(body): Json<Value>| async move {
                    let first = body["topics"][0].as_str().unwrap_or_default().to_string();
                    Json(json!({"run_id": first, "status": "queued"}))
                }),
            )
            .route("/runs/latest", get(|| async { Json(Value::Null) }))
            .route(
                "/headers",
                get(|headers: HeaderMap| async move {
                    let ct = headers
                        .get("content-type")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    Json(json!({ "content_type": ct }))
                }),
            )
            .route("/gone", get(|| async { AxumStatus::NO_CONTENT }))
            .route(
                "/offline",
                get(|| async { (AxumStatus::INTERNAL_SERVER_ERROR, "pipeline offline") }),
            )
            .route("/silent", get(|| async { AxumStatus::BAD_GATEWAY }))
            .route("/garbage", get(|| async { (AxumStatus::OK, "not json") }))
            .route("/echo", post(|Json(body): Json<Value>| async move { Json(body) }))
    }

    #[tokio::test]
    async fn sends_json_content_type_and_trims_base_slash() {
        let client = serve(backend()).await;
        assert!(!client.base_url().ends_with('/'));

        let body: Value = client.get("/headers").await.unwrap().unwrap();
        assert_eq!(body["content_type"], "application/json");
    }

    #[tokio::test]
    async fn no_content_and_null_yield_none() {
        let client = serve(backend()).await;
        let gone: Option<Value> = client.get("/gone").await.unwrap();
        assert!(gone.is_none());

        let api = HttpPipelineApi::new(client);
        assert!(api.get_latest_draft().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn error_message_prefers_body_then_status_text() {
        let client = serve(backend()).await;

        let err = client.get::<Value>("/offline").await.unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Status(500));
        assert_eq!(err.message, "pipeline offline");

        let err = client.get::<Value>("/silent").await.unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Status(502));
        assert_eq!(err.message, "Bad Gateway");
    }

    #[tokio::test]
    async fn unparsable_success_body_is_malformed() {
        let client = serve(backend()).await;
        let err = client.get::<Value>("/garbage").await.unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Malformed);
    }

    #[tokio::test]
    async fn posts_json_body() {
        let client = serve(backend()).await;
        let echoed: Value = client
            .post("/echo", &json!({"name": "Weekly AI"}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(echoed["name"], "Weekly AI");
    }

    #[tokio::test]
    async fn typed_endpoints_decode_runs_and_trigger() {
        let api = HttpPipelineApi::new(serve(backend()).await);

        let runs = api.get_runs().await.unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].status, RunStatus::Running);
        assert_eq!(runs[1].status, RunStatus::Other("mystery".to_string()));

        let request = TriggerRequest {
            topics: vec!["AI".to_string()],
            title: "Weekly Brief".to_string(),
            subject: "Fresh".to_string(),
            preheader: None,
            hero_query: None,
            rss_feeds: None,
        };
        let response = api.trigger_run(&request).await.unwrap();
        assert_eq!(response.run_id, "AI");
        assert_eq!(response.status, RunStatus::Queued);
    }

    #[tokio::test]
    async fn unreachable_backend_is_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = TransportClient::new(&format!("http://{}", addr)).unwrap();
        let err = client.get::<Value>("/runs/").await.unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Network);
    }
}
