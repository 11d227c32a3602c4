//! Pinecone vector store over the REST data plane.
//!
//! Uses `/vectors/upsert`, `/query` and `/vectors/delete` on the index host
//! with the `Api-Key` header. Upserts are split into batches.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{ChunkMetadata, IndexEntry, IndexResult, QueryMatch, VectorStore, check_dimension};
use crate::config::IndexConfig;
use crate::error::IndexError;

pub struct PineconeStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    namespace: String,
    dimension: usize,
    batch_size: usize,
}

impl std::fmt::Debug for PineconeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PineconeStore")
            .field("base_url", &self.base_url)
            .field("namespace", &self.namespace)
            .field("dimension", &self.dimension)
            .finish()
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

#[derive(Serialize)]
struct UpsertVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: &'a ChunkMetadata,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<UpsertVector<'a>>,
    #[serde(skip_serializing_if = "str::is_empty")]
    namespace: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
    #[serde(skip_serializing_if = "str::is_empty")]
    namespace: &'a str,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<RemoteMatch>,
}

#[derive(Deserialize)]
struct RemoteMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<ChunkMetadata>,
}

fn document_filter(document_id: &str) -> Value {
    json!({ "document_id": { "$eq": document_id } })
}

impl PineconeStore {
    /// Build a client for the configured index host.
    pub fn from_config(config: &IndexConfig) -> IndexResult<Self> {
        let pinecone = &config.pinecone;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(pinecone.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: normalize_host(&pinecone.host),
            api_key: pinecone.api_key.clone(),
            namespace: pinecone.namespace.clone(),
            dimension: config.dimension,
            batch_size: config.upsert_batch_size.max(1),
        })
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> IndexResult<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .header("Api-Key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::Remote {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn delete_with(&self, mut body: Value) -> IndexResult<()> {
        if !self.namespace.is_empty() {
            body["namespace"] = Value::String(self.namespace.clone());
        }
        match self.post("/vectors/delete", &body).await {
            Ok(_) => Ok(()),
            // An absent namespace has nothing to delete
            Err(IndexError::Remote { status: 404, .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl VectorStore for PineconeStore {
    fn backend(&self) -> &'static str {
        "pinecone"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn upsert(&self, entries: &[IndexEntry]) -> IndexResult<usize> {
        for entry in entries {
            check_dimension(&entry.vector, self.dimension)?;
        }

        let mut stored = 0;
        for batch in entries.chunks(self.batch_size) {
            let request = UpsertRequest {
                vectors: batch
                    .iter()
                    .map(|entry| UpsertVector {
                        id: &entry.id,
                        values: &entry.vector,
                        metadata: &entry.metadata,
                    })
                    .collect(),
                namespace: &self.namespace,
            };

            let response: UpsertResponse =
                self.post("/vectors/upsert", &request).await?.json().await?;
            stored += response.upserted_count.unwrap_or(batch.len());
        }

        tracing::debug!(target: "index", "upserted {stored} vectors to pinecone");
        Ok(stored)
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        document_id: Option<&str>,
    ) -> IndexResult<Vec<QueryMatch>> {
        check_dimension(vector, self.dimension)?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let request = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            filter: document_id.map(document_filter),
            namespace: &self.namespace,
        };

        let response: QueryResponse = self.post("/query", &request).await?.json().await?;

        // Matches without metadata carry no text to answer from
        let matches: Vec<QueryMatch> = response
            .matches
            .into_iter()
            .filter_map(|m| {
                m.metadata.map(|metadata| QueryMatch {
                    id: m.id,
                    score: m.score,
                    metadata,
                })
            })
            .collect();

        tracing::debug!(
            target: "index",
            "pinecone query returned {} matches (filter: {document_id:?})",
            matches.len()
        );
        Ok(matches)
    }

    async fn delete(&self, document_id: &str) -> IndexResult<()> {
        self.delete_with(json!({ "filter": document_filter(document_id) }))
            .await
    }

    async fn clear_all(&self) -> IndexResult<()> {
        self.delete_with(json!({ "deleteAll": true })).await?;
        tracing::info!(target: "index", "cleared pinecone index {}", self.base_url);
        Ok(())
    }

    async fn count(&self, _document_id: Option<&str>) -> IndexResult<usize> {
        Err(IndexError::Unsupported {
            backend: "pinecone",
            operation: "count",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_host() {
        assert_eq!(
            normalize_host("idx-abc.svc.pinecone.io"),
            "https://idx-abc.svc.pinecone.io"
        );
        assert_eq!(
            normalize_host("http://localhost:5080/"),
            "http://localhost:5080"
        );
    }

    #[test]
    fn test_query_request_shape() {
        let vector = [0.5, 0.25];
        let request = QueryRequest {
            vector: &vector,
            top_k: 8,
            include_metadata: true,
            filter: Some(document_filter("doc1")),
            namespace: "",
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["topK"], 8);
        assert_eq!(json["includeMetadata"], true);
        assert_eq!(json["filter"]["document_id"]["$eq"], "doc1");
        assert!(json.get("namespace").is_none());
    }
}
