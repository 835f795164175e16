//! Read-only Weaviate client for paragraph lookups.

use futures::future::join_all;
use secrecy::ExposeSecret;
use serde::Deserialize;
use uuid::Uuid;

use crate::config::WeaviateConfig;
use crate::error::VectorStoreError;

const PARAGRAPH_CLASS: &str = "Paragraph";

/// A stored paragraph and its provenance fields.
#[derive(Debug, Clone, Deserialize)]
pub struct ParagraphText {
    pub preprocessor_id: String,
    pub paper_id: String,
    pub hashed_text: String,
    #[serde(skip)]
    pub weaviate_id: Uuid,
    pub paragraph: String,
}

#[derive(Debug, Deserialize)]
struct ObjectEnvelope {
    id: Uuid,
    properties: ParagraphText,
}

/// Thin reader over the Weaviate REST objects API.
pub struct WeaviateReader {
    http: reqwest::Client,
    config: WeaviateConfig,
}

impl WeaviateReader {
    pub fn new(config: WeaviateConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Fetch the paragraphs for a batch of ids, concurrently. Ids the store
    /// no longer holds are logged and skipped; transport failures abort the
    /// batch.
    pub async fn paragraphs_for_ids(
        &self,
        ids: &[Uuid],
    ) -> Result<Vec<ParagraphText>, VectorStoreError> {
        let fetches = ids.iter().map(|id| self.fetch(*id));
        let mut paragraphs = Vec::with_capacity(ids.len());
        for fetched in join_all(fetches).await {
            if let Some(paragraph) = fetched? {
                paragraphs.push(paragraph);
            }
        }
        Ok(paragraphs)
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<ParagraphText>, VectorStoreError> {
        let url = format!(
            "{}/v1/objects/{PARAGRAPH_CLASS}/{id}",
            self.config.base_url
        );
        let mut request = self.http.get(url);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| VectorStoreError::RequestFailed(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::warn!(%id, "Paragraph not found in vector store");
            return Ok(None);
        }

        let envelope: ObjectEnvelope = response
            .error_for_status()
            .map_err(|e| VectorStoreError::RequestFailed(e.to_string()))?
            .json()
            .await
            .map_err(|e| VectorStoreError::InvalidObject {
                id,
                reason: e.to_string(),
            })?;

        let mut paragraph = envelope.properties;
        paragraph.weaviate_id = envelope.id;
        Ok(Some(paragraph))
    }
}
