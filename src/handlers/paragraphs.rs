//! Paragraph extraction handler.
//!
//! Pulls paragraph text from the vector store by id, extracts relationship
//! triplets with the guided LLM, and posts the batch to the results endpoint
//! (or returns it, for on-demand jobs).

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::{Value, json};
use tokio::sync::OnceCell;

use crate::config::{InferenceConfig, SinkConfig, WeaviateConfig};
use crate::error::HandlerError;
use crate::job::{JobKind, JobPayload, RunMetadata};
use crate::llm::prompts::{PARAGRAPH_PROMPT_ID, paragraph_template};
use crate::llm::{ChatMessage, GuidedLlm};
use crate::sink::{ResultSink, run_payload};
use crate::weaviate::{ParagraphText, WeaviateReader};
use crate::worker::JobHandler;

struct ParagraphCtx {
    llm: GuidedLlm,
    weaviate: WeaviateReader,
    sink: ResultSink,
    template: Vec<ChatMessage>,
}

pub struct ParagraphHandler {
    inference: InferenceConfig,
    weaviate: WeaviateConfig,
    sink: SinkConfig,
    ctx: OnceCell<ParagraphCtx>,
}

impl ParagraphHandler {
    pub fn new(inference: InferenceConfig, weaviate: WeaviateConfig, sink: SinkConfig) -> Self {
        Self {
            inference,
            weaviate,
            sink,
            ctx: OnceCell::new(),
        }
    }

    /// Extract triplets for one paragraph. `None` when the model found
    /// nothing or its output never validated.
    async fn extract_one(
        &self,
        ctx: &ParagraphCtx,
        paragraph: &ParagraphText,
    ) -> Result<Option<Value>, HandlerError> {
        let mut messages = ctx.template.clone();
        messages.push(ChatMessage::user(paragraph.paragraph.clone()));

        let Some(list) = ctx.llm.guided_generate(&messages).await? else {
            return Ok(None);
        };
        if list.triplets.is_empty() {
            return Ok(None);
        }

        Ok(Some(json!({
            "text": {
                "preprocessor_id": paragraph.preprocessor_id,
                "paper_id": paragraph.paper_id,
                "hashed_text": paragraph.hashed_text,
                "weaviate_id": paragraph.weaviate_id,
                "paragraph_text": paragraph.paragraph,
            },
            "relationships": list
                .triplets
                .iter()
                .map(|t| t.to_record())
                .collect::<Vec<_>>(),
        })))
    }
}

#[async_trait]
impl JobHandler for ParagraphHandler {
    fn kind(&self) -> JobKind {
        JobKind::Paragraphs
    }

    async fn startup(&self) -> Result<(), HandlerError> {
        let llm = GuidedLlm::new(&self.inference);
        llm.wait_ready().await;

        let ctx = ParagraphCtx {
            llm,
            weaviate: WeaviateReader::new(self.weaviate.clone()),
            sink: ResultSink::new(&self.sink),
            template: paragraph_template(),
        };
        self.ctx.set(ctx).map_err(|_| HandlerError::Startup {
            kind: JobKind::Paragraphs,
            reason: "context already initialized".into(),
        })?;

        tracing::info!("Ready to accept paragraph jobs");
        Ok(())
    }

    async fn process(
        &self,
        payload: JobPayload,
        run: &RunMetadata,
        need_return: bool,
    ) -> Result<Option<Value>, HandlerError> {
        let JobPayload::Paragraphs(ids) = payload else {
            return Err(HandlerError::UnexpectedPayload { kind: self.kind() });
        };
        let ctx = self.ctx.get().ok_or(HandlerError::NotInitialized {
            kind: self.kind(),
        })?;

        let paragraphs = ctx.weaviate.paragraphs_for_ids(&ids).await?;

        // One request per paragraph, joined as a batch: a hard failure on any
        // item aborts the whole batch.
        let outputs = join_all(
            paragraphs
                .iter()
                .map(|paragraph| self.extract_one(ctx, paragraph)),
        )
        .await;

        let mut records = Vec::new();
        for output in outputs {
            if let Some(record) = output? {
                records.push(record);
            }
        }
        tracing::info!(
            batch = ids.len(),
            extracted = records.len(),
            "Paragraph batch processed"
        );

        if need_return {
            return Ok(Some(run_payload(
                run,
                &self.inference.model_name,
                PARAGRAPH_PROMPT_ID,
                records,
            )));
        }
        if !records.is_empty() {
            let payload = run_payload(run, &self.inference.model_name, PARAGRAPH_PROMPT_ID, records);
            ctx.sink.post(&payload).await?;
        }
        Ok(None)
    }

    async fn shutdown(&self) -> Result<(), HandlerError> {
        tracing::info!("Paragraph handler shut down");
        Ok(())
    }
}
