//! Map description extraction handler.
//!
//! Descriptions come straight off geologic maps, so there is no vector-store
//! lookup. Instead the handler loads lithology and lithology-attribute
//! lexicons at startup and seeds each prompt with the lexemes actually found
//! in the description; descriptions matching nothing are skipped.

use std::path::Path;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::{Value, json};
use tokio::sync::OnceCell;

use crate::config::{InferenceConfig, LexiconConfig, SinkConfig};
use crate::error::HandlerError;
use crate::job::{JobKind, JobPayload, RunMetadata};
use crate::llm::prompts::{MAP_PROMPT_ID, map_template};
use crate::llm::{ChatMessage, GuidedLlm};
use crate::sink::{ResultSink, run_payload};
use crate::worker::JobHandler;

struct MapCtx {
    llm: GuidedLlm,
    sink: ResultSink,
    template: Vec<ChatMessage>,
    liths: Vec<String>,
    lith_atts: Vec<(String, String)>,
}

pub struct MapDescriptionHandler {
    inference: InferenceConfig,
    sink: SinkConfig,
    lexicon: LexiconConfig,
    ctx: OnceCell<MapCtx>,
}

impl MapDescriptionHandler {
    pub fn new(inference: InferenceConfig, sink: SinkConfig, lexicon: LexiconConfig) -> Self {
        Self {
            inference,
            sink,
            lexicon,
            ctx: OnceCell::new(),
        }
    }

    async fn extract_one(
        &self,
        ctx: &MapCtx,
        description: &str,
    ) -> Result<Option<Value>, HandlerError> {
        let Some(prompt) = build_prompt(description, &ctx.liths, &ctx.lith_atts) else {
            // No lexicon matches: skip rather than burn an inference call.
            return Ok(None);
        };

        let mut messages = ctx.template.clone();
        messages.push(ChatMessage::user(prompt));

        let Some(list) = ctx.llm.guided_generate(&messages).await? else {
            return Ok(None);
        };
        if list.triplets.is_empty() {
            return Ok(None);
        }

        Ok(Some(json!({
            "text": { "paragraph_text": description },
            "relationships": list
                .triplets
                .iter()
                .map(|t| t.to_record())
                .collect::<Vec<_>>(),
        })))
    }
}

#[async_trait]
impl JobHandler for MapDescriptionHandler {
    fn kind(&self) -> JobKind {
        JobKind::MapDescriptions
    }

    async fn startup(&self) -> Result<(), HandlerError> {
        let liths = load_single_column(&self.lexicon.liths_path)?;
        let lith_atts = load_pairs(&self.lexicon.lith_atts_path)?;
        tracing::info!(
            liths = liths.len(),
            lith_atts = lith_atts.len(),
            "Loaded lexicons"
        );

        let llm = GuidedLlm::new(&self.inference);
        llm.wait_ready().await;

        let ctx = MapCtx {
            llm,
            sink: ResultSink::new(&self.sink),
            template: map_template(),
            liths,
            lith_atts,
        };
        self.ctx.set(ctx).map_err(|_| HandlerError::Startup {
            kind: JobKind::MapDescriptions,
            reason: "context already initialized".into(),
        })?;

        tracing::info!("Ready to accept map description jobs");
        Ok(())
    }

    async fn process(
        &self,
        payload: JobPayload,
        run: &RunMetadata,
        need_return: bool,
    ) -> Result<Option<Value>, HandlerError> {
        let JobPayload::MapDescriptions(descriptions) = payload else {
            return Err(HandlerError::UnexpectedPayload { kind: self.kind() });
        };
        let ctx = self.ctx.get().ok_or(HandlerError::NotInitialized {
            kind: self.kind(),
        })?;

        let outputs = join_all(
            descriptions
                .iter()
                .map(|description| self.extract_one(ctx, description)),
        )
        .await;

        let mut records = Vec::new();
        for output in outputs {
            if let Some(record) = output? {
                records.push(record);
            }
        }
        tracing::info!(
            batch = descriptions.len(),
            extracted = records.len(),
            "Map description batch processed"
        );

        if need_return {
            return Ok(Some(run_payload(
                run,
                &self.inference.model_name,
                MAP_PROMPT_ID,
                records,
            )));
        }
        if !records.is_empty() {
            let payload = run_payload(run, &self.inference.model_name, MAP_PROMPT_ID, records);
            ctx.sink.post(&payload).await?;
        }
        Ok(None)
    }

    async fn shutdown(&self) -> Result<(), HandlerError> {
        tracing::info!("Map description handler shut down");
        Ok(())
    }
}

/// Build the per-description prompt from lexicon matches. `None` when the
/// description contains no known lithology or attribute.
fn build_prompt(
    description: &str,
    liths: &[String],
    lith_atts: &[(String, String)],
) -> Option<String> {
    let matched_liths: Vec<&str> = liths
        .iter()
        .filter(|l| description.contains(l.as_str()))
        .map(String::as_str)
        .collect();
    let matched_atts: Vec<&(String, String)> = lith_atts
        .iter()
        .filter(|(att, _)| description.contains(att.as_str()))
        .collect();

    if matched_liths.is_empty() && matched_atts.is_empty() {
        return None;
    }

    let mut prompt = format!("Find the relevant triplets in the following text.\n{description}\n");
    if !matched_liths.is_empty() {
        prompt.push_str("Here are relevant lithologies found in the text:\n");
        for lith in matched_liths {
            prompt.push_str(lith);
            prompt.push('\n');
        }
    }
    if !matched_atts.is_empty() {
        prompt.push_str("Here are relevant lithology attributes found in the text:\n");
        for (att, att_type) in matched_atts {
            prompt.push_str(att);
            prompt.push('\t');
            prompt.push_str(att_type);
            prompt.push('\n');
        }
    }
    Some(prompt)
}

/// Load a headerless single-column CSV lexicon.
fn load_single_column(path: impl AsRef<Path>) -> Result<Vec<String>, HandlerError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    let mut values = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(value) = record.get(0) {
            let value = value.trim();
            if !value.is_empty() {
                values.push(value.to_string());
            }
        }
    }
    Ok(values)
}

/// Load a headerless two-column CSV lexicon (lexeme, attribute type).
fn load_pairs(path: impl AsRef<Path>) -> Result<Vec<(String, String)>, HandlerError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut pairs = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let (Some(lexeme), Some(att_type)) = (record.get(0), record.get(1)) {
            let lexeme = lexeme.trim();
            if !lexeme.is_empty() {
                pairs.push((lexeme.to_string(), att_type.trim().to_string()));
            }
        }
    }
    Ok(pairs)
}
