//! Stateless worker fleet for LLM-based geologic relationship extraction.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod job;
pub mod llm;
pub mod manager;
pub mod sink;
pub mod weaviate;
pub mod worker;
