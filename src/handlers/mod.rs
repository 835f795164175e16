//! Domain handlers plugged into the worker runtime.

pub mod echo;
pub mod map_descriptions;
pub mod paragraphs;

pub use echo::EchoHandler;
pub use map_descriptions::MapDescriptionHandler;
pub use paragraphs::ParagraphHandler;
