//! Relationship-triplet extraction data model.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Closed set of relationships the prompts ask the model to extract. The
/// serde names are the exact phrases the model must cite; result payloads
/// carry the short identifier from [`Relationship::ident`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relationship {
    #[serde(rename = "stratigraphic unit has lithology of")]
    StratNameToLith,
    #[serde(rename = "lithology has type of")]
    LithToLithType,
    #[serde(rename = "lithology has grains of")]
    AttGrains,
    #[serde(rename = "lithology has color of")]
    AttColor,
    #[serde(rename = "lithology has bedform of")]
    AttBedform,
    #[serde(rename = "lithology has sedimentary structure of")]
    AttSedStructure,
}

impl Relationship {
    /// Short identifier used in serialized result records.
    pub fn ident(&self) -> &'static str {
        match self {
            Self::StratNameToLith => "strat_name_to_lith",
            Self::LithToLithType => "lith_to_lith_type",
            Self::AttGrains => "att_grains",
            Self::AttColor => "att_color",
            Self::AttBedform => "att_bedform",
            Self::AttSedStructure => "att_sed_structure",
        }
    }
}

/// One extracted relationship with the model's reasoning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Triplet {
    pub reasoning: String,
    pub head: String,
    pub tail: String,
    pub relationship: Relationship,
}

impl Triplet {
    pub fn to_record(&self) -> Value {
        json!({
            "src": self.head,
            "relationship_type": self.relationship.ident(),
            "dst": self.tail,
        })
    }
}

/// The guided-generation output shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripletList {
    pub reasoning: String,
    pub triplets: Vec<Triplet>,
}

impl TripletList {
    /// JSON schema handed to the inference backend for constrained decoding.
    pub fn json_schema() -> Value {
        let relationships: Vec<&str> = [
            "stratigraphic unit has lithology of",
            "lithology has type of",
            "lithology has grains of",
            "lithology has color of",
            "lithology has bedform of",
            "lithology has sedimentary structure of",
        ]
        .to_vec();
        json!({
            "type": "object",
            "properties": {
                "reasoning": { "type": "string" },
                "triplets": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "reasoning": { "type": "string" },
                            "head": { "type": "string" },
                            "tail": { "type": "string" },
                            "relationship": { "type": "string", "enum": relationships },
                        },
                        "required": ["reasoning", "head", "tail", "relationship"],
                    },
                },
            },
            "required": ["reasoning", "triplets"],
        })
    }
}
