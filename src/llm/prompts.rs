//! Prompt library for the extraction handlers.
//!
//! Each prompt set carries a `PROMPT_ID`; result payloads report it as the
//! model version so runs with different prompts are distinguishable
//! downstream.

use crate::llm::ChatMessage;

/// Prompt version for the paragraph extraction prompt set.
pub const PARAGRAPH_PROMPT_ID: u32 = 3;

/// Prompt version for the map description prompt set.
pub const MAP_PROMPT_ID: u32 = 1;

pub const PARAGRAPH_SYSTEM_PROMPT: &str = r#"
You are a geological expert who will be performing analysis on geological papers. Your task is to identify and extract relationship triplets that match any of the following relationships:

    "stratigraphic unit has lithology of"
    "lithology has type of"
    "lithology has grains of"
    "lithology has color of"
    "lithology has bedform of"
    "lithology has sedimentary structure of"

Each extracted relationship must match a relationship in the list above.

Examples of grains:
    Coarse Gravel
    Medium Sand
    Cobble
    Fine Silt

Examples of sedimentary structures:
    algal laminations
    tabular cross beds
    oncolitic

Examples of lithology types:
    ferruginous
    sandy
    carbonaceous

Examples of bedforms:
    mounds
    thickly bedded

Examples of stratigraphic units:
    Pottsville Formation
    Hancock Limestone

For each identified relationship, provide a detailed explanation of your reasoning, and format your findings as a list of objects where each object contains the following keys:

    reasoning: Detail your reasoning behind why the relationship found in the text matches one of the relationships in the shortlist.
    head: Specify the subject of the relationship (should only be one stratigraphic unit or lithologic unit).
    tail: Specify the object of the relationship (should only be one stratigraphic unit or lithologic unit).
    relationship: Cite the specific relationship from the list above that you have identified. The relationship you cite must have an exact match in the list above.

Your output must be in valid json and follow this format:

{
  "reasoning": Explain whether any relevant triplets are found in the text.
  "triplets": A list of triplets, should be empty if no relevant ones are found
}

If there are no relevant relationships found, return an empty list.
"#;

/// Few-shot (user, assistant) pairs appended after the system prompt.
const PARAGRAPH_CONTEXT: [(&str, &str); 2] = [
    (
        "The largest fossil placer known in the Upper Cretaceous rocks of Wyoming was reported \
         to be a channel deposit in sandstone of the Mesaverde Formation exposed at Dugout Creek \
         in Washakie County. In type area consists of light-colored tuffaceous sandstone, thin \
         coal and carbonaceous shale beds, and yellowish to greenish bentonite beds.",
        r#"{
  "reasoning": "The Mesaverde Formation is composed of sandstone, and the described lithologies carry explicit colors.",
  "triplets": [
    {
      "reasoning": "The Mesaverde Formation is identified as a stratigraphic unit composed of sandstone.",
      "head": "Mesaverde Formation",
      "tail": "sandstone",
      "relationship": "stratigraphic unit has lithology of"
    },
    {
      "reasoning": "The text describes 'light-colored tuffaceous sandstone', associating a color with the lithology.",
      "head": "tuffaceous sandstone",
      "tail": "light-colored",
      "relationship": "lithology has color of"
    }
  ]
}"#,
    ),
    (
        "Current designations of the age of the Silurian formations are shown in figure 16. The \
         ages indicated by Rexroad and Nicoll are based on conodont studies, while those of Berry \
         and Boucot rely mainly on brachiopods. No physical evidence exists for a significant \
         hiatus anywhere within or at the base of the Silurian.",
        r#"{
  "reasoning": "The provided text does not mention any lithologies or colors associated with stratigraphic units. It mainly discusses the ages of formations and the methods used to determine them.",
  "triplets": []
}"#,
    ),
];

pub const MAP_SYSTEM_PROMPT: &str = r#"
You are a geological expert who will be performing analysis on geologic map unit descriptions. Your task is to identify and extract relationship triplets that match any of the following relationships:

    "lithology has type of"
    "lithology has grains of"
    "lithology has color of"
    "lithology has bedform of"
    "lithology has sedimentary structure of"

Each extracted relationship must exactly match a relationship in the list above.

For each identified relationship/triplet, provide a detailed explanation of your reasoning, and format your findings as a list of objects where each object contains the following keys:

    reasoning: Detail your reasoning behind why the relationship found in the text matches one of the relationships in the shortlist.
    head: Specify the subject of the relationship (should only be one lithologic unit).
    tail: Specify the object of the relationship.
    relationship: Cite the specific relationship from the list above that you have identified.

Your output must be in valid json and follow this format:

{
  "reasoning": Explain whether any relevant triplets are found in the text.
  "triplets": A list of triplets, should be empty if no relevant ones are found
}

For example:

    "Portage Chute Formation - basal sandstone-shale member; limestone, dolomitic and argillaceous; Surprise Creek Formation - microcrystalline dolomite"

Example triplets:

    limestone lithology has type of dolomitic
    limestone lithology has type of argillaceous
    dolomite lithology has type of microcrystalline

If there are no relevant relationships found, return an empty list.
"#;

/// Build the base paragraph-extraction chat template: system prompt followed
/// by the few-shot exchanges.
pub fn paragraph_template() -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(PARAGRAPH_SYSTEM_PROMPT)];
    for (user, assistant) in PARAGRAPH_CONTEXT {
        messages.push(ChatMessage::user(user));
        messages.push(ChatMessage::assistant(assistant));
    }
    messages
}

/// Base chat template for map descriptions: system prompt only, the per-item
/// prompt is generated dynamically from lexicon matches.
pub fn map_template() -> Vec<ChatMessage> {
    vec![ChatMessage::system(MAP_SYSTEM_PROMPT)]
}
