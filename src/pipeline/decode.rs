use once_cell::sync::Lazy;
use serde_json::Value;

use super::rewrite::{apply_rules, compile_rules, CompiledRules};
use crate::constants::OPERATIONS_KEY;
use crate::error::PipelineError;

/// Decoded model output: a JSON object whose `операции` key holds the
/// operation records.
pub type Document = Value;

/// What a post-processing stage can receive: the model's raw text (possibly
/// wrapped in a markdown code fence) or an already decoded document.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    Raw(String),
    Decoded(Document),
}

impl From<String> for ModelOutput {
    fn from(raw: String) -> Self {
        ModelOutput::Raw(raw)
    }
}

impl From<&str> for ModelOutput {
    fn from(raw: &str) -> Self {
        ModelOutput::Raw(raw.to_string())
    }
}

impl From<Value> for ModelOutput {
    fn from(document: Value) -> Self {
        ModelOutput::Decoded(document)
    }
}

// Opening fence with an optional language tag, or a closing fence, each
// anchored to a line boundary.
static FENCE_RULES: Lazy<CompiledRules> =
    Lazy::new(|| compile_rules(&[(r"(?m)^```[A-Za-z]*|```$", "")]));

/// Remove markdown code fences and surrounding whitespace.
pub fn strip_code_fence(raw: &str) -> Result<String, PipelineError> {
    Ok(apply_rules(&FENCE_RULES, raw.trim())?.trim().to_string())
}

/// Strip fencing from the model's text and parse it as JSON.
pub fn decode_output(raw: &str) -> Result<Document, PipelineError> {
    let cleaned = strip_code_fence(raw)?;
    serde_json::from_str(&cleaned).map_err(|e| PipelineError::decode(cleaned, e))
}

/// Normalize either form of model output into a document.
pub fn ensure_decoded(output: ModelOutput) -> Result<Document, PipelineError> {
    match output {
        ModelOutput::Raw(raw) => decode_output(&raw),
        ModelOutput::Decoded(document) => Ok(document),
    }
}

/// Serialize a document for the next stage. Non-ASCII text is written as is.
pub fn encode_document(document: &Document) -> String {
    document.to_string()
}

/// Mutable access to the operation list, inserting an empty one when the key
/// is missing. Anything that is not an object with a list under `операции`
/// is rejected as undecodable.
pub fn operations_mut(document: &mut Document) -> Result<&mut Vec<Value>, PipelineError> {
    let well_formed = matches!(
        &*document,
        Value::Object(map) if matches!(map.get(OPERATIONS_KEY), None | Some(Value::Array(_)))
    );
    if !well_formed {
        return Err(PipelineError::Decode {
            text: encode_document(document),
            source: None,
        });
    }

    match document {
        Value::Object(map) => match map
            .entry(OPERATIONS_KEY)
            .or_insert_with(|| Value::Array(Vec::new()))
        {
            Value::Array(operations) => Ok(operations),
            other => Err(PipelineError::Decode {
                text: encode_document(other),
                source: None,
            }),
        },
        other => Err(PipelineError::Decode {
            text: encode_document(other),
            source: None,
        }),
    }
}
