use serde_json::Value;

use super::decode::{encode_document, ensure_decoded, operations_mut, Document, ModelOutput};
use crate::constants::NUMERIC_FIELDS;
use crate::error::PipelineError;

/// Stage entry point: decode if needed, clamp negative areas and yields to
/// zero and return the re-encoded document.
pub fn remove_negative_values(output: impl Into<ModelOutput>) -> Result<String, PipelineError> {
    let document = ensure_decoded(output.into())?;
    let document = clamp_negative_values(document)?;
    Ok(encode_document(&document))
}

/// Replace every negative number directly under `площадь`, `площадь_по_ПУ`
/// and `вал` with `0`. Missing fields, non-mapping fields and non-numeric
/// values are left alone.
pub fn clamp_negative_values(mut document: Document) -> Result<Document, PipelineError> {
    for operation in operations_mut(&mut document)?.iter_mut() {
        let Value::Object(record) = operation else {
            continue;
        };

        for field in NUMERIC_FIELDS {
            if let Some(Value::Object(values)) = record.get_mut(field) {
                for value in values.values_mut() {
                    if is_negative(value) {
                        *value = Value::from(0);
                    }
                }
            }
        }
    }
    Ok(document)
}

fn is_negative(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.as_f64().is_some_and(|v| v < 0.0),
        _ => false,
    }
}
