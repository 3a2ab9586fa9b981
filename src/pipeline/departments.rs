//! Department fan-out and the АОР subdivision default.
//!
//! The model reports an operation done in several departments as one record
//! with `отделение: [3, 8]` and, when areas differ per department, parallel
//! lists under `площадь`. Downstream rows need one department per record, so
//! such records are split positionally.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::decode::{encode_document, ensure_decoded, operations_mut, Document, ModelOutput};
use crate::constants::{
    is_aor_department, ALIGNED_AREA_FIELDS, AOR_SUBDIVISION, AREA_FIELD, DEPARTMENT_FIELD,
    SUBDIVISION_FIELD,
};
use crate::error::PipelineError;

/// Stage entry point: decode if needed, split multi-department records and
/// return the re-encoded document.
pub fn assign_departments(output: impl Into<ModelOutput>) -> Result<String, PipelineError> {
    let document = ensure_decoded(output.into())?;
    let document = fan_out_departments(document)?;
    Ok(encode_document(&document))
}

/// Split every record whose department is a list into one record per
/// department, then default the subdivision of АОР departments.
pub fn fan_out_departments(mut document: Document) -> Result<Document, PipelineError> {
    let operations = std::mem::take(operations_mut(&mut document)?);
    let mut expanded = Vec::with_capacity(operations.len());

    for operation in operations {
        let record = match operation {
            Value::Object(record) => record,
            other => {
                warn!("Skipping non-object operation entry");
                expanded.push(other);
                continue;
            }
        };

        let departments = match record.get(DEPARTMENT_FIELD) {
            Some(Value::Array(departments)) => Some(departments.clone()),
            _ => None,
        };

        match departments {
            Some(departments) if departments.is_empty() => {
                warn!("Dropping operation with an empty department list");
            }
            Some(departments) => {
                expanded.extend(split_by_department(&record, &departments)?);
            }
            None => expanded.push(Value::Object(with_default_subdivision(record))),
        }
    }

    debug!(records = expanded.len(), "Assigned departments");
    *operations_mut(&mut document)? = expanded;
    Ok(document)
}

fn split_by_department(
    record: &Map<String, Value>,
    departments: &[Value],
) -> Result<Vec<Value>, PipelineError> {
    check_alignment(record, departments.len())?;

    departments
        .iter()
        .enumerate()
        .map(|(idx, department)| {
            let mut split = record.clone();
            split.insert(DEPARTMENT_FIELD.to_string(), department.clone());

            if let Some(Value::Object(area)) = split.get_mut(AREA_FIELD) {
                for field in ALIGNED_AREA_FIELDS {
                    if let Some(Value::Array(values)) = area.get(field) {
                        let value = values.get(idx).cloned().ok_or_else(|| {
                            PipelineError::IndexAlignment {
                                field: format!("{}.{}", AREA_FIELD, field),
                                departments: departments.len(),
                                values: values.len(),
                            }
                        })?;
                        area.insert(field.to_string(), value);
                    }
                }
            }

            Ok(Value::Object(with_default_subdivision(split)))
        })
        .collect()
}

/// Per-department area lists must have exactly one entry per department.
fn check_alignment(record: &Map<String, Value>, departments: usize) -> Result<(), PipelineError> {
    let Some(Value::Object(area)) = record.get(AREA_FIELD) else {
        return Ok(());
    };

    for field in ALIGNED_AREA_FIELDS {
        if let Some(Value::Array(values)) = area.get(field) {
            if values.len() != departments {
                return Err(PipelineError::IndexAlignment {
                    field: format!("{}.{}", AREA_FIELD, field),
                    departments,
                    values: values.len(),
                });
            }
        }
    }
    Ok(())
}

fn with_default_subdivision(mut record: Map<String, Value>) -> Map<String, Value> {
    let in_aor = record
        .get(DEPARTMENT_FIELD)
        .and_then(department_number)
        .is_some_and(is_aor_department);

    if in_aor && is_falsy(record.get(SUBDIVISION_FIELD)) {
        record.insert(
            SUBDIVISION_FIELD.to_string(),
            Value::String(AOR_SUBDIVISION.to_string()),
        );
    }
    record
}

/// Integral department numbers; `3` and `3.0` are the same department.
fn department_number(value: &Value) -> Option<i64> {
    let Value::Number(number) = value else {
        return None;
    };
    number.as_i64().or_else(|| {
        number
            .as_f64()
            .filter(|f| f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

/// Absent, null, false, zero and empty values all count as "not set".
fn is_falsy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => !b,
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn splits_multi_department_record() {
        let doc = json!({"операции": [{
            "операция": "Культивация",
            "отделение": [3, 8],
            "площадь": {"за_день": [10, -5], "c_начала_операции": [100, 50]}
        }]});

        let out = fan_out_departments(doc).unwrap();
        let ops = out["операции"].as_array().unwrap();
        assert_eq!(ops.len(), 2);

        assert_eq!(ops[0]["отделение"], json!(3));
        assert_eq!(ops[0]["площадь"], json!({"за_день": 10, "c_начала_операции": 100}));
        assert_eq!(ops[0]["подразделение"], json!("АОР"));
        assert_eq!(ops[0]["операция"], json!("Культивация"));

        assert_eq!(ops[1]["отделение"], json!(8));
        assert_eq!(ops[1]["площадь"], json!({"за_день": -5, "c_начала_операции": 50}));
        assert!(ops[1].get("подразделение").is_none());
    }

    #[test]
    fn scalar_area_is_copied_to_every_split() {
        let doc = json!({"операции": [{
            "отделение": [1, 2],
            "площадь": {"за_день": 40, "c_начала_операции": 400}
        }]});
        let out = fan_out_departments(doc).unwrap();
        let ops = out["операции"].as_array().unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[1]["площадь"]["за_день"], json!(40));
    }

    #[test]
    fn misaligned_area_list_is_an_error() {
        let doc = json!({"операции": [{
            "отделение": [3, 8, 9],
            "площадь": {"за_день": [10, 5], "c_начала_операции": 1}
        }]});
        match fan_out_departments(doc).unwrap_err() {
            PipelineError::IndexAlignment {
                field,
                departments,
                values,
            } => {
                assert_eq!(field, "площадь.за_день");
                assert_eq!(departments, 3);
                assert_eq!(values, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn mixed_scalar_and_list_areas_split_together() {
        let doc = json!({"операции": [{
            "отделение": [5, 8],
            "площадь": {"за_день": 12, "c_начала_операции": [120, 80]}
        }]});
        let out = fan_out_departments(doc).unwrap();
        let ops = out["операции"].as_array().unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0]["площадь"], json!({"за_день": 12, "c_начала_операции": 120}));
        assert_eq!(ops[1]["площадь"], json!({"за_день": 12, "c_начала_операции": 80}));
    }

    #[test]
    fn mixed_record_with_short_list_is_an_error() {
        let doc = json!({"операции": [{
            "отделение": [5, 8],
            "площадь": {"за_день": 12, "c_начала_операции": [120]}
        }]});
        assert!(matches!(
            fan_out_departments(doc).unwrap_err(),
            PipelineError::IndexAlignment { departments: 2, values: 1, .. }
        ));
    }

    #[test]
    fn empty_department_list_drops_the_record() {
        let doc = json!({"операции": [
            {"отделение": [], "операция": "Сев"},
            {"отделение": [], "площадь": {"за_день": [4], "c_начала_операции": 9}},
            {"отделение": 9}
        ]});
        let out = fan_out_departments(doc).unwrap();
        assert_eq!(out["операции"], json!([{"отделение": 9, "подразделение": "АОР"}]));
    }

    #[test]
    fn existing_subdivision_is_kept() {
        let doc = json!({"операции": [
            {"отделение": 3, "подразделение": "Восток"},
            {"отделение": [4], "подразделение": "Запад"}
        ]});
        let out = fan_out_departments(doc).unwrap();
        assert_eq!(out["операции"][0]["подразделение"], json!("Восток"));
        assert_eq!(out["операции"][1]["подразделение"], json!("Запад"));
    }

    #[test]
    fn empty_subdivision_is_replaced_for_aor_departments() {
        let doc = json!({"операции": [
            {"отделение": 20, "подразделение": ""},
            {"отделение": 7.0, "подразделение": null},
            {"отделение": 2, "подразделение": null},
            {"отделение": "3"}
        ]});
        let out = fan_out_departments(doc).unwrap();
        assert_eq!(out["операции"][0]["подразделение"], json!("АОР"));
        assert_eq!(out["операции"][1]["подразделение"], json!("АОР"));
        assert_eq!(out["операции"][2]["подразделение"], json!(null));
        assert!(out["операции"][3].get("подразделение").is_none());
    }

    #[test]
    fn stage_accepts_fenced_text() {
        let raw = "```json\n{\"операции\":[{\"отделение\":5}]}\n```";
        let out = assign_departments(raw).unwrap();
        assert_eq!(out, "{\"операции\":[{\"отделение\":5,\"подразделение\":\"АОР\"}]}");
    }

    #[test]
    fn stage_rejects_garbage() {
        let err = assign_departments("Извините, не понял сообщение").unwrap_err();
        match err {
            PipelineError::Decode { text, .. } => {
                assert_eq!(text, "Извините, не понял сообщение")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
