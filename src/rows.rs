//! Flattening decoded reports into spreadsheet rows.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::constants::{NUMERIC_FIELDS, NUMERIC_SUB_FIELDS, OPERATIONS_KEY, SHEET_COLUMNS};
use crate::pipeline::Document;

/// One operation record as ordered `column -> cell` pairs.
///
/// Nested mappings become dotted columns (`площадь.за_день`); lists are kept
/// as their JSON text. A numeric mapping reported as `null` still fills its
/// sub-columns, with empty cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetRow {
    cells: Vec<(String, String)>,
}

impl SheetRow {
    pub fn from_record(record: &Map<String, Value>) -> Self {
        let mut cells = Vec::new();
        flatten_into(&mut cells, None, record);
        Self { cells }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(column, _)| column.as_str())
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, cell)| cell.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Rows for every object under `операции`, in document order.
pub fn rows_from_document(document: &Document) -> Vec<SheetRow> {
    document
        .get(OPERATIONS_KEY)
        .and_then(Value::as_array)
        .map(|operations| {
            operations
                .iter()
                .filter_map(Value::as_object)
                .map(SheetRow::from_record)
                .collect()
        })
        .unwrap_or_default()
}

/// The schema columns, then any other column of the rows in first-seen order.
pub fn header_for(rows: &[SheetRow]) -> Vec<String> {
    let mut header: Vec<String> = SHEET_COLUMNS.iter().map(|c| c.to_string()).collect();
    for column in rows.iter().flat_map(SheetRow::columns) {
        if !header.iter().any(|c| c == column) {
            header.push(column.to_string());
        }
    }
    header
}

fn flatten_into(cells: &mut Vec<(String, String)>, prefix: Option<&str>, map: &Map<String, Value>) {
    for (key, value) in map {
        let column = match prefix {
            Some(prefix) => format!("{}.{}", prefix, key),
            None => key.clone(),
        };
        match value {
            Value::Object(nested) => flatten_into(cells, Some(&column), nested),
            Value::Null if prefix.is_none() && NUMERIC_FIELDS.contains(&key.as_str()) => {
                for sub_field in NUMERIC_SUB_FIELDS {
                    cells.push((format!("{}.{}", column, sub_field), String::new()));
                }
            }
            other => cells.push((column, cell_text(other))),
        }
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_mappings_become_dotted_columns() {
        let doc = json!({"операции": [{
            "отделение": 3,
            "подразделение": "АОР",
            "площадь": {"за_день": 0, "c_начала_операции": 2.5},
            "вал": null
        }]});
        let rows = rows_from_document(&doc);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(
            row.columns().collect::<Vec<_>>(),
            [
                "отделение",
                "подразделение",
                "площадь.за_день",
                "площадь.c_начала_операции",
                "вал.за_день",
                "вал.c_начала_операции"
            ]
        );
        assert_eq!(row.get("отделение"), Some("3"));
        assert_eq!(row.get("площадь.c_начала_операции"), Some("2.5"));
        assert_eq!(row.get("вал.за_день"), Some(""));
        assert_eq!(row.get("вал"), None);
    }

    #[test]
    fn null_non_numeric_fields_stay_single_columns() {
        let rows = rows_from_document(&json!({"операции": [{"дата": null, "культура": null}]}));
        assert_eq!(rows[0].columns().collect::<Vec<_>>(), ["дата", "культура"]);
    }

    #[test]
    fn header_starts_with_schema_columns() {
        let doc = json!({"операции": [
            {"отделение": 1, "культура": "Пшеница озимая товарная"},
            {"отделение": 2, "операция": "Сев"}
        ]});
        let rows = rows_from_document(&doc);
        assert_eq!(header_for(&rows), SHEET_COLUMNS);

        let rows = rows_from_document(&json!({"операции": [
            {"отделение": 1, "комментарий": "дождь"},
            {"техника": "МТЗ", "комментарий": "дождь"}
        ]}));
        let header = header_for(&rows);
        assert_eq!(&header[..SHEET_COLUMNS.len()], SHEET_COLUMNS);
        assert_eq!(&header[SHEET_COLUMNS.len()..], ["комментарий", "техника"]);
    }

    #[test]
    fn documents_without_operations_have_no_rows() {
        assert!(rows_from_document(&json!({})).is_empty());
        assert!(rows_from_document(&json!({"операции": ["x"]})).is_empty());
    }
}
