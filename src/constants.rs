/// Business constants shared by the normalization stages.
/// The model output schema and the canonical phrases live here so every stage
/// agrees on the same spelling.

/// Top-level key holding the list of reported operations.
pub const OPERATIONS_KEY: &str = "операции";

// Operation record fields
pub const DEPARTMENT_FIELD: &str = "отделение";
pub const SUBDIVISION_FIELD: &str = "подразделение";
pub const AREA_FIELD: &str = "площадь";
pub const AREA_BY_PU_FIELD: &str = "площадь_по_ПУ";
pub const YIELD_FIELD: &str = "вал";

// Sub-fields of the numeric mappings. The "since start" key is spelled with a
// latin `c`, which is what the prompt asks the model to emit.
pub const PER_DAY_FIELD: &str = "за_день";
pub const SINCE_START_FIELD: &str = "c_начала_операции";

/// Numeric mappings whose values are clamped to be non-negative.
pub const NUMERIC_FIELDS: [&str; 3] = [AREA_FIELD, AREA_BY_PU_FIELD, YIELD_FIELD];

/// Sub-fields of every numeric mapping.
pub const NUMERIC_SUB_FIELDS: [&str; 2] = [PER_DAY_FIELD, SINCE_START_FIELD];

/// Area sub-fields that may carry one value per department.
pub const ALIGNED_AREA_FIELDS: [&str; 2] = [PER_DAY_FIELD, SINCE_START_FIELD];

/// Sheet columns in the order of the reply schema. Mapping fields are
/// flattened to `field.sub_field`.
pub const SHEET_COLUMNS: [&str; 11] = [
    "дата",
    SUBDIVISION_FIELD,
    DEPARTMENT_FIELD,
    "операция",
    "культура",
    "площадь.за_день",
    "площадь.c_начала_операции",
    "площадь_по_ПУ.за_день",
    "площадь_по_ПУ.c_начала_операции",
    "вал.за_день",
    "вал.c_начала_операции",
];

/// Departments that belong to the АОР subdivision unless the report says otherwise.
pub const AOR_DEPARTMENTS: [i64; 15] = [1, 3, 4, 5, 6, 7, 9, 10, 11, 12, 16, 17, 18, 19, 20];
pub const AOR_SUBDIVISION: &str = "АОР";

// Canonical phrases produced by the pre-processing stages
pub const CANONICAL_HERBICIDE_OPERATION: &str = "внесение гербицидов";
pub const CANONICAL_WINTER_WHEAT: &str = "Пшеница озимая товарная";

/// Suffix of the per-request spreadsheet artifact.
pub const SHEET_FILE_SUFFIX: &str = "_place_for_your_ads.csv";

pub const QUEUED_STATUS: &str = "Added message to task queue";

/// Returns true when `department` belongs to the АОР subdivision.
pub fn is_aor_department(department: i64) -> bool {
    AOR_DEPARTMENTS.contains(&department)
}

/// Name of the spreadsheet artifact for a request id.
pub fn sheet_file_name(request_id: &str) -> String {
    format!("{}{}", request_id, SHEET_FILE_SUFFIX)
}

pub const SYSTEM_PROMPT: &str = r#"Ты помощник агронома. Из сообщения об агрономических работах извлеки все операции и верни ТОЛЬКО JSON без пояснений в формате:
{"операции": [{
  "дата": "ДД.ММ.ГГГГ или null",
  "подразделение": "название подразделения или null",
  "отделение": номер отделения или список номеров, если операция выполнена в нескольких отделениях,
  "операция": "название операции",
  "культура": "название культуры",
  "площадь": {"за_день": число или список чисел по отделениям, "c_начала_операции": число или список чисел по отделениям},
  "площадь_по_ПУ": {"за_день": число, "c_начала_операции": число},
  "вал": {"за_день": число, "c_начала_операции": число}
}]}
Запись "ПУ a/b" означает площадь по производственному участку: a за день, b с начала операции.
Запись "Отделение a b/c" означает отделение a, площадь b за день и c с начала операции.
Если поле не указано в сообщении, ставь null. Числа пиши без единиц измерения."#;
