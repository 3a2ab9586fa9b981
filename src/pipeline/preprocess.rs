//! Text rewrites applied to a report before it reaches the model.
//!
//! Field agronomists write shorthand ("отд 5-12/7", "по пу 3/4", "оз") that the
//! model misreads. Each normalizer below is a pure `&str -> String` rewrite;
//! [`normalize_message`] runs them in their fixed order.

use once_cell::sync::Lazy;
use tracing::debug;

use super::rewrite::{apply_rules, compile_rules, CompiledRules};
use crate::constants::{CANONICAL_HERBICIDE_OPERATION, CANONICAL_WINTER_WHEAT};
use crate::error::PipelineError;

// Irrigation-site and department shorthand. Order matters: the two-number
// department form has to win over the plain `отд a/b` form.
static REFERENCE_RULES: Lazy<CompiledRules> = Lazy::new(|| {
    compile_rules(&[
        (r"(?i)(по\s*п[уy]|п[уy])\s*(\d+)\s*/\s*(\d+)", "ПУ ${2}/${3}"),
        (
            r"(?i)(отд\.?|отделение)\s*-?\s*(\d+)[\s:]*-?\s*(\d+)\s*/\s*(\d+)",
            "Отделение ${2} ${3}/${4}",
        ),
        (
            r"(?i)(отд\.?|отделение)\s*-?\s*(\d+)\s*/\s*(\d+)",
            "Отделение ${2}/${3}",
        ),
        (
            r"(?i)(отд\.?|отделение)\s*-?\s*(\d+)[\s-]+(\d+)/(\d+)",
            "Отделение ${2} ${3}/${4}",
        ),
    ])
});

static OPERATION_RULES: Lazy<CompiledRules> = Lazy::new(|| {
    compile_rules(&[(
        r"(?i)внесение\s+почв\w*\s+гербицид\w*",
        CANONICAL_HERBICIDE_OPERATION,
    )])
});

static CULTURE_RULES: Lazy<CompiledRules> = Lazy::new(|| {
    compile_rules(&[(
        r"(?i)\b(озим(ых|ая|ой|ую)?|оз(ы|им)?|зим(ых|няя|ою)?)\b",
        CANONICAL_WINTER_WHEAT,
    )])
});

/// Rewrite "по пу a/b" and "отд a b/c" shorthand into `ПУ a/b` and
/// `Отделение a b/c`.
pub fn normalize_references(text: &str) -> Result<String, PipelineError> {
    apply_rules(&REFERENCE_RULES, text)
}

/// Collapse "внесение почвенных гербицидов" and its inflections into the
/// canonical operation name.
pub fn normalize_operation(text: &str) -> Result<String, PipelineError> {
    apply_rules(&OPERATION_RULES, text)
}

/// Replace whole-word winter-crop shorthand with the canonical crop name.
pub fn normalize_cultures(text: &str) -> Result<String, PipelineError> {
    apply_rules(&CULTURE_RULES, text)
}

/// Run all pre-processing stages in order.
pub fn normalize_message(message: &str) -> Result<String, PipelineError> {
    let text = normalize_references(message)?;
    let text = normalize_operation(&text)?;
    let text = normalize_cultures(&text)?;
    debug!(before = %message, after = %text, "Normalized report text");
    Ok(text)
}
