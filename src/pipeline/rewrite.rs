use regex::Regex;

use crate::error::PipelineError;

/// A global substitution: every match of `regex` is replaced by `replacement`
/// (which may reference capture groups as `${n}`).
pub struct RewriteRule {
    regex: Regex,
    replacement: &'static str,
}

/// Rules compiled once per process. Compilation errors are kept so that every
/// later rewrite reports them instead of panicking.
pub type CompiledRules = std::result::Result<Vec<RewriteRule>, String>;

/// Compile `(pattern, replacement)` pairs in order.
pub fn compile_rules(rules: &[(&str, &'static str)]) -> CompiledRules {
    rules
        .iter()
        .map(|&(pattern, replacement)| {
            Regex::new(pattern)
                .map(|regex| RewriteRule {
                    regex,
                    replacement,
                })
                .map_err(|e| format!("invalid pattern {:?}: {}", pattern, e))
        })
        .collect()
}

/// Apply every rule, in order, to the whole text.
pub fn apply_rules(rules: &CompiledRules, text: &str) -> Result<String, PipelineError> {
    let rules = rules
        .as_ref()
        .map_err(|e| PipelineError::Transform(e.clone()))?;

    let mut current = text.to_string();
    for rule in rules {
        current = rule
            .regex
            .replace_all(&current, rule.replacement)
            .into_owned();
    }
    Ok(current)
}
