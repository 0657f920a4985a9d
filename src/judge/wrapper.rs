use crate::error::{DuelError, Result};
use crate::problems::Problem;

const USER_CODE_MARKER: &str = "{{user_code}}";
const FUNCTION_NAME_MARKER: &str = "{{function_name}}";

/// Splice a player's raw source into a problem's per-language harness
/// template. Pure and deterministic: identical inputs always produce
/// byte-identical output, so a failed case can be reproduced exactly.
pub fn wrap(template: &str, raw_source: &str, function_name: &str) -> String {
    template
        .replace(USER_CODE_MARKER, raw_source)
        .replace(FUNCTION_NAME_MARKER, function_name)
}

/// Look up the harness for `language` on `problem` and wrap `raw_source`
/// with it
pub fn wrap_for_problem(problem: &Problem, language: &str, raw_source: &str) -> Result<String> {
    let template =
        problem
            .templates
            .get(language)
            .ok_or_else(|| DuelError::MissingTemplate {
                problem: problem.id.clone(),
                language: language.to_string(),
            })?;

    Ok(wrap(template, raw_source, &problem.function_name))
}
