//! Name derivation for roles, runtime resources and environment variables.

use convert_case::{Boundary, Case, Converter};

const WORD_BOUNDARIES: [Boundary; 5] = [
    Boundary::Hyphen,
    Boundary::Underscore,
    Boundary::Space,
    Boundary::LowerUpper,
    Boundary::Acronym,
];

fn converter(case: Case) -> Converter {
    Converter::new()
        .set_boundaries(&WORD_BOUNDARIES)
        .to_case(case)
}

/// Derive the execution-role name for a compute unit.
///
/// Camel-case boundaries collapse into dashes, the result is lowercased and
/// suffixed with the stage: `getTodos` in `dev` becomes `get-todos-dev`.
pub fn role_name(unit: &str, stage: &str) -> String {
    runtime_name(unit, stage)
}

/// Derive the stage-qualified runtime name of a resource (`todos-dev`).
pub fn runtime_name(logical: &str, stage: &str) -> String {
    format!("{}-{}", converter(Case::Kebab).convert(logical), stage.to_lowercase())
}

/// Derive an environment-variable key from a logical name and a suffix.
///
/// `env_key("todos", "TABLE_NAME")` yields `TODOS_TABLE_NAME`.
pub fn env_key(logical: &str, suffix: &str) -> String {
    let prefix = converter(Case::UpperSnake).convert(logical);
    if suffix.is_empty() {
        prefix
    } else {
        format!("{prefix}_{suffix}")
    }
}
