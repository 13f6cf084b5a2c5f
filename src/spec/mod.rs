//! The declarative session pipeline: parse/validate a [`model::Spec`],
//! lower it through [`compiler`] into a command list, and hand that list to
//! [`executor`] for dry-run rendering or live execution via a [`runner::Runner`].

pub mod compiler;
pub mod executor;
pub mod ir;
pub mod model;
pub mod policy;
pub mod runner;
pub mod substitution;
pub mod validate;

pub use compiler::{compile, from_spec, CompileOptions, Command, Compiled};
pub use executor::{execute, render_dry_run, ExecutionReport, StepOutcome};
pub use model::Spec;
pub use policy::Policy;
pub use runner::{Runner, RunOutput, TmuxRunner};
pub use substitution::Context;
pub use validate::{validate, validate_policy};

use std::path::Path;

use crate::error::{PipelineError, Result};

/// Parse a spec document, trying YAML first and falling back to JSON — a
/// YAML parser accepts JSON too, so in practice this only matters for the
/// error message reported when both fail.
pub fn parse_spec(bytes: &str) -> Result<Spec> {
    match serde_yaml::from_str(bytes) {
        Ok(spec) => Ok(spec),
        Err(yaml_err) => serde_json::from_str(bytes).map_err(|json_err| PipelineError::Parse {
            tried: "yaml, json".to_string(),
            source: anyhow::anyhow!("yaml: {yaml_err}; json: {json_err}"),
        }),
    }
}

/// Parse a document, preferring JSON first when `prefer_json` is set (the
/// `.json` extension case) and falling back to the other format — the §6.1
/// "selects by extension, falling back to try-the-other" rule.
fn parse_spec_preferring(bytes: &str, prefer_json: bool) -> Result<Spec> {
    if !prefer_json {
        return parse_spec(bytes);
    }
    match serde_json::from_str(bytes) {
        Ok(spec) => Ok(spec),
        Err(json_err) => serde_yaml::from_str(bytes).map_err(|yaml_err| PipelineError::Parse {
            tried: "json, yaml".to_string(),
            source: anyhow::anyhow!("json: {json_err}; yaml: {yaml_err}"),
        }),
    }
}

/// `LoadFile(path)` (§6.2): read bytes, parse (format chosen by extension,
/// falling back to the other), structurally validate and normalize. Does
/// not run `ValidatePolicy` — no `Policy` is in scope at this entry point.
pub fn load_file(path: &Path) -> Result<Spec> {
    let bytes = std::fs::read_to_string(path)
        .map_err(|e| PipelineError::runtime(format!("failed to read {}: {e}", path.display())))?;
    let prefer_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let mut spec = parse_spec_preferring(&bytes, prefer_json)?;
    validate(&mut spec)?;
    Ok(spec)
}

/// Parse, validate and normalize a spec document in one call — the shape
/// every pipeline entry point (`validate`, `plan`, `exec`) starts from.
pub fn load_and_validate(bytes: &str, policy: &Policy) -> Result<Spec> {
    let mut spec = parse_spec(bytes)?;
    validate(&mut spec)?;
    validate_policy(&spec, policy)?;
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_spec_accepts_yaml() {
        let spec = parse_spec("windows:\n  - name: editor\n").unwrap();
        assert_eq!(spec.windows.len(), 1);
    }

    #[test]
    fn parse_spec_accepts_json() {
        let spec = parse_spec(r#"{"windows":[{"name":"editor"}]}"#).unwrap();
        assert_eq!(spec.windows.len(), 1);
    }

    #[test]
    fn parse_spec_rejects_garbage() {
        assert!(parse_spec("{not valid: [").is_err());
    }

    #[test]
    fn load_and_validate_runs_full_pipeline() {
        let policy = Policy::default();
        let spec = load_and_validate("windows:\n  - name: editor\n", &policy).unwrap();
        assert_eq!(spec.windows[0].name, "editor");
    }

    #[test]
    fn load_file_selects_yaml_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "windows:\n  - name: editor\n").unwrap();
        let spec = load_file(&path).unwrap();
        assert_eq!(spec.windows[0].name, "editor");
    }

    #[test]
    fn load_file_selects_json_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, r#"{"windows":[{"name":"editor"}]}"#).unwrap();
        let spec = load_file(&path).unwrap();
        assert_eq!(spec.windows[0].name, "editor");
    }

    #[test]
    fn load_file_rejects_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.yaml");
        assert!(load_file(&path).is_err());
    }

    #[test]
    fn load_file_rejects_empty_spec() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.yaml");
        std::fs::write(&path, "version: 1\n").unwrap();
        assert!(load_file(&path).is_err());
    }
}
