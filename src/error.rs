//! Error taxonomy for the spec pipeline (§7: parse, schema, policy, size, runtime).
//!
//! Every stage of the pipeline (load, validate, compile, execute) returns
//! one of these variants as a value rather than panicking. Callers outside
//! the pipeline (the CLI driver) are free to flatten this into `anyhow::Error`
//! via `?`; the variants remain matchable for callers that care (e.g. to
//! distinguish a policy rejection from a malformed spec file).

use thiserror::Error;

/// An error produced anywhere in the spec pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The spec file's bytes could not be decoded as YAML or JSON.
    #[error("failed to parse spec file ({tried}): {source}")]
    Parse {
        /// Which formats were attempted, e.g. "yaml" or "yaml, json".
        tried: String,
        #[source]
        source: anyhow::Error,
    },

    /// A structural invariant of the spec model was violated.
    #[error("{path}: {message}")]
    Schema {
        /// Dotted/indexed path to the offending field, e.g.
        /// `windows[2](editor).pane_plan[4]`.
        path: String,
        message: String,
    },

    /// An action type or mux subcommand is disallowed by the active policy.
    #[error("policy rejected {subject}: {message}")]
    Policy { subject: String, message: String },

    /// A configured guardrail (`MaxActions`, `MaxCommandLen`) was exceeded.
    #[error("{guardrail} exceeded: {message}")]
    Size { guardrail: &'static str, message: String },

    /// A failure that can only occur while driving the runner/gates.
    #[error("{0}")]
    Runtime(String),
}

impl PipelineError {
    pub fn schema(path: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::Schema {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn policy(subject: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::Policy {
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn size(guardrail: &'static str, message: impl Into<String>) -> Self {
        PipelineError::Size {
            guardrail,
            message: message.into(),
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        PipelineError::Runtime(message.into())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
