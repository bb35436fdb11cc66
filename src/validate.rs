//! Structured validation/repair calls.
//!
//! The model answers in JSON mode with a `validation_report` and a
//! `fixed_tekton_yaml` field. Validation never fails outward: transport and
//! parse problems become a synthetic report with no corrected artifact.
use crate::lm::{excerpt, ChatRequest, CompletionBackend, LmError};
use serde_json::Value;

/// Report text substituted when the response has no `validation_report`.
pub const MISSING_REPORT: &str = "Validation report missing in response.";

/// What a validation pass produced in place of the corrected YAML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorrectedArtifact {
    /// Non-empty corrected YAML.
    Fixed(String),
    /// The response parsed but carried no usable `fixed_tekton_yaml`.
    Missing,
    /// The call or its parsing failed; see the report.
    Unavailable,
}

/// Report plus optional corrected artifact from one validation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub report: String,
    pub corrected: CorrectedArtifact,
}

impl ValidationOutcome {
    /// A failed pass: the report explains why, nothing was corrected.
    pub fn failed(report: impl Into<String>) -> Self {
        Self {
            report: report.into(),
            corrected: CorrectedArtifact::Unavailable,
        }
    }
}

/// Runs validation passes against a completion backend.
pub struct ValidationClient<'a> {
    backend: &'a dyn CompletionBackend,
    model: String,
}

impl<'a> ValidationClient<'a> {
    pub fn new(backend: &'a dyn CompletionBackend, model: &str) -> Self {
        Self {
            backend,
            model: model.to_string(),
        }
    }

    /// Validate `tekton_yaml` with `system_prompt`. `label` names the artifact in reports.
    pub fn validate(&self, system_prompt: &str, tekton_yaml: &str, label: &str) -> ValidationOutcome {
        let payload =
            format!("Analyze and validate this Tekton pipeline YAML:\n```yaml\n{tekton_yaml}\n```");
        let request = ChatRequest::new(&self.model, system_prompt, payload).json_mode();

        let response = match self.backend.complete(&request) {
            Ok(response) => response,
            Err(LmError::Configuration(detail)) => {
                tracing::error!(artifact = label, %detail, "validation not configured");
                return ValidationOutcome::failed(format!("Configuration Error: {detail}"));
            }
            Err(err) => {
                tracing::error!(artifact = label, kind = err.kind(), error = %err, "validation call failed");
                return ValidationOutcome::failed(format!(
                    "Validation Exception: error during Tekton pipeline validation for {label}: {err}"
                ));
            }
        };
        tracing::debug!(artifact = label, raw = %response, "raw validation response");

        let outcome = parse_validation_response(&response, label);
        if outcome.corrected == CorrectedArtifact::Unavailable {
            tracing::error!(artifact = label, "validation response was not valid JSON");
        } else {
            tracing::info!(artifact = label, "validation response processed");
        }
        outcome
    }
}

/// Interpret a JSON-mode validation response.
///
/// A missing report gets [`MISSING_REPORT`]; a missing or blank fix becomes
/// [`CorrectedArtifact::Missing`]; unparsable JSON yields a parse-error report
/// with [`CorrectedArtifact::Unavailable`].
pub fn parse_validation_response(response: &str, label: &str) -> ValidationOutcome {
    let value: Value = match serde_json::from_str(response) {
        Ok(value) => value,
        Err(err) => {
            return ValidationOutcome::failed(format!(
                "JSON Parse Error: failed to parse validation response for {label}: {err}\nRaw Response: {}",
                excerpt(response, 2000)
            ));
        }
    };
    let Some(fields) = value.as_object() else {
        return ValidationOutcome::failed(format!(
            "JSON Parse Error: validation response for {label} is not a JSON object\nRaw Response: {}",
            excerpt(response, 2000)
        ));
    };

    let report = match fields.get("validation_report") {
        None | Some(Value::Null) => MISSING_REPORT.to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    };
    let corrected = match fields.get("fixed_tekton_yaml") {
        Some(Value::String(yaml)) if !yaml.trim().is_empty() => {
            CorrectedArtifact::Fixed(yaml.clone())
        }
        _ => CorrectedArtifact::Missing,
    };
    ValidationOutcome { report, corrected }
}
