//! Jenkins → JSON → Tekton conversion calls.
use crate::lm::{strip_code_fences, ChatRequest, CompletionBackend, LmError};

/// Wraps the two conversion requests around a completion backend.
pub struct ConversionClient<'a> {
    backend: &'a dyn CompletionBackend,
    model: String,
}

impl<'a> ConversionClient<'a> {
    pub fn new(backend: &'a dyn CompletionBackend, model: &str) -> Self {
        Self {
            backend,
            model: model.to_string(),
        }
    }

    /// Convert a Jenkins pipeline into its intermediate JSON form.
    ///
    /// The output must parse as a JSON document; anything else is
    /// [`LmError::InvalidJsonOutput`].
    pub fn source_to_intermediate(
        &self,
        system_prompt: &str,
        jenkins_source: &str,
    ) -> Result<String, LmError> {
        let payload = format!("Convert this Jenkins file to JSON:\n{jenkins_source}");
        let text = self.convert(system_prompt, payload)?;
        if let Err(err) = serde_json::from_str::<serde_json::Value>(&text) {
            return Err(LmError::InvalidJsonOutput(err.to_string()));
        }
        Ok(text)
    }

    /// Convert intermediate JSON into Tekton YAML. Any non-empty text is accepted.
    pub fn intermediate_to_target(
        &self,
        system_prompt: &str,
        intermediate_json: &str,
    ) -> Result<String, LmError> {
        let payload = format!("Convert this JSON pipeline to Tekton YAML:\n{intermediate_json}");
        self.convert(system_prompt, payload)
    }

    fn convert(&self, system_prompt: &str, payload: String) -> Result<String, LmError> {
        let request = ChatRequest::new(&self.model, system_prompt, payload);
        let text = strip_code_fences(&self.backend.complete(&request)?);
        if text.is_empty() {
            return Err(LmError::EmptyResponse);
        }
        Ok(text)
    }
}
