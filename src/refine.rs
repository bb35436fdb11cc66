//! Prompt refinement from validation feedback.
//!
//! After a run, the run log holds every validation report. The refiner hands
//! that log and the current JSON→Tekton prompt to the model and installs the
//! rewritten prompt, snapshotting the old one first.
use crate::lm::{ChatRequest, CompletionBackend};
use crate::prompts::{PromptRole, PromptStore};
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::Path;

const REFINE_TEMPERATURE: f32 = 0.5;

const REFINE_SYSTEM_PROMPT: &str = "You are an expert prompt engineer. You refine a system prompt \
that converts structured JSON pipeline descriptions into Tekton Pipeline YAML. You receive the \
current prompt and the validation reports written about YAML it produced. Change the prompt so \
that future YAML avoids the problems those reports describe. Output ONLY the refined prompt text, \
with no explanation, greeting, or Markdown around it.";

/// Rewrites the intermediate→target prompt using a run log.
pub struct PromptRefiner<'a> {
    backend: &'a dyn CompletionBackend,
    prompts: &'a PromptStore,
    model: String,
}

impl<'a> PromptRefiner<'a> {
    pub fn new(backend: &'a dyn CompletionBackend, prompts: &'a PromptStore, model: &str) -> Self {
        Self {
            backend,
            prompts,
            model: model.to_string(),
        }
    }

    /// Refine the prompt from the log at `log_path`.
    ///
    /// Returns `true` when the prompt was replaced or the log was empty, and
    /// `false` on any failure, which is logged rather than propagated.
    pub fn refine(&self, log_path: &Path) -> bool {
        let role = PromptRole::IntermediateToTarget;
        tracing::info!(
            prompt = role.file_name(),
            log = %log_path.display(),
            "starting prompt refinement"
        );
        match self.try_refine(log_path, role) {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(error = %format!("{err:#}"), "prompt refinement failed");
                false
            }
        }
    }

    fn try_refine(&self, log_path: &Path, role: PromptRole) -> Result<()> {
        if !log_path.exists() {
            return Err(anyhow!("log file not found: {}", log_path.display()));
        }
        let log = fs::read_to_string(log_path)
            .with_context(|| format!("read {}", log_path.display()))?;
        if log.trim().is_empty() {
            tracing::warn!(log = %log_path.display(), "log is empty, skipping prompt refinement");
            return Ok(());
        }

        let current = self.prompts.read(role)?;
        let user = format!(
            "Original Prompt:\n```text\n{current}\n```\n\n\
             Validation Feedback Log:\n```log\n{log}\n```\n\n\
             Based on the Validation Feedback Log, refine the Original Prompt. \
             Remember to output ONLY the refined prompt text."
        );
        let request = ChatRequest::new(&self.model, REFINE_SYSTEM_PROMPT, user)
            .with_temperature(REFINE_TEMPERATURE);

        tracing::info!(model = %self.model, "requesting refined prompt");
        let refined = self
            .backend
            .complete(&request)
            .context("request refined prompt")?;
        let refined = refined.trim();
        if refined.is_empty() {
            return Err(anyhow!("model returned an empty refined prompt"));
        }

        self.prompts.archive_and_replace(role, refined)?;
        tracing::info!(
            path = %self.prompts.active_path(role).display(),
            "prompt refinement complete"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lm::testing::ScriptedBackend;
    use crate::lm::LmError;

    struct Fixture {
        _dir: tempfile::TempDir,
        prompts: PromptStore,
        log_path: std::path::PathBuf,
    }

    fn fixture(log: Option<&str>) -> Fixture {
        let dir = tempfile::tempdir().expect("create temp dir");
        let prompts = PromptStore::new(dir.path().join("prompts"));
        fs::create_dir_all(dir.path().join("prompts")).unwrap();
        fs::write(
            prompts.active_path(PromptRole::IntermediateToTarget),
            "old prompt",
        )
        .unwrap();
        let log_path = dir.path().join("tekton_validation_errors.log");
        if let Some(log) = log {
            fs::write(&log_path, log).unwrap();
        }
        Fixture {
            _dir: dir,
            prompts,
            log_path,
        }
    }

    fn active(fixture: &Fixture) -> String {
        fs::read_to_string(fixture.prompts.active_path(PromptRole::IntermediateToTarget)).unwrap()
    }

    #[test]
    fn replaces_prompt_and_archives_previous() {
        let fixture = fixture(Some("--- Validation Report ---\nmissing workspace\n"));
        let backend = ScriptedBackend::new().reply("  new prompt text \n");
        let refiner = PromptRefiner::new(&backend, &fixture.prompts, "gpt-refine");

        assert!(refiner.refine(&fixture.log_path));

        assert_eq!(active(&fixture), "new prompt text");
        let snapshot = fixture
            .prompts
            .snapshot_path(PromptRole::IntermediateToTarget, 1);
        assert_eq!(fs::read_to_string(snapshot).unwrap(), "old prompt");

        let request = backend.request(0);
        assert_eq!(request.model, "gpt-refine");
        assert_eq!(request.temperature, Some(REFINE_TEMPERATURE));
        assert!(request.response_format.is_none());
        assert!(request.messages[1].content.contains("old prompt"));
        assert!(request.messages[1].content.contains("missing workspace"));
    }

    #[test]
    fn empty_log_succeeds_without_calling_model() {
        let fixture = fixture(Some("  \n\n"));
        let backend = ScriptedBackend::new();
        let refiner = PromptRefiner::new(&backend, &fixture.prompts, "gpt-refine");

        assert!(refiner.refine(&fixture.log_path));
        assert_eq!(backend.calls(), 0);
        assert_eq!(active(&fixture), "old prompt");
    }

    #[test]
    fn missing_log_fails() {
        let fixture = fixture(None);
        let backend = ScriptedBackend::new();
        let refiner = PromptRefiner::new(&backend, &fixture.prompts, "gpt-refine");

        assert!(!refiner.refine(&fixture.log_path));
        assert_eq!(backend.calls(), 0);
    }

    #[test]
    fn empty_model_response_leaves_prompt_untouched() {
        let fixture = fixture(Some("report"));
        let backend = ScriptedBackend::new().reply("   ");
        let refiner = PromptRefiner::new(&backend, &fixture.prompts, "gpt-refine");

        assert!(!refiner.refine(&fixture.log_path));
        assert_eq!(active(&fixture), "old prompt");
        assert_eq!(
            fixture
                .prompts
                .latest_snapshot(PromptRole::IntermediateToTarget)
                .unwrap(),
            0
        );
    }

    #[test]
    fn model_failure_returns_false() {
        let fixture = fixture(Some("report"));
        let backend = ScriptedBackend::new().fail(LmError::Upstream("timeout".to_string()));
        let refiner = PromptRefiner::new(&backend, &fixture.prompts, "gpt-refine");

        assert!(!refiner.refine(&fixture.log_path));
        assert_eq!(active(&fixture), "old prompt");
    }
}
