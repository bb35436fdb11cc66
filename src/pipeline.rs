//! Per-run conversion pipeline.
//!
//! Each discovered Jenkins file moves through
//! `convert → save JSON → convert → save initial YAML → validation passes`,
//! one file at a time. A failed stage ends that file only; the run moves on
//! to the next source. Validation passes are an ordered list, and a pass
//! runs only when the previous one produced corrected YAML.
use crate::convert::ConversionClient;
use crate::lm::LmError;
use crate::paths::{ArtifactNames, TargetStage};
use crate::prompts::{PromptRole, PromptStore};
use crate::run_log::{ReportHeading, RunLog};
use crate::validate::{CorrectedArtifact, ValidationClient, ValidationOutcome};
use anyhow::{anyhow, Context, Result};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// File-name patterns that identify Jenkins sources, in discovery order.
pub const SOURCE_PATTERNS: [&str; 3] = ["*.jenkinsfile", "*.jenkins", "*.groovy"];

/// One validation pass: which prompt to use and which stage its fix becomes.
#[derive(Debug, Clone, Copy)]
pub struct ValidationPass {
    pub role: PromptRole,
    pub stage: TargetStage,
    pub heading: ReportHeading,
}

pub const VALIDATION_PASSES: [ValidationPass; 2] = [
    ValidationPass {
        role: PromptRole::Validate,
        stage: TargetStage::Validated,
        heading: ReportHeading {
            title: "Validation Report",
            footer: "End Report",
            empty_note: "Validation failed or no report generated. Check previous logs for errors related to {artifact}.",
        },
    },
    ValidationPass {
        role: PromptRole::Fix,
        stage: TargetStage::Validated2,
        heading: ReportHeading {
            title: "Second Validation Report",
            footer: "End Second Report",
            empty_note: "Second validation failed or no report generated. Check logs for {artifact}.",
        },
    },
];

/// Step at which a source file was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ReadSource,
    ConvertToIntermediate,
    SaveIntermediate,
    ConvertToTarget,
    SaveTarget(TargetStage),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::ReadSource => f.write_str("read-source"),
            Stage::ConvertToIntermediate => f.write_str("convert-to-json"),
            Stage::SaveIntermediate => f.write_str("save-json"),
            Stage::ConvertToTarget => f.write_str("convert-to-tekton"),
            Stage::SaveTarget(stage) => write!(f, "save-{stage}-yaml"),
        }
    }
}

/// A per-file failure tagged with the stage that produced it.
#[derive(Debug)]
pub struct StageFailure {
    pub stage: Stage,
    pub error: anyhow::Error,
}

impl StageFailure {
    fn new(stage: Stage, error: anyhow::Error) -> Self {
        Self { stage, error }
    }

    fn from_lm(stage: Stage, err: LmError) -> Self {
        Self::new(stage, anyhow!(err))
    }
}

/// Terminal state of one source file.
#[derive(Debug)]
pub enum FileOutcome {
    /// All attempted stages succeeded; `last_stage` is the latest YAML written.
    Completed {
        last_stage: TargetStage,
        written: Vec<PathBuf>,
    },
    Failed {
        stage: Stage,
        error: String,
        written: Vec<PathBuf>,
    },
}

#[derive(Debug)]
pub struct FileReport {
    pub source: PathBuf,
    pub outcome: FileOutcome,
}

#[derive(Debug)]
pub struct RunSummary {
    pub run_number: u64,
    pub files: Vec<FileReport>,
}

impl RunSummary {
    pub fn discovered(&self) -> usize {
        self.files.len()
    }

    pub fn completed(&self) -> usize {
        self.files
            .iter()
            .filter(|file| matches!(file.outcome, FileOutcome::Completed { .. }))
            .count()
    }

    pub fn failures(&self) -> Vec<(&Path, Stage)> {
        self.files
            .iter()
            .filter_map(|file| match &file.outcome {
                FileOutcome::Failed { stage, .. } => Some((file.source.as_path(), *stage)),
                FileOutcome::Completed { .. } => None,
            })
            .collect()
    }

    pub fn artifacts_written(&self) -> usize {
        self.files
            .iter()
            .map(|file| match &file.outcome {
                FileOutcome::Completed { written, .. } | FileOutcome::Failed { written, .. } => {
                    written.len()
                }
            })
            .sum()
    }
}

/// Find Jenkins sources directly inside `input_dir`, grouped by pattern.
pub fn discover_sources(input_dir: &Path) -> Result<Vec<PathBuf>> {
    let escaped = glob::Pattern::escape(&input_dir.to_string_lossy());
    let options = glob::MatchOptions {
        require_literal_leading_dot: true,
        ..glob::MatchOptions::new()
    };
    let mut sources = Vec::new();
    for suffix in SOURCE_PATTERNS {
        let pattern = format!("{escaped}/{suffix}");
        let mut found = 0;
        let entries =
            glob::glob_with(&pattern, options).with_context(|| format!("glob {pattern}"))?;
        for entry in entries {
            match entry {
                Ok(path) if path.is_file() => {
                    sources.push(path);
                    found += 1;
                }
                Ok(_) => {}
                Err(err) => tracing::warn!(error = %err, "skipping unreadable entry"),
            }
        }
        tracing::info!(pattern = suffix, found, "searched for Jenkins files");
    }
    Ok(sources)
}

/// Drives conversion and validation for every source of one run.
pub struct Orchestrator<'a> {
    pub conversion: ConversionClient<'a>,
    pub validation: ValidationClient<'a>,
    pub prompts: &'a PromptStore,
    pub run_log: &'a RunLog,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
}

struct FileState<'p> {
    names: ArtifactNames,
    source: &'p Path,
    written: Vec<PathBuf>,
}

impl Orchestrator<'_> {
    /// Process every discovered source for `run_number`.
    ///
    /// The run log is reset first, so it never carries an earlier run's
    /// reports. Errors only when the run log or output directory cannot be
    /// prepared; per-file failures are recorded in the summary.
    pub fn run(&self, run_number: u64) -> Result<RunSummary> {
        self.run_log.reset(run_number)?;
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("create {}", self.output_dir.display()))?;

        tracing::info!(input = %self.input_dir.display(), "searching for Jenkins files");
        let sources = discover_sources(&self.input_dir)?;
        if sources.is_empty() {
            tracing::warn!(run = run_number, "no Jenkins files found in the input directory");
            return Ok(RunSummary {
                run_number,
                files: Vec::new(),
            });
        }
        tracing::info!(run = run_number, total = sources.len(), "Jenkins files to process");

        let mut files = Vec::with_capacity(sources.len());
        for source in sources {
            let span = tracing::info_span!("source", run = run_number, file = %source.display());
            let _entered = span.enter();
            let mut state = FileState {
                names: ArtifactNames::for_source(&self.output_dir, run_number, &source),
                source: &source,
                written: Vec::new(),
            };
            tracing::info!(base = state.names.base_name(), "processing file");
            let outcome = match self.process_source(run_number, &mut state) {
                Ok(last_stage) => {
                    tracing::info!(last_stage = %last_stage, "finished processing file");
                    FileOutcome::Completed {
                        last_stage,
                        written: state.written,
                    }
                }
                Err(failure) => {
                    tracing::error!(
                        stage = %failure.stage,
                        error = %format!("{:#}", failure.error),
                        "abandoning file"
                    );
                    FileOutcome::Failed {
                        stage: failure.stage,
                        error: format!("{:#}", failure.error),
                        written: state.written,
                    }
                }
            };
            files.push(FileReport { source, outcome });
        }

        let summary = RunSummary { run_number, files };
        tracing::info!(
            run = run_number,
            discovered = summary.discovered(),
            completed = summary.completed(),
            failed = summary.failures().len(),
            artifacts = summary.artifacts_written(),
            "conversion and validation finished"
        );
        Ok(summary)
    }

    fn process_source(
        &self,
        run_number: u64,
        state: &mut FileState<'_>,
    ) -> Result<TargetStage, StageFailure> {
        let source = load_text(state.source).map_err(|err| StageFailure::new(Stage::ReadSource, err))?;

        let prompt = self
            .prompts
            .read(PromptRole::SourceToIntermediate)
            .map_err(|err| StageFailure::new(Stage::ConvertToIntermediate, err))?;
        let json = self
            .conversion
            .source_to_intermediate(&prompt, &source)
            .map_err(|err| StageFailure::from_lm(Stage::ConvertToIntermediate, err))?;
        state.save(state.names.intermediate(), &json, Stage::SaveIntermediate)?;

        let prompt = self
            .prompts
            .read(PromptRole::IntermediateToTarget)
            .map_err(|err| StageFailure::new(Stage::ConvertToTarget, err))?;
        let yaml = self
            .conversion
            .intermediate_to_target(&prompt, &json)
            .map_err(|err| StageFailure::from_lm(Stage::ConvertToTarget, err))?;
        let initial = state.names.target(TargetStage::Initial);
        state.save(initial.clone(), &yaml, Stage::SaveTarget(TargetStage::Initial))?;

        let mut current_path = initial;
        let mut current_yaml = yaml;
        let mut last_stage = TargetStage::Initial;
        for pass in &VALIDATION_PASSES {
            let outcome = self.validate_pass(pass, &current_yaml, &current_path);
            if let Err(err) = self.run_log.append_report(
                &pass.heading,
                run_number,
                &current_path,
                &outcome.report,
            ) {
                tracing::error!(error = %format!("{err:#}"), "failed to append validation report");
            }

            let fixed = match outcome.corrected {
                CorrectedArtifact::Fixed(yaml) => yaml,
                CorrectedArtifact::Missing => {
                    tracing::warn!(
                        stage = %pass.stage,
                        artifact = %current_path.display(),
                        "response had no corrected Tekton YAML, skipping remaining validation"
                    );
                    break;
                }
                CorrectedArtifact::Unavailable => {
                    tracing::warn!(
                        stage = %pass.stage,
                        artifact = %current_path.display(),
                        "validation failed, skipping remaining validation"
                    );
                    break;
                }
            };
            let path = state.names.target(pass.stage);
            state.save(path.clone(), &fixed, Stage::SaveTarget(pass.stage))?;
            current_path = path;
            current_yaml = fixed;
            last_stage = pass.stage;
        }
        Ok(last_stage)
    }

    fn validate_pass(&self, pass: &ValidationPass, yaml: &str, artifact: &Path) -> ValidationOutcome {
        let label = artifact.display().to_string();
        tracing::info!(stage = %pass.stage, prompt = %pass.role, artifact = %label, "validating Tekton pipeline");
        match self.prompts.read(pass.role) {
            Ok(prompt) => self.validation.validate(&prompt, yaml, &label),
            Err(err) => {
                tracing::error!(error = %format!("{err:#}"), "validation prompt unavailable");
                ValidationOutcome::failed(format!("Error: {err:#}"))
            }
        }
    }
}

impl FileState<'_> {
    fn save(&mut self, path: PathBuf, text: &str, stage: Stage) -> Result<(), StageFailure> {
        fs::write(&path, text.as_bytes())
            .with_context(|| format!("write {}", path.display()))
            .map_err(|err| StageFailure::new(stage, err))?;
        tracing::info!(stage = %stage, path = %path.display(), "saved artifact");
        self.written.push(path);
        Ok(())
    }
}

fn load_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
