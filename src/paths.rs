//! Typed paths into the project layout.
//!
//! Centralizing path construction keeps artifact naming consistent across the
//! pipeline, the refiner, and the CLI summary.
use std::fmt;
use std::path::{Path, PathBuf};

/// Counter file holding the last-used run number.
pub const RUN_COUNTER_FILE: &str = "run_counter.txt";
/// Run-scoped validation log, reset at the start of every run.
pub const RUN_LOG_FILE: &str = "tekton_validation_errors.log";
/// Structured configuration document.
pub const CONFIG_FILE: &str = "config.yaml";
/// Directory holding the active prompt templates and their snapshots.
pub const PROMPTS_DIR: &str = "prompts";

/// Convenience wrapper for locating project-level files.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    root: PathBuf,
}

impl ProjectPaths {
    /// Create a new path helper rooted at the project root.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Return the project root used for path derivation.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return the `config.yaml` path.
    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    /// Return the `run_counter.txt` path.
    pub fn counter_path(&self) -> PathBuf {
        self.root.join(RUN_COUNTER_FILE)
    }

    /// Return the `tekton_validation_errors.log` path.
    pub fn run_log_path(&self) -> PathBuf {
        self.root.join(RUN_LOG_FILE)
    }

    /// Return the `prompts/` directory path.
    pub fn prompts_dir(&self) -> PathBuf {
        self.root.join(PROMPTS_DIR)
    }

    /// Resolve a configured directory against the project root.
    ///
    /// Absolute paths are returned unchanged.
    pub fn resolve(&self, configured: &Path) -> PathBuf {
        self.root.join(configured)
    }
}

/// Lifecycle stage of a generated Tekton pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetStage {
    Initial,
    Validated,
    Validated2,
}

impl TargetStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetStage::Initial => "initial",
            TargetStage::Validated => "validated",
            TargetStage::Validated2 => "validated2",
        }
    }
}

impl fmt::Display for TargetStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output file names for one source artifact within one run.
#[derive(Debug, Clone)]
pub struct ArtifactNames {
    output_dir: PathBuf,
    run_number: u64,
    base_name: String,
}

impl ArtifactNames {
    pub fn new(output_dir: &Path, run_number: u64, base_name: &str) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            run_number,
            base_name: base_name.to_string(),
        }
    }

    /// Derive the base name from a source path (file name without its extension).
    pub fn for_source(output_dir: &Path, run_number: u64, source: &Path) -> Self {
        let base_name = source
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "pipeline".to_string());
        Self::new(output_dir, run_number, &base_name)
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// `{run}-{name}.json`
    pub fn intermediate(&self) -> PathBuf {
        self.output_dir.join(format!("{}-{}.json", self.run_number, self.base_name))
    }

    /// `{run}-{name}-tekton-pipeline.yaml`, optionally prefixed with the stage tag.
    pub fn target(&self, stage: TargetStage) -> PathBuf {
        let name = match stage {
            TargetStage::Initial => {
                format!("{}-{}-tekton-pipeline.yaml", self.run_number, self.base_name)
            }
            TargetStage::Validated | TargetStage::Validated2 => format!(
                "{}-{}-{}-tekton-pipeline.yaml",
                self.run_number,
                stage.as_str(),
                self.base_name
            ),
        };
        self.output_dir.join(name)
    }
}
