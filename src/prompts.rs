//! Versioned prompt templates.
//!
//! Each role has one active file under `prompts/`. Replacing a prompt first
//! snapshots the active text to `<base>_v<N>.txt`, where `N` is one more than
//! the highest snapshot already on disk. Snapshots are never reused or pruned.
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

const JENKINS2JSON: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/jenkins2json.txt"
));
const JSON2TEKTON: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/json2tekton.txt"
));
const VALIDATE_TEKTON: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/validate_tekton_pipeline.txt"
));
const FIX_TEKTON: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/fix_tekton_pipeline.txt"
));

/// Logical prompt roles used by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    /// Jenkins source to intermediate JSON.
    SourceToIntermediate,
    /// Intermediate JSON to Tekton YAML. The only role the refiner rewrites.
    IntermediateToTarget,
    /// First validation pass.
    Validate,
    /// Second, fix-focused validation pass.
    Fix,
}

impl PromptRole {
    /// File name of the active template.
    pub fn file_name(&self) -> &'static str {
        match self {
            PromptRole::SourceToIntermediate => "jenkins2json.txt",
            PromptRole::IntermediateToTarget => "json2tekton.txt",
            PromptRole::Validate => "validate_tekton_pipeline.txt",
            PromptRole::Fix => "fix_tekton_pipeline.txt",
        }
    }

    /// File name without the `.txt` extension; snapshots are `<base>_v<N>.txt`.
    pub fn base_name(&self) -> &'static str {
        let name = self.file_name();
        name.strip_suffix(".txt").unwrap_or(name)
    }

    fn bundled(&self) -> &'static str {
        match self {
            PromptRole::SourceToIntermediate => JENKINS2JSON,
            PromptRole::IntermediateToTarget => JSON2TEKTON,
            PromptRole::Validate => VALIDATE_TEKTON,
            PromptRole::Fix => FIX_TEKTON,
        }
    }
}

impl fmt::Display for PromptRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PromptRole::SourceToIntermediate => "source->intermediate",
            PromptRole::IntermediateToTarget => "intermediate->target",
            PromptRole::Validate => "validate",
            PromptRole::Fix => "fix",
        };
        f.write_str(label)
    }
}

/// Prompt templates stored as plain text files in one directory.
#[derive(Debug, Clone)]
pub struct PromptStore {
    dir: PathBuf,
}

impl PromptStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Path of the active template for `role`.
    pub fn active_path(&self, role: PromptRole) -> PathBuf {
        self.dir.join(role.file_name())
    }

    /// Path of snapshot `version` for `role`.
    pub fn snapshot_path(&self, role: PromptRole, version: u64) -> PathBuf {
        self.dir.join(format!("{}_v{}.txt", role.base_name(), version))
    }

    /// Read the active template, falling back to the bundled default when
    /// no active file exists yet.
    pub fn read(&self, role: PromptRole) -> Result<String> {
        let path = self.active_path(role);
        if !path.exists() {
            tracing::warn!(
                role = %role,
                path = %path.display(),
                "prompt file not found, using bundled default"
            );
            return Ok(role.bundled().to_string());
        }
        fs::read_to_string(&path).with_context(|| format!("read prompt {}", path.display()))
    }

    /// Highest snapshot number on disk for `role`, 0 when there are none.
    pub fn latest_snapshot(&self, role: PromptRole) -> Result<u64> {
        if !self.dir.is_dir() {
            return Ok(0);
        }
        let pattern = Regex::new(&format!(r"^{}_v(\d+)\.txt$", regex::escape(role.base_name())))
            .context("compile snapshot pattern")?;
        let entries =
            fs::read_dir(&self.dir).with_context(|| format!("read {}", self.dir.display()))?;
        let mut max_version = 0;
        for entry in entries {
            let entry = entry.with_context(|| format!("read {}", self.dir.display()))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some(captures) = pattern.captures(name) else {
                continue;
            };
            if let Ok(version) = captures[1].parse::<u64>() {
                max_version = max_version.max(version);
            }
        }
        Ok(max_version)
    }

    /// Snapshot the active template and overwrite it with `new_text`.
    ///
    /// Returns the snapshot path, or `None` when there was no active file to
    /// snapshot. A failed snapshot leaves the active file untouched.
    pub fn archive_and_replace(&self, role: PromptRole, new_text: &str) -> Result<Option<PathBuf>> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create {}", self.dir.display()))?;
        let active = self.active_path(role);

        let snapshot = if active.exists() {
            let latest = self.latest_snapshot(role)?;
            let version = latest.checked_add(1).ok_or_else(|| {
                anyhow!("no snapshot number left after {}_v{latest}", role.base_name())
            })?;
            let snapshot = self.snapshot_path(role, version);
            copy_with_mtime(&active, &snapshot)?;
            tracing::info!(
                role = %role,
                snapshot = %snapshot.display(),
                "archived prompt"
            );
            Some(snapshot)
        } else {
            tracing::warn!(
                role = %role,
                path = %active.display(),
                "active prompt missing, nothing to archive"
            );
            None
        };

        fs::write(&active, new_text.as_bytes())
            .with_context(|| format!("write prompt {}", active.display()))?;
        tracing::info!(role = %role, path = %active.display(), "prompt updated");
        Ok(snapshot)
    }
}

fn copy_with_mtime(src: &Path, dest: &Path) -> Result<()> {
    if dest.exists() {
        return Err(anyhow!("snapshot {} already exists", dest.display()));
    }
    fs::copy(src, dest)
        .with_context(|| format!("copy {} to {}", src.display(), dest.display()))?;
    let modified = fs::metadata(src)
        .and_then(|meta| meta.modified())
        .with_context(|| format!("stat {}", src.display()))?;
    File::options()
        .write(true)
        .open(dest)
        .and_then(|file| file.set_modified(modified))
        .with_context(|| format!("preserve mtime on {}", dest.display()))?;
    Ok(())
}
