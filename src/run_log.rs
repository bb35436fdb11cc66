//! Human-readable run log of validation reports.
//!
//! The log is truncated to a header at the start of each run and only
//! appended to afterwards. The refiner reads it back as model feedback.
use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Delimiters for one report entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportHeading {
    pub title: &'static str,
    pub footer: &'static str,
    /// Text used when the pass produced an empty report.
    pub empty_note: &'static str,
}

#[derive(Debug, Clone)]
pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Truncate the log and write the header for `run_number`.
    pub fn reset(&self, run_number: u64) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&self.path, header(run_number))
            .with_context(|| format!("initialize {}", self.path.display()))?;
        tracing::info!(run = run_number, path = %self.path.display(), "run log initialized");
        Ok(())
    }

    /// Append one delimited report for `artifact`.
    pub fn append_report(
        &self,
        heading: &ReportHeading,
        run_number: u64,
        artifact: &Path,
        report: &str,
    ) -> Result<()> {
        let entry = format_entry(heading, run_number, artifact, report);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open {} for append", self.path.display()))?;
        file.write_all(entry.as_bytes())
            .with_context(|| format!("append to {}", self.path.display()))?;
        Ok(())
    }

    pub fn read(&self) -> Result<String> {
        fs::read_to_string(&self.path).with_context(|| format!("read {}", self.path.display()))
    }

    /// True when the log holds anything beyond its header.
    pub fn has_entries(&self) -> Result<bool> {
        let text = self.read()?;
        Ok(text.trim().lines().count() > 2)
    }
}

fn header(run_number: u64) -> String {
    format!("# Tekton Validation Errors and Reports - Run {run_number}\n\n")
}

fn format_entry(heading: &ReportHeading, run_number: u64, artifact: &Path, report: &str) -> String {
    let artifact = artifact.display();
    let mut entry = format!(
        "--- {} for Run {run_number}, File: {artifact} ---\n",
        heading.title
    );
    if report.trim().is_empty() {
        entry.push_str(&heading.empty_note.replace("{artifact}", &artifact.to_string()));
    } else {
        entry.push_str(report);
    }
    entry.push('\n');
    entry.push_str(&format!("--- {} ---\n\n", heading.footer));
    entry
}
