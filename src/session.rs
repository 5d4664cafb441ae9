//! Screenshot working directory for one run.
//!
//! Screenshots are written locally first and uploaded to the store as
//! artifacts; the directory is cleared when a run starts so leftover frames
//! from a previous run in the same container never leak into oracle context.

use std::fs;
use std::path::{Path, PathBuf};

/// Per-run screenshot directory and naming.
#[derive(Debug)]
pub struct Session {
    job_name: String,
    dir: PathBuf,
    /// Count of screenshots taken so far.
    counter: usize,
}

impl Session {
    /// Create a session for `job_name` under `dir`, clearing any files left
    /// from a previous run.
    pub fn new(job_name: impl Into<String>, dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        clear_folder(&dir)?;
        Ok(Self {
            job_name: job_name.into(),
            dir,
            counter: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    /// Path for the next screenshot; advances the counter.
    pub fn next_screenshot_path(&mut self) -> PathBuf {
        let path = self.screenshot_path(self.counter);
        self.counter += 1;
        path
    }

    /// The most recently captured screenshot, if any.
    pub fn latest(&self) -> Option<PathBuf> {
        self.counter.checked_sub(1).map(|i| self.screenshot_path(i))
    }

    /// The screenshot before the latest, if any.
    pub fn previous(&self) -> Option<PathBuf> {
        self.counter.checked_sub(2).map(|i| self.screenshot_path(i))
    }

    fn screenshot_path(&self, index: usize) -> PathBuf {
        self.dir
            .join(format!("testSuite_{}_{}.png", sanitize_name(&self.job_name), index))
    }
}

/// Create `dir` if missing, otherwise delete the plain files inside it.
fn clear_folder(dir: &Path) -> std::io::Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            fs::remove_file(path)?;
        }
    }
    Ok(())
}

/// Sanitize a name for use in filenames
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}
