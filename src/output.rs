// Output file handling: the ranked list is written as pretty JSON through a
// sibling temp file and a rename, so readers never see a partial file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::models::job::{JobRecord, Requirements};

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "jobs.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `jobs` to `path`, replacing any previous file atomically.
pub async fn write_jobs(path: &Path, jobs: &[JobRecord]) -> Result<(), AppError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AppError::io(parent, e))?;
    }

    let contents = serde_json::to_string_pretty(jobs).map_err(|e| AppError::json(path, e))?;
    let tmp = temp_path(path);
    tokio::fs::write(&tmp, contents)
        .await
        .map_err(|e| AppError::io(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| AppError::io(path, e))?;

    tracing::info!("Wrote {} jobs to {}", jobs.len(), path.display());
    Ok(())
}

/// Requirements attached to records of a previous run, keyed by id. A
/// missing or unreadable file just means nothing to carry over.
pub async fn load_previous_requirements(path: &Path) -> HashMap<String, Requirements> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
        Err(e) => {
            tracing::warn!("Could not read previous output {}: {e}", path.display());
            return HashMap::new();
        }
    };

    match serde_json::from_str::<Vec<JobRecord>>(&contents) {
        Ok(jobs) => jobs
            .into_iter()
            .filter_map(|job| job.requirements.map(|r| (job.id, r)))
            .collect(),
        Err(e) => {
            tracing::warn!("Ignoring previous output {}: {e}", path.display());
            HashMap::new()
        }
    }
}

/// Re-attach requirements to records whose id survived. Returns how many
/// records received one.
pub fn carry_over_requirements(
    jobs: &mut [JobRecord],
    mut previous: HashMap<String, Requirements>,
) -> usize {
    let mut carried = 0;
    for job in jobs.iter_mut().filter(|j| j.requirements.is_none()) {
        if let Some(requirements) = previous.remove(&job.id) {
            job.requirements = Some(requirements);
            carried += 1;
        }
    }
    carried
}
