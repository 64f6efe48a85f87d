use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Scratch paths used by one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingLayout {
    /// Where downloaded csvs land.
    pub csv_dir: PathBuf,
    /// The service definition file uploaded to the portal.
    pub staged_features: PathBuf,
}

impl StagingLayout {
    pub fn new(scratch_dir: &Path, service_name: &str) -> Self {
        Self {
            csv_dir: scratch_dir.join("fleet"),
            staged_features: scratch_dir.join(format!("{service_name}.geojson")),
        }
    }

    /// Clear anything left by a previous run and recreate an empty csv directory.
    pub fn reset(&self) -> io::Result<()> {
        for path in [&self.csv_dir, &self.staged_features] {
            remove_if_exists(path)?;
        }
        fs::create_dir_all(&self.csv_dir)?;
        debug!(path = %self.csv_dir.display(), "Created csv staging directory");
        Ok(())
    }
}

/// Delete a file or directory tree if present. Missing paths are not an error.
pub fn remove_if_exists(path: &Path) -> io::Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    info!(path = %path.display(), "Deleting prior to use...");
    if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_clears_previous_run() {
        let scratch = tempfile::tempdir().unwrap();
        let layout = StagingLayout::new(scratch.path(), "FleetVehicles");
        fs::create_dir_all(&layout.csv_dir).unwrap();
        fs::write(layout.csv_dir.join("vehicle_data_20230101.csv"), "x").unwrap();
        fs::write(&layout.staged_features, "{}").unwrap();

        layout.reset().unwrap();

        assert!(layout.csv_dir.is_dir());
        assert_eq!(fs::read_dir(&layout.csv_dir).unwrap().count(), 0);
        assert!(!layout.staged_features.exists());
    }

    #[test]
    fn removing_missing_path_is_ok() {
        let scratch = tempfile::tempdir().unwrap();
        remove_if_exists(&scratch.path().join("nope")).unwrap();
    }
}
