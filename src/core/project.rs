//! Project discovery and initialization
//!
//! A project is any directory containing a `.sysprov/` folder. Commands run
//! from a subdirectory walk up until they find one.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::config::DEFAULT_CONFIG;

/// Name of the project marker directory
pub const PROJECT_DIR: &str = ".sysprov";

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("not a sysprov project (no {PROJECT_DIR}/ found in {0} or any parent); run `sysprov init`")]
    NotFound(PathBuf),

    #[error("project already initialized at {0}")]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
}

impl Project {
    /// Discover the project from the current directory
    pub fn discover() -> Result<Self, ProjectError> {
        Self::discover_from(&std::env::current_dir()?)
    }

    /// Walk up from `start` to the nearest directory holding `.sysprov/`
    pub fn discover_from(start: &Path) -> Result<Self, ProjectError> {
        let mut current = Some(start);
        while let Some(dir) = current {
            if dir.join(PROJECT_DIR).is_dir() {
                return Ok(Self {
                    root: dir.to_path_buf(),
                });
            }
            current = dir.parent();
        }
        Err(ProjectError::NotFound(start.to_path_buf()))
    }

    /// Create `.sysprov/` with a default config; fails if it already exists
    pub fn init(root: &Path) -> Result<Self, ProjectError> {
        let dir = root.join(PROJECT_DIR);
        if dir.exists() {
            return Err(ProjectError::AlreadyExists(root.to_path_buf()));
        }
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("config.yaml"), DEFAULT_CONFIG)?;
        fs::write(dir.join(".gitignore"), "provisioning.db*\n")?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sysprov_dir(&self) -> PathBuf {
        self.root.join(PROJECT_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.sysprov_dir().join("config.yaml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_then_discover_from_subdir() {
        let tmp = tempdir().unwrap();
        let project = Project::init(tmp.path()).unwrap();
        assert!(project.config_path().exists());

        let nested = tmp.path().join("site").join("north");
        fs::create_dir_all(&nested).unwrap();
        let found = Project::discover_from(&nested).unwrap();
        assert_eq!(found.root(), tmp.path());
    }

    #[test]
    fn test_init_twice_fails() {
        let tmp = tempdir().unwrap();
        Project::init(tmp.path()).unwrap();
        assert!(matches!(
            Project::init(tmp.path()),
            Err(ProjectError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_discover_outside_project() {
        let tmp = tempdir().unwrap();
        assert!(matches!(
            Project::discover_from(tmp.path()),
            Err(ProjectError::NotFound(_))
        ));
    }
}
