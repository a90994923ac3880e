use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Ordered journal of the paths one install created or replaced.
///
/// Entries are appended in the order the filesystem was touched and a path is
/// kept only at its first position. Forward iteration replays the install;
/// [`Manifest::iter_rev`] is the undo order, in which every file comes before
/// the directories that were created to hold it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<PathBuf>", into = "Vec<PathBuf>")]
pub struct Manifest {
    paths: Vec<PathBuf>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `path` unless it is already recorded. Returns whether it was added.
    pub fn record(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        if self.contains(&path) {
            return false;
        }
        self.paths.push(path);
        true
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Paths in installation order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Path> {
        self.paths.iter().map(PathBuf::as_path)
    }

    /// Paths in undo order (newest first).
    pub fn iter_rev(&self) -> impl Iterator<Item = &Path> {
        self.iter().rev()
    }

    /// Append every path of `other` not already present.
    pub fn merge(&mut self, other: Manifest) {
        for path in other.paths {
            self.record(path);
        }
    }

    /// Replace the entry `old` with `new` in place. Returns whether `old` was found.
    pub fn rewrite(&mut self, old: &Path, new: PathBuf) -> bool {
        match self.paths.iter().position(|p| p == old) {
            Some(index) => {
                self.paths[index] = new;
                true
            }
            None => false,
        }
    }
}

impl From<Vec<PathBuf>> for Manifest {
    fn from(paths: Vec<PathBuf>) -> Self {
        let mut manifest = Manifest::new();
        for path in paths {
            manifest.record(path);
        }
        manifest
    }
}

impl From<Manifest> for Vec<PathBuf> {
    fn from(manifest: Manifest) -> Self {
        manifest.paths
    }
}
