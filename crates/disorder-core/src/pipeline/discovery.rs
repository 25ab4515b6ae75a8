//! Path enumeration and resume filtering.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::ProcessingConfig;
use crate::error::ConfigError;

/// Produces the ordered list of image paths under a root.
pub struct PathEnumerator {
    supported_formats: Vec<String>,
    truncate: Option<usize>,
}

impl PathEnumerator {
    /// Create an enumerator from processing settings.
    pub fn new(config: &ProcessingConfig) -> Self {
        Self {
            supported_formats: config
                .supported_formats
                .iter()
                .map(|f| f.to_lowercase())
                .collect(),
            truncate: config.truncate,
        }
    }

    /// Enumerate supported image paths under `root`, sorted by path.
    ///
    /// The root is canonicalized first, so every returned path is absolute and
    /// spelled the same way however the root was written. A file root yields
    /// itself; a directory root is walked recursively. The result keeps the
    /// first `truncate` paths when a limit is set.
    pub fn enumerate(&self, root: &Path) -> Result<Vec<PathBuf>, ConfigError> {
        let root = std::fs::canonicalize(root).map_err(|e| ConfigError::InvalidRoot {
            path: root.to_path_buf(),
            reason: if e.kind() == std::io::ErrorKind::NotFound {
                "path does not exist".to_string()
            } else {
                e.to_string()
            },
        })?;

        let mut paths = if root.is_file() {
            if !self.is_supported(&root) {
                return Err(ConfigError::InvalidRoot {
                    path: root,
                    reason: "file extension is not a supported image format".to_string(),
                });
            }
            vec![root.clone()]
        } else if root.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(&root)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && self.is_supported(e.path()))
                .map(|e| e.into_path())
                .collect();

            // Sort by path for deterministic ordering
            found.sort();
            found
        } else {
            return Err(ConfigError::InvalidRoot {
                path: root,
                reason: "neither a file nor a directory".to_string(),
            });
        };

        if let Some(limit) = self.truncate {
            paths.truncate(limit);
        }
        tracing::debug!("Enumerated {} image paths under {:?}", paths.len(), root);
        Ok(paths)
    }

    /// Paths not yet recorded in the destination, in their original order.
    pub fn remaining(paths: Vec<PathBuf>, recorded: &[PathBuf]) -> Vec<PathBuf> {
        if recorded.is_empty() {
            return paths;
        }
        let done: HashSet<&PathBuf> = recorded.iter().collect();
        paths.into_iter().filter(|p| !done.contains(p)).collect()
    }

    /// Check if a file has a supported extension.
    fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext_lower = ext.to_lowercase();
                self.supported_formats.iter().any(|fmt| *fmt == ext_lower)
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enumerator(truncate: Option<usize>) -> PathEnumerator {
        PathEnumerator::new(&ProcessingConfig {
            truncate,
            ..ProcessingConfig::default()
        })
    }

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_is_supported() {
        let e = enumerator(None);
        assert!(e.is_supported(Path::new("test.jpg")));
        assert!(e.is_supported(Path::new("test.JPG")));
        assert!(e.is_supported(Path::new("test.bmp")));
        assert!(e.is_supported(Path::new("test.tiff")));
        assert!(!e.is_supported(Path::new("test.txt")));
        assert!(!e.is_supported(Path::new("noext")));
    }

    #[test]
    fn test_directory_walk_is_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("b/2.png"));
        touch(&dir.path().join("a/1.jpg"));
        touch(&dir.path().join("a/notes.txt"));
        touch(&dir.path().join("c.BMP"));

        let root = dir.path().canonicalize().unwrap();
        let paths = enumerator(None).enumerate(dir.path()).unwrap();
        assert_eq!(
            paths,
            vec![root.join("a/1.jpg"), root.join("b/2.png"), root.join("c.BMP")]
        );
    }

    #[test]
    fn test_truncate_keeps_first_paths() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            touch(&dir.path().join(format!("{i}.png")));
        }
        let root = dir.path().canonicalize().unwrap();
        let paths = enumerator(Some(2)).enumerate(dir.path()).unwrap();
        assert_eq!(paths, vec![root.join("0.png"), root.join("1.png")]);
    }

    #[test]
    fn test_file_root() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("only.png");
        touch(&image);
        assert_eq!(
            enumerator(None).enumerate(&image).unwrap(),
            vec![image.canonicalize().unwrap()]
        );

        let text = dir.path().join("readme.md");
        touch(&text);
        let err = enumerator(None).enumerate(&text).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRoot { .. }));
    }

    #[test]
    fn test_missing_root_is_invalid() {
        let err = enumerator(None)
            .enumerate(Path::new("/definitely/not/here"))
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_root_spellings_enumerate_identical_paths() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("imgs/a.png"));
        touch(&dir.path().join("imgs/sub/b.jpg"));
        std::fs::create_dir_all(dir.path().join("imgs/sub/empty")).unwrap();

        let e = enumerator(None);
        let plain = e.enumerate(&dir.path().join("imgs")).unwrap();
        let dotted = e.enumerate(&dir.path().join("imgs/./sub/empty/../..")).unwrap();
        assert_eq!(plain, dotted);
        assert!(plain.iter().all(|p| p.is_absolute()));
        assert!(PathEnumerator::remaining(dotted, &plain).is_empty());
    }

    #[test]
    fn test_remaining_preserves_order() {
        let all: Vec<PathBuf> = ["a", "b", "c", "d"].iter().map(PathBuf::from).collect();
        let recorded = vec![PathBuf::from("a"), PathBuf::from("c")];
        assert_eq!(
            PathEnumerator::remaining(all.clone(), &recorded),
            vec![PathBuf::from("b"), PathBuf::from("d")]
        );
        assert_eq!(PathEnumerator::remaining(all.clone(), &[]), all);
    }
}
