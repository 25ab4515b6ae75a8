//! Cheap checks run before and after decoding.

use std::io::Read;
use std::path::Path;

use crate::config::LimitsConfig;
use crate::error::PipelineError;

/// Leading-byte signatures of the formats in the default allow-list.
const SIGNATURES: &[(&str, &[u8])] = &[
    ("jpeg", &[0xFF, 0xD8, 0xFF]),
    ("png", &[0x89, b'P', b'N', b'G']),
    ("gif", b"GIF8"),
    ("bmp", b"BM"),
    ("tiff", &[b'I', b'I', 0x2A, 0x00]),
    ("tiff", &[b'M', b'M', 0x00, 0x2A]),
];

/// Rejects files that cannot be images or exceed the configured limits.
pub struct Validator {
    limits: LimitsConfig,
}

impl Validator {
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Existence, size limit and magic bytes. Returns the file size.
    pub fn validate(&self, path: &Path) -> Result<u64, PipelineError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PipelineError::FileNotFound(path.to_path_buf())
            } else {
                PipelineError::Decode {
                    path: path.to_path_buf(),
                    message: format!("Cannot read metadata: {}", e),
                }
            }
        })?;

        let max_bytes = self.limits.max_file_size_mb * 1024 * 1024;
        if metadata.len() > max_bytes {
            return Err(PipelineError::FileTooLarge {
                path: path.to_path_buf(),
                size_mb: metadata.len() / (1024 * 1024),
                max_mb: self.limits.max_file_size_mb,
            });
        }

        let mut header = [0u8; 12];
        let bytes_read = std::fs::File::open(path)
            .and_then(|mut f| f.read(&mut header))
            .map_err(|e| PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Cannot open file: {}", e),
            })?;

        if bytes_read < 4 {
            return Err(PipelineError::Decode {
                path: path.to_path_buf(),
                message: "File too small to be a valid image".to_string(),
            });
        }
        if detect_format(&header[..bytes_read]).is_none() {
            return Err(PipelineError::Decode {
                path: path.to_path_buf(),
                message: "Unrecognized image format (invalid magic bytes)".to_string(),
            });
        }

        Ok(metadata.len())
    }

    /// Post-decode dimension limit.
    pub fn check_dimensions(&self, path: &Path, width: u32, height: u32) -> Result<(), PipelineError> {
        let max_dim = self.limits.max_image_dimension;
        if width > max_dim || height > max_dim {
            return Err(PipelineError::ImageTooLarge {
                path: path.to_path_buf(),
                width,
                height,
                max_dim,
            });
        }
        Ok(())
    }
}

/// Format name for a file header, if it matches a known signature.
pub fn detect_format(header: &[u8]) -> Option<&'static str> {
    if let Some((name, _)) = SIGNATURES.iter().find(|(_, sig)| header.starts_with(sig)) {
        return Some(*name);
    }
    // WebP: RIFF....WEBP
    if header.starts_with(b"RIFF") && (header.len() < 12 || &header[8..12] == b"WEBP") {
        return Some("webp");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_known_formats() {
        assert_eq!(detect_format(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("jpeg"));
        assert_eq!(detect_format(&[0x89, b'P', b'N', b'G', 0x0D]), Some("png"));
        assert_eq!(detect_format(b"BM\x00\x00"), Some("bmp"));
        assert_eq!(detect_format(b"GIF89a"), Some("gif"));
        assert_eq!(detect_format(b"RIFF\x00\x00\x00\x00WEBP"), Some("webp"));
        assert_eq!(detect_format(&[b'I', b'I', 0x2A, 0x00]), Some("tiff"));
        assert_eq!(detect_format(&[b'M', b'M', 0x00, 0x2A]), Some("tiff"));
    }

    #[test]
    fn test_detect_rejects_lookalikes() {
        assert_eq!(detect_format(&[0, 0, 0, 0]), None);
        assert_eq!(detect_format(&[b'I', b'I', 0x00, 0x00]), None);
        assert_eq!(detect_format(b"RIFF\x00\x00\x00\x00WAVE"), None);
    }

    #[test]
    fn test_validate_missing_file() {
        let validator = Validator::new(LimitsConfig::default());
        let err = validator.validate(Path::new("/no/such/image.png")).unwrap_err();
        assert!(matches!(err, PipelineError::FileNotFound(_)));
    }

    #[test]
    fn test_validate_garbage_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.png");
        std::fs::write(&path, b"not an image at all").unwrap();
        let err = Validator::new(LimitsConfig::default())
            .validate(&path)
            .unwrap_err();
        assert!(err.to_string().contains("magic bytes"));
    }

    #[test]
    fn test_dimension_limit() {
        let validator = Validator::new(LimitsConfig {
            max_image_dimension: 100,
            ..LimitsConfig::default()
        });
        assert!(validator.check_dimensions(Path::new("a.png"), 100, 50).is_ok());
        let err = validator
            .check_dimensions(Path::new("a.png"), 101, 50)
            .unwrap_err();
        assert!(matches!(err, PipelineError::ImageTooLarge { .. }));
    }
}
