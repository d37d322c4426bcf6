// Directory-backed image registry
//
// An image exists when a regular file with an allowed extension sits in the
// upload directory. Nothing else is stored about it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::core::errors::{GcpError, GcpResult};
use crate::core::types::IncomingImage;

/// Extensions accepted for upload, compared case-insensitively
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// True when `filename` ends in `.png`, `.jpg` or `.jpeg` (any case)
pub fn is_allowed_extension(filename: &str) -> bool {
    match filename.rsplit_once('.') {
        Some((_, ext)) => ALLOWED_EXTENSIONS
            .iter()
            .any(|allowed| ext.eq_ignore_ascii_case(allowed)),
        None => false,
    }
}

/// MIME type served for a stored image
pub fn content_type_for(filename: &str) -> &'static str {
    match filename.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Reject names that could escape the upload directory.
fn check_filename(filename: &str) -> GcpResult<()> {
    if filename.is_empty()
        || filename == "."
        || filename == ".."
        || filename.contains(['/', '\\', '\0'])
    {
        return Err(GcpError::InvalidFilename(filename.to_string()));
    }
    Ok(())
}

/// Validate a name for upload: safe filename and allowed extension
pub fn validate_upload_name(filename: &str) -> GcpResult<()> {
    check_filename(filename)?;
    if !is_allowed_extension(filename) {
        return Err(GcpError::InvalidExtension(filename.to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ImageRegistry {
    upload_dir: PathBuf,
}

impl ImageRegistry {
    /// Open the registry, creating the upload directory if needed.
    pub async fn open(upload_dir: impl Into<PathBuf>) -> Result<Self> {
        let upload_dir = upload_dir.into();
        if !upload_dir.exists() {
            tokio::fs::create_dir_all(&upload_dir)
                .await
                .with_context(|| {
                    format!("Failed to create upload directory {}", upload_dir.display())
                })?;
            info!("Created upload directory {}", upload_dir.display());
        }
        Ok(Self { upload_dir })
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Names of all regular files in the upload directory, sorted.
    pub async fn list(&self) -> GcpResult<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.upload_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            // Non UTF-8 names cannot be addressed over HTTP anyway
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => debug!("Skipping non UTF-8 filename {:?}", raw),
            }
        }
        names.sort();
        Ok(names)
    }

    /// Listed files restricted to allowed image extensions.
    pub async fn list_images(&self) -> GcpResult<Vec<String>> {
        let mut names = self.list().await?;
        names.retain(|name| is_allowed_extension(name));
        Ok(names)
    }

    /// Write one image, silently replacing a file of the same name.
    pub async fn store(&self, filename: &str, bytes: &[u8]) -> GcpResult<()> {
        validate_upload_name(filename)?;
        tokio::fs::write(self.upload_dir.join(filename), bytes).await?;
        debug!("Stored {} ({} bytes)", filename, bytes.len());
        Ok(())
    }

    /// Write a batch of images.
    ///
    /// Every name is validated before the first write, so a bad extension
    /// anywhere fails the batch with nothing on disk. An I/O failure part way
    /// through leaves the earlier files in place; `on_stored` runs after each
    /// successful write so callers can register those files as they land.
    pub async fn store_all<F>(
        &self,
        images: &[IncomingImage],
        mut on_stored: F,
    ) -> GcpResult<Vec<String>>
    where
        F: FnMut(&str),
    {
        for image in images {
            validate_upload_name(&image.filename)?;
        }

        let mut stored = Vec::with_capacity(images.len());
        for image in images {
            self.store(&image.filename, &image.bytes).await?;
            on_stored(&image.filename);
            stored.push(image.filename.clone());
        }
        Ok(stored)
    }

    /// Raw bytes of a stored file.
    pub async fn fetch(&self, filename: &str) -> GcpResult<Vec<u8>> {
        check_filename(filename)?;
        let path = self.upload_dir.join(filename);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(tokio::fs::read(&path).await?),
            Ok(_) => Err(GcpError::FileNotFound(filename.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(GcpError::FileNotFound(filename.to_string()))
            }
            Err(e) => Err(GcpError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScratchDir;

    #[test]
    fn test_allowed_extensions() {
        assert!(is_allowed_extension("a.png"));
        assert!(is_allowed_extension("a.JPG"));
        assert!(is_allowed_extension("archive.tar.jpeg"));
        assert!(!is_allowed_extension("a.gif"));
        assert!(!is_allowed_extension("png"));
        assert!(!is_allowed_extension("a.png.txt"));
    }

    #[test]
    fn test_upload_name_validation() {
        assert!(matches!(
            validate_upload_name("../evil.png"),
            Err(GcpError::InvalidFilename(_))
        ));
        assert!(matches!(
            validate_upload_name(""),
            Err(GcpError::InvalidFilename(_))
        ));
        assert!(matches!(
            validate_upload_name("notes.txt"),
            Err(GcpError::InvalidExtension(_))
        ));
        assert!(validate_upload_name("site 1.jpeg").is_ok());
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type_for("a.PNG"), "image/png");
        assert_eq!(content_type_for("a.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("a"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_store_fetch_and_overwrite() {
        let dir = ScratchDir::new("registry_store");
        let registry = ImageRegistry::open(dir.path()).await.unwrap();

        registry.store("a.jpg", b"first").await.unwrap();
        registry.store("a.jpg", b"second").await.unwrap();

        assert_eq!(registry.fetch("a.jpg").await.unwrap(), b"second");
        assert_eq!(registry.list().await.unwrap(), vec!["a.jpg".to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_extension_ignores_content() {
        let dir = ScratchDir::new("registry_ext");
        let registry = ImageRegistry::open(dir.path()).await.unwrap();

        // Valid PNG magic bytes do not rescue a wrong extension
        let err = registry
            .store("image.gif", b"\x89PNG\r\n\x1a\n")
            .await
            .unwrap_err();
        assert!(matches!(err, GcpError::InvalidExtension(_)));
        assert!(registry.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_validates_before_writing() {
        let dir = ScratchDir::new("registry_batch");
        let registry = ImageRegistry::open(dir.path()).await.unwrap();

        let batch = vec![
            IncomingImage { filename: "a.png".into(), bytes: vec![1] },
            IncomingImage { filename: "b.bmp".into(), bytes: vec![2] },
        ];
        assert!(matches!(
            registry.store_all(&batch, |_| {}).await,
            Err(GcpError::InvalidExtension(name)) if name == "b.bmp"
        ));
        assert!(registry.list().await.unwrap().is_empty());

        let batch = vec![
            IncomingImage { filename: "a.png".into(), bytes: vec![1] },
            IncomingImage { filename: "b.jpeg".into(), bytes: vec![2] },
        ];
        let mut seen = Vec::new();
        let stored = registry
            .store_all(&batch, |name| seen.push(name.to_string()))
            .await
            .unwrap();
        assert_eq!(stored, vec!["a.png".to_string(), "b.jpeg".to_string()]);
        assert_eq!(seen, stored);
    }

    #[tokio::test]
    async fn test_batch_reports_writes_before_io_failure() {
        let dir = ScratchDir::new("registry_batch_io");
        // A directory in the way makes the second write fail
        std::fs::create_dir(dir.join("b.png")).unwrap();
        let registry = ImageRegistry::open(dir.path()).await.unwrap();

        let batch = vec![
            IncomingImage { filename: "a.png".into(), bytes: vec![1] },
            IncomingImage { filename: "b.png".into(), bytes: vec![2] },
            IncomingImage { filename: "c.png".into(), bytes: vec![3] },
        ];
        let mut seen = Vec::new();
        let result = registry
            .store_all(&batch, |name| seen.push(name.to_string()))
            .await;

        assert!(matches!(result, Err(GcpError::Io(_))));
        assert_eq!(seen, vec!["a.png".to_string()]);
        assert_eq!(registry.fetch("a.png").await.unwrap(), vec![1]);
        assert!(matches!(
            registry.fetch("c.png").await,
            Err(GcpError::FileNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_listing_skips_directories() {
        let dir = ScratchDir::new("registry_list");
        std::fs::create_dir(dir.join("nested.png")).unwrap();
        std::fs::write(dir.join("readme.txt"), b"x").unwrap();
        std::fs::write(dir.join("b.png"), b"x").unwrap();
        std::fs::write(dir.join("a.JPG"), b"x").unwrap();

        let registry = ImageRegistry::open(dir.path()).await.unwrap();
        assert_eq!(
            registry.list().await.unwrap(),
            vec!["a.JPG".to_string(), "b.png".to_string(), "readme.txt".to_string()]
        );
        assert_eq!(
            registry.list_images().await.unwrap(),
            vec!["a.JPG".to_string(), "b.png".to_string()]
        );
    }

    #[tokio::test]
    async fn test_fetch_missing_and_traversal() {
        let dir = ScratchDir::new("registry_fetch");
        let registry = ImageRegistry::open(dir.path()).await.unwrap();

        assert!(matches!(
            registry.fetch("nope.png").await,
            Err(GcpError::FileNotFound(_))
        ));
        assert!(matches!(
            registry.fetch("../secret").await,
            Err(GcpError::InvalidFilename(_))
        ));
    }

    #[tokio::test]
    async fn test_open_creates_directory() {
        let dir = ScratchDir::new("registry_open");
        let nested = dir.join("static/uploads");
        let registry = ImageRegistry::open(&nested).await.unwrap();
        assert!(registry.upload_dir().is_dir());
    }
}
