//! Gallery listing over the watched image directory.

use std::path::{Path, PathBuf};

use tracing::debug;

/// Extensions served by the gallery, matched case-insensitively.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "avif", "svg"];

/// Read-only view of the image directory.
pub struct GalleryService {
    directory: PathBuf,
}

impl GalleryService {
    pub fn new(directory: PathBuf) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Filenames of regular image files, in enumeration order.
    ///
    /// A missing or unreadable directory yields an empty list; listing
    /// never errors to its caller.
    pub async fn list_images(&self) -> Vec<String> {
        let mut entries = match tokio::fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(err) => {
                debug!(
                    target = "vetrina::gallery",
                    directory = %self.directory.display(),
                    error = %err,
                    "image directory not readable"
                );
                return Vec::new();
            }
        };

        let mut images = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let is_file = entry
                .file_type()
                .await
                .map(|kind| kind.is_file())
                .unwrap_or(false);
            if !is_file {
                continue;
            }

            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if has_image_extension(name) {
                images.push(name.to_string());
            }
        }

        images
    }
}

fn has_image_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}
