use anyhow::{anyhow, Context, Result};
use image::ImageFormat;
use shared::agent_api::ImageAttachment;
use std::fs;
use std::path::{Path, PathBuf};

/// Expand a leading `~/` to the home directory.
pub fn expand_user_path(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(dirs) = directories::BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    path.to_path_buf()
}

/// Read an image file for sending. Only formats the providers accept are allowed.
pub fn load_image(path: &Path) -> Result<ImageAttachment> {
    let path = expand_user_path(path);
    let bytes = fs::read(&path).with_context(|| format!("could not read {}", path.display()))?;
    let mime_type = image_mime_type(&bytes)
        .ok_or_else(|| anyhow!("{} is not a PNG, JPEG, GIF or WebP image", path.display()))?;
    Ok(ImageAttachment::new(bytes, mime_type))
}

fn image_mime_type(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes).ok()? {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::WebP => Some("image/webp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    #[test]
    fn test_detects_png() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("diagram.png");
        fs::write(&path, PNG_HEADER).unwrap();

        let image = load_image(&path).unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.bytes, PNG_HEADER);
    }

    #[test]
    fn test_rejects_non_images() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("notes.png");
        fs::write(&path, "just text").unwrap();

        let err = load_image(&path).unwrap_err();
        assert!(err.to_string().contains("not a PNG"));
    }

    #[test]
    fn test_missing_file() {
        assert!(load_image(Path::new("/definitely/not/here.png")).is_err());
    }
}
