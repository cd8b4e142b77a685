// Roost - A modular content management system built with Rust
// Copyright (C) 2025 Roost Project Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::{anyhow, Context, Result};
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use rand::Rng;
use roost_core::models::gallery::{thumbs_for_width, ImageSet};
use roost_core::utils::picture_stem;
use std::fs;
use std::path::{Path, PathBuf};

/// Magic bytes for common image formats
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const GIF_MAGIC: &[u8] = b"GIF";
const WEBP_MAGIC: &[u8] = b"RIFF";

/// Raster formats accepted for pictures, covers and gallery items
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
            ImageFormat::Webp => "webp",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Webp => "image/webp",
        }
    }

    /// Format of a stored file, from its extension.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let ext = Path::new(filename).extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            "gif" => Some(ImageFormat::Gif),
            "webp" => Some(ImageFormat::Webp),
            _ => None,
        }
    }

    /// Detect format from file content
    pub fn detect(data: &[u8]) -> Result<Self> {
        if data.len() < 8 {
            return Err(anyhow!("File too small to determine format"));
        }

        if data.starts_with(JPEG_MAGIC) {
            Ok(ImageFormat::Jpeg)
        } else if data.starts_with(PNG_MAGIC) {
            Ok(ImageFormat::Png)
        } else if data.starts_with(GIF_MAGIC) {
            Ok(ImageFormat::Gif)
        } else if data.starts_with(WEBP_MAGIC) && data.len() > 12 && &data[8..12] == b"WEBP" {
            Ok(ImageFormat::Webp)
        } else {
            Err(anyhow!("Unsupported image format"))
        }
    }
}

/// Upload directory of a module, created on demand.
pub fn module_dir(uploads_root: &Path, module: &str) -> Result<PathBuf> {
    let dir = uploads_root.join(module);
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create upload directory: {:?}", dir))?;
    Ok(dir)
}

/// File name for a picture: the sanitized title (or original stem), a
/// random suffix and the detected extension.
pub fn picture_filename(original_name: &str, title: Option<&str>, format: ImageFormat) -> String {
    let source = match title {
        Some(t) if !t.trim().is_empty() => t.to_string(),
        _ => Path::new(original_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string(),
    };
    let mut stem = picture_stem(&source).to_lowercase();
    if stem.is_empty() {
        stem = "picture".to_string();
    }
    let suffix: u32 = rand::thread_rng().gen_range(0x100000..0xFFFFFF);
    format!("{}-{:06x}.{}", stem, suffix, format.extension())
}

/// Validate and store an uploaded picture. Returns the stored file name.
pub fn save_picture(dir: &Path, original_name: &str, title: Option<&str>, data: &[u8]) -> Result<String> {
    validate_upload_filename(original_name)?;
    let format = ImageFormat::detect(data)?;
    let filename = picture_filename(original_name, title, format);
    let path = dir.join(&filename);
    fs::write(&path, data).with_context(|| format!("Failed to write file: {:?}", path))?;
    tracing::debug!("Stored picture {:?}", path);
    Ok(filename)
}

fn open_image(path: &Path) -> Result<DynamicImage> {
    image::open(path).with_context(|| format!("Failed to decode image {:?}", path))
}

fn sized_name(filename: &str, size: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext)) => format!("{}-{}.{}", stem, size, ext),
        None => format!("{}-{}", filename, size),
    }
}

/// Store a gallery upload: the original as `lg` plus every thumbnail
/// narrower than the image.
pub fn save_gallery_image(dir: &Path, original_name: &str, data: &[u8]) -> Result<ImageSet> {
    let filename = save_picture(dir, original_name, None, data)?;
    let mut set = ImageSet::default();
    set.insert("lg", filename.clone());

    let img = open_image(&dir.join(&filename))?;
    let (width, _) = img.dimensions();
    for (size, target) in thumbs_for_width(width) {
        let thumb = img.resize(target, u32::MAX, FilterType::Lanczos3);
        let name = sized_name(&filename, size);
        thumb
            .save(dir.join(&name))
            .with_context(|| format!("Failed to write {} thumbnail", size))?;
        set.insert(size, name);
    }
    Ok(set)
}

/// Crop the picture to a centered square no larger than `size`, in place.
pub fn crop_square(path: &Path, size: u32) -> Result<()> {
    let img = open_image(path)?;
    let (width, height) = img.dimensions();
    let side = width.min(height);
    let mut square = img.crop_imm((width - side) / 2, (height - side) / 2, side, side);
    if side > size {
        square = square.resize_exact(size, size, FilterType::Lanczos3);
    }
    square
        .save(path)
        .with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}

/// Remove a stored file. A missing file is not an error.
pub fn remove_file(dir: &Path, filename: &str) -> Result<()> {
    validate_upload_filename(filename)?;
    let path = dir.join(filename);
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {:?}", path)),
    }
}

/// List of dangerous executable extensions that should be blocked
const DANGEROUS_EXTENSIONS: &[&str] = &[
    "exe", "bat", "cmd", "com", "pif", "scr", "vbs", "js", "jar", "msi", "app", "deb", "rpm",
    "dmg", "pkg", "run", "sh", "bash", "csh", "ksh", "ps1", "pl", "py", "rb", "php", "phtml",
    "asp", "aspx", "jsp", "cgi", "htm", "html", "hta", "htaccess", "htpasswd", "svg",
];

/// Check if a filename carries a dangerous extension anywhere in its chain
pub fn is_dangerous_filename(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    lower
        .split('.')
        .skip(1)
        .any(|ext| DANGEROUS_EXTENSIONS.contains(&ext))
}

/// Validate that a filename is safe for upload
pub fn validate_upload_filename(filename: &str) -> Result<()> {
    if filename.is_empty() {
        return Err(anyhow!("Filename cannot be empty"));
    }

    if filename.len() > 255 {
        return Err(anyhow!("Filename too long"));
    }

    if filename.contains('\0') || filename.contains('/') || filename.contains('\\') {
        return Err(anyhow!("Filename contains invalid characters"));
    }

    if is_dangerous_filename(filename) {
        return Err(anyhow!("File type not allowed for security reasons"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::png_bytes;
    use tempfile::TempDir;

    #[test]
    fn test_image_format_detection() {
        let jpeg_data = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46];
        assert_eq!(ImageFormat::detect(&jpeg_data).unwrap(), ImageFormat::Jpeg);

        let png_data = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        assert_eq!(ImageFormat::detect(&png_data).unwrap(), ImageFormat::Png);

        let gif_data = b"GIF89aXX".to_vec();
        assert_eq!(ImageFormat::detect(&gif_data).unwrap(), ImageFormat::Gif);

        let svg = b"<svg xmlns=\"http://www.w3.org/2000/svg\">".to_vec();
        assert!(ImageFormat::detect(&svg).is_err());

        assert!(ImageFormat::detect(&[0xFF, 0xD8]).is_err());
    }

    #[test]
    fn test_picture_filename() {
        let name = picture_filename("IMG_0001.JPG", Some("Summer Race #2"), ImageFormat::Jpeg);
        assert!(name.starts_with("summer-race-2-"));
        assert!(name.ends_with(".jpg"));

        let fallback = picture_filename("???.png", None, ImageFormat::Png);
        assert!(fallback.starts_with("picture-"));
    }

    #[test]
    fn test_save_picture_rejects_non_images() {
        let dir = TempDir::new().unwrap();
        assert!(save_picture(dir.path(), "notes.txt", None, b"just some text here").is_err());
        assert!(save_picture(dir.path(), "shell.php.png", None, &png_bytes(4, 4)).is_err());
    }

    #[test]
    fn test_gallery_thumbnails_only_when_wider() {
        let dir = TempDir::new().unwrap();
        let set = save_gallery_image(dir.path(), "wide.png", &png_bytes(400, 200)).unwrap();
        assert!(set.get("lg").is_some());
        assert!(set.get("sm").is_some());
        assert!(set.get("xs").is_some());
        assert!(set.get("md").is_none());
        for path in set.paths() {
            assert!(dir.path().join(path).exists());
        }
        let sm = image::open(dir.path().join(set.get("sm").unwrap())).unwrap();
        assert_eq!(sm.width(), 300);
    }

    #[test]
    fn test_crop_square() {
        let dir = TempDir::new().unwrap();
        let name = save_picture(dir.path(), "avatar.png", None, &png_bytes(900, 600)).unwrap();
        let path = dir.path().join(&name);
        crop_square(&path, 512).unwrap();
        let img = image::open(&path).unwrap();
        assert_eq!(img.dimensions(), (512, 512));
    }

    #[test]
    fn test_remove_file_tolerates_missing() {
        let dir = TempDir::new().unwrap();
        assert!(remove_file(dir.path(), "gone.png").is_ok());
        assert!(remove_file(dir.path(), "../escape.png").is_err());
    }

    #[test]
    fn test_validate_upload_filename() {
        assert!(validate_upload_filename("image.jpg").is_ok());
        assert!(validate_upload_filename("my-file_123.png").is_ok());

        assert!(validate_upload_filename("").is_err());
        assert!(validate_upload_filename("a".repeat(256).as_str()).is_err());
        assert!(validate_upload_filename("../../../etc/passwd").is_err());
        assert!(validate_upload_filename("virus.exe").is_err());

        let result = validate_upload_filename("backdoor.php.jpg");
        assert!(result.unwrap_err().to_string().contains("security reasons"));
    }
}
