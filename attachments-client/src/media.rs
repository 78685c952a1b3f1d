//! Image type detection for files the user picks before they are staged, and
//! the reverse mapping used to name stored objects.

use std::path::Path;

use mime_guess::MimeGuess;

/// Image types with first-class support. The first extension of each entry is
/// the one given to stored objects of that type.
const IMAGE_TYPES: &[(&str, &[&str])] = &[
    ("image/png", &["png"]),
    ("image/jpeg", &["jpg", "jpeg", "jpe"]),
    ("image/gif", &["gif"]),
    ("image/webp", &["webp"]),
    ("image/bmp", &["bmp"]),
    ("image/svg+xml", &["svg"]),
    ("image/heic", &["heic"]),
    ("image/heif", &["heif"]),
];

const FALLBACK_EXTENSION: &str = "bin";

pub fn is_supported_image(path: &Path) -> bool {
    infer_image_mime(path).is_some()
}

/// Mime type for an image file, judged by extension. `None` for anything that
/// is not an image.
pub fn infer_image_mime(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.trim().to_ascii_lowercase();
    if let Some((mime, _)) = IMAGE_TYPES
        .iter()
        .find(|(_, exts)| exts.contains(&ext.as_str()))
    {
        return Some((*mime).to_string());
    }
    // Rarer formats (tiff, avif, ico) come from the mime database.
    MimeGuess::from_ext(&ext)
        .iter_raw()
        .find(|m| m.starts_with("image/"))
        .map(str::to_string)
}

/// File extension used when naming a stored object of the given mime type.
pub fn extension_for_mime(mime: &str) -> &'static str {
    let essence = mime
        .split(';')
        .next()
        .unwrap_or(mime)
        .trim()
        .to_ascii_lowercase();
    let essence = match essence.as_str() {
        "image/jpg" => "image/jpeg".to_string(),
        _ => essence,
    };
    IMAGE_TYPES
        .iter()
        .find(|(m, _)| *m == essence)
        .and_then(|(_, exts)| exts.first().copied())
        .or_else(|| {
            mime_guess::get_mime_extensions_str(&essence).and_then(|exts| exts.first().copied())
        })
        .unwrap_or(FALLBACK_EXTENSION)
}
