//! Media-type allow-list shared by the upload flow and the proxy handler.

use std::path::Path;

/// Media types the OCR backend accepts.
pub const ALLOWED_MEDIA_TYPES: [&str; 8] = [
    "application/pdf",
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
    "image/gif",
    "image/bmp",
    "image/tiff",
];

/// Message shown when a file is rejected before upload.
pub const UNSUPPORTED_FILE_MESSAGE: &str =
    "Please select a valid PDF or image file (JPEG, PNG, WebP, GIF, BMP, TIFF)";

/// Returns true iff `media_type` is on the allow-list.
pub fn is_allowed_media_type(media_type: &str) -> bool {
    ALLOWED_MEDIA_TYPES.contains(&media_type)
}

/// Guess the declared media type of a file on disk from its extension.
///
/// Only extensions that map onto the allow-list are recognised; anything else
/// yields `None` and the caller should treat the file as unsupported.
pub fn media_type_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let media_type = match ext.as_str() {
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        _ => return None,
    };
    Some(media_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_list_accepts_every_listed_type() {
        for media_type in ALLOWED_MEDIA_TYPES {
            assert!(is_allowed_media_type(media_type), "{media_type} rejected");
        }
    }

    #[test]
    fn test_allow_list_rejects_other_types() {
        for media_type in ["text/plain", "application/zip", "image/svg+xml", "", "APPLICATION/PDF"] {
            assert!(!is_allowed_media_type(media_type), "{media_type} accepted");
        }
    }

    #[test]
    fn test_media_type_for_path() {
        assert_eq!(media_type_for_path(Path::new("scan.PDF")), Some("application/pdf"));
        assert_eq!(media_type_for_path(Path::new("a/b/photo.jpg")), Some("image/jpeg"));
        assert_eq!(media_type_for_path(Path::new("page.tif")), Some("image/tiff"));
        assert_eq!(media_type_for_path(Path::new("notes.txt")), None);
        assert_eq!(media_type_for_path(Path::new("README")), None);
    }

    #[test]
    fn test_guessed_types_are_always_allowed() {
        for name in ["a.pdf", "a.jpeg", "a.jpg", "a.png", "a.webp", "a.gif", "a.bmp", "a.tiff", "a.tif"] {
            let media_type = media_type_for_path(Path::new(name)).unwrap();
            assert!(is_allowed_media_type(media_type));
        }
    }
}
