use crate::models::FileType;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "svg", "webp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "flac"];
const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "txt", "xls", "xlsx", "csv", "rtf", "ods", "ppt", "odp", "md", "html",
    "htm", "epub", "pages", "fig", "psd", "ai", "indd", "xd", "sketch", "afdesign", "afphoto",
];

/// Splits the extension off `filename` and classifies it. Files without an
/// extension are `Other` with an empty extension.
pub fn get_file_type(filename: &str) -> (FileType, String) {
    let extension = match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_lowercase(),
        _ => return (FileType::Other, String::new()),
    };

    let file_type = if DOCUMENT_EXTENSIONS.contains(&extension.as_str()) {
        FileType::Document
    } else if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        FileType::Image
    } else if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
        FileType::Video
    } else if AUDIO_EXTENSIONS.contains(&extension.as_str()) {
        FileType::Audio
    } else {
        FileType::Other
    };

    (file_type, extension)
}

pub fn construct_file_url(base_url: &str, bucket_file_id: &str) -> String {
    format!(
        "{}/storage/{}/view",
        base_url.trim_end_matches('/'),
        bucket_file_id
    )
}

pub fn construct_download_url(base_url: &str, bucket_file_id: &str) -> String {
    format!(
        "{}/storage/{}/download",
        base_url.trim_end_matches('/'),
        bucket_file_id
    )
}

/// Human readable size: bytes, then one decimal KB/MB/GB.
pub fn convert_file_size(size_in_bytes: i64) -> String {
    const KB: f64 = 1024.0;
    let size = size_in_bytes as f64;
    if size < KB {
        format!("{} Bytes", size_in_bytes)
    } else if size < KB * KB {
        format!("{:.1} KB", size / KB)
    } else if size < KB * KB * KB {
        format!("{:.1} MB", size / (KB * KB))
    } else {
        format!("{:.1} GB", size / (KB * KB * KB))
    }
}

/// Markup a browser would run script from when rendered on our origin.
const ACTIVE_EXTENSIONS: &[&str] = &["html", "htm", "xhtml", "svg", "svgz", "xml", "js", "mjs"];

pub fn is_active_content(extension: &str) -> bool {
    ACTIVE_EXTENSIONS.contains(&extension.to_lowercase().as_str())
}

/// Content type blobs are served with. Active markup is never labelled as such.
pub fn content_type_for(extension: &str) -> &'static str {
    match extension.to_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        "pdf" => "application/pdf",
        "txt" | "md" => "text/plain; charset=utf-8",
        "csv" => "text/csv",
        _ => mime::APPLICATION_OCTET_STREAM.as_ref(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_file_type() {
        assert_eq!(get_file_type("photo.JPG"), (FileType::Image, "jpg".into()));
        assert_eq!(get_file_type("clip.mp4"), (FileType::Video, "mp4".into()));
        assert_eq!(get_file_type("a.b.flac"), (FileType::Audio, "flac".into()));
        assert_eq!(get_file_type("cv.docx"), (FileType::Document, "docx".into()));
        assert_eq!(get_file_type("archive.zip"), (FileType::Other, "zip".into()));
        assert_eq!(get_file_type("Makefile"), (FileType::Other, String::new()));
        assert_eq!(get_file_type(".bashrc"), (FileType::Other, String::new()));
    }

    #[test]
    fn test_urls() {
        assert_eq!(
            construct_file_url("http://localhost:3000/", "b1"),
            "http://localhost:3000/storage/b1/view"
        );
        assert_eq!(
            construct_download_url("http://localhost:3000", "b1"),
            "http://localhost:3000/storage/b1/download"
        );
    }

    #[test]
    fn test_convert_file_size() {
        assert_eq!(convert_file_size(512), "512 Bytes");
        assert_eq!(convert_file_size(1536), "1.5 KB");
        assert_eq!(convert_file_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(convert_file_size(2 * 1024 * 1024 * 1024), "2.0 GB");
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("PNG"), "image/png");
        assert_eq!(content_type_for("zip"), "application/octet-stream");
        assert_eq!(content_type_for("HTML"), "application/octet-stream");
        assert_eq!(content_type_for("svg"), "application/octet-stream");
    }

    #[test]
    fn test_is_active_content() {
        assert!(is_active_content("html"));
        assert!(is_active_content("SVG"));
        assert!(!is_active_content("png"));
        assert!(!is_active_content(""));
    }
}
