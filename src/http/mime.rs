//! MIME type detection based on file extensions.

const FALLBACK: &str = "application/octet-stream";

/// Maps a file name to the `Content-Type` it is served with.
///
/// Only the part after the last `.` matters. Names without an extension,
/// or with an extension not in the table, are served as
/// `application/octet-stream`.
///
/// ```
/// # use ferrule::http::mime::content_type_for;
/// assert_eq!(content_type_for("/index.html"), "text/html");
/// assert_eq!(content_type_for("/img/logo.png"), "image/png");
/// assert_eq!(content_type_for("/README"), "application/octet-stream");
/// ```
pub fn content_type_for(filename: &str) -> String {
    let ext = match filename.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() && !ext.contains('/') => ext,
        _ => return FALLBACK.to_string(),
    };

    match ext {
        "htm" | "html" | "shtml" => "text/html".to_string(),
        "css" | "csv" | "rtf" | "xml" => format!("text/{ext}"),
        "txt" => "text/plain".to_string(),
        "js" | "mjs" => "text/javascript".to_string(),
        "jpeg" | "jpg" => "image/jpeg".to_string(),
        "heic" | "png" | "apng" | "tiff" | "webp" | "bmp" | "gif" | "avif" => {
            format!("image/{ext}")
        }
        "json" | "gz" | "pdf" => format!("application/{ext}"),
        "mp3" | "aac" => format!("audio/{ext}"),
        "mp4" | "mpeg" => format!("video/{ext}"),
        _ => FALLBACK.to_string(),
    }
}
