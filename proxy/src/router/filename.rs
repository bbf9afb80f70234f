use std::path::Path;

/// Name for `Content-Disposition`. Characters that would break the header
/// are replaced, and a name without an extension gets one derived from the
/// content type when the type is known.
pub fn sanitize_file_name(name: &str, content_type: &str) -> String {
    let mut clean: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' | '/' | ';' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if clean.trim().is_empty() {
        clean = "file".to_string();
    }

    if has_extension(&clean) {
        return clean;
    }

    match extension_for(content_type) {
        Some(ext) => format!("{}.{}", clean, ext),
        None => clean,
    }
}

// A dot anywhere after the first character counts.
fn has_extension(name: &str) -> bool {
    name.len() > 2 && name.bytes().skip(1).any(|b| b == b'.')
}

/// Preferred extension for a MIME type; parameters such as `charset` are ignored.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let ext = match essence.as_str() {
        // Web documents
        "text/html" => "html",
        "text/css" => "css",
        "application/javascript" | "text/javascript" => "js",
        "application/json" => "json",
        "application/xml" | "text/xml" => "xml",

        // Images
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/svg+xml" => "svg",
        "image/x-icon" => "ico",
        "image/webp" => "webp",
        "image/bmp" => "bmp",
        "image/avif" => "avif",

        // Fonts
        "font/woff" => "woff",
        "font/woff2" => "woff2",
        "font/ttf" => "ttf",
        "font/otf" => "otf",

        // Media
        "audio/mpeg" => "mp3",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "audio/ogg" => "ogg",
        "audio/wav" => "wav",

        // Documents
        "application/pdf" => "pdf",
        "text/plain" => "txt",
        "text/markdown" => "md",

        // Archives
        "application/zip" => "zip",
        "application/gzip" => "gz",
        "application/x-tar" => "tar",

        _ => return None,
    };
    Some(ext)
}

/// Guess a content type from a local path, for uploads.
pub fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") | Some("mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("mp3") => "audio/mpeg",
        Some("mp4") => "video/mp4",
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain; charset=utf-8",
        Some("md") => "text/markdown; charset=utf-8",
        Some("zip") => "application/zip",
        Some("gz") => "application/gzip",
        Some("tar") => "application/x-tar",
        _ => "application/octet-stream",
    }
}
