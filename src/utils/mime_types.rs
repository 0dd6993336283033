use serde::{Deserialize, Serialize};

/// Extension patterns and the MIME type they map to. Mirrors the set of types
/// a standard (non-administrator) account may upload to the host platform.
const DEFAULT_MIME_TYPES: &[(&str, &str)] = &[
    // Images
    ("jpg|jpeg|jpe", "image/jpeg"),
    ("gif", "image/gif"),
    ("png", "image/png"),
    ("bmp", "image/bmp"),
    ("tiff|tif", "image/tiff"),
    ("webp", "image/webp"),
    ("avif", "image/avif"),
    ("ico", "image/x-icon"),
    ("heic", "image/heic"),
    // Video
    ("asf|asx", "video/x-ms-asf"),
    ("wmv", "video/x-ms-wmv"),
    ("wmx", "video/x-ms-wmx"),
    ("wm", "video/x-ms-wm"),
    ("avi", "video/avi"),
    ("divx", "video/divx"),
    ("flv", "video/x-flv"),
    ("mov|qt", "video/quicktime"),
    ("mpeg|mpg|mpe", "video/mpeg"),
    ("mp4|m4v", "video/mp4"),
    ("ogv", "video/ogg"),
    ("webm", "video/webm"),
    ("mkv", "video/x-matroska"),
    ("3gp|3gpp", "video/3gpp"),
    ("3g2|3gp2", "video/3gpp2"),
    // Text
    ("txt|asc|c|cc|h|srt", "text/plain"),
    ("csv", "text/csv"),
    ("tsv", "text/tab-separated-values"),
    ("ics", "text/calendar"),
    ("rtx", "text/richtext"),
    ("css", "text/css"),
    ("vtt", "text/vtt"),
    ("dfxp", "application/ttaf+xml"),
    // Audio
    ("mp3|m4a|m4b", "audio/mpeg"),
    ("aac", "audio/aac"),
    ("ra|ram", "audio/x-realaudio"),
    ("wav", "audio/wav"),
    ("ogg|oga", "audio/ogg"),
    ("flac", "audio/flac"),
    ("mid|midi", "audio/midi"),
    ("wma", "audio/x-ms-wma"),
    ("wax", "audio/x-ms-wax"),
    ("mka", "audio/x-matroska"),
    // Misc application
    ("rtf", "application/rtf"),
    ("pdf", "application/pdf"),
    ("class", "application/java"),
    ("tar", "application/x-tar"),
    ("zip", "application/zip"),
    ("gz|gzip", "application/x-gzip"),
    ("rar", "application/rar"),
    ("7z", "application/x-7z-compressed"),
    ("psd", "application/octet-stream"),
    ("xcf", "application/octet-stream"),
    // Office documents
    ("doc", "application/msword"),
    ("pot|pps|ppt", "application/vnd.ms-powerpoint"),
    ("wri", "application/vnd.ms-write"),
    ("xla|xls|xlt|xlw", "application/vnd.ms-excel"),
    ("mdb", "application/vnd.ms-access"),
    ("mpp", "application/vnd.ms-project"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    (
        "pptx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ),
    ("odt", "application/vnd.oasis.opendocument.text"),
    ("ods", "application/vnd.oasis.opendocument.spreadsheet"),
    ("odp", "application/vnd.oasis.opendocument.presentation"),
    ("numbers", "application/vnd.apple.numbers"),
    ("pages", "application/vnd.apple.pages"),
    ("key", "application/vnd.apple.keynote"),
];

/// Ordered mapping of extension patterns (`"jpg|jpeg|jpe"`) to MIME types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MimeMap(Vec<(String, String)>);

impl Default for MimeMap {
    fn default() -> Self {
        Self(
            DEFAULT_MIME_TYPES
                .iter()
                .map(|(exts, mime)| (exts.to_string(), mime.to_string()))
                .collect(),
        )
    }
}

impl MimeMap {
    pub fn new(entries: Vec<(String, String)>) -> Self {
        Self(entries)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(exts, mime)| (exts.as_str(), mime.as_str()))
    }

    pub fn contains_mime(&self, mime_type: &str) -> bool {
        let mime_type = normalize_mime(mime_type);
        self.iter().any(|(_, mime)| mime == mime_type)
    }

    /// Extension patterns, joined for display in error messages.
    pub fn patterns(&self) -> String {
        self.iter()
            .map(|(exts, _)| exts)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn insert(&mut self, exts: impl Into<String>, mime_type: impl Into<String>) {
        self.0.push((exts.into(), mime_type.into()));
    }

    pub fn remove_mime(&mut self, mime_type: &str) {
        let mime_type = normalize_mime(mime_type);
        self.0.retain(|(_, mime)| normalize_mime(mime) != mime_type);
    }
}

/// Lower-cased MIME essence without parameters (`"Image/PNG; q=1"` → `"image/png"`).
pub fn normalize_mime(mime_type: &str) -> String {
    match mime_type.trim().parse::<mime::Mime>() {
        Ok(parsed) => parsed.essence_str().to_lowercase(),
        Err(_) => mime_type.trim().to_lowercase(),
    }
}

/// Canonical extension for a MIME type: the first extension of the first
/// pattern mapping to it.
pub fn file_type_for_mime<'a>(mime_type: &str, map: &'a MimeMap) -> Option<&'a str> {
    let mime_type = normalize_mime(mime_type);
    map.iter()
        .find(|(_, mime)| *mime == mime_type)
        .and_then(|(exts, _)| exts.split('|').next())
}

/// Extension and MIME type implied by a file name, if the map knows the
/// extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileType {
    pub ext: String,
    pub mime_type: String,
}

pub fn check_filetype(filename: &str, map: &MimeMap) -> Option<FileType> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_lowercase();
    map.iter()
        .find(|(exts, _)| exts.split('|').any(|candidate| candidate == ext))
        .map(|(_, mime)| FileType {
            ext,
            mime_type: mime.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_for_mime() {
        let map = MimeMap::default();
        assert_eq!(file_type_for_mime("image/jpeg", &map), Some("jpg"));
        assert_eq!(file_type_for_mime("image/png", &map), Some("png"));
        assert_eq!(file_type_for_mime("application/pdf", &map), Some("pdf"));
        assert_eq!(file_type_for_mime("IMAGE/GIF", &map), Some("gif"));
        assert_eq!(
            file_type_for_mime("text/plain; charset=utf-8", &map),
            Some("txt")
        );
        assert_eq!(file_type_for_mime("application/x-php", &map), None);
    }

    #[test]
    fn test_check_filetype() {
        let map = MimeMap::default();
        let ft = check_filetype("Photo.JPEG", &map).unwrap();
        assert_eq!(ft.ext, "jpeg");
        assert_eq!(ft.mime_type, "image/jpeg");

        assert_eq!(check_filetype("shell.php", &map), None);
        assert_eq!(check_filetype("README", &map), None);
    }

    #[test]
    fn test_map_editing() {
        let mut map = MimeMap::new(vec![]);
        assert!(!map.contains_mime("image/svg+xml"));
        map.insert("svg", "image/svg+xml");
        assert!(map.contains_mime("image/svg+xml"));
        assert_eq!(map.patterns(), "svg");
        map.remove_mime("image/svg+xml");
        assert!(!map.contains_mime("image/svg+xml"));
    }

    #[test]
    fn test_remove_mime_ignores_case_and_parameters() {
        let mut map = MimeMap::default();
        assert!(map.contains_mime("text/plain"));
        map.insert("svg", "image/svg+xml");

        map.remove_mime("Image/SVG+XML");
        map.remove_mime("TEXT/plain; charset=utf-8");
        assert!(!map.contains_mime("image/svg+xml"));
        assert!(!map.contains_mime("text/plain"));
        assert!(map.contains_mime("application/pdf"));
    }
}
