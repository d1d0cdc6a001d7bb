//! File extension to MIME type lookup for uploads.

/// Known extensions, lowercase with leading dot.
const EXTENSION_TABLE: &[(&str, &str)] = &[
    // Office
    (".doc", "application/msword"),
    (".dot", "application/msword"),
    (".docx", "application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
    (".dotx", "application/vnd.openxmlformats-officedocument.wordprocessingml.template"),
    (".docm", "application/vnd.ms-word.document.macroEnabled.12"),
    (".xls", "application/vnd.ms-excel"),
    (".xlt", "application/vnd.ms-excel"),
    (".xlsx", "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
    (".xltx", "application/vnd.openxmlformats-officedocument.spreadsheetml.template"),
    (".xlsm", "application/vnd.ms-excel.sheet.macroEnabled.12"),
    (".xlsb", "application/vnd.ms-excel.sheet.binary.macroEnabled.12"),
    (".ppt", "application/vnd.ms-powerpoint"),
    (".pps", "application/vnd.ms-powerpoint"),
    (".pptx", "application/vnd.openxmlformats-officedocument.presentationml.presentation"),
    (".ppsx", "application/vnd.openxmlformats-officedocument.presentationml.slideshow"),
    (".pptm", "application/vnd.ms-powerpoint.presentation.macroEnabled.12"),
    (".vsdx", "application/vnd.ms-visio.drawing"),
    (".one", "application/onenote"),
    (".msg", "application/vnd.ms-outlook"),
    (".pbix", "application/octet-stream"),
    // OpenDocument
    (".odt", "application/vnd.oasis.opendocument.text"),
    (".ods", "application/vnd.oasis.opendocument.spreadsheet"),
    (".odp", "application/vnd.oasis.opendocument.presentation"),
    // Documents and text
    (".pdf", "application/pdf"),
    (".rtf", "application/rtf"),
    (".txt", "text/plain"),
    (".log", "text/plain"),
    (".md", "text/markdown"),
    (".csv", "text/csv"),
    (".tsv", "text/tab-separated-values"),
    (".htm", "text/html"),
    (".html", "text/html"),
    (".css", "text/css"),
    (".js", "text/javascript"),
    (".json", "application/json"),
    (".xml", "application/xml"),
    (".yaml", "application/yaml"),
    (".yml", "application/yaml"),
    (".eml", "message/rfc822"),
    // Images
    (".jpg", "image/jpeg"),
    (".jpeg", "image/jpeg"),
    (".png", "image/png"),
    (".gif", "image/gif"),
    (".bmp", "image/bmp"),
    (".tif", "image/tiff"),
    (".tiff", "image/tiff"),
    (".svg", "image/svg+xml"),
    (".webp", "image/webp"),
    (".ico", "image/x-icon"),
    (".heic", "image/heic"),
    // Audio and video
    (".mp3", "audio/mpeg"),
    (".wav", "audio/wav"),
    (".m4a", "audio/mp4"),
    (".ogg", "audio/ogg"),
    (".mp4", "video/mp4"),
    (".mov", "video/quicktime"),
    (".avi", "video/x-msvideo"),
    (".wmv", "video/x-ms-wmv"),
    (".webm", "video/webm"),
    // Archives and binaries
    (".zip", "application/zip"),
    (".7z", "application/x-7z-compressed"),
    (".rar", "application/vnd.rar"),
    (".gz", "application/gzip"),
    (".tar", "application/x-tar"),
    (".bin", "application/octet-stream"),
    (".exe", "application/octet-stream"),
    (".msi", "application/octet-stream"),
    (".iso", "application/octet-stream"),
];

/// Trailing `.ext` of a file name, if any.
///
/// A leading dot alone (`.env`) counts as an extension, a trailing dot
/// (`name.`) does not.
pub fn extension(file_name: &str) -> Option<&str> {
    let dot = file_name.rfind('.')?;
    let ext = &file_name[dot..];
    (ext.len() > 1).then_some(ext)
}

/// MIME type for a file name, matching the extension case-insensitively.
pub fn mime_for(file_name: &str) -> Option<&'static str> {
    let ext = extension(file_name)?;
    EXTENSION_TABLE
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(ext))
        .map(|(_, mime)| *mime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_extensions() {
        assert_eq!(mime_for("report.pdf"), Some("application/pdf"));
        assert_eq!(
            mime_for("Budget 2024.xlsx"),
            Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet")
        );
        assert_eq!(mime_for("archive.tar.gz"), Some("application/gzip"));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(mime_for("PHOTO.JPG"), Some("image/jpeg"));
        assert_eq!(mime_for("Notes.Md"), Some("text/markdown"));
    }

    #[test]
    fn test_unknown_or_missing_extension() {
        assert_eq!(mime_for("payload.xyz"), None);
        assert_eq!(mime_for("Makefile"), None);
        assert_eq!(mime_for("trailing."), None);
    }

    #[test]
    fn test_extension_parsing() {
        assert_eq!(extension("a.b.c"), Some(".c"));
        assert_eq!(extension(".env"), Some(".env"));
        assert_eq!(extension("noext"), None);
    }
}
