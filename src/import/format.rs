use crate::core::DocumentKind;

use super::extension;

/// Map a file name (and, failing that, its declared MIME type) to a format.
///
/// The extension wins when it is recognized. MIME parameters such as
/// `; charset=utf-8` are ignored.
pub fn detect_format(name: &str, mime: Option<&str>) -> DocumentKind {
    let by_extension = extension(name).map(|ext| match ext.as_str() {
        "xml" => DocumentKind::NfeXml,
        "csv" => DocumentKind::Csv,
        "xlsx" | "xls" => DocumentKind::Xlsx,
        "pdf" => DocumentKind::Pdf,
        "jpg" | "jpeg" | "png" => DocumentKind::Image,
        "zip" => DocumentKind::Zip,
        _ => DocumentKind::Unsupported,
    });
    if let Some(kind) = by_extension.filter(|k| *k != DocumentKind::Unsupported) {
        return kind;
    }

    let essence = mime
        .and_then(|m| m.split(';').next())
        .map(|m| m.trim().to_ascii_lowercase())
        .unwrap_or_default();
    match essence.as_str() {
        "application/xml" | "text/xml" => DocumentKind::NfeXml,
        "text/csv" => DocumentKind::Csv,
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        | "application/vnd.ms-excel" => DocumentKind::Xlsx,
        "application/pdf" => DocumentKind::Pdf,
        "image/jpeg" | "image/png" => DocumentKind::Image,
        "application/zip" | "application/x-zip-compressed" => DocumentKind::Zip,
        _ => DocumentKind::Unsupported,
    }
}
