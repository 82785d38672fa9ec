//! Declared media types accepted for upload, and the format family each
//! one dispatches to.

pub const PDF: &str = "application/pdf";
pub const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const DOC: &str = "application/msword";
pub const PPTX: &str = "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const PPT: &str = "application/vnd.ms-powerpoint";
pub const XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const XLS: &str = "application/vnd.ms-excel";
pub const TEXT: &str = "text/plain";
pub const CSV: &str = "text/csv";
pub const RTF: &str = "application/rtf";
pub const ODT: &str = "application/vnd.oasis.opendocument.text";
pub const ODP: &str = "application/vnd.oasis.opendocument.presentation";
pub const ODS: &str = "application/vnd.oasis.opendocument.spreadsheet";

pub const SUPPORTED_MEDIA_TYPES: &[&str] = &[
    PDF, DOCX, DOC, PPTX, PPT, XLSX, XLS, TEXT, CSV, RTF, ODT, ODP, ODS,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatFamily {
    Pdf,
    Word,
    Spreadsheet,
    Presentation,
    PlainText,
    Other,
}

impl FormatFamily {
    pub fn from_media_type(media_type: &str) -> Self {
        match normalize(media_type).as_str() {
            PDF => FormatFamily::Pdf,
            DOCX | DOC => FormatFamily::Word,
            XLSX | XLS => FormatFamily::Spreadsheet,
            PPTX | PPT => FormatFamily::Presentation,
            TEXT | CSV => FormatFamily::PlainText,
            _ => FormatFamily::Other,
        }
    }
}

/// Lowercases and drops parameters such as `; charset=utf-8`.
pub fn normalize(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub fn is_supported(media_type: &str) -> bool {
    SUPPORTED_MEDIA_TYPES.contains(&normalize(media_type).as_str())
}

/// File extension used when storing an upload whose original name has none.
pub fn default_extension(media_type: &str) -> &'static str {
    match normalize(media_type).as_str() {
        PDF => "pdf",
        DOCX => "docx",
        DOC => "doc",
        PPTX => "pptx",
        PPT => "ppt",
        XLSX => "xlsx",
        XLS => "xls",
        TEXT => "txt",
        CSV => "csv",
        RTF => "rtf",
        ODT => "odt",
        ODP => "odp",
        ODS => "ods",
        _ => "bin",
    }
}
