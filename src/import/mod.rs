//! Batch import: format detection, per-format normalization and ZIP expansion.
//!
//! Every file settles into one or more [`ImportedDocument`]s. Parse
//! failures never escape a file: they become documents with
//! `status = error` and the batch carries on.
//!
//! # Example
//!
//! ```
//! use sped_audit::import::{Importer, RawFile};
//! use sped_audit::core::ImportStatus;
//!
//! let csv = "produto_nome;produto_qtd;produto_valor_unit;produto_valor_total\n\
//!            Arroz 5kg;10;25,00;250,00\n";
//! let files = vec![
//!     RawFile::new("vendas.csv", csv.as_bytes().to_vec()),
//!     RawFile::new("leia-me.docx", b"x".to_vec()),
//! ];
//!
//! let docs = Importer::default().import_all(&files, |done, total| {
//!     assert!(done <= total);
//! });
//! assert_eq!(docs[0].status, ImportStatus::Parsed);
//! assert_eq!(docs[1].status, ImportStatus::Unsupported);
//! ```

mod archive;
mod format;
mod nfe_xml;
mod tabular;
mod text;

use std::borrow::Cow;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::*;

pub use crate::report::ensure_usable;
pub use archive::is_rejected_entry;
pub use format::detect_format;
pub use nfe_xml::parse_nfe_xml;
pub use tabular::{fold_header, parse_csv, parse_spreadsheet};
pub use text::pdf_text;

/// Import settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Native PDF text shorter than this (in chars, trimmed) goes to OCR.
    pub min_text_len: usize,
    /// Keep only the 8-digit root and the 2 check digits of every CNPJ.
    pub mask_cnpj: bool,
    /// How many ZIP levels are expanded. A ZIP found deeper is rejected.
    pub max_archive_depth: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            min_text_len: 32,
            mask_cnpj: true,
            max_archive_depth: 3,
        }
    }
}

impl ImportConfig {
    pub fn min_text_len(mut self, len: usize) -> Self {
        self.min_text_len = len;
        self
    }

    pub fn mask_cnpj(mut self, mask: bool) -> Self {
        self.mask_cnpj = mask;
        self
    }

    pub fn max_archive_depth(mut self, depth: usize) -> Self {
        self.max_archive_depth = depth;
        self
    }
}

/// One submitted file. Consumed once by the importer, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFile {
    pub name: String,
    /// Declared MIME type, consulted when the extension is not recognized.
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

impl RawFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: None,
            bytes,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// OCR collaborator. An empty string means "no text found", not a failure.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, bytes: &[u8]) -> Result<String, AuditError>;
}

/// Structured-field collaborator turning free text into item rows.
/// May return no rows.
pub trait FieldExtractor: Send + Sync {
    fn extract_fields(&self, text: &str) -> Result<Vec<CanonicalItem>, AuditError>;
}

/// Owns the import configuration and the optional text collaborators.
#[derive(Default)]
pub struct Importer {
    config: ImportConfig,
    ocr: Option<Box<dyn TextExtractor>>,
    fields: Option<Box<dyn FieldExtractor>>,
}

impl std::fmt::Debug for Importer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Importer")
            .field("config", &self.config)
            .field("ocr", &self.ocr.is_some())
            .field("fields", &self.fields.is_some())
            .finish()
    }
}

impl Importer {
    pub fn new(config: ImportConfig) -> Self {
        Self {
            config,
            ocr: None,
            fields: None,
        }
    }

    pub fn with_ocr(mut self, ocr: impl TextExtractor + 'static) -> Self {
        self.ocr = Some(Box::new(ocr));
        self
    }

    pub fn with_field_extractor(mut self, fields: impl FieldExtractor + 'static) -> Self {
        self.fields = Some(Box::new(fields));
        self
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Normalize one non-archive file.
    ///
    /// ZIP containers hold many documents and are expanded by
    /// [`import_file`](Self::import_file); passed here they come back as
    /// `unsupported`.
    pub fn normalize(&self, file: &RawFile) -> ImportedDocument {
        let kind = detect_format(&file.name, file.mime.as_deref());
        log::debug!("{}: detected {kind:?}", file.name);

        match kind {
            DocumentKind::NfeXml => self.settle(kind, file, parse_nfe_xml(&file.bytes)),
            DocumentKind::Csv => self.settle(kind, file, parse_csv(&file.bytes)),
            DocumentKind::Xlsx => self.settle(kind, file, parse_spreadsheet(&file.bytes)),
            DocumentKind::Pdf => self.normalize_pdf(file),
            DocumentKind::Image => self.normalize_image(file),
            DocumentKind::Zip => {
                let mut doc = ImportedDocument::unsupported(
                    &file.name,
                    file.size(),
                    "Arquivos ZIP são expandidos pelo importador de lote.",
                );
                doc.kind = DocumentKind::Zip;
                doc
            }
            DocumentKind::Unsupported => {
                let reason = match extension(&file.name) {
                    Some(ext) => format!("Formato não suportado (.{ext})."),
                    None => "Formato não suportado.".to_string(),
                };
                ImportedDocument::unsupported(&file.name, file.size(), reason)
            }
        }
    }

    /// Import one top-level file: a ZIP expands into its documents, anything
    /// else yields exactly one.
    pub fn import_file(&self, file: &RawFile) -> Vec<ImportedDocument> {
        let name = sanitize_filename(&file.name);
        let file = if name == file.name {
            Cow::Borrowed(file)
        } else {
            Cow::Owned(RawFile {
                name,
                mime: file.mime.clone(),
                bytes: file.bytes.clone(),
            })
        };
        match detect_format(&file.name, file.mime.as_deref()) {
            DocumentKind::Zip => self.expand(&file, 1),
            _ => vec![self.normalize(&file)],
        }
    }

    /// Import a batch concurrently.
    ///
    /// `on_progress(done, total)` is called with `(0, total)` before any
    /// work starts and once per settled top-level file. The result keeps
    /// the submission order of top-level files.
    pub fn import_all<F>(&self, files: &[RawFile], on_progress: F) -> Vec<ImportedDocument>
    where
        F: Fn(usize, usize) + Sync,
    {
        let total = files.len();
        on_progress(0, total);
        let completed = AtomicUsize::new(0);

        let settled: Vec<Vec<ImportedDocument>> = files
            .par_iter()
            .map(|file| {
                let docs = self.import_file(file);
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                on_progress(done, total);
                docs
            })
            .collect();

        let docs: Vec<ImportedDocument> = settled.into_iter().flatten().collect();
        log::info!(
            "import: {total} files -> {} documents ({} usable)",
            docs.len(),
            docs.iter().filter(|d| d.is_usable()).count()
        );
        docs
    }

    /// Turn a parser result into a document, masking CNPJs on success.
    fn settle(
        &self,
        kind: DocumentKind,
        file: &RawFile,
        result: Result<Vec<CanonicalItem>, AuditError>,
    ) -> ImportedDocument {
        match result {
            Ok(items) => ImportedDocument::parsed(kind, &file.name, file.size(), self.mask(items)),
            Err(e) => {
                log::warn!("{}: {e}", file.name);
                ImportedDocument::failed(kind, &file.name, file.size(), e.to_string())
            }
        }
    }

    fn mask(&self, mut items: Vec<CanonicalItem>) -> Vec<CanonicalItem> {
        if self.config.mask_cnpj {
            for item in &mut items {
                for cnpj in [&mut item.issuer_cnpj, &mut item.recipient_cnpj] {
                    if let Some(value) = cnpj.as_mut() {
                        *value = mask_cnpj(value);
                    }
                }
            }
        }
        items
    }
}

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `12345678000195` → `12345678****95`. Shorter values are kept as they are.
pub fn mask_cnpj(cnpj: &str) -> String {
    let cnpj = cnpj.trim();
    let chars: Vec<char> = cnpj.chars().collect();
    if chars.len() < 14 || cnpj.contains("****") {
        return cnpj.to_string();
    }
    let root: String = chars[..8].iter().collect();
    let check: String = chars[chars.len() - 2..].iter().collect();
    format!("{root}****{check}")
}

/// Lowercased extension without the dot.
pub(crate) fn extension(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    base.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn sanitize_replaces_unsafe_chars() {
        assert_eq!(sanitize_filename("nota fiscal (1).xml"), "nota_fiscal__1_.xml");
        assert_eq!(sanitize_filename("../etc/passwd"), ".._etc_passwd");
        assert_eq!(sanitize_filename("março.csv"), "mar_o.csv");
    }

    #[test]
    fn cnpj_masking() {
        assert_eq!(mask_cnpj("12345678000195"), "12345678****95");
        assert_eq!(mask_cnpj("123"), "123");
        assert_eq!(mask_cnpj("12345678****95"), "12345678****95");
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(extension("a/B.XML").as_deref(), Some("xml"));
        assert_eq!(extension("semextensao"), None);
        assert_eq!(extension("arquivo."), None);
    }

    #[test]
    fn progress_starts_at_zero_and_reaches_total() {
        let files = vec![
            RawFile::new("a.txt", b"x".to_vec()),
            RawFile::new("b.txt", b"y".to_vec()),
            RawFile::new("c.txt", b"z".to_vec()),
        ];
        let seen = Mutex::new(Vec::new());
        let docs = Importer::default().import_all(&files, |done, total| {
            if let Ok(mut seen) = seen.lock() {
                seen.push((done, total));
            }
        });
        let mut seen = seen.into_inner().unwrap();
        assert_eq!(seen[0], (0, 3));
        seen.sort_unstable();
        assert_eq!(seen, vec![(0, 3), (1, 3), (2, 3), (3, 3)]);
        let names: Vec<&str> = docs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["a.txt", "b.txt", "c.txt"]);
    }

    #[test]
    fn zip_passed_to_normalize_is_unsupported() {
        let doc = Importer::default().normalize(&RawFile::new("lote.zip", Vec::new()));
        assert_eq!(doc.kind, DocumentKind::Zip);
        assert_eq!(doc.status, ImportStatus::Unsupported);
    }

    #[test]
    fn unmasked_when_disabled() {
        let xml = r#"<NFe><infNFe Id="NFe1"><emit><CNPJ>12345678000195</CNPJ></emit>
            <det nItem="1"><prod><xProd>A</xProd><vProd>1.00</vProd></prod></det>
            <total><ICMSTot><vNF>1.00</vNF></ICMSTot></total></infNFe></NFe>"#;
        let file = RawFile::new("a.xml", xml.as_bytes().to_vec());
        let masked = Importer::default().normalize(&file);
        let plain = Importer::new(ImportConfig::default().mask_cnpj(false)).normalize(&file);
        assert_eq!(masked.items()[0].issuer_cnpj.as_deref(), Some("12345678****95"));
        assert_eq!(plain.items()[0].issuer_cnpj.as_deref(), Some("12345678000195"));
    }
}
