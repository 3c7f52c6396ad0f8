use lopdf::Document;

use super::{Importer, RawFile};
use crate::core::*;

/// Native text of every page, in page order.
///
/// Pages whose text cannot be decoded contribute nothing; only a PDF that
/// cannot be loaded at all is an error.
pub fn pdf_text(bytes: &[u8]) -> Result<String, AuditError> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| AuditError::Pdf(format!("falha ao carregar PDF: {e}")))?;

    let mut text = String::new();
    for page in doc.get_pages().keys() {
        match doc.extract_text(&[*page]) {
            Ok(page_text) => {
                text.push_str(&page_text);
                text.push('\n');
            }
            Err(e) => log::debug!("page {page}: no text layer ({e})"),
        }
    }
    Ok(text)
}

impl Importer {
    pub(super) fn normalize_pdf(&self, file: &RawFile) -> ImportedDocument {
        let native = match pdf_text(&file.bytes) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("{}: {e}", file.name);
                return ImportedDocument::failed(DocumentKind::Pdf, &file.name, file.size(), e.to_string());
            }
        };
        if native.trim().chars().count() >= self.config.min_text_len {
            return self.structured(DocumentKind::Pdf, file, native);
        }
        log::debug!(
            "{}: {} chars of native text, below {}; trying OCR",
            file.name,
            native.trim().chars().count(),
            self.config.min_text_len
        );
        self.ocr_then_structure(DocumentKind::Pdf, file, Some(native))
    }

    pub(super) fn normalize_image(&self, file: &RawFile) -> ImportedDocument {
        self.ocr_then_structure(DocumentKind::Image, file, None)
    }

    /// Without an OCR service the document waits for one, keeping whatever
    /// native text was found.
    fn ocr_then_structure(
        &self,
        kind: DocumentKind,
        file: &RawFile,
        native: Option<String>,
    ) -> ImportedDocument {
        let Some(ocr) = self.ocr.as_deref() else {
            let pending = ImportedDocument::ocr_needed(
                kind,
                &file.name,
                file.size(),
                "Documento sem texto legível; nenhum serviço de OCR configurado.",
            );
            return match native.filter(|t| !t.trim().is_empty()) {
                Some(text) => pending.with_text(text),
                None => pending,
            };
        };
        match ocr.extract_text(&file.bytes) {
            Ok(text) if text.trim().is_empty() => {
                log::warn!("{}: OCR returned no text", file.name);
                ImportedDocument::failed(
                    kind,
                    &file.name,
                    file.size(),
                    "Nenhum texto encontrado no documento.",
                )
            }
            Ok(text) => self.structured(kind, file, text),
            Err(e) => {
                log::warn!("{}: OCR failed: {e}", file.name);
                ImportedDocument::failed(kind, &file.name, file.size(), e.to_string())
            }
        }
    }

    /// Run the field extractor over extracted text. No rows is a warning,
    /// not a failure.
    fn structured(&self, kind: DocumentKind, file: &RawFile, text: String) -> ImportedDocument {
        let rows = match self.fields.as_deref() {
            Some(extractor) => match extractor.extract_fields(&text) {
                Ok(rows) => rows,
                Err(e) => {
                    log::warn!("{}: field extraction failed: {e}", file.name);
                    return ImportedDocument::failed(kind, &file.name, file.size(), e.to_string())
                        .with_text(text);
                }
            },
            None => Vec::new(),
        };
        if rows.is_empty() {
            log::warn!("{}: text extracted but no structured rows", file.name);
        }
        ImportedDocument::parsed(kind, &file.name, file.size(), self.mask(rows)).with_text(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::{FieldExtractor, ImportConfig, TextExtractor};
    use rust_decimal_macros::dec;

    struct FixedOcr(&'static str);

    impl TextExtractor for FixedOcr {
        fn extract_text(&self, _bytes: &[u8]) -> Result<String, AuditError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingOcr;

    impl TextExtractor for FailingOcr {
        fn extract_text(&self, _bytes: &[u8]) -> Result<String, AuditError> {
            Err(AuditError::Extraction("connection reset".into()))
        }
    }

    struct OneRow;

    impl FieldExtractor for OneRow {
        fn extract_fields(&self, text: &str) -> Result<Vec<CanonicalItem>, AuditError> {
            Ok(vec![CanonicalItemBuilder::new(text.trim(), dec!(1), dec!(9.90)).build()])
        }
    }

    fn photo() -> RawFile {
        RawFile::new("nota.jpg", vec![0xFF, 0xD8, 0xFF])
    }

    #[test]
    fn image_without_ocr_needs_ocr() {
        let doc = Importer::default().normalize(&photo());
        assert_eq!(doc.status, ImportStatus::OcrNeeded);
        assert_eq!(doc.kind, DocumentKind::Image);
        assert!(doc.data.is_none());
    }

    #[test]
    fn empty_ocr_yield_is_an_error() {
        let doc = Importer::default().with_ocr(FixedOcr("   ")).normalize(&photo());
        assert_eq!(doc.status, ImportStatus::Error);
        assert_eq!(doc.error.as_deref(), Some("Nenhum texto encontrado no documento."));
    }

    #[test]
    fn ocr_failure_is_an_error() {
        let doc = Importer::default().with_ocr(FailingOcr).normalize(&photo());
        assert_eq!(doc.status, ImportStatus::Error);
    }

    #[test]
    fn ocr_text_without_extractor_is_parsed_without_rows() {
        let doc = Importer::default().with_ocr(FixedOcr("NOTA FISCAL")).normalize(&photo());
        assert_eq!(doc.status, ImportStatus::Parsed);
        assert_eq!(doc.text.as_deref(), Some("NOTA FISCAL"));
        assert!(doc.items().is_empty());
    }

    #[test]
    fn extractor_rows_are_kept() {
        let doc = Importer::new(ImportConfig::default())
            .with_ocr(FixedOcr("Caneta azul"))
            .with_field_extractor(OneRow)
            .normalize(&photo());
        assert!(doc.is_usable());
        assert_eq!(doc.items()[0].product_name.as_deref(), Some("Caneta azul"));
    }

    /// One page showing `text` in Helvetica.
    fn pdf_with_text(text: &str) -> Vec<u8> {
        use lopdf::{Object, Stream, dictionary};

        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => Object::Reference(font_id) },
        });
        let content = Stream::new(
            dictionary! {},
            format!("BT /F1 12 Tf 100 700 Td ({text}) Tj ET").into_bytes(),
        );
        let content_id = doc.add_object(content);
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            "Contents" => Object::Reference(content_id),
            "Resources" => Object::Reference(resources_id),
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    #[test]
    fn sparse_pdf_without_ocr_keeps_native_text() {
        let doc = Importer::default().normalize(&RawFile::new("nota.pdf", pdf_with_text("NF 42")));
        assert_eq!(doc.status, ImportStatus::OcrNeeded);
        assert_eq!(doc.kind, DocumentKind::Pdf);
        assert!(doc.text.as_deref().unwrap_or_default().contains("NF 42"), "{:?}", doc.text);
    }

    #[test]
    fn image_without_ocr_has_no_text() {
        assert_eq!(Importer::default().normalize(&photo()).text, None);
    }

    #[test]
    fn broken_pdf_is_an_error() {
        let doc = Importer::default().normalize(&RawFile::new("a.pdf", b"%PDF-garbage".to_vec()));
        assert_eq!(doc.status, ImportStatus::Error);
        assert_eq!(doc.kind, DocumentKind::Pdf);
    }
}
