//! Stage orchestration from imported documents to a finished report.

use serde::{Deserialize, Serialize};

use super::metrics::aggregate;
use super::summary::deterministic_summary;
use super::AuditReport;
use crate::audit::{CorrectionStore, RulesConfig, audit_documents, classify_documents};
use crate::core::*;
use crate::ledger::synthesize_all;
use crate::reconcile::{ReconcileConfig, reconcile};
use crate::sped::{SpedConfig, encode};

#[cfg(feature = "import")]
use crate::import::ImportConfig;

/// Every stage's configuration in one place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[cfg(feature = "import")]
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub sped: SpedConfig,
}

const NO_SUPPORTED_FILES: &str = "Nenhum arquivo suportado ou válido foi encontrado. \
     Envie arquivos XML, CSV, XLSX, PDF, imagens ou ZIP com documentos fiscais.";

/// Fail the batch when no document survived import.
///
/// With exactly one document, its own error is surfaced (localized when a
/// known pattern matches); otherwise a generic message is returned.
pub fn ensure_usable(docs: &[ImportedDocument]) -> Result<(), AuditError> {
    if docs.iter().any(ImportedDocument::is_usable) {
        return Ok(());
    }
    let message = match docs {
        [only] => match only.error.as_deref() {
            Some(raw) => friendly_message(raw),
            None => format!("O arquivo \"{}\" não contém dados fiscais utilizáveis.", only.name),
        },
        _ => NO_SUPPORTED_FILES.to_string(),
    };
    log::warn!("batch rejected: {message}");
    Err(AuditError::NoUsableDocuments(message))
}

/// Run audit, classification, reconciliation, aggregation, ledger and SPED
/// over an imported batch.
pub fn run_pipeline(
    imported: Vec<ImportedDocument>,
    config: &PipelineConfig,
    corrections: &dyn CorrectionStore,
) -> Result<AuditReport, AuditError> {
    ensure_usable(&imported)?;

    let audited = audit_documents(imported, &config.rules);
    let classified = classify_documents(audited, corrections);
    let cross_validation = reconcile(&classified, &config.reconcile);
    let metrics = aggregate(&classified);
    let entries = synthesize_all(&classified);
    let sped = encode(&classified, &config.sped);
    let summary = deterministic_summary(&classified, &metrics);

    Ok(AuditReport::new(classified)
        .with_cross_validation(cross_validation)
        .with_metrics(metrics)
        .with_entries(entries)
        .with_sped(sped)
        .with_summary(summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_failed_document_surfaces_its_error() {
        let doc = ImportedDocument::failed(DocumentKind::Xlsx, "a.xlsx", 1, "planilha vazia");
        let err = ensure_usable(&[doc]).unwrap_err();
        assert_eq!(err.user_message(), "planilha vazia");
    }

    #[test]
    fn many_failed_documents_get_generic_message() {
        let a = ImportedDocument::unsupported("a.doc", 1, "tipo .doc não suportado");
        let b = ImportedDocument::unsupported("b.doc", 1, "tipo .doc não suportado");
        let err = ensure_usable(&[a, b]).unwrap_err();
        assert!(err.to_string().starts_with("Nenhum arquivo suportado"));
    }

    #[test]
    fn empty_batch_is_rejected() {
        assert!(ensure_usable(&[]).is_err());
    }
}
