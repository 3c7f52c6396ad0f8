//! Audit report assembly.
//!
//! An [`AuditReport`] is built stage by stage. Every stage consumes the
//! report and returns a new one, so no stage can alias another's output.
//!
//! # Example
//!
//! ```
//! use sped_audit::audit::InMemoryCorrections;
//! use sped_audit::core::*;
//! use sped_audit::report::*;
//! use rust_decimal_macros::dec;
//!
//! let item = CanonicalItemBuilder::new("Arroz 5kg", dec!(10), dec!(25))
//!     .nfe("NFe1", dec!(250))
//!     .cfop("5102")
//!     .ncm("10063021")
//!     .build();
//! let docs = vec![ImportedDocument::parsed(DocumentKind::Csv, "vendas.csv", 300, vec![item])];
//!
//! let report = run_pipeline(docs, &PipelineConfig::default(), &InMemoryCorrections::new()).unwrap();
//! assert_eq!(report.aggregated_metrics.as_ref().unwrap().nfe_total, dec!(250));
//! assert_eq!(report.accounting_entries.len(), 2);
//! ```

mod metrics;
mod pipeline;
mod summary;

use serde::{Deserialize, Serialize};

use crate::core::*;

pub use metrics::{AggregatedMetrics, QUALITY_ALERT_LABEL, aggregate};
pub use pipeline::{PipelineConfig, ensure_usable, run_pipeline};
pub use summary::{AnalysisSummary, KeyMetric, deterministic_summary};

/// The terminal aggregate of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub documents: Vec<AuditedDocument>,
    pub summary: Option<AnalysisSummary>,
    pub aggregated_metrics: Option<AggregatedMetrics>,
    pub accounting_entries: Vec<AccountingEntry>,
    pub sped_file: Option<SpedFile>,
    pub deterministic_cross_validation: Vec<DeterministicCrossValidationResult>,
}

impl AuditReport {
    /// A report holding only the audited documents.
    pub fn new(documents: Vec<AuditedDocument>) -> Self {
        Self {
            documents,
            summary: None,
            aggregated_metrics: None,
            accounting_entries: Vec::new(),
            sped_file: None,
            deterministic_cross_validation: Vec::new(),
        }
    }

    pub fn with_cross_validation(self, results: Vec<DeterministicCrossValidationResult>) -> Self {
        Self {
            deterministic_cross_validation: results,
            ..self
        }
    }

    pub fn with_metrics(self, metrics: AggregatedMetrics) -> Self {
        Self {
            aggregated_metrics: Some(metrics),
            ..self
        }
    }

    pub fn with_entries(self, entries: Vec<AccountingEntry>) -> Self {
        Self {
            accounting_entries: entries,
            ..self
        }
    }

    pub fn with_sped(self, sped: SpedFile) -> Self {
        Self {
            sped_file: Some(sped),
            ..self
        }
    }

    pub fn with_summary(self, summary: AnalysisSummary) -> Self {
        Self {
            summary: Some(summary),
            ..self
        }
    }

    /// Documents grouped by verdict: `(ok, alerta, erro)`.
    pub fn status_counts(&self) -> (usize, usize, usize) {
        self.documents
            .iter()
            .fold((0, 0, 0), |(ok, alerta, erro), d| match d.status {
                AuditStatus::Ok => (ok + 1, alerta, erro),
                AuditStatus::Alerta => (ok, alerta + 1, erro),
                AuditStatus::Erro => (ok, alerta, erro + 1),
            })
    }

    /// Serialize the whole report as pretty-printed JSON.
    #[cfg(feature = "json")]
    pub fn to_json(&self) -> Result<String, AuditError> {
        serde_json::to_string_pretty(self).map_err(|e| AuditError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn stages_compose_without_touching_other_fields() {
        let report = AuditReport::new(Vec::new()).with_entries(vec![AccountingEntry {
            doc_name: "a.xml".into(),
            account_code: "1.1.2".into(),
            account_name: "Estoques".into(),
            entry_type: EntryType::Debit,
            value: dec!(10),
        }]);
        let report = report.with_metrics(AggregatedMetrics::default());
        assert_eq!(report.accounting_entries.len(), 1);
        assert!(report.aggregated_metrics.is_some());
        assert!(report.sped_file.is_none());
    }

    #[test]
    fn status_counts() {
        let doc = ImportedDocument::parsed(DocumentKind::Csv, "a.csv", 1, Vec::new());
        let mut erro = AuditedDocument::new(doc.clone());
        erro.status = AuditStatus::Erro;
        let report = AuditReport::new(vec![AuditedDocument::new(doc), erro]);
        assert_eq!(report.status_counts(), (1, 0, 1));
    }

    #[cfg(feature = "json")]
    #[test]
    fn json_uses_wire_names() {
        let mut doc = AuditedDocument::new(ImportedDocument::parsed(DocumentKind::NfeXml, "a.xml", 1, Vec::new()));
        doc.status = AuditStatus::Alerta;
        let json = AuditReport::new(vec![doc]).to_json().unwrap();
        assert!(json.contains("\"ALERTA\""));
        assert!(json.contains("\"NFE_XML\""));
        assert!(json.contains("\"parsed\""));
    }
}
