use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::numbers::saturating_sum;

/// Source format of an input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentKind {
    /// NFe XML (`.xml`).
    NfeXml,
    /// Delimited text (`.csv`).
    Csv,
    /// Spreadsheet (`.xlsx`, `.xls`).
    Xlsx,
    /// PDF, text layer or scanned (`.pdf`).
    Pdf,
    /// Raster image requiring OCR (`.jpg`, `.jpeg`, `.png`).
    Image,
    /// ZIP container of any of the above.
    Zip,
    /// Anything else.
    Unsupported,
}

/// Outcome of normalizing one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Parsed,
    /// Text could not be read natively and no OCR collaborator was available.
    OcrNeeded,
    Unsupported,
    Error,
}

/// Where a document came from when it was expanded out of an archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Name of the archive that contained the entry.
    pub source_archive: String,
    /// Raw path of the entry inside the archive.
    pub internal_path: String,
}

/// One normalized invoice line item.
///
/// Header-level fields (NFe id, issuer, recipient, totals) are flattened onto
/// every line. Every field is optional; missing numerics read as zero via
/// `unwrap_or_default()`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalItem {
    /// NFe access key attribute (`infNFe/@Id`, e.g. `NFe3524...`).
    pub nfe_id: Option<String>,
    /// `ide/nNF`.
    pub nfe_number: Option<String>,
    /// `ide/serie`.
    pub series: Option<String>,
    /// Emission timestamp as written in the source.
    pub emission_date: Option<String>,
    /// Document total (`ICMSTot/vNF`, or its reconstruction).
    pub nfe_total: Option<Decimal>,

    pub issuer_name: Option<String>,
    pub issuer_cnpj: Option<String>,
    pub issuer_uf: Option<String>,
    pub recipient_name: Option<String>,
    pub recipient_cnpj: Option<String>,
    pub recipient_uf: Option<String>,

    /// `det/@nItem`.
    pub item_number: Option<u32>,
    /// Seller's product code (`cProd`).
    pub product_code: Option<String>,
    pub product_name: Option<String>,
    pub ncm: Option<String>,
    pub cfop: Option<String>,
    /// Commercial unit (`uCom`).
    pub unit: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub line_total: Option<Decimal>,

    /// ICMS CST, or CSOSN for Simples Nacional issuers.
    pub icms_cst: Option<String>,
    pub icms_base: Option<Decimal>,
    pub icms_rate: Option<Decimal>,
    pub icms_value: Option<Decimal>,

    pub pis_cst: Option<String>,
    pub pis_base: Option<Decimal>,
    pub pis_rate: Option<Decimal>,
    pub pis_value: Option<Decimal>,

    pub cofins_cst: Option<String>,
    pub cofins_base: Option<Decimal>,
    pub cofins_rate: Option<Decimal>,
    pub cofins_value: Option<Decimal>,

    pub iss_base: Option<Decimal>,
    pub iss_rate: Option<Decimal>,
    pub iss_value: Option<Decimal>,

    /// Tabular columns with no canonical counterpart, raw text.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl CanonicalItem {
    /// First digit of the CFOP, if any.
    pub fn cfop_prefix(&self) -> Option<char> {
        self.cfop.as_deref().and_then(|c| c.trim().chars().next())
    }
}

/// Canonical parse result for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedDocument {
    pub kind: DocumentKind,
    pub name: String,
    pub size: u64,
    pub status: ImportStatus,
    /// Ordered line items; absent whenever `status` is `Error`.
    pub data: Option<Vec<CanonicalItem>>,
    /// Raw extracted text (PDF / image paths).
    pub text: Option<String>,
    pub error: Option<String>,
    pub meta: Option<Provenance>,
}

impl ImportedDocument {
    /// A successfully parsed document.
    pub fn parsed(
        kind: DocumentKind,
        name: impl Into<String>,
        size: u64,
        data: Vec<CanonicalItem>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            size,
            status: ImportStatus::Parsed,
            data: Some(data),
            text: None,
            error: None,
            meta: None,
        }
    }

    /// A document whose parse failed. Carries no data.
    pub fn failed(
        kind: DocumentKind,
        name: impl Into<String>,
        size: u64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            size,
            status: ImportStatus::Error,
            data: None,
            text: None,
            error: Some(error.into()),
            meta: None,
        }
    }

    /// A file of a type the pipeline does not handle.
    pub fn unsupported(name: impl Into<String>, size: u64, reason: impl Into<String>) -> Self {
        Self {
            kind: DocumentKind::Unsupported,
            name: name.into(),
            size,
            status: ImportStatus::Unsupported,
            data: None,
            text: None,
            error: Some(reason.into()),
            meta: None,
        }
    }

    /// A scanned document still waiting for OCR.
    pub fn ocr_needed(
        kind: DocumentKind,
        name: impl Into<String>,
        size: u64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            size,
            status: ImportStatus::OcrNeeded,
            data: None,
            text: None,
            error: Some(reason.into()),
            meta: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_provenance(mut self, meta: Provenance) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Line items, empty when the document carries none.
    pub fn items(&self) -> &[CanonicalItem] {
        self.data.as_deref().unwrap_or(&[])
    }

    /// Parsed and carrying at least one item.
    pub fn is_usable(&self) -> bool {
        self.status == ImportStatus::Parsed && !self.items().is_empty()
    }

    pub fn doc_ref(&self) -> DocRef {
        DocRef {
            name: self.name.clone(),
            source_archive: self.meta.as_ref().map(|m| m.source_archive.clone()),
            internal_path: self.meta.as_ref().map(|m| m.internal_path.clone()),
        }
    }

    /// Sum of a per-item amount, missing values counting as zero.
    pub fn sum_by(&self, f: impl Fn(&CanonicalItem) -> Option<Decimal>) -> Decimal {
        saturating_sum(self.items().iter().map(|i| f(i).unwrap_or_default()))
    }

    /// Σ line totals.
    pub fn line_total_sum(&self) -> Decimal {
        self.sum_by(|i| i.line_total)
    }

    /// Sum of declared NFe totals, counting each distinct NFe id once.
    ///
    /// Items without an id share one bucket, so a single-invoice CSV
    /// without ids still contributes its header total exactly once.
    pub fn declared_total(&self) -> Decimal {
        let mut per_nfe: BTreeMap<&str, Decimal> = BTreeMap::new();
        for item in self.items() {
            let key = item.nfe_id.as_deref().unwrap_or("");
            let value = item.nfe_total.unwrap_or_default();
            let slot = per_nfe.entry(key).or_insert(Decimal::ZERO);
            if slot.is_zero() {
                *slot = value;
            }
        }
        saturating_sum(per_nfe.values().copied())
    }

    /// Declared total, falling back to the line sum when nothing was declared.
    pub fn document_total(&self) -> Decimal {
        let declared = self.declared_total();
        if declared.is_zero() {
            self.line_total_sum()
        } else {
            declared
        }
    }
}

/// Reference to a source document in findings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_archive: Option<String>,
    pub internal_path: Option<String>,
}

/// Document-level audit verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AuditStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "ALERTA")]
    Alerta,
    #[serde(rename = "ERRO")]
    Erro,
}

/// Severity of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    #[serde(rename = "INFO")]
    Info,
    #[serde(rename = "ALERTA")]
    Alerta,
    #[serde(rename = "ERRO")]
    Erro,
}

impl Severity {
    /// Contribution to a document's risk score.
    pub fn weight(&self) -> u32 {
        match self {
            Self::Erro => 10,
            Self::Alerta => 2,
            Self::Info => 0,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Alerta => "ALERTA",
            Self::Erro => "ERRO",
        }
    }
}

/// A rule finding on a single document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inconsistency {
    /// Stable rule identifier, e.g. `CFOP-GEO-01`.
    pub code: String,
    pub message: String,
    pub explanation: String,
    pub severity: Severity,
    /// Legal basis for the rule, when there is one.
    pub normative_base: Option<String>,
}

/// Nature of the operation a document records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationType {
    Compra,
    Venda,
    #[serde(rename = "Devolução")]
    Devolucao,
    #[serde(rename = "Serviço")]
    Servico,
    #[serde(rename = "Transferência")]
    Transferencia,
    Outros,
}

impl OperationType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Compra => "Compra",
            Self::Venda => "Venda",
            Self::Devolucao => "Devolução",
            Self::Servico => "Serviço",
            Self::Transferencia => "Transferência",
            Self::Outros => "Outros",
        }
    }

    /// Parse a label, tolerating case and missing accents.
    pub fn from_label(label: &str) -> Option<Self> {
        let folded: String = label
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| match c {
                'ç' => 'c',
                'ã' | 'á' | 'â' => 'a',
                'é' | 'ê' => 'e',
                'í' => 'i',
                'ó' | 'õ' | 'ô' => 'o',
                'ú' => 'u',
                other => other,
            })
            .collect();
        match folded.as_str() {
            "compra" => Some(Self::Compra),
            "venda" => Some(Self::Venda),
            "devolucao" => Some(Self::Devolucao),
            "servico" => Some(Self::Servico),
            "transferencia" => Some(Self::Transferencia),
            "outros" => Some(Self::Outros),
            _ => None,
        }
    }
}

/// Operation classification assigned to an audited document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub operation_type: OperationType,
    pub business_sector: String,
    /// 0.0 – 1.0.
    pub confidence: f64,
}

/// An imported document after rule-based audit (and, later, classification).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditedDocument {
    pub doc: ImportedDocument,
    pub status: AuditStatus,
    pub score: u32,
    pub inconsistencies: Vec<Inconsistency>,
    pub classification: Option<Classification>,
}

impl AuditedDocument {
    /// Wrap a document with a clean verdict and no classification.
    pub fn new(doc: ImportedDocument) -> Self {
        Self {
            doc,
            status: AuditStatus::Ok,
            score: 0,
            inconsistencies: Vec::new(),
            classification: None,
        }
    }

    /// Attach a classification with full confidence and an unspecified sector.
    pub fn classified_as(self, operation_type: OperationType) -> Self {
        self.with_classification(Classification {
            operation_type,
            business_sector: "Não Classificado".into(),
            confidence: 1.0,
        })
    }

    pub fn with_classification(mut self, classification: Classification) -> Self {
        self.classification = Some(classification);
        self
    }

    pub fn name(&self) -> &str {
        &self.doc.name
    }

    pub fn items(&self) -> &[CanonicalItem] {
        self.doc.items()
    }

    pub fn operation_type(&self) -> Option<OperationType> {
        self.classification.as_ref().map(|c| c.operation_type)
    }

    /// Not rejected by the audit and carrying items.
    pub fn is_postable(&self) -> bool {
        self.status != AuditStatus::Erro && !self.items().is_empty()
    }
}

/// One pair of disagreeing values between two documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub value_a: String,
    pub doc_a: DocRef,
    pub value_b: String,
    pub doc_b: DocRef,
}

/// A cross-document attribute disagreement for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterministicCrossValidationResult {
    /// Shared product identity.
    pub comparison_key: String,
    /// Which attribute disagrees (e.g. `Preço Unitário`).
    pub attribute: String,
    pub description: String,
    pub severity: Severity,
    pub discrepancies: Vec<Discrepancy>,
}

impl DeterministicCrossValidationResult {
    /// Distinct document names referenced by the discrepancies.
    pub fn document_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .discrepancies
            .iter()
            .flat_map(|d| [d.doc_a.name.as_str(), d.doc_b.name.as_str()])
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

/// Debit / credit side of a posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryType {
    #[serde(rename = "D")]
    Debit,
    #[serde(rename = "C")]
    Credit,
}

impl EntryType {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Debit => "D",
            Self::Credit => "C",
        }
    }
}

/// One double-entry posting line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountingEntry {
    pub doc_name: String,
    /// Chart-of-accounts code, e.g. `1.1.2`.
    pub account_code: String,
    /// Account label, e.g. `Estoques`.
    pub account_name: String,
    pub entry_type: EntryType,
    pub value: Decimal,
}

/// A generated SPED file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpedFile {
    pub filename: String,
    pub content: String,
}
