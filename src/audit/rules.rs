//! Per-item fiscal rules and document verdicts.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::core::*;

/// Score assigned to a document that could not be imported at all.
pub const IMPORT_FAIL_SCORE: u32 = 99;

/// Configuration for the rule-based audit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Name of the company being audited. When set, an outbound CFOP on a
    /// document addressed to this company is flagged (`CFOP-INV-01`).
    pub own_company_name: Option<String>,
}

impl RulesConfig {
    pub fn own_company(mut self, name: impl Into<String>) -> Self {
        self.own_company_name = Some(name.into());
        self
    }
}

/// The fixed rule dictionary. Each variant carries a stable code and its
/// localized texts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    OutboundCfopOnPurchase,
    ServiceNcmOnProduct,
    InvalidNcm,
    LineTotalMismatch,
    ZeroLineTotal,
    InterstateCfopSameUf,
    IntrastateCfopDifferentUf,
    TaxedPisCofinsOnReturn,
    TaxedIcmsOnReturn,
    IcmsCalculationMismatch,
}

impl Rule {
    pub fn code(&self) -> &'static str {
        match self {
            Self::OutboundCfopOnPurchase => "CFOP-INV-01",
            Self::ServiceNcmOnProduct => "NCM-INV-01",
            Self::InvalidNcm => "NCM-INV-02",
            Self::LineTotalMismatch => "VAL-ERR-01",
            Self::ZeroLineTotal => "VAL-WARN-01",
            Self::InterstateCfopSameUf => "CFOP-GEO-01",
            Self::IntrastateCfopDifferentUf => "CFOP-GEO-02",
            Self::TaxedPisCofinsOnReturn => "PIS-COFINS-CST-INV-01",
            Self::TaxedIcmsOnReturn => "ICMS-CST-INV-01",
            Self::IcmsCalculationMismatch => "ICMS-CALC-01",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::ServiceNcmOnProduct
            | Self::ZeroLineTotal
            | Self::TaxedPisCofinsOnReturn
            | Self::TaxedIcmsOnReturn => Severity::Alerta,
            _ => Severity::Erro,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::OutboundCfopOnPurchase => "CFOP de saída (5xxx/6xxx) em operação de compra.",
            Self::ServiceNcmOnProduct => {
                "NCM \"00000000\" usado para um item que parece ser um produto."
            }
            Self::InvalidNcm => "Código NCM possui formato inválido.",
            Self::LineTotalMismatch => {
                "Valor total do item (vProd) não corresponde a Qtd x Vlr. Unit."
            }
            Self::ZeroLineTotal => "Produto com valor total zerado.",
            Self::InterstateCfopSameUf => {
                "CFOP interestadual (6xxx) usado em operação com mesma UF de origem e destino."
            }
            Self::IntrastateCfopDifferentUf => {
                "CFOP estadual (5xxx) usado em operação com UFs de origem e destino diferentes."
            }
            Self::TaxedPisCofinsOnReturn => "CST de PIS/COFINS (tributado) em CFOP de devolução.",
            Self::TaxedIcmsOnReturn => "CST de ICMS incompatível com o CFOP da operação.",
            Self::IcmsCalculationMismatch => {
                "Valor do ICMS (vICMS) não corresponde ao cálculo (vBC x pICMS)."
            }
        }
    }

    pub fn explanation(&self) -> &'static str {
        match self {
            Self::OutboundCfopOnPurchase => {
                "O CFOP indica uma Venda/Remessa, mas a empresa é a destinatária. Para compras, \
                 o CFOP deveria ser de entrada (1xxx/2xxx)."
            }
            Self::ServiceNcmOnProduct => {
                "O NCM \"00000000\" é reservado para serviços ou itens sem classificação. \
                 Um bem físico deve ter um código NCM específico da tabela TIPI."
            }
            Self::InvalidNcm => {
                "O NCM deve ser um código de 8 dígitos. Um formato incorreto pode levar à \
                 rejeição da NFe ou a uma tributação errada."
            }
            Self::LineTotalMismatch => {
                "A multiplicação da quantidade pelo valor unitário diverge do valor total do \
                 produto. Pode indicar descontos não informados ou erro de arredondamento."
            }
            Self::ZeroLineTotal => {
                "O valor total do produto é zero. Bonificações, doações e amostras exigem CFOP \
                 específico e podem ter tratamento tributário diferenciado."
            }
            Self::InterstateCfopSameUf => {
                "Um CFOP iniciado com 6 indica operação interestadual, mas emitente e \
                 destinatário estão na mesma UF."
            }
            Self::IntrastateCfopDifferentUf => {
                "Um CFOP iniciado com 5 indica operação dentro do estado, mas emitente e \
                 destinatário estão em UFs diferentes. O CFOP provavelmente deveria começar com 6."
            }
            Self::TaxedPisCofinsOnReturn => {
                "Devoluções normalmente usam um CST de PIS/COFINS próprio, como 98. Um CST de \
                 tributação normal está provavelmente incorreto."
            }
            Self::TaxedIcmsOnReturn => {
                "O CST do ICMS indica tributação incompatível com o CFOP de devolução."
            }
            Self::IcmsCalculationMismatch => {
                "O valor do ICMS diverge da base de cálculo multiplicada pela alíquota."
            }
        }
    }

    pub fn normative_base(&self) -> &'static str {
        match self {
            Self::OutboundCfopOnPurchase
            | Self::InterstateCfopSameUf
            | Self::IntrastateCfopDifferentUf => {
                "Anexo II do Convênio S/Nº, de 15 de dezembro de 1970."
            }
            Self::ServiceNcmOnProduct => {
                "Tabela de Incidência do IPI (TIPI), aprovada pelo Decreto nº 11.158/2022."
            }
            Self::InvalidNcm => "Sistema Harmonizado de Designação e de Codificação de Mercadorias.",
            Self::LineTotalMismatch => "Princípios contábeis e Art. 476 do Código Civil.",
            Self::ZeroLineTotal => "RICMS do respectivo estado para operações de bonificação.",
            Self::TaxedPisCofinsOnReturn => "Lei 10.833/03 (COFINS) e Lei 10.637/02 (PIS).",
            Self::TaxedIcmsOnReturn => {
                "Anexo I (Códigos de Situação Tributária) do Convênio S/Nº, de 1970."
            }
            Self::IcmsCalculationMismatch => "Lei Complementar nº 87/1996 (Lei Kandir).",
        }
    }

    pub fn to_inconsistency(self) -> Inconsistency {
        Inconsistency {
            code: self.code().into(),
            message: self.message().into(),
            explanation: self.explanation().into(),
            severity: self.severity(),
            normative_base: Some(self.normative_base().into()),
        }
    }
}

/// Run every item rule against one line item.
/// Returns all rules that fire, in dictionary order.
pub fn validate_item(item: &CanonicalItem, config: &RulesConfig) -> Vec<Rule> {
    let mut found = Vec::new();

    let cfop = item.cfop.as_deref().map(str::trim).unwrap_or("");
    let ncm = item.ncm.as_deref().map(str::trim).unwrap_or("");
    let outbound = cfop.starts_with('5') || cfop.starts_with('6');

    // CFOP-INV-01
    if outbound {
        if let Some(own) = config.own_company_name.as_deref().filter(|n| !n.trim().is_empty()) {
            let recipient = item.recipient_name.as_deref().unwrap_or("").to_lowercase();
            if recipient.contains(&own.trim().to_lowercase()) {
                found.push(Rule::OutboundCfopOnPurchase);
            }
        }
    }

    // NCM-INV-01 / NCM-INV-02
    if ncm == "00000000" {
        let name = item.product_name.as_deref().unwrap_or("").to_lowercase();
        if !name.contains("servi") {
            found.push(Rule::ServiceNcmOnProduct);
        }
    } else if !ncm.is_empty() && !(ncm.len() == 8 && ncm.bytes().all(|b| b.is_ascii_digit())) {
        found.push(Rule::InvalidNcm);
    }

    let qty = item.quantity.unwrap_or_default();
    let unit_price = item.unit_price.unwrap_or_default();
    let line_total = item.line_total.unwrap_or_default();

    // VAL-ERR-01: tolerate 0.1 % and one cent. A product too large for a
    // Decimal cannot match any declared total.
    if qty > Decimal::ZERO && unit_price > Decimal::ZERO && line_total > Decimal::ZERO {
        let mismatch = match qty.checked_mul(unit_price) {
            Some(calculated) => {
                let diff = (calculated - line_total).abs();
                diff > calculated / dec!(1000) && diff > dec!(0.01)
            }
            None => true,
        };
        if mismatch {
            found.push(Rule::LineTotalMismatch);
        }
    }

    // VAL-WARN-01
    if line_total.is_zero() && qty > Decimal::ZERO {
        found.push(Rule::ZeroLineTotal);
    }

    // CFOP-GEO-01 / CFOP-GEO-02
    let issuer_uf = normalized_uf(item.issuer_uf.as_deref());
    let recipient_uf = normalized_uf(item.recipient_uf.as_deref());
    if !issuer_uf.is_empty() && !recipient_uf.is_empty() && !cfop.is_empty() {
        if cfop.starts_with('6') && issuer_uf == recipient_uf {
            found.push(Rule::InterstateCfopSameUf);
        } else if cfop.starts_with('5') && issuer_uf != recipient_uf {
            found.push(Rule::IntrastateCfopDifferentUf);
        }
    }

    let is_return = ["12", "22", "52", "62"].iter().any(|p| cfop.starts_with(p));
    if is_return {
        let taxed = |cst: &Option<String>| {
            matches!(cst.as_deref().map(str::trim), Some("01") | Some("02"))
        };
        if taxed(&item.pis_cst) || taxed(&item.cofins_cst) {
            found.push(Rule::TaxedPisCofinsOnReturn);
        }
        if matches!(item.icms_cst.as_deref().map(str::trim), Some("00") | Some("20")) {
            found.push(Rule::TaxedIcmsOnReturn);
        }
    }

    // ICMS-CALC-01
    let base = item.icms_base.unwrap_or_default();
    let rate = item.icms_rate.unwrap_or_default();
    let icms = item.icms_value.unwrap_or_default();
    if base > Decimal::ZERO && rate > Decimal::ZERO && icms > Decimal::ZERO {
        let mismatch = match base.checked_mul(rate) {
            Some(product) => (product / dec!(100) - icms).abs() > dec!(0.015),
            None => true,
        };
        if mismatch {
            found.push(Rule::IcmsCalculationMismatch);
        }
    }

    found
}

fn normalized_uf(uf: Option<&str>) -> String {
    uf.unwrap_or("").trim().to_uppercase()
}

/// Audit a batch of imported documents.
///
/// Documents that failed import become `ERRO` with a single `IMPORT-FAIL`
/// finding and score [`IMPORT_FAIL_SCORE`]. Everything else is checked
/// item by item; findings are deduplicated by code (first occurrence wins),
/// the status is the worst severity and the score is the sum of weights.
pub fn audit_documents(docs: Vec<ImportedDocument>, config: &RulesConfig) -> Vec<AuditedDocument> {
    let audited: Vec<AuditedDocument> = docs
        .into_iter()
        .map(|doc| audit_document(doc, config))
        .collect();

    let errors = audited.iter().filter(|d| d.status == AuditStatus::Erro).count();
    log::info!("audit: {} documents, {} with errors", audited.len(), errors);
    audited
}

fn audit_document(doc: ImportedDocument, config: &RulesConfig) -> AuditedDocument {
    if doc.status != ImportStatus::Parsed && doc.data.is_none() {
        let inconsistency = Inconsistency {
            code: "IMPORT-FAIL".into(),
            message: doc
                .error
                .clone()
                .unwrap_or_else(|| "Falha na importação ou formato não suportado.".into()),
            explanation: format!(
                "O arquivo \"{}\" não pôde ser processado corretamente. \
                 Verifique a integridade e o formato do arquivo.",
                doc.name
            ),
            severity: Severity::Erro,
            normative_base: None,
        };
        return AuditedDocument {
            doc,
            status: AuditStatus::Erro,
            score: IMPORT_FAIL_SCORE,
            inconsistencies: vec![inconsistency],
            classification: None,
        };
    }

    let mut rules: Vec<Rule> = Vec::new();
    for item in doc.items() {
        for rule in validate_item(item, config) {
            if !rules.contains(&rule) {
                rules.push(rule);
            }
        }
    }

    let status = match rules.iter().map(Rule::severity).max() {
        Some(Severity::Erro) => AuditStatus::Erro,
        Some(Severity::Alerta) => AuditStatus::Alerta,
        _ => AuditStatus::Ok,
    };
    let score = rules.iter().map(|r| r.severity().weight()).sum();

    AuditedDocument {
        doc,
        status,
        score,
        inconsistencies: rules.into_iter().map(Rule::to_inconsistency).collect(),
        classification: None,
    }
}
