//! Batch-level totals.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::core::*;

/// Simulated IVA (CBS + IBS) rate applied to PIS + COFINS.
const IVA_SIMULATED_RATE: Decimal = dec!(0.25);

pub const QUALITY_ALERT_LABEL: &str = "Alerta de Qualidade";

/// Deterministic totals over the documents that passed the audit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMetrics {
    /// Distinct NFes, plus documents that carry no NFe id.
    pub document_count: usize,
    pub item_count: usize,
    /// One declared total per distinct NFe; reconstructed from products and
    /// taxes when nothing was declared.
    pub nfe_total: Decimal,
    pub product_total: Decimal,
    pub icms_total: Decimal,
    pub pis_total: Decimal,
    pub cofins_total: Decimal,
    pub iss_total: Decimal,
    /// `(PIS + COFINS) × 0.25`, a simulation only.
    pub iva_estimate: Decimal,
    /// Set when items exist but the NFe total is still zero.
    pub quality_alert: Option<String>,
}

impl AggregatedMetrics {
    /// pt-BR label / formatted value pairs, in display order.
    pub fn labeled(&self) -> Vec<(&'static str, String)> {
        let mut out = vec![
            ("Número de Documentos Válidos", self.document_count.to_string()),
            ("Valor Total das NFes", format_brl(self.nfe_total)),
            ("Valor Total dos Produtos", format_brl(self.product_total)),
            ("Total de Itens Processados", self.item_count.to_string()),
            ("Valor Total de ICMS", format_brl(self.icms_total)),
            ("Valor Total de PIS", format_brl(self.pis_total)),
            ("Valor Total de COFINS", format_brl(self.cofins_total)),
            ("Valor Total de ISS", format_brl(self.iss_total)),
            ("Estimativa de IVA (Simulado)", format_brl(self.iva_estimate)),
        ];
        if let Some(alert) = &self.quality_alert {
            out.push((QUALITY_ALERT_LABEL, alert.clone()));
        }
        out
    }
}

/// Aggregate a batch. `ERRO` documents and documents without items are left out.
pub fn aggregate(docs: &[AuditedDocument]) -> AggregatedMetrics {
    let valid: Vec<&AuditedDocument> = docs.iter().filter(|d| d.is_postable()).collect();
    let mut m = AggregatedMetrics::default();

    // NFe id → first non-zero declared total, across documents.
    let mut per_nfe: BTreeMap<&str, Decimal> = BTreeMap::new();
    let mut without_id = 0usize;
    let mut undeclared_total = Decimal::ZERO;

    for doc in &valid {
        let mut doc_without_id = Decimal::ZERO;
        let mut has_anonymous = false;
        for item in doc.items() {
            m.item_count += 1;
            m.product_total = m.product_total.saturating_add(item.line_total.unwrap_or_default());
            m.icms_total = m.icms_total.saturating_add(item.icms_value.unwrap_or_default());
            m.pis_total = m.pis_total.saturating_add(item.pis_value.unwrap_or_default());
            m.cofins_total = m.cofins_total.saturating_add(item.cofins_value.unwrap_or_default());
            m.iss_total = m.iss_total.saturating_add(item.iss_value.unwrap_or_default());

            let declared = item.nfe_total.unwrap_or_default();
            match item.nfe_id.as_deref().filter(|id| !id.trim().is_empty()) {
                Some(id) => {
                    let slot = per_nfe.entry(id).or_insert(Decimal::ZERO);
                    if slot.is_zero() {
                        *slot = declared;
                    }
                }
                None => {
                    has_anonymous = true;
                    if doc_without_id.is_zero() {
                        doc_without_id = declared;
                    }
                }
            }
        }
        if has_anonymous {
            without_id += 1;
            undeclared_total = undeclared_total.saturating_add(doc_without_id);
        }
    }

    m.document_count = per_nfe.len() + without_id;
    m.nfe_total = saturating_sum(per_nfe.values().copied()).saturating_add(undeclared_total);
    if m.nfe_total.is_zero() && m.product_total > Decimal::ZERO {
        m.nfe_total = saturating_sum([m.product_total, m.icms_total, m.pis_total, m.cofins_total, m.iss_total]);
    }
    m.iva_estimate = m.pis_total.saturating_add(m.cofins_total).saturating_mul(IVA_SIMULATED_RATE);

    if m.nfe_total.is_zero() && m.item_count > 0 {
        log::warn!("aggregate: {} items but the NFe total is zero", m.item_count);
        m.quality_alert = Some(
            "O valor total das NFes processadas é zero, indicando dados de origem inconsistentes."
                .into(),
        );
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audited(name: &str, items: Vec<CanonicalItem>) -> AuditedDocument {
        AuditedDocument::new(ImportedDocument::parsed(DocumentKind::NfeXml, name, 1, items))
    }

    #[test]
    fn same_nfe_in_two_documents_counts_once() {
        let item = CanonicalItemBuilder::new("A", dec!(2), dec!(50))
            .nfe("NFe1", dec!(100))
            .pis("01", dec!(1.65))
            .cofins("01", dec!(7.60))
            .build();
        let m = aggregate(&[audited("a.xml", vec![item.clone()]), audited("a.pdf", vec![item])]);
        assert_eq!(m.document_count, 1);
        assert_eq!(m.item_count, 2);
        assert_eq!(m.nfe_total, dec!(100));
        assert_eq!(m.product_total, dec!(200));
        assert_eq!(m.iva_estimate, dec!(4.625));
    }

    #[test]
    fn reconstructs_total_from_products_and_taxes() {
        let item = CanonicalItemBuilder::new("A", dec!(1), dec!(100))
            .icms("00", dec!(100), dec!(18), dec!(18))
            .build();
        let m = aggregate(&[audited("a.csv", vec![item])]);
        assert_eq!(m.document_count, 1);
        assert_eq!(m.nfe_total, dec!(118));
        assert!(m.quality_alert.is_none());
    }

    #[test]
    fn zero_values_raise_quality_alert() {
        let item = CanonicalItemBuilder::new("A", dec!(0), dec!(0)).build();
        let m = aggregate(&[audited("a.csv", vec![item])]);
        assert!(m.quality_alert.is_some());
        assert_eq!(m.labeled().last().map(|(k, _)| *k), Some(QUALITY_ALERT_LABEL));
    }

    #[test]
    fn erro_documents_are_excluded() {
        let mut doc = audited("a.xml", vec![CanonicalItemBuilder::new("A", dec!(1), dec!(5)).build()]);
        doc.status = AuditStatus::Erro;
        assert_eq!(aggregate(&[doc]), AggregatedMetrics::default());
    }
}
