//! The compared line-level attributes and how each one disagrees.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use super::{BatchDoc, Observation, ProductGroup, ReconcileConfig};
use crate::core::numbers::format_sped_decimal;
use crate::core::*;

/// A line-level attribute that should be stable for one product across
/// documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Ncm,
    UnitPrice,
    IcmsRate,
}

impl Attribute {
    /// Comparison order within one product.
    pub const ALL: [Attribute; 3] = [Self::Ncm, Self::UnitPrice, Self::IcmsRate];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Ncm => "NCM",
            Self::UnitPrice => "Preço Unitário",
            Self::IcmsRate => "Alíquota ICMS",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::Ncm | Self::UnitPrice => Severity::Alerta,
            Self::IcmsRate => Severity::Info,
        }
    }

    pub(crate) fn compare(
        &self,
        group: &ProductGroup<'_>,
        config: &ReconcileConfig,
    ) -> Option<DeterministicCrossValidationResult> {
        match self {
            Self::Ncm => categorical(*self, group, |item| {
                item.ncm
                    .as_deref()
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(String::from)
            }),
            Self::IcmsRate => categorical(*self, group, |item| {
                item.icms_rate.map(|r| format!("{}%", format_sped_decimal(r)))
            }),
            Self::UnitPrice => price_spread(group, config.price_tolerance),
        }
    }
}

/// For each distinct value, the sorted set of documents carrying it.
fn values_by_document<'a>(
    group: &ProductGroup<'a>,
    extract: impl Fn(&CanonicalItem) -> Option<String>,
) -> BTreeMap<String, Vec<BatchDoc<'a>>> {
    let mut values: BTreeMap<String, Vec<BatchDoc<'a>>> = BTreeMap::new();
    for Observation { doc, item } in group.observations.iter().copied() {
        if let Some(value) = extract(item) {
            values.entry(value).or_default().push(doc);
        }
    }
    for docs in values.values_mut() {
        docs.sort_by_key(BatchDoc::order_key);
        docs.dedup_by_key(|d| d.index);
    }
    values
}

/// Exact inequality. The reference value is the one found in the
/// lexicographically first document; every other value is paired with it,
/// using the first document that carries it and is not the reference
/// document. Values only found alongside the reference in one document
/// are not reported.
fn categorical(
    attribute: Attribute,
    group: &ProductGroup<'_>,
    extract: impl Fn(&CanonicalItem) -> Option<String>,
) -> Option<DeterministicCrossValidationResult> {
    let values = values_by_document(group, extract);
    if values.len() < 2 {
        return None;
    }

    let (reference, reference_docs) = values
        .iter()
        .min_by(|(va, da), (vb, db)| {
            da[0].order_key().cmp(&db[0].order_key()).then_with(|| va.cmp(vb))
        })?;
    let reference_doc = reference_docs[0];

    let mut others: Vec<(&String, BatchDoc<'_>)> = values
        .iter()
        .filter(|(value, _)| *value != reference)
        .filter_map(|(value, docs)| {
            docs.iter()
                .find(|d| d.index != reference_doc.index)
                .map(|d| (value, *d))
        })
        .collect();
    others.sort_by(|(va, da), (vb, db)| da.order_key().cmp(&db.order_key()).then_with(|| va.cmp(vb)));

    if others.is_empty() {
        return None;
    }

    let discrepancies = others
        .iter()
        .map(|(value, doc)| Discrepancy {
            value_a: reference.clone(),
            doc_a: reference_doc.doc.doc_ref(),
            value_b: (*value).clone(),
            doc_b: doc.doc.doc_ref(),
        })
        .collect();

    let mut listed: Vec<&str> = vec![reference.as_str()];
    listed.extend(others.iter().map(|(v, _)| v.as_str()));

    let description = match attribute {
        Attribute::Ncm => format!(
            "O produto \"{}\" foi encontrado com múltiplos códigos NCM ({}), o que pode levar a tributação inconsistente.",
            group.label,
            listed.join(", ")
        ),
        _ => format!(
            "O produto \"{}\" foi encontrado com valores divergentes de {} ({}).",
            group.label,
            attribute.label(),
            listed.join(", ")
        ),
    };

    Some(DeterministicCrossValidationResult {
        comparison_key: group.label.clone(),
        attribute: attribute.label().into(),
        description,
        severity: attribute.severity(),
        discrepancies,
    })
}

/// Relative spread between the cheapest and the most expensive observation
/// in two different documents. Non-positive prices are ignored.
fn price_spread(
    group: &ProductGroup<'_>,
    tolerance: Decimal,
) -> Option<DeterministicCrossValidationResult> {
    // Per document: lowest and highest positive price.
    let mut per_doc: BTreeMap<_, (Decimal, Decimal, BatchDoc<'_>)> = BTreeMap::new();
    for Observation { doc, item } in group.observations.iter().copied() {
        let price = item.unit_price.unwrap_or_default();
        if price <= Decimal::ZERO {
            continue;
        }
        let slot = per_doc.entry(doc.order_key()).or_insert((price, price, doc));
        slot.0 = slot.0.min(price);
        slot.1 = slot.1.max(price);
    }

    // Widest cross-document pair; BTreeMap order makes the first
    // maximum the lexicographically smallest (low, high) pair. A spread
    // too wide for a Decimal saturates at Decimal::MAX.
    let mut best: Option<(Decimal, Decimal, Decimal, BatchDoc<'_>, BatchDoc<'_>)> = None;
    for (low_key, (low, _, low_doc)) in &per_doc {
        for (high_key, (_, high, high_doc)) in &per_doc {
            if low_key == high_key {
                continue;
            }
            let variation = high
                .checked_sub(*low)
                .and_then(|spread| spread.checked_div(*low))
                .unwrap_or(Decimal::MAX);
            if best.is_none_or(|(v, ..)| variation > v) {
                best = Some((variation, *low, *high, *low_doc, *high_doc));
            }
        }
    }

    let (variation, low, high, low_doc, high_doc) = best?;
    if variation <= tolerance {
        return None;
    }

    let percent = variation.checked_mul(Decimal::ONE_HUNDRED).unwrap_or(Decimal::MAX).round();
    Some(DeterministicCrossValidationResult {
        comparison_key: group.label.clone(),
        attribute: Attribute::UnitPrice.label().into(),
        description: format!(
            "Variação de preço de {percent}% detectada para o produto \"{}\".",
            group.label
        ),
        severity: Attribute::UnitPrice.severity(),
        discrepancies: vec![Discrepancy {
            value_a: format_brl(low),
            doc_a: low_doc.doc.doc_ref(),
            value_b: format_brl(high),
            doc_b: high_doc.doc.doc_ref(),
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::super::reconcile_imported;
    use super::*;
    use rust_decimal_macros::dec;

    fn doc(name: &str, items: Vec<CanonicalItem>) -> ImportedDocument {
        ImportedDocument::parsed(DocumentKind::NfeXml, name, 1, items)
    }

    fn priced(price: Decimal) -> CanonicalItem {
        CanonicalItemBuilder::new("Café", dec!(1), price).build()
    }

    #[test]
    fn price_within_tolerance_is_quiet() {
        let out = reconcile_imported(
            &[doc("a.xml", vec![priced(dec!(10))]), doc("b.xml", vec![priced(dec!(11.5))])],
            &ReconcileConfig::default(),
        );
        assert!(out.is_empty());
    }

    #[test]
    fn price_pair_spans_documents() {
        // b.xml holds both extremes; only cross-document pairs count.
        let out = reconcile_imported(
            &[
                doc("a.xml", vec![priced(dec!(12))]),
                doc("b.xml", vec![priced(dec!(5)), priced(dec!(20))]),
            ],
            &ReconcileConfig::default(),
        );
        assert_eq!(out.len(), 1);
        let d = &out[0].discrepancies[0];
        assert_eq!((d.doc_a.name.as_str(), d.value_a.as_str()), ("b.xml", "R$ 5,00"));
        assert_eq!((d.doc_b.name.as_str(), d.value_b.as_str()), ("a.xml", "R$ 12,00"));
        assert_eq!(out[0].description, "Variação de preço de 140% detectada para o produto \"Café\".");
    }

    #[test]
    fn ncm_disagreement() {
        let a = CanonicalItemBuilder::new("Café", dec!(1), dec!(10)).ncm("09012100").build();
        let b = CanonicalItemBuilder::new("Café", dec!(1), dec!(10)).ncm("09011100").build();
        let out = reconcile_imported(
            &[doc("b.xml", vec![b]), doc("a.xml", vec![a])],
            &ReconcileConfig::default(),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].attribute, "NCM");
        assert_eq!(out[0].severity, Severity::Alerta);
        let d = &out[0].discrepancies[0];
        assert_eq!((d.value_a.as_str(), d.doc_a.name.as_str()), ("09012100", "a.xml"));
        assert_eq!((d.value_b.as_str(), d.doc_b.name.as_str()), ("09011100", "b.xml"));
    }

    #[test]
    fn intra_document_disagreement_is_skipped() {
        let a1 = CanonicalItemBuilder::new("Café", dec!(1), dec!(10)).ncm("09012100").build();
        let a2 = CanonicalItemBuilder::new("Café", dec!(1), dec!(10)).ncm("09011100").build();
        let b = CanonicalItemBuilder::new("Café", dec!(1), dec!(10)).build();
        let out = reconcile_imported(
            &[doc("a.xml", vec![a1, a2]), doc("b.xml", vec![b])],
            &ReconcileConfig::default(),
        );
        assert!(out.is_empty());
    }

    #[test]
    fn icms_rate_is_info() {
        let a = CanonicalItemBuilder::new("Café", dec!(1), dec!(10))
            .icms("00", dec!(10), dec!(12), dec!(1.2))
            .build();
        let b = CanonicalItemBuilder::new("Café", dec!(1), dec!(10))
            .icms("00", dec!(10), dec!(18.00), dec!(1.8))
            .build();
        let out = reconcile_imported(
            &[doc("a.xml", vec![a]), doc("b.xml", vec![b])],
            &ReconcileConfig::default(),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].attribute, "Alíquota ICMS");
        assert_eq!(out[0].severity, Severity::Info);
        assert_eq!(out[0].discrepancies[0].value_a, "12,00%");
        assert_eq!(out[0].discrepancies[0].value_b, "18,00%");
    }
}
