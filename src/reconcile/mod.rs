//! Deterministic cross-document reconciliation.
//!
//! Items from every usable document are grouped by product identity, and
//! each group that spans at least two documents is checked for attribute
//! disagreement: NCM, unit price (relative tolerance) and ICMS rate.
//!
//! The reconciler is a pure function: it never looks at document totals and
//! never compares an item with another item of the same document.
//!
//! # Example
//!
//! ```
//! use sped_audit::core::*;
//! use sped_audit::reconcile::{ReconcileConfig, reconcile_imported};
//! use rust_decimal_macros::dec;
//!
//! let a = ImportedDocument::parsed(DocumentKind::NfeXml, "a.xml", 1,
//!     vec![CanonicalItemBuilder::new("Café 500g", dec!(1), dec!(10.00)).build()]);
//! let b = ImportedDocument::parsed(DocumentKind::NfeXml, "b.xml", 1,
//!     vec![CanonicalItemBuilder::new("café  500G", dec!(1), dec!(12.50)).build()]);
//!
//! let results = reconcile_imported(&[a, b], &ReconcileConfig::default());
//! assert_eq!(results.len(), 1);
//! assert_eq!(results[0].attribute, "Preço Unitário");
//! ```

mod attributes;

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::core::*;

pub use attributes::Attribute;

/// Reconciliation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Relative unit-price spread, `(max - min) / min`, above which a
    /// product is flagged. Default 0.15.
    pub price_tolerance: Decimal,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            price_tolerance: dec!(0.15),
        }
    }
}

impl ReconcileConfig {
    pub fn price_tolerance(mut self, tolerance: Decimal) -> Self {
        self.price_tolerance = tolerance;
        self
    }
}

/// A document together with its position in the batch. Two uploads, or two
/// entries of different archive folders, may share a display name.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BatchDoc<'a> {
    pub index: usize,
    pub doc: &'a ImportedDocument,
}

impl<'a> BatchDoc<'a> {
    /// Name, then archive path, then batch position.
    pub fn order_key(&self) -> (&'a str, Option<&'a str>, usize) {
        (
            self.doc.name.as_str(),
            self.doc.meta.as_ref().map(|m| m.internal_path.as_str()),
            self.index,
        )
    }
}

/// One item observation inside a product group.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Observation<'a> {
    pub doc: BatchDoc<'a>,
    pub item: &'a CanonicalItem,
}

/// Products seen in a batch, keyed by normalized identity.
pub(crate) struct ProductGroup<'a> {
    /// Display name: the first spelling seen.
    pub label: String,
    pub observations: Vec<Observation<'a>>,
}

impl ProductGroup<'_> {
    fn distinct_documents(&self) -> usize {
        let mut indices: Vec<usize> = self.observations.iter().map(|o| o.doc.index).collect();
        indices.sort_unstable();
        indices.dedup();
        indices.len()
    }
}

/// Grouping key for an item: the product name lowercased with whitespace
/// collapsed, or the product code when the item has no name.
pub fn comparison_key(item: &CanonicalItem) -> Option<String> {
    let name = item
        .product_name
        .as_deref()
        .map(|n| n.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase())
        .filter(|n| !n.is_empty());
    name.or_else(|| {
        item.product_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(|c| format!("#{c}"))
    })
}

fn group_items<'a>(docs: &[&'a ImportedDocument]) -> BTreeMap<String, ProductGroup<'a>> {
    let mut groups: BTreeMap<String, ProductGroup<'a>> = BTreeMap::new();
    for (index, &doc) in docs.iter().enumerate() {
        for item in doc.items() {
            let Some(key) = comparison_key(item) else {
                continue;
            };
            let group = groups.entry(key).or_insert_with(|| ProductGroup {
                label: item
                    .product_name
                    .as_deref()
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .or(item.product_code.as_deref().map(str::trim))
                    .unwrap_or_default()
                    .to_string(),
                observations: Vec::new(),
            });
            group.observations.push(Observation {
                doc: BatchDoc { index, doc },
                item,
            });
        }
    }
    groups
}

/// Reconcile a set of audited documents.
///
/// Results come out ordered by product key, then by attribute
/// ([`Attribute::ALL`] order).
pub fn reconcile(
    docs: &[AuditedDocument],
    config: &ReconcileConfig,
) -> Vec<DeterministicCrossValidationResult> {
    let imported: Vec<&ImportedDocument> = docs.iter().map(|d| &d.doc).collect();
    reconcile_refs(&imported, config)
}

/// [`reconcile`] over documents that have not been audited yet.
pub fn reconcile_imported(
    docs: &[ImportedDocument],
    config: &ReconcileConfig,
) -> Vec<DeterministicCrossValidationResult> {
    let refs: Vec<&ImportedDocument> = docs.iter().collect();
    reconcile_refs(&refs, config)
}

fn reconcile_refs(
    docs: &[&ImportedDocument],
    config: &ReconcileConfig,
) -> Vec<DeterministicCrossValidationResult> {
    let usable: Vec<&ImportedDocument> = docs.iter().copied().filter(|d| d.is_usable()).collect();
    let groups = group_items(&usable);

    let mut results = Vec::new();
    for group in groups.values() {
        if group.distinct_documents() < 2 {
            continue;
        }
        for attribute in Attribute::ALL {
            if let Some(result) = attribute.compare(group, config) {
                results.push(result);
            }
        }
    }

    log::info!(
        "reconcile: {} documents, {} products, {} discrepancies",
        usable.len(),
        groups.len(),
        results.len()
    );
    results
}
