//! CFOP-vote classification with injected corrections.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::core::*;

/// Persistence of user corrections to operation types, keyed by document name.
///
/// The caller owns persistence; the pipeline only reads and writes through
/// this interface.
pub trait CorrectionStore: Send + Sync {
    fn get(&self, doc_name: &str) -> Option<OperationType>;
    fn put(&self, doc_name: &str, operation_type: OperationType);
}

/// Process-local [`CorrectionStore`].
#[derive(Debug, Default)]
pub struct InMemoryCorrections {
    entries: RwLock<HashMap<String, OperationType>>,
}

impl InMemoryCorrections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CorrectionStore for InMemoryCorrections {
    fn get(&self, doc_name: &str) -> Option<OperationType> {
        self.entries.read().ok()?.get(doc_name).copied()
    }

    fn put(&self, doc_name: &str, operation_type: OperationType) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(doc_name.to_string(), operation_type);
        }
    }
}

const UNCLASSIFIED: &str = "Não Classificado";

/// NCM prefix → business sector. 4-digit prefixes are tried before 2-digit ones.
const NCM_SECTORS: &[(&str, &str)] = &[
    ("8471", "Tecnologia da Informação"),
    ("2106", "Preparações Alimentícias Diversas"),
    ("84", "Máquinas e Equipamentos"),
    ("85", "Material Elétrico"),
    ("22", "Bebidas"),
    ("10", "Produtos de Moagem"),
];

/// Business sector implied by an NCM code.
pub fn business_sector(ncm: &str) -> &'static str {
    let ncm = ncm.trim();
    if ncm.is_empty() {
        return UNCLASSIFIED;
    }
    let lookup = |len: usize| {
        let prefix = ncm.get(..len)?;
        NCM_SECTORS
            .iter()
            .find(|(p, _)| *p == prefix)
            .map(|(_, s)| *s)
    };
    lookup(4)
        .or_else(|| lookup(2))
        .unwrap_or("Comércio Varejista/Atacadista")
}

fn vote(cfop: &str) -> OperationType {
    let has = |prefixes: &[&str]| prefixes.iter().any(|p| cfop.starts_with(p));
    if has(&["1", "2"]) {
        if has(&["12", "22"]) {
            OperationType::Devolucao
        } else if has(&["14", "24"]) {
            OperationType::Compra
        } else if has(&["13", "23"]) {
            OperationType::Servico
        } else if has(&["155", "255"]) {
            OperationType::Transferencia
        } else {
            OperationType::Compra
        }
    } else if has(&["5", "6"]) {
        if has(&["52", "62"]) {
            OperationType::Devolucao
        } else if has(&["5933", "6933"]) {
            OperationType::Servico
        } else if has(&["555", "655"]) {
            OperationType::Transferencia
        } else {
            OperationType::Venda
        }
    } else {
        OperationType::Outros
    }
}

/// Most frequent value; ties go to the one seen first.
fn first_majority<T: PartialEq + Copy>(values: impl IntoIterator<Item = T>) -> Option<(T, usize)> {
    let mut tally: Vec<(T, usize)> = Vec::new();
    for v in values {
        match tally.iter_mut().find(|(seen, _)| *seen == v) {
            Some((_, n)) => *n += 1,
            None => tally.push((v, 1)),
        }
    }
    let mut best: Option<(T, usize)> = None;
    for (v, n) in tally {
        if best.is_none_or(|(_, b)| n > b) {
            best = Some((v, n));
        }
    }
    best
}

fn classify(doc: &AuditedDocument) -> Option<Classification> {
    let cfops: Vec<&str> = doc
        .items()
        .iter()
        .filter_map(|i| i.cfop.as_deref().map(str::trim).filter(|c| !c.is_empty()))
        .collect();
    let sector = first_majority(
        doc.items()
            .iter()
            .filter_map(|i| i.ncm.as_deref().filter(|n| !n.trim().is_empty()))
            .map(business_sector),
    )
    .map(|(s, _)| s)
    .unwrap_or(UNCLASSIFIED);

    let (operation_type, votes) = first_majority(cfops.iter().map(|c| vote(c)))?;
    Some(Classification {
        operation_type,
        business_sector: sector.to_string(),
        confidence: votes as f64 / cfops.len() as f64,
    })
}

/// Attach a deterministic classification to every classifiable document.
///
/// `ERRO` documents and documents without items pass through untouched.
/// A correction recorded for the document name overrides the voted
/// operation type with confidence 1.0.
pub fn classify_documents(
    docs: Vec<AuditedDocument>,
    corrections: &dyn CorrectionStore,
) -> Vec<AuditedDocument> {
    docs.into_iter()
        .map(|doc| {
            if doc.status == AuditStatus::Erro || doc.items().is_empty() {
                return doc;
            }
            let voted = classify(&doc);
            match corrections.get(doc.name()) {
                Some(operation_type) => {
                    let business_sector = voted
                        .map(|c| c.business_sector)
                        .unwrap_or_else(|| UNCLASSIFIED.to_string());
                    log::debug!("{}: classification corrected to {}", doc.name(), operation_type.label());
                    doc.with_classification(Classification {
                        operation_type,
                        business_sector,
                        confidence: 1.0,
                    })
                }
                None => match voted {
                    Some(c) => doc.with_classification(c),
                    None => doc,
                },
            }
        })
        .collect()
}
