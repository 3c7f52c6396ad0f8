//! Posting rules per operation type.

use rust_decimal::Decimal;

use super::accounts::Account;
use crate::core::*;

/// The amounts a posting rule works from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Amounts {
    /// Document total (declared, else line sum).
    total: Decimal,
    /// Σ line totals.
    products: Decimal,
    /// Σ ICMS, never negative.
    icms: Decimal,
}

impl Amounts {
    fn of(doc: &ImportedDocument) -> Self {
        Self {
            total: doc.document_total(),
            products: doc.line_total_sum(),
            icms: doc.sum_by(|i| i.icms_value).max(Decimal::ZERO),
        }
    }
}

/// Collects postings for one document, dropping zero amounts.
struct Journal {
    lines: Vec<(Account, EntryType, Decimal)>,
}

impl Journal {
    fn new() -> Self {
        Self { lines: Vec::new() }
    }

    fn debit(&mut self, account: Account, value: Decimal) -> &mut Self {
        if !value.is_zero() {
            self.lines.push((account, EntryType::Debit, value));
        }
        self
    }

    fn credit(&mut self, account: Account, value: Decimal) -> &mut Self {
        if !value.is_zero() {
            self.lines.push((account, EntryType::Credit, value));
        }
        self
    }

    /// Swap every debit and credit.
    fn reversed(mut self) -> Self {
        for (_, side, _) in &mut self.lines {
            *side = match *side {
                EntryType::Debit => EntryType::Credit,
                EntryType::Credit => EntryType::Debit,
            };
        }
        self
    }

    fn into_entries(self, doc_name: &str) -> Vec<AccountingEntry> {
        self.lines
            .into_iter()
            .map(|(account, entry_type, value)| AccountingEntry {
                doc_name: doc_name.to_string(),
                account_code: account.code().into(),
                account_name: account.label().into(),
                entry_type,
                value,
            })
            .collect()
    }
}

fn purchase(a: Amounts) -> Journal {
    let residual = a.total.saturating_sub(a.products).saturating_sub(a.icms);
    let mut j = Journal::new();
    j.debit(Account::Estoques, a.products)
        .debit(Account::IcmsARecuperar, a.icms)
        .credit(Account::Fornecedores, a.total);
    if residual > Decimal::ZERO {
        j.debit(Account::EncargosAcessorios, residual);
    } else {
        j.credit(Account::DescontosObtidos, -residual);
    }
    j
}

fn sale(a: Amounts, revenue: Account) -> Journal {
    let residual = a.total.saturating_sub(a.products);
    let mut j = Journal::new();
    j.debit(Account::Clientes, a.total)
        .credit(revenue, a.products)
        .debit(Account::IcmsSobreVendas, a.icms)
        .credit(Account::IcmsARecolher, a.icms);
    if residual > Decimal::ZERO {
        j.credit(Account::ReceitasAcessorias, residual);
    } else {
        j.debit(Account::DescontosConcedidos, -residual);
    }
    j
}

fn journal_for(operation: OperationType, cfop_prefix: Option<char>, a: Amounts) -> Journal {
    match operation {
        OperationType::Compra => purchase(a),
        OperationType::Venda => sale(a, Account::ReceitaDeVendas),
        OperationType::Devolucao => match cfop_prefix {
            Some('1') | Some('2') => purchase(a).reversed(),
            _ => sale(a, Account::DevolucoesDeVendas).reversed(),
        },
        OperationType::Servico => {
            let mut j = Journal::new();
            if matches!(cfop_prefix, Some('5') | Some('6') | Some('7')) {
                j.debit(Account::Clientes, a.total)
                    .credit(Account::ReceitaDeServicos, a.total);
            } else {
                j.debit(Account::DespesaComServicos, a.total)
                    .credit(Account::Fornecedores, a.total);
            }
            j
        }
        OperationType::Transferencia => {
            let mut j = Journal::new();
            if matches!(cfop_prefix, Some('5') | Some('6')) {
                j.debit(Account::CustoDeTransferencia, a.products)
                    .credit(Account::Estoques, a.products);
            } else {
                j.debit(Account::Estoques, a.products)
                    .credit(Account::ReceitaDeTransferencia, a.products);
            }
            j
        }
        OperationType::Outros => Journal::new(),
    }
}

/// Derive the double-entry postings for one classified document.
///
/// Documents without a classification, rejected (`ERRO`) documents and
/// documents with nothing to post yield no entries. The direction of
/// returns, services and transfers comes from the first item's CFOP.
pub fn synthesize(doc: &AuditedDocument) -> Vec<AccountingEntry> {
    let Some(operation) = doc.operation_type() else {
        return Vec::new();
    };
    if !doc.is_postable() {
        return Vec::new();
    }

    let amounts = Amounts::of(&doc.doc);
    if amounts.total.is_zero() && amounts.products.is_zero() {
        log::debug!("{}: nothing to post", doc.name());
        return Vec::new();
    }

    let cfop_prefix = doc.items().first().and_then(CanonicalItem::cfop_prefix);
    journal_for(operation, cfop_prefix, amounts).into_entries(doc.name())
}

/// [`synthesize`] over a batch, in document order.
pub fn synthesize_all(docs: &[AuditedDocument]) -> Vec<AccountingEntry> {
    let entries: Vec<AccountingEntry> = docs.iter().flat_map(synthesize).collect();
    log::info!("ledger: {} entries for {} documents", entries.len(), docs.len());
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn amounts(total: Decimal, products: Decimal, icms: Decimal) -> Amounts {
        Amounts { total, products, icms }
    }

    fn balance(j: &Journal) -> Decimal {
        j.lines
            .iter()
            .map(|(_, side, v)| match side {
                EntryType::Debit => *v,
                EntryType::Credit => -*v,
            })
            .sum()
    }

    #[test]
    fn purchase_with_freight_posts_residual() {
        let j = purchase(amounts(dec!(130), dec!(100), dec!(18)));
        assert_eq!(balance(&j), Decimal::ZERO);
        assert!(j.lines.contains(&(Account::EncargosAcessorios, EntryType::Debit, dec!(12))));
    }

    #[test]
    fn purchase_with_discount_posts_credit() {
        let j = purchase(amounts(dec!(110), dec!(100), dec!(18)));
        assert_eq!(balance(&j), Decimal::ZERO);
        assert!(j.lines.contains(&(Account::DescontosObtidos, EntryType::Credit, dec!(8))));
    }

    #[test]
    fn sale_return_reverses_with_devolucoes() {
        let j = journal_for(OperationType::Devolucao, Some('5'), amounts(dec!(100), dec!(100), dec!(12)));
        assert_eq!(balance(&j), Decimal::ZERO);
        assert_eq!(j.lines[0], (Account::Clientes, EntryType::Credit, dec!(100)));
        assert_eq!(j.lines[1], (Account::DevolucoesDeVendas, EntryType::Debit, dec!(100)));
    }

    #[test]
    fn purchase_return_reverses_purchase() {
        let j = journal_for(OperationType::Devolucao, Some('2'), amounts(dec!(118), dec!(100), dec!(18)));
        assert_eq!(
            j.lines,
            vec![
                (Account::Estoques, EntryType::Credit, dec!(100)),
                (Account::IcmsARecuperar, EntryType::Credit, dec!(18)),
                (Account::Fornecedores, EntryType::Debit, dec!(118)),
            ]
        );
    }

    #[test]
    fn outros_posts_nothing() {
        assert!(journal_for(OperationType::Outros, Some('5'), amounts(dec!(1), dec!(1), dec!(0)))
            .lines
            .is_empty());
    }

    #[test]
    fn unclassified_is_skipped() {
        let item = CanonicalItemBuilder::new("X", dec!(1), dec!(10)).build();
        let doc = AuditedDocument::new(ImportedDocument::parsed(DocumentKind::Csv, "x.csv", 1, vec![item]));
        assert!(synthesize(&doc).is_empty());
    }
}
