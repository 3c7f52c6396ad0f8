#![cfg(feature = "core")]

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sped_audit::core::*;
use sped_audit::ledger::*;

fn document(op: OperationType, cfop: &str, total: Decimal, items: &[(Decimal, Decimal)]) -> AuditedDocument {
    let items = items
        .iter()
        .map(|(value, icms)| {
            CanonicalItemBuilder::new("Mercadoria", dec!(1), *value)
                .nfe("NFe1", total)
                .cfop(cfop)
                .icms("00", *value, dec!(18), *icms)
                .build()
        })
        .collect();
    AuditedDocument::new(ImportedDocument::parsed(DocumentKind::NfeXml, "nota.xml", 1, items)).classified_as(op)
}

fn lines(entries: &[AccountingEntry]) -> Vec<(&str, &str, Decimal)> {
    entries
        .iter()
        .map(|e| (e.account_name.as_str(), e.entry_type.code(), e.value))
        .collect()
}

fn balance(entries: &[AccountingEntry]) -> (Decimal, Decimal) {
    entries.iter().fold((Decimal::ZERO, Decimal::ZERO), |(d, c), e| match e.entry_type {
        EntryType::Debit => (d + e.value, c),
        EntryType::Credit => (d, c + e.value),
    })
}

#[test]
fn purchase_posts_stock_recoverable_icms_and_supplier() {
    let doc = document(OperationType::Compra, "1102", dec!(118), &[(dec!(100), dec!(18))]);
    let entries = synthesize(&doc);
    assert_eq!(
        lines(&entries),
        [
            ("Estoques", "D", dec!(100)),
            ("ICMS a Recuperar", "D", dec!(18)),
            ("Fornecedores", "C", dec!(118)),
        ]
    );
    assert!(entries.iter().all(|e| e.doc_name == "nota.xml"));
    assert_eq!(entries[0].account_code, "1.1.2");
}

#[test]
fn sale_posts_revenue_and_icms_on_sales() {
    let doc = document(OperationType::Venda, "5102", dec!(200), &[(dec!(120), dec!(21.60)), (dec!(80), dec!(14.40))]);
    let entries = synthesize(&doc);
    assert_eq!(
        lines(&entries),
        [
            ("Clientes", "D", dec!(200)),
            ("Receita de Vendas", "C", dec!(200)),
            ("ICMS sobre Vendas", "D", dec!(36.00)),
            ("ICMS a Recolher", "C", dec!(36.00)),
        ]
    );
}

#[test]
fn residuals_keep_every_document_balanced() {
    let freight = document(OperationType::Compra, "1102", dec!(130), &[(dec!(100), dec!(18))]);
    let entries = synthesize(&freight);
    assert_eq!(lines(&entries)[3], ("Encargos e Despesas Acessórias", "D", dec!(12)));
    let (d, c) = balance(&entries);
    assert_eq!(d, c);

    let discount = document(OperationType::Venda, "5102", dec!(90), &[(dec!(100), dec!(0))]);
    let entries = synthesize(&discount);
    assert!(lines(&entries).contains(&("Descontos Concedidos", "D", dec!(10))));
    let (d, c) = balance(&entries);
    assert_eq!(d, c);
}

#[test]
fn returns_follow_the_cfop_direction() {
    let from_customer = document(OperationType::Devolucao, "1202", dec!(118), &[(dec!(100), dec!(18))]);
    assert_eq!(
        lines(&synthesize(&from_customer)),
        [
            ("Estoques", "C", dec!(100)),
            ("ICMS a Recuperar", "C", dec!(18)),
            ("Fornecedores", "D", dec!(118)),
        ]
    );

    let to_supplier = document(OperationType::Devolucao, "5202", dec!(100), &[(dec!(100), dec!(0))]);
    assert_eq!(
        lines(&synthesize(&to_supplier)),
        [("Clientes", "C", dec!(100)), ("Devoluções de Vendas", "D", dec!(100))]
    );
}

#[test]
fn services_and_transfers() {
    let provided = document(OperationType::Servico, "5933", dec!(300), &[(dec!(300), dec!(0))]);
    assert_eq!(
        lines(&synthesize(&provided)),
        [("Clientes", "D", dec!(300)), ("Receita de Serviços", "C", dec!(300))]
    );

    let taken = document(OperationType::Servico, "1933", dec!(300), &[(dec!(300), dec!(0))]);
    assert_eq!(
        lines(&synthesize(&taken)),
        [("Despesa com Serviços", "D", dec!(300)), ("Fornecedores", "C", dec!(300))]
    );

    let outgoing = document(OperationType::Transferencia, "5152", dec!(50), &[(dec!(50), dec!(0))]);
    assert_eq!(
        lines(&synthesize(&outgoing)),
        [("Custo de Transferência", "D", dec!(50)), ("Estoques", "C", dec!(50))]
    );
}

#[test]
fn outros_and_rejected_documents_post_nothing() {
    let other = document(OperationType::Outros, "5949", dec!(10), &[(dec!(10), dec!(0))]);
    assert!(synthesize(&other).is_empty());

    let mut rejected = document(OperationType::Compra, "1102", dec!(118), &[(dec!(100), dec!(18))]);
    rejected.status = AuditStatus::Erro;
    assert!(synthesize(&rejected).is_empty());
}

#[test]
fn batch_keeps_document_order() {
    let mut a = document(OperationType::Compra, "1102", dec!(118), &[(dec!(100), dec!(18))]);
    a.doc.name = "a.xml".into();
    let mut b = document(OperationType::Venda, "5102", dec!(50), &[(dec!(50), dec!(0))]);
    b.doc.name = "b.xml".into();

    let entries = synthesize_all(&[b, a]);
    assert_eq!(entries.len(), 5);
    assert_eq!(entries[0].doc_name, "b.xml");
    assert_eq!(entries[4].doc_name, "a.xml");
}

#[test]
fn chart_lookup() {
    assert_eq!(account_by_code("2.1.1"), Some(Account::Fornecedores));
    assert_eq!(account_by_code("9.9.9"), None);
    assert_eq!(Account::IcmsARecolher.display_name(), "2.1.2 ICMS a Recolher");
}
