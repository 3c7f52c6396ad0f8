use chrono::NaiveDate;
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use sped_audit::audit::{InMemoryCorrections, RulesConfig, audit_documents, classify_documents};
use sped_audit::core::*;
use sped_audit::import::{Importer, RawFile, parse_csv, parse_nfe_xml};
use sped_audit::ledger::synthesize_all;
use sped_audit::reconcile::{ReconcileConfig, reconcile};
use sped_audit::sped::{SpedConfig, SpedConfigBuilder, encode, verify_control_counts};

const PRODUCTS: [&str; 8] = [
    "Parafuso 10mm",
    "Porca 10mm",
    "Arruela lisa",
    "Cerveja 350ml",
    "Café 500g",
    "Açúcar 1kg",
    "Caixa de papelão",
    "Fita adesiva",
];

fn sped_config() -> SpedConfig {
    SpedConfigBuilder::new("Benchmark LTDA", "12345678000195", "SP")
        .generated_on(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
        .build()
}

/// `n` classified documents of 10 items each, prices drifting per document.
fn batch(n: usize) -> Vec<AuditedDocument> {
    (0..n)
        .map(|d| {
            let op = if d % 2 == 0 { OperationType::Compra } else { OperationType::Venda };
            let cfop = if d % 2 == 0 { "1102" } else { "5102" };
            let items: Vec<CanonicalItem> = (0..10)
                .map(|i| {
                    let price = Decimal::from(10 + i) + Decimal::new((d % 7) as i64 * 50, 2);
                    CanonicalItemBuilder::new(PRODUCTS[i % PRODUCTS.len()], dec!(3), price)
                        .nfe(format!("NFe{d}"), Decimal::ZERO)
                        .emitted("2024-05-10")
                        .ncm("73181500")
                        .cfop(cfop)
                        .icms("00", price * dec!(3), dec!(18), (price * dec!(3) * dec!(0.18)).round_dp(2))
                        .build()
                })
                .collect();
            AuditedDocument::new(ImportedDocument::parsed(DocumentKind::NfeXml, format!("nota-{d:04}.xml"), 4096, items))
                .classified_as(op)
        })
        .collect()
}

fn nfe_xml(dets: usize) -> String {
    let mut xml = String::from(
        r#"<nfeProc xmlns="http://www.portalfiscal.inf.br/nfe"><NFe><infNFe Id="NFe35240112345678000195550010000000011000000010">
<ide><nNF>1</nNF><serie>1</serie><dhEmi>2024-01-15T10:00:00-03:00</dhEmi></ide>
<emit><CNPJ>12345678000195</CNPJ><xNome>Emitente</xNome><enderEmit><UF>SP</UF></enderEmit></emit>
<dest><CNPJ>98765432000110</CNPJ><xNome>Destinatario</xNome><enderDest><UF>SP</UF></enderDest></dest>"#,
    );
    for i in 1..=dets {
        xml.push_str(&format!(
            "<det nItem=\"{i}\"><prod><cProd>P{i}</cProd><xProd>Produto {i}</xProd><NCM>73181500</NCM>\
             <CFOP>5102</CFOP><uCom>UN</uCom><qCom>2.0000</qCom><vUnCom>5.0000000000</vUnCom><vProd>10.00</vProd></prod>\
             <imposto><ICMS><ICMS00><CST>00</CST><vBC>10.00</vBC><pICMS>18.00</pICMS><vICMS>1.80</vICMS></ICMS00></ICMS>\
             <PIS><PISAliq><CST>01</CST><vPIS>0.17</vPIS></PISAliq></PIS></imposto></det>"
        ));
    }
    xml.push_str("<total><ICMSTot><vNF>0.00</vNF></ICMSTot></total></infNFe></NFe></nfeProc>");
    xml
}

fn sales_csv(rows: usize) -> String {
    let mut csv = String::from("produto;quantidade;valor_unitario;valor_total;cfop;ncm\n");
    for i in 0..rows {
        csv.push_str(&format!("{};2;1.234,50;2.469,00;5102;73181500\n", PRODUCTS[i % PRODUCTS.len()]));
    }
    csv
}

fn bench_nfe_parse(c: &mut Criterion) {
    let xml = nfe_xml(200);
    c.bench_function("nfe_parse_200_items", |b| {
        b.iter(|| black_box(parse_nfe_xml(black_box(xml.as_bytes()))));
    });
}

fn bench_csv_parse(c: &mut Criterion) {
    let csv = sales_csv(1000);
    c.bench_function("csv_parse_1000_rows", |b| {
        b.iter(|| black_box(parse_csv(black_box(csv.as_bytes()))));
    });
}

fn bench_import_batch(c: &mut Criterion) {
    let files: Vec<RawFile> = (0..50)
        .map(|i| RawFile::new(format!("nota-{i}.xml"), nfe_xml(20).into_bytes()))
        .collect();
    let importer = Importer::default();
    c.bench_function("import_50_xml", |b| {
        b.iter(|| black_box(importer.import_all(black_box(&files), |_, _| {})));
    });
}

fn bench_audit_classify(c: &mut Criterion) {
    let imported: Vec<ImportedDocument> = batch(100).into_iter().map(|d| d.doc).collect();
    let rules = RulesConfig::default();
    let store = InMemoryCorrections::new();
    c.bench_function("audit_classify_100_docs", |b| {
        b.iter(|| black_box(classify_documents(audit_documents(imported.clone(), &rules), &store)));
    });
}

fn bench_reconcile(c: &mut Criterion) {
    let docs = batch(200);
    let config = ReconcileConfig::default();
    c.bench_function("reconcile_200_docs", |b| {
        b.iter(|| black_box(reconcile(black_box(&docs), &config)));
    });
}

fn bench_ledger(c: &mut Criterion) {
    let docs = batch(200);
    c.bench_function("ledger_200_docs", |b| {
        b.iter(|| black_box(synthesize_all(black_box(&docs))));
    });
}

fn bench_sped_encode(c: &mut Criterion) {
    let docs = batch(200);
    let config = sped_config();
    c.bench_function("sped_encode_200_docs", |b| {
        b.iter(|| black_box(encode(black_box(&docs), &config)));
    });

    let sped = encode(&docs, &config);
    c.bench_function("sped_verify_200_docs", |b| {
        b.iter(|| black_box(verify_control_counts(black_box(&sped.content))));
    });
}

criterion_group!(
    benches,
    bench_nfe_parse,
    bench_csv_parse,
    bench_import_batch,
    bench_audit_classify,
    bench_reconcile,
    bench_ledger,
    bench_sped_encode,
);
criterion_main!(benches);
