//! EFD ICMS/IPI text generation.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::*;

/// Configuration for EFD generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpedConfig {
    /// Layout version (`COD_VER`), e.g. `017`.
    pub layout_version: String,
    /// File purpose (`COD_FIN`): `0` original, `1` substitute.
    pub purpose: String,
    /// Company legal name (`NOME`).
    pub company_name: String,
    /// Company CNPJ, digits only.
    pub cnpj: String,
    /// State (`UF`).
    pub uf: String,
    /// State registration (`IE`).
    pub ie: String,
    /// IBGE municipality code (`COD_MUN`).
    pub municipality_code: String,
    /// Profile (`IND_PERFIL`): `A`, `B` or `C`.
    pub profile: String,
    /// Activity (`IND_ATIV`): `0` industrial, `1` other.
    pub activity: String,
    /// Explicit reporting period; derived from the documents when absent.
    pub period: Option<(NaiveDate, NaiveDate)>,
    /// Generation date; today's local date when absent.
    pub generated_on: Option<NaiveDate>,
}

impl Default for SpedConfig {
    fn default() -> Self {
        Self {
            layout_version: "017".into(),
            purpose: "0".into(),
            company_name: String::new(),
            cnpj: String::new(),
            uf: String::new(),
            ie: String::new(),
            municipality_code: String::new(),
            profile: "A".into(),
            activity: "1".into(),
            period: None,
            generated_on: None,
        }
    }
}

/// Builder for [`SpedConfig`].
///
/// # Example
///
/// ```
/// use sped_audit::sped::SpedConfigBuilder;
/// use chrono::NaiveDate;
///
/// let config = SpedConfigBuilder::new("ACME LTDA", "12345678000195", "SP")
///     .ie("110042490114")
///     .generated_on(NaiveDate::from_ymd_opt(2024, 4, 2).unwrap())
///     .build();
/// assert_eq!(config.layout_version, "017");
/// ```
pub struct SpedConfigBuilder {
    config: SpedConfig,
}

impl SpedConfigBuilder {
    /// Create a builder with the required company identity.
    pub fn new(company_name: impl Into<String>, cnpj: impl Into<String>, uf: impl Into<String>) -> Self {
        Self {
            config: SpedConfig {
                company_name: company_name.into(),
                cnpj: cnpj.into(),
                uf: uf.into(),
                ..Default::default()
            },
        }
    }

    pub fn layout_version(mut self, version: impl Into<String>) -> Self {
        self.config.layout_version = version.into();
        self
    }

    pub fn purpose(mut self, purpose: impl Into<String>) -> Self {
        self.config.purpose = purpose.into();
        self
    }

    pub fn ie(mut self, ie: impl Into<String>) -> Self {
        self.config.ie = ie.into();
        self
    }

    pub fn municipality_code(mut self, code: impl Into<String>) -> Self {
        self.config.municipality_code = code.into();
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config.profile = profile.into();
        self
    }

    pub fn activity(mut self, activity: impl Into<String>) -> Self {
        self.config.activity = activity.into();
        self
    }

    /// Fix the reporting period instead of deriving it.
    pub fn period(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.config.period = Some((start, end));
        self
    }

    /// Pin the generation date (file name and fallback period).
    pub fn generated_on(mut self, date: NaiveDate) -> Self {
        self.config.generated_on = Some(date);
        self
    }

    pub fn build(self) -> SpedConfig {
        self.config
    }
}

/// Appends records and keeps per-register counts.
struct RecordWriter {
    out: String,
    counts: BTreeMap<&'static str, usize>,
    lines: usize,
}

impl RecordWriter {
    fn new() -> Self {
        Self {
            out: String::new(),
            counts: BTreeMap::new(),
            lines: 0,
        }
    }

    fn record<S: AsRef<str>>(&mut self, register: &'static str, fields: &[S]) {
        self.out.push('|');
        self.out.push_str(register);
        self.out.push('|');
        for f in fields {
            self.out.push_str(f.as_ref());
            self.out.push('|');
        }
        self.out.push_str("\r\n");
        *self.counts.entry(register).or_insert(0) += 1;
        self.lines += 1;
    }

    fn count(&self, register: &str) -> usize {
        self.counts.get(register).copied().unwrap_or(0)
    }
}

/// Make free text safe for a pipe-delimited field.
pub fn sanitize_text(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '|' | '\r' | '\n' => ' ',
            other => other,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

fn ddmmyyyy(d: NaiveDate) -> String {
    d.format("%d%m%Y").to_string()
}

fn money(d: Decimal) -> String {
    format_sped_decimal(d)
}

fn last_day_of_month(d: NaiveDate) -> NaiveDate {
    let (y, m) = if d.month() == 12 {
        (d.year() + 1, 1)
    } else {
        (d.year(), d.month() + 1)
    };
    NaiveDate::from_ymd_opt(y, m, 1)
        .and_then(|first| first.pred_opt())
        .unwrap_or(d)
}

fn reporting_period(docs: &[&AuditedDocument], config: &SpedConfig, today: NaiveDate) -> (NaiveDate, NaiveDate) {
    if let Some(period) = config.period {
        return period;
    }
    let dates: Vec<NaiveDate> = docs
        .iter()
        .flat_map(|d| d.items())
        .filter_map(|i| i.emission_date.as_deref().and_then(parse_emission_date))
        .collect();
    match (dates.iter().min(), dates.iter().max()) {
        (Some(min), Some(max)) => (*min, *max),
        _ => (today.with_day(1).unwrap_or(today), last_day_of_month(today)),
    }
}

/// Access key: the 44 digits of the NFe id, or empty.
fn access_key(item: &CanonicalItem) -> String {
    let digits: String = item
        .nfe_id
        .as_deref()
        .unwrap_or("")
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    if digits.len() == 44 { digits } else { String::new() }
}

fn write_header(w: &mut RecordWriter, config: &SpedConfig, period: (NaiveDate, NaiveDate)) {
    w.record(
        "0000",
        &[
            sanitize_text(&config.layout_version),
            sanitize_text(&config.purpose),
            ddmmyyyy(period.0),
            ddmmyyyy(period.1),
            sanitize_text(&config.company_name),
            sanitize_text(&config.cnpj),
            String::new(), // CPF
            sanitize_text(&config.uf),
            sanitize_text(&config.ie),
            sanitize_text(&config.municipality_code),
            String::new(), // IM
            String::new(), // SUFRAMA
            sanitize_text(&config.profile),
            sanitize_text(&config.activity),
        ],
    );
    w.record("0001", &["0"]);
}

fn write_document(w: &mut RecordWriter, doc: &AuditedDocument) {
    let items = doc.items();
    let first = &items[0];
    let d = &doc.doc;
    let is_purchase = doc.operation_type() == Some(OperationType::Compra);

    // C100
    w.record(
        "C100",
        &[
            (if is_purchase { "0" } else { "1" }).to_string(), // IND_OPER
            (if is_purchase { "1" } else { "0" }).to_string(), // IND_EMIT
            String::new(),                                     // COD_PART
            "55".into(),                                       // COD_MOD
            "00".into(),                                       // COD_SIT
            sanitize_text(first.series.as_deref().unwrap_or("")),
            sanitize_text(first.nfe_number.as_deref().unwrap_or("")),
            access_key(first),
            first
                .emission_date
                .as_deref()
                .and_then(parse_emission_date)
                .map(ddmmyyyy)
                .unwrap_or_default(),
            String::new(), // DT_E_S
            money(d.document_total()),
            String::new(), // IND_PGTO
            String::new(), // VL_DESC
            String::new(), // VL_ABAT_NT
            money(d.line_total_sum()),
            String::new(), // IND_FRT
            String::new(), // VL_FRT
            String::new(), // VL_SEG
            String::new(), // VL_OUT_DA
            money(d.sum_by(|i| i.icms_base)),
            money(d.sum_by(|i| i.icms_value)),
            String::new(), // VL_BC_ICMS_ST
            String::new(), // VL_ICMS_ST
            String::new(), // VL_IPI
            money(d.sum_by(|i| i.pis_value)),
            money(d.sum_by(|i| i.cofins_value)),
            String::new(), // VL_PIS_ST
            String::new(), // VL_COFINS_ST
        ],
    );

    // C190: one per (CST, CFOP, rate)
    let mut analytic: BTreeMap<(String, String, Decimal), (Decimal, Decimal, Decimal)> = BTreeMap::new();
    for item in items {
        let cst: String = sanitize_text(item.icms_cst.as_deref().unwrap_or(""))
            .chars()
            .take(3)
            .collect();
        let cst = if cst.is_empty() { "000".to_string() } else { cst };
        let cfop = sanitize_text(item.cfop.as_deref().unwrap_or(""));
        let cfop = if cfop.is_empty() { "0000".to_string() } else { cfop };
        let rate = item.icms_rate.unwrap_or_default();

        let bucket = analytic.entry((cst, cfop, rate)).or_default();
        bucket.0 = bucket.0.saturating_add(item.line_total.unwrap_or_default());
        bucket.1 = bucket.1.saturating_add(item.icms_base.unwrap_or_default());
        bucket.2 = bucket.2.saturating_add(item.icms_value.unwrap_or_default());
    }
    for ((cst, cfop, rate), (operation, base, icms)) in &analytic {
        w.record(
            "C190",
            &[
                cst.clone(),
                cfop.clone(),
                money(*rate),
                money(*operation),
                money(*base),
                money(*icms),
                String::new(), // VL_BC_ICMS_ST
                String::new(), // VL_ICMS_ST
                String::new(), // VL_RED_BC
                String::new(), // VL_IPI
                String::new(), // COD_OBS
            ],
        );
    }

    // C170: one per item, in source order
    for (index, item) in items.iter().enumerate() {
        w.record(
            "C170",
            &[
                (index + 1).to_string(),
                sanitize_text(item.product_code.as_deref().unwrap_or("")),
                sanitize_text(item.product_name.as_deref().unwrap_or("")),
                format_sped_quantity(item.quantity.unwrap_or_default()),
                sanitize_text(item.unit.as_deref().unwrap_or("UN")),
                money(item.line_total.unwrap_or_default()),
                String::new(), // VL_DESC
                "0".into(),    // IND_MOV
                sanitize_text(item.icms_cst.as_deref().unwrap_or("")),
                sanitize_text(item.cfop.as_deref().unwrap_or("")),
                String::new(), // COD_NAT
                money(item.icms_base.unwrap_or_default()),
                money(item.icms_rate.unwrap_or_default()),
                money(item.icms_value.unwrap_or_default()),
            ],
        );
    }
}

fn write_footer(w: &mut RecordWriter) {
    let c990 = w.count("C001") + w.count("C100") + w.count("C170") + w.count("C190") + 1;
    w.record("C990", &[c990.to_string()]);
    w.record("9001", &["0"]);
    w.record("0990", &["2"]);

    // 9900 covers every register in the file, itself and the closers included.
    let mut summary: BTreeMap<&'static str, usize> = w.counts.clone();
    summary.insert("9990", 1);
    summary.insert("9999", 1);
    summary.insert("9900", 0);
    let distinct = summary.len();
    summary.insert("9900", distinct);
    for (register, count) in &summary {
        w.record("9900", &[register.to_string(), count.to_string()]);
    }

    let c9990 = w.count("9001") + w.count("9900") + 1;
    w.record("9990", &[c9990.to_string()]);
    let total = w.lines + 1;
    w.record("9999", &[total.to_string()]);
}

/// Serialize a batch into an EFD ICMS/IPI file.
///
/// Only documents that passed the audit (not `ERRO`) and carry items are
/// written. The encoder reads nothing but the canonical items and the
/// operation type, so it can be driven by synthetic fixtures.
pub fn encode(docs: &[AuditedDocument], config: &SpedConfig) -> SpedFile {
    let today = config
        .generated_on
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let encoded: Vec<&AuditedDocument> = docs.iter().filter(|d| d.is_postable()).collect();
    let period = reporting_period(&encoded, config, today);

    let mut w = RecordWriter::new();
    write_header(&mut w, config, period);
    w.record("C001", &[if encoded.is_empty() { "1" } else { "0" }]);
    for doc in &encoded {
        write_document(&mut w, doc);
    }
    write_footer(&mut w);

    log::info!(
        "sped: {} documents encoded, {} records",
        encoded.len(),
        w.lines
    );

    SpedFile {
        filename: format!("SPED-EFD-{}.txt", today.format("%Y-%m-%d")),
        content: w.out,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn sanitize_strips_delimiters() {
        assert_eq!(sanitize_text(" a|b\r\nc "), "a b  c");
    }

    #[test]
    fn month_end() {
        let d = NaiveDate::from_ymd_opt(2024, 2, 10).unwrap();
        assert_eq!(last_day_of_month(d), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        let d = NaiveDate::from_ymd_opt(2024, 12, 5).unwrap();
        assert_eq!(last_day_of_month(d), NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
    }

    #[test]
    fn access_key_needs_44_digits() {
        let item = CanonicalItemBuilder::new("x", dec!(1), dec!(1))
            .nfe("NFe35240112345678000195550010000000011000000010", dec!(1))
            .build();
        assert_eq!(access_key(&item).len(), 44);
        let short = CanonicalItemBuilder::new("x", dec!(1), dec!(1)).nfe("NFe123", dec!(1)).build();
        assert_eq!(access_key(&short), "");
    }

    #[test]
    fn empty_batch_still_closes_blocks() {
        let config = SpedConfigBuilder::new("ACME", "1", "SP")
            .generated_on(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
            .build();
        let sped = encode(&[], &config);
        assert_eq!(sped.filename, "SPED-EFD-2024-03-15.txt");
        assert!(sped.content.starts_with("|0000|017|0|01032024|31032024|ACME|1||SP|||||A|1|\r\n"));
        assert!(sped.content.contains("|C001|1|\r\n"));
        assert!(sped.content.contains("|C990|2|\r\n"));
        assert!(sped.content.contains("|9990|11|\r\n"));
        assert!(sped.content.ends_with("|9999|17|\r\n"));
    }
}
