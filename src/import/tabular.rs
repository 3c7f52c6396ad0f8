//! CSV and spreadsheet normalization.
//!
//! The first row is the header. Headers are folded and looked up in the
//! [`CanonicalField`] alias table; columns without a canonical field land
//! in [`CanonicalItem::extra`].

use std::io::Cursor;

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::core::*;

/// Fold a header for alias lookup: accents stripped, lowercase, runs of
/// whitespace and `-` collapsed to a single `_`.
pub fn fold_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for c in raw.trim().nfkd().filter(|c| !is_combining_mark(*c)) {
        if c.is_whitespace() || c == '-' || c == '_' {
            pending_sep = !out.is_empty();
            continue;
        }
        if pending_sep {
            out.push('_');
            pending_sep = false;
        }
        out.extend(c.to_lowercase());
    }
    out
}

/// Column layout resolved from a header row.
struct Columns {
    fields: Vec<Option<CanonicalField>>,
    headers: Vec<String>,
}

impl Columns {
    fn new<S: AsRef<str>>(header: &[S]) -> Self {
        let headers: Vec<String> = header.iter().map(|h| h.as_ref().trim().to_string()).collect();
        let fields: Vec<Option<CanonicalField>> = headers
            .iter()
            .map(|h| CanonicalField::from_alias(&fold_header(h)))
            .collect();

        let unmapped: Vec<&str> = headers
            .iter()
            .zip(&fields)
            .filter(|(h, f)| f.is_none() && !h.is_empty())
            .map(|(h, _)| h.as_str())
            .collect();
        if !unmapped.is_empty() {
            log::warn!("unmapped columns kept as extra: {}", unmapped.join(", "));
        }
        Self { fields, headers }
    }

    /// One item per row; rows with every cell blank are skipped.
    fn item<S: AsRef<str>>(&self, row: &[S]) -> Option<CanonicalItem> {
        if row.iter().all(|c| c.as_ref().trim().is_empty()) {
            return None;
        }
        let mut item = CanonicalItem::default();
        for (i, cell) in row.iter().enumerate() {
            let cell = cell.as_ref().trim();
            match self.fields.get(i).copied().flatten() {
                Some(field) => item.set_field(field, cell),
                None => {
                    let key = match self.headers.get(i) {
                        Some(h) if !h.is_empty() => h.clone(),
                        _ => format!("coluna_{}", i + 1),
                    };
                    if !cell.is_empty() {
                        item.extra.insert(key, cell.to_string());
                    }
                }
            }
        }
        Some(item)
    }
}

/// `;` when the header line has more semicolons than commas, else `,`.
fn sniff_delimiter(content: &[u8]) -> u8 {
    let first_line = content.split(|b| *b == b'\n').next().unwrap_or_default();
    let count = |needle: u8| first_line.iter().filter(|b| **b == needle).count();
    if count(b';') > count(b',') { b';' } else { b',' }
}

/// Parse delimited text. Invalid UTF-8 is replaced rather than rejected.
pub fn parse_csv(bytes: &[u8]) -> Result<Vec<CanonicalItem>, AuditError> {
    let content = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(content))
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content);

    let header: Vec<String> = rdr
        .byte_headers()
        .map_err(|e| AuditError::Spreadsheet(format!("cabeçalho CSV ilegível: {e}")))?
        .iter()
        .map(|h| String::from_utf8_lossy(h).into_owned())
        .collect();
    let columns = Columns::new(&header);

    let mut items = Vec::new();
    for record in rdr.byte_records() {
        let record = record.map_err(|e| AuditError::Spreadsheet(format!("CSV inválido: {e}")))?;
        let row: Vec<String> = record
            .iter()
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect();
        items.extend(columns.item(&row));
    }

    if items.is_empty() {
        return Err(AuditError::Spreadsheet("Nenhuma linha encontrada no CSV.".into()));
    }
    Ok(items)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        other => other.to_string(),
    }
}

/// Parse the first worksheet of an XLSX/XLS workbook.
pub fn parse_spreadsheet(bytes: &[u8]) -> Result<Vec<CanonicalItem>, AuditError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| AuditError::Spreadsheet(format!("planilha ilegível: {e}")))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AuditError::Spreadsheet("planilha sem abas".into()))?
        .map_err(|e| AuditError::Spreadsheet(format!("aba ilegível: {e}")))?;

    let mut rows = range.rows();
    let header: Vec<String> = rows
        .next()
        .map(|r| r.iter().map(cell_text).collect())
        .unwrap_or_default();
    let columns = Columns::new(&header);

    let items: Vec<CanonicalItem> = rows
        .filter_map(|r| {
            let row: Vec<String> = r.iter().map(cell_text).collect();
            columns.item(&row)
        })
        .collect();

    if items.is_empty() {
        return Err(AuditError::Spreadsheet("Nenhuma linha encontrada na planilha.".into()));
    }
    Ok(items)
}
