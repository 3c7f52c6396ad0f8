//! Defensive numeric parsing and pt-BR number formatting.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

/// Parse a numeric field the way fiscal sources actually write them.
///
/// With a comma present, dots and spaces are thousands separators and the
/// comma is the decimal mark (`"1.234,56"`). Without one, the dot is the
/// decimal mark (`"1234.56"`, as in NFe XML). Currency symbols and other
/// noise are dropped. Anything left unparseable yields zero, never an error.
pub fn parse_safe_decimal(raw: &str) -> Decimal {
    let s = raw.trim();
    if s.is_empty() {
        return Decimal::ZERO;
    }

    let cleaned: String = if s.contains(',') {
        s.chars()
            .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '-')
            .map(|c| if c == ',' { '.' } else { c })
            .collect()
    } else {
        s.chars()
            .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
            .collect()
    };

    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .unwrap_or(Decimal::ZERO)
}

/// [`parse_safe_decimal`] over an optional source value.
pub fn parse_opt_decimal(raw: Option<&str>) -> Decimal {
    raw.map(parse_safe_decimal).unwrap_or(Decimal::ZERO)
}

/// Sum that clamps at [`Decimal::MAX`] / [`Decimal::MIN`] instead of
/// panicking on overflow.
pub fn saturating_sum(values: impl IntoIterator<Item = Decimal>) -> Decimal {
    values.into_iter().fold(Decimal::ZERO, Decimal::saturating_add)
}

/// SPED numeric field: 2 decimal places, comma separator, no grouping.
pub fn format_sped_decimal(d: Decimal) -> String {
    format!("{:.2}", round_money(d)).replace('.', ",")
}

/// SPED quantity field: at least 2 and at most 5 decimal places.
pub fn format_sped_quantity(d: Decimal) -> String {
    let mut q = d
        .round_dp_with_strategy(5, RoundingStrategy::MidpointAwayFromZero)
        .normalize();
    if q.scale() < 2 {
        q.rescale(2);
    }
    q.to_string().replace('.', ",")
}

/// Round half away from zero to 2 places, the fiscal convention.
pub fn round_money(d: Decimal) -> Decimal {
    d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Human-readable Brazilian currency, e.g. `R$ 1.234,56`.
pub fn format_brl(d: Decimal) -> String {
    let fixed = format!("{:.2}", round_money(d));
    let (sign, digits) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed.as_str()),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    format!("{sign}R$ {grouped},{frac_part}")
}

/// Parse the leading date of an emission timestamp.
///
/// Accepts `2024-03-15T10:00:00-03:00` (NFe `dhEmi`), `2024-03-15`
/// (`dEmi`) and `15/03/2024` (spreadsheets).
pub fn parse_emission_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    let head = s.get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(head, "%d/%m/%Y"))
        .ok()
}
