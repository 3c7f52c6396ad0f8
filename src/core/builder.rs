use rust_decimal::Decimal;

use super::types::*;

/// Builder for [`CanonicalItem`]s, used by field extractors and fixtures.
///
/// ```
/// use sped_audit::core::*;
/// use rust_decimal_macros::dec;
///
/// let item = CanonicalItemBuilder::new("Parafuso 10mm", dec!(100), dec!(0.25))
///     .nfe("NFe35240112345678000195550010000000011000000010", dec!(30))
///     .cfop("1102")
///     .ncm("73181500")
///     .icms("00", dec!(25), dec!(18), dec!(4.50))
///     .build();
///
/// assert_eq!(item.line_total, Some(dec!(25.00)));
/// ```
pub struct CanonicalItemBuilder {
    item: CanonicalItem,
}

impl CanonicalItemBuilder {
    /// Start an item; the line total is `quantity × unit_price` until overridden,
    /// and left unset when that product does not fit a `Decimal`.
    pub fn new(product_name: impl Into<String>, quantity: Decimal, unit_price: Decimal) -> Self {
        Self {
            item: CanonicalItem {
                product_name: Some(product_name.into()),
                quantity: Some(quantity),
                unit_price: Some(unit_price),
                line_total: quantity.checked_mul(unit_price),
                ..Default::default()
            },
        }
    }

    /// NFe identity and its declared document total.
    pub fn nfe(mut self, id: impl Into<String>, total: Decimal) -> Self {
        self.item.nfe_id = Some(id.into());
        self.item.nfe_total = Some(total);
        self
    }

    pub fn number(mut self, number: impl Into<String>, series: impl Into<String>) -> Self {
        self.item.nfe_number = Some(number.into());
        self.item.series = Some(series.into());
        self
    }

    pub fn emitted(mut self, date: impl Into<String>) -> Self {
        self.item.emission_date = Some(date.into());
        self
    }

    pub fn issuer(mut self, name: impl Into<String>, uf: impl Into<String>) -> Self {
        self.item.issuer_name = Some(name.into());
        self.item.issuer_uf = Some(uf.into());
        self
    }

    pub fn recipient(mut self, name: impl Into<String>, uf: impl Into<String>) -> Self {
        self.item.recipient_name = Some(name.into());
        self.item.recipient_uf = Some(uf.into());
        self
    }

    pub fn item_number(mut self, n: u32) -> Self {
        self.item.item_number = Some(n);
        self
    }

    pub fn product_code(mut self, code: impl Into<String>) -> Self {
        self.item.product_code = Some(code.into());
        self
    }

    pub fn ncm(mut self, ncm: impl Into<String>) -> Self {
        self.item.ncm = Some(ncm.into());
        self
    }

    pub fn cfop(mut self, cfop: impl Into<String>) -> Self {
        self.item.cfop = Some(cfop.into());
        self
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.item.unit = Some(unit.into());
        self
    }

    pub fn line_total(mut self, total: Decimal) -> Self {
        self.item.line_total = Some(total);
        self
    }

    pub fn icms(mut self, cst: impl Into<String>, base: Decimal, rate: Decimal, value: Decimal) -> Self {
        self.item.icms_cst = Some(cst.into());
        self.item.icms_base = Some(base);
        self.item.icms_rate = Some(rate);
        self.item.icms_value = Some(value);
        self
    }

    pub fn pis(mut self, cst: impl Into<String>, value: Decimal) -> Self {
        self.item.pis_cst = Some(cst.into());
        self.item.pis_value = Some(value);
        self
    }

    pub fn cofins(mut self, cst: impl Into<String>, value: Decimal) -> Self {
        self.item.cofins_cst = Some(cst.into());
        self.item.cofins_value = Some(value);
        self
    }

    pub fn iss(mut self, value: Decimal) -> Self {
        self.item.iss_value = Some(value);
        self
    }

    pub fn build(self) -> CanonicalItem {
        self.item
    }
}
