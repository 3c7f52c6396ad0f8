//! The canonical field vocabulary and its tabular-header aliases.

use super::numbers::parse_safe_decimal;
use super::types::CanonicalItem;

/// Every field a [`CanonicalItem`] can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    NfeId,
    NfeNumber,
    Series,
    EmissionDate,
    NfeTotal,
    IssuerName,
    IssuerCnpj,
    IssuerUf,
    RecipientName,
    RecipientCnpj,
    RecipientUf,
    ItemNumber,
    ProductCode,
    ProductName,
    Ncm,
    Cfop,
    Unit,
    Quantity,
    UnitPrice,
    LineTotal,
    IcmsCst,
    IcmsBase,
    IcmsRate,
    IcmsValue,
    PisCst,
    PisBase,
    PisRate,
    PisValue,
    CofinsCst,
    CofinsBase,
    CofinsRate,
    CofinsValue,
    IssBase,
    IssRate,
    IssValue,
}

/// Folded header → field. Headers are matched after accent stripping,
/// lowercasing and collapsing whitespace / `-` to `_`.
const ALIASES: &[(&str, CanonicalField)] = &[
    ("nfe_id", CanonicalField::NfeId),
    ("chave", CanonicalField::NfeId),
    ("chave_nfe", CanonicalField::NfeId),
    ("chave_de_acesso", CanonicalField::NfeId),
    ("numero_nfe", CanonicalField::NfeNumber),
    ("numero_nota", CanonicalField::NfeNumber),
    ("nnf", CanonicalField::NfeNumber),
    ("serie", CanonicalField::Series),
    ("data_emissao", CanonicalField::EmissionDate),
    ("data_de_emissao", CanonicalField::EmissionDate),
    ("dhemi", CanonicalField::EmissionDate),
    ("emissao", CanonicalField::EmissionDate),
    ("valor_total_nfe", CanonicalField::NfeTotal),
    ("valor_total_da_nota", CanonicalField::NfeTotal),
    ("valor_nota", CanonicalField::NfeTotal),
    ("vnf", CanonicalField::NfeTotal),
    ("emitente_nome", CanonicalField::IssuerName),
    ("emitente", CanonicalField::IssuerName),
    ("razao_social_emitente", CanonicalField::IssuerName),
    ("emitente_cnpj", CanonicalField::IssuerCnpj),
    ("cnpj_emitente", CanonicalField::IssuerCnpj),
    ("emitente_uf", CanonicalField::IssuerUf),
    ("uf_emitente", CanonicalField::IssuerUf),
    ("destinatario_nome", CanonicalField::RecipientName),
    ("destinatario", CanonicalField::RecipientName),
    ("razao_social_destinatario", CanonicalField::RecipientName),
    ("destinatario_cnpj", CanonicalField::RecipientCnpj),
    ("cnpj_destinatario", CanonicalField::RecipientCnpj),
    ("destinatario_uf", CanonicalField::RecipientUf),
    ("uf_destinatario", CanonicalField::RecipientUf),
    ("item", CanonicalField::ItemNumber),
    ("numero_item", CanonicalField::ItemNumber),
    ("nitem", CanonicalField::ItemNumber),
    ("produto_codigo", CanonicalField::ProductCode),
    ("codigo_produto", CanonicalField::ProductCode),
    ("codigo", CanonicalField::ProductCode),
    ("cprod", CanonicalField::ProductCode),
    ("produto_nome", CanonicalField::ProductName),
    ("produto", CanonicalField::ProductName),
    ("descricao", CanonicalField::ProductName),
    ("descricao_produto", CanonicalField::ProductName),
    ("xprod", CanonicalField::ProductName),
    ("produto_ncm", CanonicalField::Ncm),
    ("ncm", CanonicalField::Ncm),
    ("produto_cfop", CanonicalField::Cfop),
    ("cfop", CanonicalField::Cfop),
    ("produto_unidade", CanonicalField::Unit),
    ("unidade", CanonicalField::Unit),
    ("ucom", CanonicalField::Unit),
    ("produto_qtd", CanonicalField::Quantity),
    ("quantidade", CanonicalField::Quantity),
    ("qtd", CanonicalField::Quantity),
    ("qcom", CanonicalField::Quantity),
    ("produto_valor_unit", CanonicalField::UnitPrice),
    ("valor_unitario", CanonicalField::UnitPrice),
    ("preco_unitario", CanonicalField::UnitPrice),
    ("vuncom", CanonicalField::UnitPrice),
    ("produto_valor_total", CanonicalField::LineTotal),
    ("valor_total", CanonicalField::LineTotal),
    ("valor_produto", CanonicalField::LineTotal),
    ("vprod", CanonicalField::LineTotal),
    ("produto_cst_icms", CanonicalField::IcmsCst),
    ("cst_icms", CanonicalField::IcmsCst),
    ("produto_base_calculo_icms", CanonicalField::IcmsBase),
    ("base_calculo_icms", CanonicalField::IcmsBase),
    ("bc_icms", CanonicalField::IcmsBase),
    ("produto_aliquota_icms", CanonicalField::IcmsRate),
    ("aliquota_icms", CanonicalField::IcmsRate),
    ("picms", CanonicalField::IcmsRate),
    ("produto_valor_icms", CanonicalField::IcmsValue),
    ("valor_icms", CanonicalField::IcmsValue),
    ("vicms", CanonicalField::IcmsValue),
    ("produto_cst_pis", CanonicalField::PisCst),
    ("cst_pis", CanonicalField::PisCst),
    ("produto_base_calculo_pis", CanonicalField::PisBase),
    ("base_calculo_pis", CanonicalField::PisBase),
    ("produto_aliquota_pis", CanonicalField::PisRate),
    ("aliquota_pis", CanonicalField::PisRate),
    ("produto_valor_pis", CanonicalField::PisValue),
    ("valor_pis", CanonicalField::PisValue),
    ("produto_cst_cofins", CanonicalField::CofinsCst),
    ("cst_cofins", CanonicalField::CofinsCst),
    ("produto_base_calculo_cofins", CanonicalField::CofinsBase),
    ("base_calculo_cofins", CanonicalField::CofinsBase),
    ("produto_aliquota_cofins", CanonicalField::CofinsRate),
    ("aliquota_cofins", CanonicalField::CofinsRate),
    ("produto_valor_cofins", CanonicalField::CofinsValue),
    ("valor_cofins", CanonicalField::CofinsValue),
    ("produto_base_calculo_iss", CanonicalField::IssBase),
    ("base_calculo_iss", CanonicalField::IssBase),
    ("produto_aliquota_iss", CanonicalField::IssRate),
    ("aliquota_iss", CanonicalField::IssRate),
    ("produto_valor_iss", CanonicalField::IssValue),
    ("valor_iss", CanonicalField::IssValue),
];

impl CanonicalField {
    /// Look up a field by its already-folded header name.
    pub fn from_alias(folded: &str) -> Option<Self> {
        ALIASES
            .iter()
            .find(|(alias, _)| *alias == folded)
            .map(|(_, field)| *field)
    }
}

impl CanonicalItem {
    /// Assign a raw source value to a field.
    ///
    /// Empty values leave the field absent. Numeric fields go through
    /// [`parse_safe_decimal`], so garbage becomes zero rather than an error.
    pub fn set_field(&mut self, field: CanonicalField, raw: &str) {
        let raw = raw.trim();
        if raw.is_empty() {
            return;
        }
        let text = || Some(raw.to_string());
        let num = || Some(parse_safe_decimal(raw));

        match field {
            CanonicalField::NfeId => self.nfe_id = text(),
            CanonicalField::NfeNumber => self.nfe_number = text(),
            CanonicalField::Series => self.series = text(),
            CanonicalField::EmissionDate => self.emission_date = text(),
            CanonicalField::NfeTotal => self.nfe_total = num(),
            CanonicalField::IssuerName => self.issuer_name = text(),
            CanonicalField::IssuerCnpj => self.issuer_cnpj = text(),
            CanonicalField::IssuerUf => self.issuer_uf = text(),
            CanonicalField::RecipientName => self.recipient_name = text(),
            CanonicalField::RecipientCnpj => self.recipient_cnpj = text(),
            CanonicalField::RecipientUf => self.recipient_uf = text(),
            CanonicalField::ItemNumber => self.item_number = raw.parse().ok(),
            CanonicalField::ProductCode => self.product_code = text(),
            CanonicalField::ProductName => self.product_name = text(),
            CanonicalField::Ncm => self.ncm = text(),
            CanonicalField::Cfop => self.cfop = text(),
            CanonicalField::Unit => self.unit = text(),
            CanonicalField::Quantity => self.quantity = num(),
            CanonicalField::UnitPrice => self.unit_price = num(),
            CanonicalField::LineTotal => self.line_total = num(),
            CanonicalField::IcmsCst => self.icms_cst = text(),
            CanonicalField::IcmsBase => self.icms_base = num(),
            CanonicalField::IcmsRate => self.icms_rate = num(),
            CanonicalField::IcmsValue => self.icms_value = num(),
            CanonicalField::PisCst => self.pis_cst = text(),
            CanonicalField::PisBase => self.pis_base = num(),
            CanonicalField::PisRate => self.pis_rate = num(),
            CanonicalField::PisValue => self.pis_value = num(),
            CanonicalField::CofinsCst => self.cofins_cst = text(),
            CanonicalField::CofinsBase => self.cofins_base = num(),
            CanonicalField::CofinsRate => self.cofins_rate = num(),
            CanonicalField::CofinsValue => self.cofins_value = num(),
            CanonicalField::IssBase => self.iss_base = num(),
            CanonicalField::IssRate => self.iss_rate = num(),
            CanonicalField::IssValue => self.iss_value = num(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn aliases_resolve() {
        assert_eq!(CanonicalField::from_alias("produto_nome"), Some(CanonicalField::ProductName));
        assert_eq!(CanonicalField::from_alias("valor_unitario"), Some(CanonicalField::UnitPrice));
        assert_eq!(CanonicalField::from_alias("observacao"), None);
    }

    #[test]
    fn set_field_parses_numbers_defensively() {
        let mut item = CanonicalItem::default();
        item.set_field(CanonicalField::UnitPrice, "1.234,50");
        item.set_field(CanonicalField::Quantity, "n/d");
        item.set_field(CanonicalField::Cfop, " 5102 ");
        item.set_field(CanonicalField::Ncm, "");
        assert_eq!(item.unit_price, Some(dec!(1234.50)));
        assert_eq!(item.quantity, Some(dec!(0)));
        assert_eq!(item.cfop.as_deref(), Some("5102"));
        assert_eq!(item.ncm, None);
    }
}
