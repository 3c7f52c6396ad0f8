//! NFe XML normalization.
//!
//! A streaming reader walks the document with a stack of local element
//! names. Header groups (`ide`, `emit`, `dest`, `total`) are collected once
//! and flattened onto every `det` line item.
//!
//! Tax families (`ICMS`, `PIS`, `COFINS`) wrap their values in one child
//! element whose tag names the tax situation (`ICMS00`, `ICMSSN102`,
//! `PISAliq`, ...). Every such child is captured as a candidate block; the
//! first candidate with a known tag is used, else the first candidate. This
//! is a heuristic: a family holding two unknown blocks resolves to the
//! first one.

use std::collections::BTreeMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::core::numbers::parse_opt_decimal;
use crate::core::*;

const ICMS_BLOCKS: &[&str] = &[
    "ICMS00", "ICMS02", "ICMS10", "ICMS15", "ICMS20", "ICMS30", "ICMS40", "ICMS51", "ICMS53",
    "ICMS60", "ICMS61", "ICMS70", "ICMS90", "ICMSPart", "ICMSST", "ICMSSN101", "ICMSSN102",
    "ICMSSN201", "ICMSSN202", "ICMSSN500", "ICMSSN900",
];
const PIS_BLOCKS: &[&str] = &["PISAliq", "PISQtde", "PISNT", "PISOutr"];
const COFINS_BLOCKS: &[&str] = &["COFINSAliq", "COFINSQtde", "COFINSNT", "COFINSOutr"];

type Fields = BTreeMap<String, String>;

#[derive(Debug, Default)]
struct TaxBlock {
    tag: String,
    fields: Fields,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaxFamily {
    Icms,
    Pis,
    Cofins,
}

impl TaxFamily {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "ICMS" => Some(Self::Icms),
            "PIS" => Some(Self::Pis),
            "COFINS" => Some(Self::Cofins),
            _ => None,
        }
    }

    fn registry(self) -> &'static [&'static str] {
        match self {
            Self::Icms => ICMS_BLOCKS,
            Self::Pis => PIS_BLOCKS,
            Self::Cofins => COFINS_BLOCKS,
        }
    }
}

#[derive(Debug, Default)]
struct DetParsed {
    n_item: Option<u32>,
    prod: Fields,
    icms: Vec<TaxBlock>,
    pis: Vec<TaxBlock>,
    cofins: Vec<TaxBlock>,
    issqn: Fields,
}

impl DetParsed {
    fn family_mut(&mut self, family: TaxFamily) -> &mut Vec<TaxBlock> {
        match family {
            TaxFamily::Icms => &mut self.icms,
            TaxFamily::Pis => &mut self.pis,
            TaxFamily::Cofins => &mut self.cofins,
        }
    }

    fn resolve(&self, family: TaxFamily) -> Option<&Fields> {
        let blocks = match family {
            TaxFamily::Icms => &self.icms,
            TaxFamily::Pis => &self.pis,
            TaxFamily::Cofins => &self.cofins,
        };
        blocks
            .iter()
            .find(|b| family.registry().contains(&b.tag.as_str()))
            .or_else(|| blocks.first())
            .map(|b| &b.fields)
    }
}

#[derive(Debug, Default)]
struct NfeParsed {
    found_inf_nfe: bool,
    id: Option<String>,
    ide: Fields,
    emit: Fields,
    dest: Fields,
    icms_tot: Fields,
    issqn_tot: Fields,
    current: Option<DetParsed>,
    dets: Vec<DetParsed>,
}

/// Parse NFe XML bytes into one item per `det`.
///
/// `nfeProc` wrappers and namespace prefixes are accepted. A missing
/// `infNFe` or an invoice without `det` items is an error. When `vNF` is
/// zero the total is rebuilt from the item values plus `ISSQNtot/vServ`.
pub fn parse_nfe_xml(bytes: &[u8]) -> Result<Vec<CanonicalItem>, AuditError> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_start_matches('\u{feff}');
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut p = NfeParsed::default();
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = local_name(e);
                p.open(&path, &name, e);
                path.push(name);
            }
            Ok(Event::Empty(ref e)) => {
                let name = local_name(e);
                p.open(&path, &name, e);
                if name == "det" {
                    if let Some(det) = p.current.take() {
                        p.dets.push(det);
                    }
                }
            }
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| AuditError::Xml(format!("XML malformado: {err}")))?;
                p.handle_text(&path, text.trim());
            }
            Ok(Event::CData(e)) => {
                let raw = e.into_inner();
                p.handle_text(&path, String::from_utf8_lossy(&raw).trim());
            }
            Ok(Event::End(_)) => {
                if path.pop().as_deref() == Some("det") {
                    if let Some(det) = p.current.take() {
                        p.dets.push(det);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(AuditError::Xml(format!("XML malformado: {e}"))),
            _ => {}
        }
    }

    p.into_items()
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart<'_>, key: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref().eq_ignore_ascii_case(key.as_bytes()))
        .and_then(|a| a.unescape_value().ok().map(|v| v.trim().to_string()))
        .filter(|v| !v.is_empty())
}

impl NfeParsed {
    fn open(&mut self, path: &[String], name: &str, e: &BytesStart<'_>) {
        match name {
            "infNFe" => {
                self.found_inf_nfe = true;
                if self.id.is_none() {
                    self.id = attribute(e, "Id");
                }
            }
            "det" if path.last().is_some_and(|p| p == "infNFe") => {
                self.current = Some(DetParsed {
                    n_item: attribute(e, "nItem").and_then(|n| n.parse().ok()),
                    ..Default::default()
                });
            }
            _ => {
                // A direct child of imposto/<family> opens a candidate block.
                let n = path.len();
                if n >= 2 && path[n - 2] == "imposto" {
                    if let (Some(family), Some(det)) =
                        (TaxFamily::from_tag(&path[n - 1]), self.current.as_mut())
                    {
                        det.family_mut(family).push(TaxBlock {
                            tag: name.to_string(),
                            fields: Fields::new(),
                        });
                    }
                }
            }
        }
    }

    fn handle_text(&mut self, path: &[String], text: &str) {
        if text.is_empty() {
            return;
        }
        let n = path.len();
        let Some(leaf) = path.last() else {
            return;
        };
        let parent = if n >= 2 { path[n - 2].as_str() } else { "" };
        let value = text.to_string();

        if let Some(det) = self.current.as_mut() {
            // det/prod/<leaf>
            if parent == "prod" {
                det.prod.insert(leaf.clone(), value);
                return;
            }
            // det/imposto/ISSQN/<leaf>
            if parent == "ISSQN" && n >= 3 && path[n - 3] == "imposto" {
                det.issqn.insert(leaf.clone(), value);
                return;
            }
            // det/imposto/<family>/<block>/<leaf>
            if n >= 4 && path[n - 4] == "imposto" {
                if let Some(family) = TaxFamily::from_tag(&path[n - 3]) {
                    if let Some(block) = det.family_mut(family).last_mut() {
                        block.fields.insert(leaf.clone(), value);
                    }
                }
            }
            return;
        }

        let target = match parent {
            "ide" => &mut self.ide,
            "emit" | "enderEmit" => &mut self.emit,
            "dest" | "enderDest" => &mut self.dest,
            "ICMSTot" => &mut self.icms_tot,
            "ISSQNtot" => &mut self.issqn_tot,
            _ => return,
        };
        target.entry(leaf.clone()).or_insert(value);
    }

    fn into_items(self) -> Result<Vec<CanonicalItem>, AuditError> {
        if !self.found_inf_nfe {
            return Err(AuditError::Xml("Bloco <infNFe> não encontrado no XML.".into()));
        }
        if self.dets.is_empty() {
            return Err(AuditError::Xml("Nenhum item <det> encontrado no XML.".into()));
        }

        let num = |fields: &Fields, key: &str| parse_opt_decimal(fields.get(key).map(String::as_str));
        let text = |fields: &Fields, key: &str| fields.get(key).cloned();

        let mut total = num(&self.icms_tot, "vNF");
        if total.is_zero() {
            let products = saturating_sum(self.dets.iter().map(|d| num(&d.prod, "vProd")));
            total = products.saturating_add(num(&self.issqn_tot, "vServ"));
            log::warn!(
                "NFe {}: vNF is zero, total rebuilt from items as {total}",
                self.id.as_deref().unwrap_or("sem Id")
            );
        }

        let emission = text(&self.ide, "dhEmi").or_else(|| text(&self.ide, "dEmi"));
        let party_id = |fields: &Fields| text(fields, "CNPJ").or_else(|| text(fields, "CPF"));

        let items = self
            .dets
            .iter()
            .map(|det| {
                let icms = det.resolve(TaxFamily::Icms);
                let pis = det.resolve(TaxFamily::Pis);
                let cofins = det.resolve(TaxFamily::Cofins);
                let tax_text = |block: Option<&Fields>, key: &str| block.and_then(|f| text(f, key));
                let tax_num = |block: Option<&Fields>, key: &str| block.map(|f| num(f, key));

                CanonicalItem {
                    nfe_id: self.id.clone(),
                    nfe_number: text(&self.ide, "nNF"),
                    series: text(&self.ide, "serie"),
                    emission_date: emission.clone(),
                    nfe_total: Some(total),
                    issuer_name: text(&self.emit, "xNome"),
                    issuer_cnpj: party_id(&self.emit),
                    issuer_uf: text(&self.emit, "UF"),
                    recipient_name: text(&self.dest, "xNome"),
                    recipient_cnpj: party_id(&self.dest),
                    recipient_uf: text(&self.dest, "UF"),
                    item_number: det.n_item,
                    product_code: text(&det.prod, "cProd"),
                    product_name: text(&det.prod, "xProd"),
                    ncm: text(&det.prod, "NCM"),
                    cfop: text(&det.prod, "CFOP"),
                    unit: text(&det.prod, "uCom"),
                    quantity: Some(num(&det.prod, "qCom")),
                    unit_price: Some(num(&det.prod, "vUnCom")),
                    line_total: Some(num(&det.prod, "vProd")),
                    icms_cst: tax_text(icms, "CST").or_else(|| tax_text(icms, "CSOSN")),
                    icms_base: tax_num(icms, "vBC"),
                    icms_rate: tax_num(icms, "pICMS"),
                    icms_value: tax_num(icms, "vICMS"),
                    pis_cst: tax_text(pis, "CST"),
                    pis_base: tax_num(pis, "vBC"),
                    pis_rate: tax_num(pis, "pPIS"),
                    pis_value: tax_num(pis, "vPIS"),
                    cofins_cst: tax_text(cofins, "CST"),
                    cofins_base: tax_num(cofins, "vBC"),
                    cofins_rate: tax_num(cofins, "pCOFINS"),
                    cofins_value: tax_num(cofins, "vCOFINS"),
                    iss_base: det.issqn.get("vBC").map(|v| parse_safe_decimal(v)),
                    iss_rate: det.issqn.get("vAliq").map(|v| parse_safe_decimal(v)),
                    iss_value: det.issqn.get("vISSQN").map(|v| parse_safe_decimal(v)),
                    extra: BTreeMap::new(),
                }
            })
            .collect();
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const NFE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<nfeProc xmlns="http://www.portalfiscal.inf.br/nfe" versao="4.00">
  <NFe>
    <infNFe Id="NFe35240112345678000195550010000000011000000010" versao="4.00">
      <ide><nNF>1</nNF><serie>1</serie><dhEmi>2024-01-15T10:00:00-03:00</dhEmi></ide>
      <emit>
        <CNPJ>12345678000195</CNPJ><xNome>Fornecedor SA</xNome>
        <enderEmit><UF>SP</UF></enderEmit>
      </emit>
      <dest>
        <CNPJ>98765432000110</CNPJ><xNome>Loja &amp; Cia</xNome>
        <enderDest><UF>RJ</UF></enderDest>
      </dest>
      <det nItem="1">
        <prod>
          <cProd>P1</cProd><xProd>Parafuso</xProd><NCM>73181500</NCM><CFOP>6102</CFOP>
          <uCom>UN</uCom><qCom>100.0000</qCom><vUnCom>1.00</vUnCom><vProd>100.00</vProd>
        </prod>
        <imposto>
          <ICMS><ICMS00><orig>0</orig><CST>00</CST><vBC>100.00</vBC><pICMS>12.00</pICMS><vICMS>12.00</vICMS></ICMS00></ICMS>
          <PIS><PISAliq><CST>01</CST><vBC>100.00</vBC><pPIS>1.65</pPIS><vPIS>1.65</vPIS></PISAliq></PIS>
          <COFINS><COFINSAliq><CST>01</CST><vBC>100.00</vBC><pCOFINS>7.60</pCOFINS><vCOFINS>7.60</vCOFINS></COFINSAliq></COFINS>
        </imposto>
      </det>
      <det nItem="2">
        <prod><xProd>Porca</xProd><CFOP>6102</CFOP><qCom>10</qCom><vUnCom>2.50</vUnCom><vProd>25.00</vProd></prod>
        <imposto><ICMS><ICMSSN102><orig>0</orig><CSOSN>102</CSOSN></ICMSSN102></ICMS></imposto>
      </det>
      <total><ICMSTot><vProd>125.00</vProd><vNF>137.00</vNF></ICMSTot></total>
    </infNFe>
  </NFe>
</nfeProc>"#;

    #[test]
    fn flattens_header_onto_items() {
        let items = parse_nfe_xml(NFE.as_bytes()).unwrap();
        assert_eq!(items.len(), 2);
        let first = &items[0];
        assert_eq!(first.nfe_id.as_deref(), Some("NFe35240112345678000195550010000000011000000010"));
        assert_eq!(first.issuer_uf.as_deref(), Some("SP"));
        assert_eq!(first.recipient_name.as_deref(), Some("Loja & Cia"));
        assert_eq!(first.nfe_total, Some(dec!(137.00)));
        assert_eq!(first.item_number, Some(1));
        assert_eq!(first.icms_cst.as_deref(), Some("00"));
        assert_eq!(first.icms_value, Some(dec!(12.00)));
        assert_eq!(first.pis_value, Some(dec!(1.65)));
        assert_eq!(first.cofins_rate, Some(dec!(7.60)));
        assert_eq!(items[1].nfe_total, Some(dec!(137.00)));
        assert_eq!(items[1].icms_cst.as_deref(), Some("102"));
        assert_eq!(items[1].pis_value, None);
    }

    #[test]
    fn zero_total_is_rebuilt() {
        let xml = NFE.replace("<vNF>137.00</vNF>", "<vNF>0.00</vNF>");
        let items = parse_nfe_xml(xml.as_bytes()).unwrap();
        assert_eq!(items[0].nfe_total, Some(dec!(125.00)));
    }

    #[test]
    fn unknown_block_falls_back_to_first_child() {
        let xml = NFE.replace("ICMS00>", "ICMS99>");
        let items = parse_nfe_xml(xml.as_bytes()).unwrap();
        assert_eq!(items[0].icms_value, Some(dec!(12.00)));
    }

    #[test]
    fn missing_inf_nfe() {
        let err = parse_nfe_xml(b"<NFe><outro/></NFe>").unwrap_err();
        assert!(err.to_string().contains("infNFe"));
    }

    #[test]
    fn no_items() {
        let err = parse_nfe_xml(br#"<NFe><infNFe Id="x"><ide/></infNFe></NFe>"#).unwrap_err();
        assert!(err.to_string().contains("<det>"));
    }

    #[test]
    fn malformed_xml() {
        assert!(parse_nfe_xml(b"<NFe><infNFe></NFe>").is_err());
    }
}
