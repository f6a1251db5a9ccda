//! # payload: the submitted fiscal configuration form
//!
//! The submission is a tree of optional records. Every leaf accepts any JSON
//! scalar, and every nested record that arrives with the wrong JSON type is
//! treated as absent, so deserialising a form object never fails because of a
//! sparse or sloppy sub-structure.
//!
//! Wire keys are the form's own (Portuguese) field names; see the `rename`
//! attributes.

use serde::de::{DeserializeOwned, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;

/// Largest magnitude below which every whole `f64` is an exact integer.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Whole floats print without a fraction, as the form shows them (`1500.0` → `1500`).
fn display_number(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < MAX_EXACT_INTEGER => {
            format!("{}", f as i64)
        }
        _ => n.to_string(),
    }
}

/// A leaf value as submitted by the form: text, number or boolean.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
}

impl FieldValue {
    /// Form truthiness: empty text, zero and `false` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            FieldValue::Text(s) => !s.is_empty(),
            FieldValue::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
            FieldValue::Bool(b) => *b,
        }
    }

    /// Text shown in the report for this value.
    pub fn display(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Number(n) => display_number(n),
            FieldValue::Bool(true) => "true".to_string(),
            FieldValue::Bool(false) => "false".to_string(),
        }
    }

    /// Numeric reading used by the percent formatter.
    /// Accepts numbers and numeric text with either `.` or `,` as decimal mark.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => n.as_f64(),
            FieldValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return None;
                }
                let normalised = if trimmed.contains('.') {
                    trimmed.to_string()
                } else {
                    trimmed.replace(',', ".")
                };
                normalised.parse::<f64>().ok().filter(|f| f.is_finite())
            }
            FieldValue::Bool(_) => None,
        }
    }

    fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(FieldValue::Text(s)),
            Value::Number(n) => Some(FieldValue::Number(n)),
            Value::Bool(b) => Some(FieldValue::Bool(b)),
            other => Some(FieldValue::Text(other.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        FieldValue::from_json(value)
            .ok_or_else(|| serde::de::Error::custom("null is not a field value"))
    }
}

/// True when the optional value is present and truthy.
pub fn truthy(value: &Option<FieldValue>) -> bool {
    value.as_ref().is_some_and(FieldValue::is_truthy)
}

/// Insertion-ordered string-keyed map.
///
/// The report iterates document types in the order the form submitted them,
/// so entries keep their wire order. Entries whose value cannot be read as `T`
/// are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<T> {
    entries: Vec<(String, T)>,
}

impl<T> OrderedMap<T> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl<T> Default for OrderedMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<(String, T)> for OrderedMap<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

struct OrderedMapVisitor<T>(PhantomData<T>);

impl<'de, T: DeserializeOwned> Visitor<'de> for OrderedMapVisitor<T> {
    type Value = OrderedMap<T>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<String, Value>()? {
            if let Ok(parsed) = serde_json::from_value::<T>(value) {
                entries.push((key, parsed));
            }
        }
        Ok(OrderedMap { entries })
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for OrderedMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

/// Reads an optional sub-record; a value of the wrong shape becomes `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    Ok(serde_json::from_value(value).ok())
}

/// Reads an optional leaf; `null` and nested structures degrade gracefully.
fn leaf<'de, D>(deserializer: D) -> Result<Option<FieldValue>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(FieldValue::from_json(value))
}

/// The whole form submission.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Submission {
    #[serde(rename = "empresa", default, deserialize_with = "lenient")]
    pub company: Option<Company>,
    #[serde(rename = "contabilidade", default, deserialize_with = "lenient")]
    pub accounting_firm: Option<AccountingFirm>,
    #[serde(rename = "documentos", default, deserialize_with = "lenient")]
    pub documents: Option<DocumentSelection>,
    #[serde(rename = "configPorDocumento", default, deserialize_with = "lenient")]
    pub per_document: Option<OrderedMap<DocumentConfig>>,
    #[serde(rename = "reformaTributaria", default, deserialize_with = "lenient")]
    pub tax_reform: Option<TaxReform>,
}

impl Submission {
    /// Parses a submission out of an already decoded JSON value.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        if !value.is_object() {
            return Err(serde::de::Error::custom("submission must be a JSON object"));
        }
        serde_json::from_value(value)
    }

    /// Document types the client selected, in form order.
    pub fn selected_documents(&self) -> &[String] {
        self.documents
            .as_ref()
            .map(|d| d.selected.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Company {
    #[serde(rename = "razaoSocial", default, deserialize_with = "leaf")]
    pub legal_name: Option<FieldValue>,
    #[serde(rename = "cnpj", default, deserialize_with = "leaf")]
    pub tax_id: Option<FieldValue>,
    #[serde(rename = "ie", default, deserialize_with = "leaf")]
    pub state_registration: Option<FieldValue>,
    #[serde(rename = "crt", default, deserialize_with = "leaf")]
    pub tax_regime: Option<FieldValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountingFirm {
    #[serde(rename = "nome", default, deserialize_with = "leaf")]
    pub name: Option<FieldValue>,
    #[serde(rename = "telefone", default, deserialize_with = "leaf")]
    pub phone: Option<FieldValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentSelection {
    #[serde(rename = "selecionados", default, deserialize_with = "selection")]
    pub selected: Vec<String>,
    #[serde(rename = "nfeNfceMesmosDados", default, deserialize_with = "leaf")]
    pub nfe_nfce_same_data: Option<FieldValue>,
}

fn selection<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let items = match value {
        Value::Array(items) => items,
        _ => return Ok(Vec::new()),
    };
    Ok(items
        .into_iter()
        .filter_map(FieldValue::from_json)
        .map(|v| v.display())
        .filter(|s| !s.is_empty())
        .collect())
}

/// Configuration of one document type. Every block is independent, and an
/// entry that is not an object reads as an empty configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(remote = "Self")]
pub struct DocumentConfig {
    #[serde(rename = "ambiente", default, deserialize_with = "leaf")]
    pub environment: Option<FieldValue>,
    #[serde(rename = "serie", default, deserialize_with = "leaf")]
    pub series: Option<FieldValue>,
    #[serde(rename = "ultimoNumero", default, deserialize_with = "leaf")]
    pub last_number: Option<FieldValue>,
    #[serde(default, deserialize_with = "lenient")]
    pub icms: Option<Icms>,
    #[serde(rename = "pisCofins", default, deserialize_with = "lenient")]
    pub pis_cofins: Option<PisCofins>,
    #[serde(rename = "nfceCsc", default, deserialize_with = "leaf")]
    pub nfce_csc: Option<FieldValue>,
    #[serde(rename = "nfceToken", default, deserialize_with = "leaf")]
    pub nfce_token: Option<FieldValue>,
    #[serde(default, deserialize_with = "lenient")]
    pub nfse: Option<OrderedMap<FieldValue>>,
    #[serde(default, deserialize_with = "lenient")]
    pub cte: Option<OrderedMap<FieldValue>>,
    #[serde(default, deserialize_with = "lenient")]
    pub mdfe: Option<OrderedMap<FieldValue>>,
    #[serde(default, deserialize_with = "lenient")]
    pub efd: Option<OrderedMap<EfdEntry>>,
    #[serde(rename = "obs", default, deserialize_with = "leaf")]
    pub observations: Option<FieldValue>,
}

impl<'de> Deserialize<'de> for DocumentConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match value {
            // Inherent `deserialize` generated by `remote = "Self"`.
            Value::Object(_) => DocumentConfig::deserialize(value).map_err(serde::de::Error::custom),
            _ => Ok(DocumentConfig::default()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Icms {
    #[serde(rename = "tipo", default, deserialize_with = "leaf")]
    pub kind: Option<FieldValue>,
    #[serde(rename = "origem", default, deserialize_with = "leaf")]
    pub origin: Option<FieldValue>,
    #[serde(rename = "codigo", default, deserialize_with = "leaf")]
    pub code: Option<FieldValue>,
    #[serde(default, deserialize_with = "leaf")]
    pub cfop: Option<FieldValue>,
    #[serde(rename = "aliquota", default, deserialize_with = "leaf")]
    pub rate: Option<FieldValue>,
}

impl Icms {
    /// The tax type discriminator value that selects the simplified-regime table.
    pub const SIMPLIFIED_REGIME: &'static str = "CSOSN";

    pub fn is_simplified_regime(&self) -> bool {
        matches!(&self.kind, Some(FieldValue::Text(k)) if k == Self::SIMPLIFIED_REGIME)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PisCofins {
    #[serde(rename = "pisSituacao", default, deserialize_with = "leaf")]
    pub pis_situation: Option<FieldValue>,
    #[serde(rename = "pisAliquota", default, deserialize_with = "leaf")]
    pub pis_rate: Option<FieldValue>,
    #[serde(rename = "cofinsSituacao", default, deserialize_with = "leaf")]
    pub cofins_situation: Option<FieldValue>,
    #[serde(rename = "cofinsAliquota", default, deserialize_with = "leaf")]
    pub cofins_rate: Option<FieldValue>,
}

/// One entry of the EFD block: either a per-regime group of fields or a scalar.
#[derive(Debug, Clone, PartialEq)]
pub enum EfdEntry {
    Group(OrderedMap<Option<FieldValue>>),
    Scalar(Option<FieldValue>),
}

impl EfdEntry {
    /// Key of the scalar that carries the ICMS origin; rendered on its own line.
    pub const ORIGIN_KEY: &'static str = "origem";
}

impl<'de> Deserialize<'de> for EfdEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::Object(_) => {
                let group = serde_json::from_value(value).map_err(serde::de::Error::custom)?;
                Ok(EfdEntry::Group(group))
            }
            other => Ok(EfdEntry::Scalar(FieldValue::from_json(other))),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaxReform {
    #[serde(rename = "habilitar", default, deserialize_with = "leaf")]
    pub enabled: Option<FieldValue>,
    #[serde(rename = "porDocumento", default, deserialize_with = "lenient")]
    pub per_document: Option<OrderedMap<ReformConfig>>,
}

impl TaxReform {
    pub fn is_enabled(&self) -> bool {
        truthy(&self.enabled)
    }
}

/// Reform configuration of one document type; the shape is chosen by the
/// presence of a municipality.
#[derive(Debug, Clone, PartialEq)]
pub enum ReformConfig {
    Municipal(MunicipalReform),
    General(GeneralReform),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MunicipalReform {
    #[serde(rename = "municipio", default, deserialize_with = "leaf")]
    pub municipality: Option<FieldValue>,
    #[serde(rename = "ibs", default, deserialize_with = "leaf")]
    pub ibs_rate: Option<FieldValue>,
    #[serde(rename = "diferimento", default, deserialize_with = "leaf")]
    pub deferral_rate: Option<FieldValue>,
    #[serde(rename = "reducao", default, deserialize_with = "leaf")]
    pub reduction_rate: Option<FieldValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GeneralReform {
    #[serde(default, deserialize_with = "leaf")]
    pub cst: Option<FieldValue>,
    #[serde(rename = "classTrib", default, deserialize_with = "leaf")]
    pub classification: Option<FieldValue>,
    #[serde(rename = "cbs", default, deserialize_with = "leaf")]
    pub cbs_rate: Option<FieldValue>,
    #[serde(rename = "ibs", default, deserialize_with = "leaf")]
    pub ibs_rate: Option<FieldValue>,
    #[serde(rename = "deduzIcms", default, deserialize_with = "leaf")]
    pub deducts_icms: Option<FieldValue>,
    #[serde(rename = "credito", default, deserialize_with = "leaf")]
    pub presumed_credit: Option<FieldValue>,
    #[serde(rename = "percCreditoCBS", default, deserialize_with = "leaf")]
    pub cbs_credit_rate: Option<FieldValue>,
    #[serde(rename = "percCreditoIBS", default, deserialize_with = "leaf")]
    pub ibs_credit_rate: Option<FieldValue>,
}

impl GeneralReform {
    pub fn deducts_icms(&self) -> bool {
        match &self.deducts_icms {
            Some(FieldValue::Text(s)) => s.eq_ignore_ascii_case("sim"),
            Some(FieldValue::Bool(b)) => *b,
            _ => false,
        }
    }
}

impl<'de> Deserialize<'de> for ReformConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let value = match value {
            Value::Object(map) => Value::Object(map),
            _ => Value::Object(Default::default()),
        };
        let has_municipality = value
            .get("municipio")
            .cloned()
            .and_then(FieldValue::from_json)
            .is_some_and(|v| v.is_truthy());
        if has_municipality {
            serde_json::from_value(value)
                .map(ReformConfig::Municipal)
                .map_err(serde::de::Error::custom)
        } else {
            serde_json::from_value(value)
                .map(ReformConfig::General)
                .map_err(serde::de::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keeps_document_order_as_submitted() {
        let submission = Submission::from_value(json!({
            "configPorDocumento": { "NFSe": {}, "NFe": {}, "CTe": {} }
        }))
        .unwrap();
        let keys: Vec<_> = submission.per_document.unwrap().keys().map(String::from).collect();
        assert_eq!(keys, vec!["NFSe", "NFe", "CTe"]);
    }

    #[test]
    fn wrong_shaped_blocks_become_absent() {
        let submission = Submission::from_value(json!({
            "empresa": "not an object",
            "configPorDocumento": { "NFe": { "icms": 42, "pisCofins": [1, 2], "serie": 1 } }
        }))
        .unwrap();
        assert!(submission.company.is_none());
        let docs = submission.per_document.unwrap();
        let nfe = docs.get("NFe").unwrap();
        assert!(nfe.icms.is_none());
        assert!(nfe.pis_cofins.is_none());
        assert_eq!(nfe.series.as_ref().unwrap().display(), "1");
    }

    #[test]
    fn reform_shape_follows_municipality() {
        let submission = Submission::from_value(json!({
            "reformaTributaria": { "habilitar": true, "porDocumento": {
                "NFSe": { "municipio": "Curitiba", "ibs": 0.1 },
                "NFe": { "municipio": "", "cst": "000" }
            }}
        }))
        .unwrap();
        let reform = submission.tax_reform.unwrap();
        assert!(reform.is_enabled());
        let per_doc = reform.per_document.unwrap();
        assert!(matches!(per_doc.get("NFSe"), Some(ReformConfig::Municipal(_))));
        assert!(matches!(per_doc.get("NFe"), Some(ReformConfig::General(_))));
    }

    #[test]
    fn whole_floats_display_without_fraction() {
        let number = |v: Value| FieldValue::from_json(v).unwrap().display();
        assert_eq!(number(json!(1500.0)), "1500");
        assert_eq!(number(json!(-3.0)), "-3");
        assert_eq!(number(json!(18.75)), "18.75");
        assert_eq!(number(json!(42)), "42");
        assert_eq!(number(json!(1e300)), "1e300");
    }

    #[test]
    fn numeric_text_reads_with_comma_or_dot() {
        assert_eq!(FieldValue::Text("18,5".into()).as_number(), Some(18.5));
        assert_eq!(FieldValue::Text("1.5".into()).as_number(), Some(1.5));
        assert_eq!(FieldValue::Text("abc".into()).as_number(), None);
        assert_eq!(FieldValue::Bool(true).as_number(), None);
    }

    #[test]
    fn efd_entries_split_groups_and_scalars() {
        let efd: OrderedMap<EfdEntry> = serde_json::from_value(json!({
            "origem": "0",
            "lucroPresumido": { "cstSaida": "00", "cstEntrada": "90" },
            "vazio": null
        }))
        .unwrap();
        assert!(matches!(efd.get("origem"), Some(EfdEntry::Scalar(Some(_)))));
        assert!(matches!(efd.get("lucroPresumido"), Some(EfdEntry::Group(g)) if g.len() == 2));
        assert!(matches!(efd.get("vazio"), Some(EfdEntry::Scalar(None))));
    }
}
