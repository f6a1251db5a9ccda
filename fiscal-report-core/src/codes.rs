//! Static fiscal code tables and their total lookup.
//!
//! Every table maps a short code to the text shown in the report. Lookups
//! never fail: a code missing from the table is returned as submitted.

/// The code domains the report can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeTable {
    /// ICMS situation codes for the regular regime (CST).
    IcmsRegular,
    /// ICMS situation codes for the simplified regime (CSOSN).
    IcmsSimplified,
    /// PIS/COFINS situation codes.
    PisCofins,
    /// CBS/IBS situation codes (tax reform).
    CbsIbs,
    /// CBS/IBS tax classification codes (cClassTrib).
    TaxClassification,
}

impl CodeTable {
    fn entries(self) -> &'static [(&'static str, &'static str)] {
        match self {
            CodeTable::IcmsRegular => ICMS_CST,
            CodeTable::IcmsSimplified => ICMS_CSOSN,
            CodeTable::PisCofins => PIS_COFINS_CST,
            CodeTable::CbsIbs => CBS_IBS_CST,
            CodeTable::TaxClassification => CLASS_TRIB,
        }
    }

    /// Description for `code`, or `code` itself when the table does not know it.
    pub fn describe(self, code: &str) -> String {
        let trimmed = code.trim();
        self.entries()
            .iter()
            .find(|(key, _)| *key == trimmed)
            .map(|(_, description)| (*description).to_string())
            .unwrap_or_else(|| code.to_string())
    }

    pub fn contains(self, code: &str) -> bool {
        self.entries().iter().any(|(key, _)| *key == code.trim())
    }
}

const ICMS_CST: &[(&str, &str)] = &[
    ("00", "00 - Tributada integralmente"),
    ("10", "10 - Tributada com ST"),
    ("20", "20 - Com redução de base"),
    ("30", "30 - Isenta com ST"),
    ("40", "40 - Isenta"),
    ("41", "41 - Não tributada"),
    ("50", "50 - Suspensão"),
    ("51", "51 - Diferimento"),
    ("60", "60 - ICMS ST anterior"),
    ("90", "90 - Outras"),
];

const ICMS_CSOSN: &[(&str, &str)] = &[
    ("02", "02 - Simples Nacional - Tributada pelo Simples Nacional com permissão de crédito"),
    ("15", "15 - Tributação monofásica própria e com responsabilidade pela retenção sobre combustíveis"),
    ("53", "53 - Tributação monofásica sobre combustíveis com recolhimento diferido"),
    ("61", "61 - Tributação monofásica sobre combustíveis cobrada anteriormente"),
    ("101", "101 - Simples Nacional - Tributada pelo Simples Nacional com permissão de crédito"),
    ("102", "102 - Simples Nacional - Tributada pelo Simples Nacional sem permissão de crédito"),
    ("103", "103 - Simples Nacional - Isenção do ICMS no Simples Nacional para faixa de receita bruta"),
    ("300", "300 - Simples Nacional - Imune"),
    ("400", "400 - Simples Nacional - Não tributada pelo Simples Nacional"),
    ("500", "500 - Simples Nacional - ICMS cobrado anteriormente por substituição tributária (substituído) ou por antecipação"),
    ("900", "900 - Simples Nacional - Outros"),
];

const PIS_COFINS_CST: &[(&str, &str)] = &[
    ("01", "01 - Operação Tributável (alíquota básica)"),
    ("02", "02 - Operação Tributável (alíquota diferenciada)"),
    ("03", "03 - Operação Tributável (alíquota por unidade)"),
    ("04", "04 - Monofásica"),
    ("05", "05 - Substituição Tributária"),
    ("06", "06 - Alíquota Zero"),
    ("07", "07 - Isenta"),
    ("08", "08 - Sem Incidência"),
    ("09", "09 - Suspensão"),
    ("49", "49 - Outras Operações"),
    ("99", "99 - Outras Operações"),
];

const CBS_IBS_CST: &[(&str, &str)] = &[
    ("000", "000 - Tributação integral"),
    ("010", "010 - Tributação com alíquotas uniformes"),
    ("011", "011 - Tributação com alíquotas uniformes reduzidas"),
    ("200", "200 - Alíquota reduzida"),
    ("210", "210 - Redução de alíquota com redutor de base de cálculo"),
    ("220", "220 - Alíquota fixa"),
    ("221", "221 - Alíquota fixa proporcional"),
    ("222", "222 - Redução de base de cálculo"),
    ("400", "400 - Isenção"),
    ("410", "410 - Imunidade e não incidência"),
    ("510", "510 - Diferimento"),
    ("550", "550 - Suspensão"),
    ("620", "620 - Tributação monofásica"),
    ("800", "800 - Transferência de crédito"),
    ("810", "810 - Ajustes"),
    ("820", "820 - Tributação em declaração de regime específico"),
];

const CLASS_TRIB: &[(&str, &str)] = &[
    ("000001", "000001 - Situações tributadas integralmente pelo IBS e CBS"),
    ("000002", "000002 - Exploração de via"),
    ("000003", "000003 - Regime automotivo - projetos incentivados"),
    ("010001", "010001 - Operações do FGTS não realizadas pela Caixa Econômica Federal"),
    ("011001", "011001 - Planos de assistência funerária"),
    ("200001", "200001 - Aquisições de máquinas e equipamentos por produtor rural"),
    ("200003", "200003 - Vendas de produtos destinados à alimentação humana"),
    ("200013", "200013 - Fornecimento de dispositivos médicos"),
    ("200028", "200028 - Fornecimento de serviços de educação"),
    ("200029", "200029 - Fornecimento de serviços de saúde humana"),
    ("410001", "410001 - Fornecimento de bonificações sem cobrança"),
    ("410999", "410999 - Operações não onerosas sem previsão de tributação"),
    ("510001", "510001 - Operações sujeitas a diferimento"),
    ("550001", "550001 - Exportações de bens materiais"),
    ("620001", "620001 - Tributação monofásica sobre combustíveis"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_resolve_to_descriptions() {
        assert_eq!(CodeTable::IcmsRegular.describe("00"), "00 - Tributada integralmente");
        assert_eq!(
            CodeTable::IcmsSimplified.describe("102"),
            "102 - Simples Nacional - Tributada pelo Simples Nacional sem permissão de crédito"
        );
        assert_eq!(CodeTable::PisCofins.describe("06"), "06 - Alíquota Zero");
        assert_eq!(CodeTable::CbsIbs.describe("000"), "000 - Tributação integral");
        assert!(CodeTable::TaxClassification.describe("000001").starts_with("000001 - "));
    }

    #[test]
    fn unknown_codes_come_back_verbatim() {
        for table in [
            CodeTable::IcmsRegular,
            CodeTable::IcmsSimplified,
            CodeTable::PisCofins,
            CodeTable::CbsIbs,
            CodeTable::TaxClassification,
        ] {
            assert_eq!(table.describe("ZZ-9"), "ZZ-9");
            assert!(!table.contains("ZZ-9"));
        }
    }

    #[test]
    fn tables_do_not_cross_domains() {
        // 102 only exists in the simplified regime.
        assert_eq!(CodeTable::IcmsRegular.describe("102"), "102");
        assert_eq!(CodeTable::IcmsSimplified.describe("00"), "00");
    }
}
