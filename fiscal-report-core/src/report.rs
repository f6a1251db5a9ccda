//! # report: the fiscal configuration summary
//!
//! [`layout`] composes a [`Submission`] into a [`Document`]; [`generate`]
//! renders that document to PDF bytes. Both are pure: no I/O, and the same
//! submission always yields the same display list.
//!
//! Sections, in order, each skipped when its data is absent:
//! 1. branding band
//! 2. accounting firm card
//! 3. company card
//! 4. selected documents card
//! 5. one page and card per document configuration
//! 6. tax reform (CBS / IBS) cards, when enabled
//!
//! When the submission has no document configuration at all, composition
//! stops right after the "Configuração por Documento" heading: no document
//! pages and no tax reform section are produced.

use crate::codes::CodeTable;
use crate::format::{or_placeholder, percent, yes_no};
use crate::layout::{palette, Composer, Document, FontWeight, PageGeometry};
use crate::payload::{
    truthy, AccountingFirm, Company, DocumentConfig, DocumentSelection, EfdEntry, FieldValue,
    GeneralReform, MunicipalReform, OrderedMap, ReformConfig, Submission, TaxReform,
};
use tracing::{debug, info};

pub const REPORT_TITLE: &str = "Parametrização Fiscal";
pub const REPORT_SUBTITLE: &str = "SupraTech Sistemas";
pub const PER_DOCUMENT_HEADING: &str = "Configuração por Documento";
pub const TAX_REFORM_HEADING: &str = "Reforma Tributária (CBS / IBS)";

/// Composes and renders the report as PDF bytes.
pub fn generate(submission: &Submission) -> Vec<u8> {
    let document = layout(submission);
    info!(pages = document.page_count(), "Report composed");
    crate::pdf::render(&document)
}

/// Composes the report into a display list.
pub fn layout(submission: &Submission) -> Document {
    let mut c = Composer::new(PageGeometry::a4());

    branding(&mut c);

    if let Some(firm) = &submission.accounting_firm {
        accounting_firm(&mut c, firm);
        c.divider();
    }
    if let Some(company) = &submission.company {
        company_card(&mut c, company);
        c.divider();
    }
    if let Some(selection) = &submission.documents {
        document_selection(&mut c, selection);
        c.divider();
    }

    c.heading(PER_DOCUMENT_HEADING);

    // Without per-document configuration the report ends here, right after
    // the heading. The tax reform section is not rendered in that case either.
    let Some(per_document) = &submission.per_document else {
        debug!("No per-document configuration; report ends after the section heading");
        return c.finish();
    };

    for (key, config) in per_document.iter() {
        c.new_page();
        document_card(&mut c, key, config);
    }

    if let Some(reform) = &submission.tax_reform {
        tax_reform(&mut c, reform);
    }

    c.finish()
}

fn branding(c: &mut Composer) {
    let margin = c.state().geometry.margin;
    let width = c.state().geometry.content_width();
    c.rect(margin, margin, 6.0, 40.0, palette::ACCENT);
    c.text_at(margin + 16.0, 44.0, 20.0, FontWeight::Bold, palette::ACCENT, REPORT_TITLE);
    c.text_at(margin + 16.0, 70.0, 10.0, FontWeight::Regular, palette::SUBTITLE, REPORT_SUBTITLE);
    c.rect(margin, 92.0, width, 2.0, palette::ACCENT);
    c.set_cursor(100.0);
    c.move_down(1.0);
}

fn value(v: &Option<FieldValue>) -> String {
    or_placeholder(v.as_ref())
}

fn accounting_firm(c: &mut Composer, firm: &AccountingFirm) {
    c.card("Contabilidade", |c| {
        c.field("Nome:", &value(&firm.name));
        c.field("Telefone:", &value(&firm.phone));
    });
}

fn company_card(c: &mut Composer, company: &Company) {
    c.card("Empresa", |c| {
        c.field("Razão Social:", &value(&company.legal_name));
        c.field("CNPJ/CPF:", &value(&company.tax_id));
        c.field("Inscrição Estadual:", &value(&company.state_registration));
        c.field("CRT:", &value(&company.tax_regime));
    });
}

fn document_selection(c: &mut Composer, selection: &DocumentSelection) {
    c.card("Documentos Emitidos", |c| {
        let selected = if selection.selected.is_empty() {
            crate::format::PLACEHOLDER.to_string()
        } else {
            selection.selected.join(", ")
        };
        c.field("Selecionados:", &selected);
        c.field(
            "NF-e e NFC-e mesmos dados:",
            yes_no(truthy(&selection.nfe_nfce_same_data)),
        );
    });
}

fn document_card(c: &mut Composer, key: &str, config: &DocumentConfig) {
    debug!(document = key, "Rendering document configuration");
    c.card(&format!("Documento: {key}"), |c| {
        metadata(c, config);
        if let Some(icms) = &config.icms {
            c.sub_heading("ICMS", palette::ACCENT);
            c.field("Tipo:", &value(&icms.kind));
            c.field("Origem:", &value(&icms.origin));
            let table = if icms.is_simplified_regime() {
                CodeTable::IcmsSimplified
            } else {
                CodeTable::IcmsRegular
            };
            c.field("Código:", &describe(table, &icms.code));
            c.field("CFOP:", &value(&icms.cfop));
            c.field("Alíquota:", &percent(icms.rate.as_ref()));
        }
        if let Some(pis_cofins) = &config.pis_cofins {
            c.sub_heading("PIS / COFINS", palette::ACCENT);
            c.field("PIS:", &describe(CodeTable::PisCofins, &pis_cofins.pis_situation));
            c.field("Alíquota PIS:", &percent(pis_cofins.pis_rate.as_ref()));
            c.field("COFINS:", &describe(CodeTable::PisCofins, &pis_cofins.cofins_situation));
            c.field("Alíquota COFINS:", &percent(pis_cofins.cofins_rate.as_ref()));
        }
        if key == "NFCe" {
            if truthy(&config.nfce_csc) {
                c.field("CSC:", &value(&config.nfce_csc));
            }
            if truthy(&config.nfce_token) {
                c.field("Token CSC:", &value(&config.nfce_token));
            }
        }
        extension(c, "NFS-e", &config.nfse);
        extension(c, "CT-e", &config.cte);
        extension(c, "MDF-e", &config.mdfe);
        if let Some(efd) = &config.efd {
            efd_block(c, efd);
        }
        if let Some(observations) = &config.observations {
            if observations.is_truthy() {
                c.move_down(1.0);
                c.sub_heading("Observações:", palette::ACCENT);
                c.paragraph(&observations.display());
            }
        }
    });
}

fn metadata(c: &mut Composer, config: &DocumentConfig) {
    if truthy(&config.environment) {
        c.field("Ambiente:", &value(&config.environment));
    }
    if truthy(&config.series) {
        c.field("Série:", &value(&config.series));
    }
    if truthy(&config.last_number) {
        c.field("Último Número:", &value(&config.last_number));
    }
}

/// Code description, raw code when unknown, placeholder when absent.
fn describe(table: CodeTable, code: &Option<FieldValue>) -> String {
    match code.as_ref().map(FieldValue::display) {
        Some(code) if !code.is_empty() => table.describe(&code),
        _ => crate::format::PLACEHOLDER.to_string(),
    }
}

fn extension(c: &mut Composer, title: &str, entries: &Option<OrderedMap<FieldValue>>) {
    let Some(entries) = entries else {
        return;
    };
    c.sub_heading(title, palette::ACCENT);
    for (key, v) in entries.iter().filter(|(_, v)| v.is_truthy()) {
        c.field(&format!("{key}:"), &v.display());
    }
}

/// Fields of an EFD regime group that hold ICMS situation codes.
const EFD_SITUATION_FIELDS: [&str; 2] = ["cstSaida", "cstEntrada"];

fn efd_block(c: &mut Composer, efd: &OrderedMap<EfdEntry>) {
    c.sub_heading("EFD Contribuições", palette::ACCENT);
    let origin = match efd.get(EfdEntry::ORIGIN_KEY) {
        Some(EfdEntry::Scalar(origin)) => value(origin),
        _ => crate::format::PLACEHOLDER.to_string(),
    };
    c.field("Origem ICMS:", &origin);

    for (key, entry) in efd.iter() {
        if key == EfdEntry::ORIGIN_KEY {
            continue;
        }
        match entry {
            EfdEntry::Group(fields) => {
                c.sub_heading(&key.to_uppercase(), palette::GROUP);
                for (field, v) in fields.iter() {
                    let shown = if EFD_SITUATION_FIELDS.contains(&field) {
                        describe(CodeTable::IcmsRegular, v)
                    } else {
                        value(v)
                    };
                    c.field(&format!("- {field}:"), &shown);
                }
            }
            EfdEntry::Scalar(v) if truthy(v) => {
                c.field(&format!("{key}:"), &value(v));
            }
            EfdEntry::Scalar(_) => {}
        }
    }
}

fn tax_reform(c: &mut Composer, reform: &TaxReform) {
    if !reform.is_enabled() {
        return;
    }
    let Some(per_document) = &reform.per_document else {
        return;
    };
    c.heading(TAX_REFORM_HEADING);
    for (key, config) in per_document.iter() {
        c.card(&format!("Reforma - {key}"), |c| match config {
            ReformConfig::Municipal(municipal) => municipal_reform(c, municipal),
            ReformConfig::General(general) => general_reform(c, general),
        });
    }
}

fn municipal_reform(c: &mut Composer, reform: &MunicipalReform) {
    c.field("Município:", &value(&reform.municipality));
    c.field("Alíquota IBS:", &percent(reform.ibs_rate.as_ref()));
    c.field("Diferimento IBS:", &percent(reform.deferral_rate.as_ref()));
    c.field("Redução IBS:", &percent(reform.reduction_rate.as_ref()));
}

fn general_reform(c: &mut Composer, reform: &GeneralReform) {
    c.field("CST CBS/IBS:", &describe(CodeTable::CbsIbs, &reform.cst));
    c.field(
        "Classificação Tributária:",
        &describe(CodeTable::TaxClassification, &reform.classification),
    );
    c.field("Alíquota CBS:", &percent(reform.cbs_rate.as_ref()));
    c.field("Alíquota IBS:", &percent(reform.ibs_rate.as_ref()));
    c.field("Deduz ICMS:", yes_no(reform.deducts_icms()));
    if truthy(&reform.presumed_credit) {
        c.field("Crédito Presumido:", &value(&reform.presumed_credit));
        c.field("% Crédito CBS:", &percent(reform.cbs_credit_rate.as_ref()));
        c.field("% Crédito IBS:", &percent(reform.ibs_credit_rate.as_ref()));
    }
}
