use fiscal_report_core::payload::Submission;
use fiscal_report_core::report::generate;
use serde_json::json;

#[test]
fn generate_produces_a_pdf_for_a_full_submission() {
    let submission = Submission::from_value(json!({
        "empresa": {"razaoSocial": "Padaria Pão Quente", "cnpj": "11.222.333/0001-44"},
        "documentos": {"selecionados": ["NFe", "NFCe"]},
        "configPorDocumento": {
            "NFe": {"icms": {"tipo": "CST", "codigo": "00", "aliquota": 18}},
            "NFCe": {"icms": {"tipo": "CSOSN", "codigo": "102"}, "nfceCsc": "X1"}
        },
        "reformaTributaria": {"habilitar": true, "porDocumento": {"NFe": {"cst": "000"}}}
    }))
    .unwrap();

    let bytes = generate(&submission);
    assert!(bytes.starts_with(b"%PDF"));
    let tail = String::from_utf8_lossy(&bytes[bytes.len().saturating_sub(64)..]).to_string();
    assert!(tail.contains("%%EOF"));
}

#[test]
fn generate_handles_an_empty_submission() {
    let bytes = generate(&Submission::default());
    assert!(bytes.starts_with(b"%PDF"));
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

fn content_of(pdf: &[u8]) -> String {
    String::from_utf8_lossy(pdf).to_uppercase()
}

#[test]
fn accented_labels_are_written_in_win_ansi() {
    let submission = Submission::from_value(json!({
        "empresa": {"razaoSocial": "Padaria Pão Quente"}
    }))
    .unwrap();
    let text = content_of(&generate(&submission));

    // "Razão Social:" with ã as the single byte 0xE3.
    assert!(text.contains(&hex(b"Raz\xE3o Social:")), "label not WinAnsi encoded");
    assert!(text.contains(&hex(b"Padaria P\xE3o Quente")), "value not WinAnsi encoded");
    assert!(!text.contains(&hex("Razão".as_bytes())), "UTF-8 bytes leaked into the page");
    assert!(text.contains("/WINANSIENCODING"));
}

#[test]
fn report_title_is_written_in_win_ansi() {
    let text = content_of(&generate(&Submission::default()));
    assert!(text.contains(&hex(b"Parametriza\xE7\xE3o Fiscal")));
    assert!(!text.contains(&hex("Parametrização".as_bytes())));
}
