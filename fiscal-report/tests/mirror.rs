use chrono::NaiveDate;
use fiscal_report::mirror::LocalMirror;
use fiscal_report_core::contract::{Attachment, Delivery, DistributionStore};
use fiscal_report_core::payload::Submission;
use serde_json::json;
use tempfile::tempdir;

fn delivery(payload: serde_json::Value, certificate: Option<Attachment>) -> Delivery {
    Delivery {
        submission: Submission::from_value(payload.clone()).unwrap(),
        raw_payload: payload,
        report: b"%PDF-1.7 mirror".to_vec(),
        certificate,
        as_of: NaiveDate::from_ymd_opt(2025, 2, 14).unwrap(),
    }
}

#[tokio::test]
async fn mirrors_report_certificate_and_payload_per_document() {
    let base = tempdir().unwrap();
    let mirror = LocalMirror::new(base.path().to_path_buf());
    let payload = json!({
        "empresa": {"cnpj": "12.345.678/0001-99", "razaoSocial": "Loja Exemplo"},
        "documentos": {"selecionados": ["NFe", "NFCe"]}
    });

    let receipt = mirror
        .deliver(&delivery(
            payload.clone(),
            Some(Attachment {
                filename: "certificado.pfx".into(),
                content: vec![7, 7, 7],
                content_type: Some("application/x-pkcs12".into()),
            }),
        ))
        .await
        .expect("mirror should write");

    assert_eq!(receipt.folders.len(), 2);
    assert_eq!(receipt.files.len(), 6);
    for document in ["NFe", "NFCe"] {
        let dir = base
            .path()
            .join(document)
            .join("12.345.678-0001-99 - Loja Exemplo");
        assert_eq!(
            std::fs::read(dir.join("2025-02-14 - parametrizacao-fiscal.pdf")).unwrap(),
            b"%PDF-1.7 mirror"
        );
        assert_eq!(std::fs::read(dir.join("certificado.pfx")).unwrap(), vec![7, 7, 7]);
        let side_car = std::fs::read_to_string(dir.join("2025-02-14 - payload.json")).unwrap();
        assert!(side_car.contains("\n  \"empresa\""), "payload is pretty printed");
        let parsed: serde_json::Value = serde_json::from_str(&side_car).unwrap();
        assert_eq!(parsed, payload);
    }
}

#[tokio::test]
async fn hostile_names_stay_inside_base_dir() {
    let base = tempdir().unwrap();
    let mirror = LocalMirror::new(base.path().join("mirror"));

    mirror
        .deliver(&delivery(
            json!({"documentos": {"selecionados": [".."]}}),
            Some(Attachment {
                filename: "../../escape.pfx".into(),
                content: vec![1],
                content_type: None,
            }),
        ))
        .await
        .unwrap();

    let dir = base.path().join("mirror").join("_").join("SEM-CNPJ - SEM-NOME");
    assert!(dir.join("..-..-escape.pfx").is_file());
    assert!(!base.path().join("escape.pfx").exists());
}

#[tokio::test]
async fn nothing_selected_writes_nothing() {
    let base = tempdir().unwrap();
    let mirror = LocalMirror::new(base.path().to_path_buf());
    let receipt = mirror.deliver(&delivery(json!({}), None)).await.unwrap();
    assert!(receipt.files.is_empty());
    assert_eq!(std::fs::read_dir(base.path()).unwrap().count(), 0);
}
