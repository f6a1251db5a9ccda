use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::{read, write};
use tempfile::{tempdir, NamedTempFile};

fn payload_file(json: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("Creating temp payload file failed");
    write(file.path(), json).expect("Writing temp payload failed");
    file
}

#[test]
fn render_writes_a_pdf_for_a_payload() {
    let payload = payload_file(
        r#"{
            "empresa": {"razaoSocial": "Loja Exemplo", "cnpj": "12.345.678/0001-99"},
            "documentos": {"selecionados": ["NFe"]},
            "configPorDocumento": {"NFe": {"icms": {"tipo": "CST", "codigo": "00", "aliquota": 18}}}
        }"#,
    );
    let out_dir = tempdir().unwrap();
    let output = out_dir.path().join("relatorio.pdf");

    let mut cmd = Command::cargo_bin("fiscal-report").expect("Binary exists");
    cmd.arg("render")
        .arg("--payload")
        .arg(payload.path())
        .arg("--output")
        .arg(&output);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Report written"));
    let bytes = read(&output).expect("PDF written");
    assert!(bytes.starts_with(b"%PDF"));
}

#[test]
fn render_rejects_a_payload_that_is_not_json() {
    let payload = payload_file("this is not json");
    let out_dir = tempdir().unwrap();

    let mut cmd = Command::cargo_bin("fiscal-report").expect("Binary exists");
    cmd.arg("render")
        .arg("--payload")
        .arg(payload.path())
        .arg("--output")
        .arg(out_dir.path().join("never.pdf"));

    cmd.assert().failure();
    assert!(!out_dir.path().join("never.pdf").exists());
}

#[test]
fn serve_fails_fast_without_config() {
    let mut cmd = Command::cargo_bin("fiscal-report").expect("Binary exists");
    cmd.arg("serve").arg("--config").arg("/nonexistent/config.yaml");
    cmd.assert().failure();
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.events.lock().unwrap().push(format!("{:?}", event));
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use fiscal_report::cli::{run, Cli, Commands};

    let cli = Cli {
        command: Commands::Render {
            payload: std::path::PathBuf::from("dummy.json"),
            output: std::path::PathBuf::from("dummy.pdf"),
        },
    };

    let _ = run(cli).await;

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
