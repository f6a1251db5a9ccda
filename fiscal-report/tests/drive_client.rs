use fiscal_report::drive::{folder_query, DriveClient, ServiceAccountKey};
use fiscal_report_core::contract::{Attachment, FolderStore};
use serde_json::json;
use wiremock::matchers::{
    body_partial_json, body_string_contains, header, header_regex, method, path, query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_PRIVATE_KEY: &str = include_str!("fixtures/test_service_account_key.pem");

async fn client_for(server: &MockServer) -> DriveClient {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains(
            "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer",
        ))
        .and(body_string_contains("assertion="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "test-token",
            "expires_in": 3600,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(server)
        .await;

    let key = ServiceAccountKey {
        client_email: "uploader@project.iam.gserviceaccount.com".into(),
        private_key: TEST_PRIVATE_KEY.into(),
        token_uri: format!("{}/token", server.uri()),
    };
    DriveClient::new(key)
        .expect("test key should load")
        .with_api_base(server.uri())
}

#[tokio::test]
async fn find_folder_queries_by_name_and_parent() {
    let server = MockServer::start().await;
    let client = client_for(&server).await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(header("authorization", "Bearer test-token"))
        .and(query_param("q", folder_query("NFe", "root-id")))
        .and(query_param("supportsAllDrives", "true"))
        .and(query_param("includeItemsFromAllDrives", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [{"id": "folder-1", "name": "NFe"}, {"id": "folder-2", "name": "NFe"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let found = client.find_folder("NFe", "root-id").await.unwrap();
    assert_eq!(found.as_deref(), Some("folder-1"));
}

#[tokio::test]
async fn missing_folder_is_none_and_token_is_reused() {
    let server = MockServer::start().await;
    let client = client_for(&server).await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"files": []})))
        .expect(2)
        .mount(&server)
        .await;

    assert_eq!(client.find_folder("NFCe", "root").await.unwrap(), None);
    assert_eq!(client.find_folder("CTe", "root").await.unwrap(), None);
    // The token mock expects exactly one exchange; verified when `server` drops.
}

#[tokio::test]
async fn create_folder_posts_folder_metadata() {
    let server = MockServer::start().await;
    let client = client_for(&server).await;

    Mock::given(method("POST"))
        .and(path("/drive/v3/files"))
        .and(query_param("supportsAllDrives", "true"))
        .and(body_partial_json(json!({
            "name": "12.345-0001-99 - ACME",
            "mimeType": "application/vnd.google-apps.folder",
            "parents": ["doc-folder"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "client-folder"})))
        .expect(1)
        .mount(&server)
        .await;

    let id = client
        .create_folder("12.345-0001-99 - ACME", "doc-folder")
        .await
        .unwrap();
    assert_eq!(id, "client-folder");
}

#[tokio::test]
async fn upload_sends_multipart_related_body() {
    let server = MockServer::start().await;
    let client = client_for(&server).await;

    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .and(query_param("uploadType", "multipart"))
        .and(query_param("supportsAllDrives", "true"))
        .and(header_regex("content-type", "^multipart/related; boundary=.+"))
        .and(body_string_contains("\"name\":\"2025-01-31 - parametrizacao-fiscal.pdf\""))
        .and(body_string_contains("\"parents\":[\"client-folder\"]"))
        .and(body_string_contains("Content-Type: application/pdf"))
        .and(body_string_contains("%PDF-1.7 body"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "file-9"})))
        .expect(1)
        .mount(&server)
        .await;

    let file = Attachment {
        filename: "2025-01-31 - parametrizacao-fiscal.pdf".into(),
        content: b"%PDF-1.7 body".to_vec(),
        content_type: Some("application/pdf".into()),
    };
    let id = client.upload_file("client-folder", &file).await.unwrap();
    assert_eq!(id, "file-9");
}

#[tokio::test]
async fn api_errors_surface_status_and_body() {
    let server = MockServer::start().await;
    let client = client_for(&server).await;

    Mock::given(method("POST"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(403).set_body_string("insufficientPermissions"))
        .mount(&server)
        .await;

    let err = client.create_folder("NFe", "root").await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("403"), "{message}");
    assert!(message.contains("insufficientPermissions"), "{message}");
}

#[tokio::test]
async fn rejects_a_key_that_is_not_rsa_pem() {
    let key = ServiceAccountKey {
        client_email: "x@example.com".into(),
        private_key: "not a key".into(),
        token_uri: "http://localhost/token".into(),
    };
    assert!(DriveClient::new(key).is_err());
}

#[tokio::test]
async fn loads_service_account_file() {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(
        file.path(),
        serde_json::to_vec(&json!({
            "type": "service_account",
            "client_email": "uploader@project.iam.gserviceaccount.com",
            "private_key": TEST_PRIVATE_KEY,
        }))
        .unwrap(),
    )
    .unwrap();
    assert!(DriveClient::from_service_account_file(file.path()).await.is_ok());
    assert!(DriveClient::from_service_account_file(std::path::Path::new("/nonexistent.json"))
        .await
        .is_err());
}
