use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rocket::http::{Header, Status};
use rocket::local::asynchronous::Client;
use tempfile::TempDir;
use url::Url;

use image_resolver::cache::{Addressing, Pairtree};
use image_resolver::migrator::{Migrator, MigratorError};
use image_resolver::{api, AccessPolicy, AppConfig, IdentifierResolver};

struct SlowMigrator {
    pairtree: Pairtree,
    delay: Duration,
}

#[async_trait]
impl Migrator for SlowMigrator {
    async fn convert(&self, id: &str, _source: &Url) -> Result<PathBuf, MigratorError> {
        tokio::time::sleep(self.delay).await;

        let path = self.pairtree.path_for(id);
        tokio::fs::create_dir_all(path.parent().unwrap()).await?;
        tokio::fs::write(&path, b"\x00\x00\x00\x0cjP  \r\n\x87\n").await?;
        Ok(path)
    }
}

async fn client(dir: &TempDir, allowed_hosts: Option<Vec<String>>) -> Client {
    let config = AppConfig {
        jp2_data_dir: dir.path().to_path_buf(),
        ingest_sources: vec![r"https?://images\.example\.org/(.+)\.jpg".to_string()],
        ..AppConfig::default()
    };
    let migrator = Arc::new(SlowMigrator {
        pairtree: Pairtree::new(dir.path()),
        delay: Duration::from_millis(300),
    });
    let resolver = IdentifierResolver::from_config(&config, migrator).unwrap();

    let rocket = rocket::build()
        .manage(resolver)
        .manage(AccessPolicy::new(allowed_hosts))
        .mount("/", api::routes());

    Client::tracked(rocket).await.expect("valid rocket instance")
}

#[rocket::async_test]
async fn local_image_is_served_with_etag() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("image1.jp2"), b"jp2-data").unwrap();
    let client = client(&dir, None).await;

    let response = client.get("/image?rft_id=image1").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(response.content_type().map(|ct| ct.to_string()), Some("image/jp2".to_string()));
    let etag = response.headers().get_one("ETag").unwrap().to_string();
    assert_eq!(response.into_bytes().await.unwrap(), b"jp2-data");

    let cached = client
        .get("/image?rft_id=image1")
        .header(Header::new("If-None-Match", etag))
        .dispatch()
        .await;
    assert_eq!(cached.status(), Status::NotModified);
}

#[rocket::async_test]
async fn converted_image_is_served_as_jp2() {
    let dir = TempDir::new().unwrap();
    let client = client(&dir, None).await;

    let response = client
        .get("/image?rft_id=http%3A%2F%2Fimages.example.org%2Fcat.jpg")
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(response.content_type().map(|ct| ct.to_string()), Some("image/jp2".to_string()));
    assert_eq!(response.into_bytes().await.unwrap(), b"\x00\x00\x00\x0cjP  \r\n\x87\n");
}

#[rocket::async_test]
async fn resolve_returns_record_json() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("image1.jp2"), b"jp2-data").unwrap();
    let client = client(&dir, None).await;

    let response = client.get("/resolve?rft_id=image1").dispatch().await;
    assert_eq!(response.status(), Status::Ok);

    let body: serde_json::Value = response.into_json().await.unwrap();
    assert_eq!(body["identifier"], "image1");
    assert!(body["localPath"].as_str().unwrap().ends_with("image1.jp2"));
}

#[rocket::async_test]
async fn unknown_identifier_is_404() {
    let dir = TempDir::new().unwrap();
    let client = client(&dir, None).await;

    assert_eq!(client.get("/resolve?rft_id=missing").dispatch().await.status(), Status::NotFound);
    assert_eq!(client.get("/status?rft_id=missing").dispatch().await.status(), Status::NotFound);
}

#[rocket::async_test]
async fn missing_rft_id_is_400() {
    let dir = TempDir::new().unwrap();
    let client = client(&dir, None).await;

    assert_eq!(client.get("/resolve").dispatch().await.status(), Status::BadRequest);
    assert_eq!(client.get("/status").dispatch().await.status(), Status::BadRequest);
}

#[rocket::async_test]
async fn status_reports_processing_then_ready() {
    let dir = TempDir::new().unwrap();
    let client = client(&dir, None).await;
    let uri = "/status?rft_id=http%3A%2F%2Fimages.example.org%2Fcat.jpg";

    let (resolved, during) = tokio::join!(
        client.get("/resolve?rft_id=http%3A%2F%2Fimages.example.org%2Fcat.jpg").dispatch(),
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            client.get(uri).dispatch().await.status()
        }
    );

    assert_eq!(during, Status::Accepted);
    assert_eq!(resolved.status(), Status::Ok);

    let after = client.get(uri).dispatch().await;
    assert_eq!(after.status(), Status::Ok);
    let body: serde_json::Value = after.into_json().await.unwrap();
    assert_eq!(body["status"], "READY");
    assert_eq!(body["identifier"], "http://images.example.org/cat.jpg");
}

#[rocket::async_test]
async fn disallowed_host_is_403() {
    let dir = TempDir::new().unwrap();
    let client = client(&dir, Some(vec!["example.org".to_string()])).await;

    let denied = client.get("/resolve?rft_id=http%3A%2F%2Fevil.test%2Fcat.jpg").dispatch().await;
    assert_eq!(denied.status(), Status::Forbidden);

    let allowed = client.get("/resolve?rft_id=http%3A%2F%2Fimages.example.org%2Fcat.jpg").dispatch().await;
    assert_eq!(allowed.status(), Status::Ok);
}

#[rocket::async_test]
async fn rescan_reports_index_size() {
    let dir = TempDir::new().unwrap();
    let client = client(&dir, None).await;

    std::fs::write(dir.path().join("late.jp2"), b"jp2").unwrap();
    let response = client.post("/rescan").dispatch().await;
    assert_eq!(response.status(), Status::Ok);

    let body: serde_json::Value = response.into_json().await.unwrap();
    assert_eq!(body["indexed"], 1);
    assert_eq!(client.get("/status?rft_id=late").dispatch().await.status(), Status::Ok);
}
