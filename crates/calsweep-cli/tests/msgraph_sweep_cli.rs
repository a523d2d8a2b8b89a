//! `msgraph-sweep` driven end to end against a mocked identity platform and Graph API.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use calsweep_cli::credentials::Prompter;
use calsweep_cli::{Cli, ClientError, ProviderKind, Session};
use calsweep_providers::{
    AuthPrompt, BoxFuture, BrowserAuthorization, DeviceCodeChallenge, ProviderResult,
};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TENANT: &str = "contoso.onmicrosoft.com";

#[derive(Default)]
struct CountingPrompt {
    device_codes: AtomicUsize,
}

impl AuthPrompt for CountingPrompt {
    fn device_code<'a>(
        &'a self,
        _: &'a DeviceCodeChallenge,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        self.device_codes.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }

    fn browser_authorization<'a>(
        &'a self,
        _: &'a BrowserAuthorization,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        unreachable!("Microsoft sign-in never opens a browser")
    }
}

struct NoTerminal;

impl Prompter for NoTerminal {
    fn text(&self, _: &str) -> Result<String, String> {
        Err("not a terminal".to_string())
    }

    fn secret(&self, _: &str) -> Result<String, String> {
        Err("not a terminal".to_string())
    }
}

fn write_config(dir: &Path, server: &MockServer) -> std::path::PathBuf {
    let config = format!(
        r#"
timezone = "UTC"

[microsoft]
tenant_id = "{TENANT}"
token_cache = "{cache}"
authority = "{uri}"
graph_base = "{uri}/v1.0"
"#,
        cache = dir.join("token_cache.json").display(),
        uri = server.uri(),
    );
    let path = dir.join("config.toml");
    std::fs::write(&path, config).unwrap();
    path
}

fn cli(config: &Path, args: &[&str]) -> Cli {
    let mut argv = vec!["msgraph-sweep", "--config", config.to_str().unwrap()];
    argv.extend_from_slice(args);
    Cli::try_parse_for(ProviderKind::Microsoft, argv).unwrap()
}

fn env() -> HashMap<String, String> {
    HashMap::from([("CLIENT_ID".to_string(), "test-client".to_string())])
}

fn graph_event(id: &str, start: &str) -> serde_json::Value {
    json!({
        "id": id,
        "subject": "Copied row",
        "start": {"dateTime": start, "timeZone": "UTC"},
        "end": {"dateTime": start, "timeZone": "UTC"}
    })
}

async fn mount_sign_in(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(format!("/{TENANT}/oauth2/v2.0/devicecode")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device_code": "device-123",
            "user_code": "ABCD-EFGH",
            "verification_uri": "https://microsoft.com/devicelogin",
            "expires_in": 900,
            "interval": 0
        })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/{TENANT}/oauth2/v2.0/token")))
        .and(body_string_contains("device_code=device-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "graph-token",
            "refresh_token": "graph-refresh",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn deletes_exactly_the_events_inside_the_window() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), &server);
    mount_sign_in(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/me/calendarView"))
        .and(query_param("startDateTime", "2024-01-01T00:00:00Z"))
        .and(query_param("endDateTime", "2024-01-02T00:00:00Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                graph_event("before", "2023-12-31T22:00:00.0000000"),
                graph_event("one", "2024-01-01T00:00:00.0000000"),
                graph_event("two", "2024-01-01T12:00:00.0000000"),
                graph_event("three", "2024-01-01T23:59:00.0000000"),
                graph_event("after", "2024-01-02T00:00:00.0000000")
            ]
        })))
        .mount(&server)
        .await;

    for id in ["one", "two", "three"] {
        Mock::given(method("DELETE"))
            .and(path(format!("/v1.0/me/events/{id}")))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
    }
    for id in ["before", "after"] {
        Mock::given(method("DELETE"))
            .and(path(format!("/v1.0/me/events/{id}")))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;
    }

    let prompt = CountingPrompt::default();
    let env = env();
    let session = Session {
        env: &env,
        prompter: &NoTerminal,
        auth_prompt: &prompt,
    };
    let mut out = Vec::new();

    calsweep_cli::run(
        ProviderKind::Microsoft,
        &cli(
            &config,
            &["--start", "2024-01-01 00:00", "--end", "2024-01-02 00:00"],
        ),
        &session,
        &mut out,
    )
    .await
    .unwrap();

    let printed = String::from_utf8(out).unwrap();
    assert!(printed.contains("Found 3 events to delete."));
    assert!(printed.contains("Deleted 3 events."));
    assert_eq!(prompt.device_codes.load(Ordering::SeqCst), 1);
    assert!(dir.path().join("token_cache.json").exists());

    // --clean removes the cache, and succeeds again once it is gone.
    for _ in 0..2 {
        calsweep_cli::run(
            ProviderKind::Microsoft,
            &cli(&config, &["--clean"]),
            &session,
            &mut Vec::new(),
        )
        .await
        .unwrap();
    }
    assert!(!dir.path().join("token_cache.json").exists());
}

#[tokio::test]
async fn reversed_window_fails_before_any_request() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), &server);

    let env = HashMap::new();
    let session = Session {
        env: &env,
        prompter: &NoTerminal,
        auth_prompt: &CountingPrompt::default(),
    };

    let err = calsweep_cli::run(
        ProviderKind::Microsoft,
        &cli(
            &config,
            &["--start", "2024-01-02 00:00", "--end", "2024-01-01 00:00"],
        ),
        &session,
        &mut Vec::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ClientError::Window(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_client_id_without_a_terminal_is_a_config_error() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), &server);

    let env = HashMap::new();
    let session = Session {
        env: &env,
        prompter: &NoTerminal,
        auth_prompt: &CountingPrompt::default(),
    };

    let err = calsweep_cli::run(
        ProviderKind::Microsoft,
        &cli(
            &config,
            &["--start", "2024-01-01 00:00", "--end", "2024-01-02 00:00"],
        ),
        &session,
        &mut Vec::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ClientError::Config(ref m) if m.contains("client ID")));
}

#[tokio::test]
async fn calendar_name_is_rejected_before_sign_in() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), &server);

    let env = env();
    let prompt = CountingPrompt::default();
    let session = Session {
        env: &env,
        prompter: &NoTerminal,
        auth_prompt: &prompt,
    };

    let err = calsweep_cli::run(
        ProviderKind::Microsoft,
        &cli(
            &config,
            &[
                "--start",
                "2024-01-01 00:00",
                "--end",
                "2024-01-02 00:00",
                "--calendar",
                "Work",
            ],
        ),
        &session,
        &mut Vec::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ClientError::Config(ref m) if m.contains("--calendar")));
    assert!(server.received_requests().await.unwrap().is_empty());
    assert_eq!(prompt.device_codes.load(Ordering::SeqCst), 0);
    assert!(!dir.path().join("token_cache.json").exists());
}
