//! HTTP registry behavior against a mock server.

use crate::common::TestProject;
use prs_resolver::core::PrsError;
use prs_resolver::registry::{HttpAuth, HttpRegistry, HttpRegistryOptions, Registry};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BASE: &str = "blocks:\n  identity: remote base\n";

fn options() -> HttpRegistryOptions {
    HttpRegistryOptions {
        initial_backoff: Duration::from_millis(1),
        ..HttpRegistryOptions::default()
    }
}

fn registry(server: &MockServer, options: HttpRegistryOptions) -> HttpRegistry {
    HttpRegistry::new(&format!("{}/registry", server.uri()), options).unwrap()
}

#[tokio::test]
async fn test_responses_are_cached_within_ttl() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/registry/@acme/base.prs"))
        .respond_with(ResponseTemplate::new(200).set_body_string(BASE))
        .expect(1)
        .mount(&server)
        .await;

    let registry = registry(&server, options());
    assert_eq!(registry.fetch("@acme/base.prs").await.unwrap(), BASE);
    assert_eq!(registry.fetch("@acme/base.prs").await.unwrap(), BASE);
    assert!(registry.exists("@acme/base.prs").await);
    assert_eq!(registry.request_count(), 1);
}

#[tokio::test]
async fn test_disabled_cache_refetches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/registry/@acme/base.prs"))
        .respond_with(ResponseTemplate::new(200).set_body_string(BASE))
        .expect(2)
        .mount(&server)
        .await;

    let registry = registry(
        &server,
        HttpRegistryOptions {
            cache_ttl: Duration::ZERO,
            ..options()
        },
    );
    registry.fetch("@acme/base.prs").await.unwrap();
    registry.fetch("@acme/base.prs").await.unwrap();
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/registry/flaky.prs"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/registry/flaky.prs"))
        .respond_with(ResponseTemplate::new(200).set_body_string(BASE))
        .expect(1)
        .mount(&server)
        .await;

    let registry = registry(&server, options());
    assert_eq!(registry.fetch("flaky.prs").await.unwrap(), BASE);
    assert_eq!(registry.request_count(), 3);
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/registry/down.prs"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let registry = registry(
        &server,
        HttpRegistryOptions {
            max_retries: 2,
            ..options()
        },
    );
    let error = registry.fetch("down.prs").await.unwrap_err();
    assert!(matches!(PrsError::from_anyhow(&error), PrsError::NetworkError { .. }));
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/registry/secret.prs"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let registry = registry(&server, options());
    let forbidden = registry.fetch("secret.prs").await.unwrap_err();
    assert!(matches!(PrsError::from_anyhow(&forbidden), PrsError::NetworkError { .. }));

    let missing = registry.fetch("missing.prs").await.unwrap_err();
    assert!(matches!(PrsError::from_anyhow(&missing), PrsError::FileNotFound { .. }));
    assert!(!registry.exists("missing.prs").await);
}

#[tokio::test]
async fn test_authorization_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/registry/basic.prs"))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200).set_body_string(BASE))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/registry/bearer.prs"))
        .and(header("authorization", "Bearer s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_string(BASE))
        .expect(1)
        .mount(&server)
        .await;

    let basic = registry(
        &server,
        HttpRegistryOptions {
            auth: Some(HttpAuth::Basic {
                username: "user".into(),
                password: "pass".into(),
            }),
            ..options()
        },
    );
    assert!(basic.fetch("basic.prs").await.is_ok());

    let bearer = registry(
        &server,
        HttpRegistryOptions {
            auth: Some(HttpAuth::Bearer("s3cret".into())),
            ..options()
        },
    );
    assert!(bearer.fetch("bearer.prs").await.is_ok());
}

#[tokio::test]
async fn test_list_reads_directory_index() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/registry/@acme/index.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"["base.prs", "tone.prs"]"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/registry/broken/index.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let registry = registry(&server, options());
    assert_eq!(registry.list("@acme").await, vec!["base.prs", "tone.prs"]);
    assert!(registry.list("broken").await.is_empty());
    assert!(registry.list("absent").await.is_empty());
}

#[tokio::test]
async fn test_resolver_inherits_from_http_registry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/registry/@acme/base.prs"))
        .respond_with(ResponseTemplate::new(200).set_body_string(BASE))
        .expect(1)
        .mount(&server)
        .await;

    let project = TestProject::new().unwrap();
    project.write("main.prs", "inherit: \"@acme/base@v3\"\nblocks:\n  identity: local\n");
    let resolver = project.resolver_with(Arc::new(registry(&server, options())));

    let result = resolver.resolve("main").await;
    assert!(result.is_success(), "{:?}", result.errors);

    resolver.invalidate_cache();
    let again = resolver.resolve("main").await;
    assert_eq!(result, again);
}
