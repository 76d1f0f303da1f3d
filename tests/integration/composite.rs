//! Resolution through several registries consulted in order.

use crate::common::TestProject;
use prs_resolver::ast::Content;
use prs_resolver::config::{RegistryConfig, ResolverConfig, RetryConfig};
use prs_resolver::registry::{CompositeRegistry, FileSystemRegistry, HttpRegistry, HttpRegistryOptions, Registry};
use prs_resolver::resolver::Resolver;
use prs_resolver::test_utils::write_document;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_earlier_member_shadows_later_ones() {
    let project = TestProject::new().unwrap();
    let first = project.root().join("first");
    let second = project.root().join("second");
    write_document(&first, "@acme/tone.prs", "blocks:\n  tone: from first\n");
    write_document(&second, "@acme/tone.prs", "blocks:\n  tone: from second\n");
    write_document(&second, "@acme/security.prs", "blocks:\n  security: from second\n");
    project.write("main.prs", "use: [\"@acme/tone\", \"@acme/security\"]\nblocks: {}\n");

    let composite = CompositeRegistry::new(vec![
        Arc::new(FileSystemRegistry::new(&first)) as Arc<dyn Registry>,
        Arc::new(FileSystemRegistry::new(&second)),
    ]);
    assert_eq!(composite.list("@acme").await, vec!["tone.prs", "security.prs"]);

    let result = project.resolver_with(Arc::new(composite)).resolve("main").await;
    assert!(result.is_success(), "{:?}", result.errors);
    let ast = result.ast.unwrap();
    assert_eq!(ast.block("tone").unwrap().content, Content::Text("from first".into()));
    assert_eq!(ast.block("security").unwrap().content, Content::Text("from second".into()));
}

#[tokio::test]
async fn test_configured_filesystem_falls_back_to_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/prompts/@acme/remote.prs"))
        .respond_with(ResponseTemplate::new(200).set_body_string("blocks:\n  remote: over http\n"))
        .expect(1)
        .mount(&server)
        .await;

    let project = TestProject::new().unwrap();
    let vendor = project.root().join("vendor");
    write_document(&vendor, "@acme/local.prs", "blocks:\n  local: on disk\n");
    project.write("main.prs", "use: [\"@acme/local\", \"@acme/remote\"]\nblocks: {}\n");

    let config = ResolverConfig {
        registries: vec![
            RegistryConfig::Filesystem {
                path: vendor.display().to_string(),
            },
            RegistryConfig::Http {
                url: format!("{}/prompts/", server.uri()),
                cache_ttl_secs: None,
                timeout_secs: Some(5),
                auth: None,
                retry: RetryConfig {
                    max_retries: 0,
                    initial_backoff_ms: 1,
                },
            },
        ],
        ..project.config()
    };
    let resolver = Resolver::builder().config(config).build().unwrap();
    let result = resolver.resolve("main").await;

    assert!(result.is_success(), "{:?}", result.errors);
    let ast = result.ast.unwrap();
    assert_eq!(ast.block("local").unwrap().content, Content::Text("on disk".into()));
    assert_eq!(ast.block("remote").unwrap().content, Content::Text("over http".into()));
    assert!(resolver.loader().registry().unwrap().describe().starts_with("composite["));
}

#[tokio::test]
async fn test_document_missing_everywhere() {
    let server = MockServer::start().await;
    let project = TestProject::new().unwrap();
    project.write("main.prs", "inherit: \"@acme/nowhere\"\nblocks:\n  identity: main\n");

    let composite = CompositeRegistry::new(vec![
        Arc::new(FileSystemRegistry::new(project.root().join("empty"))) as Arc<dyn Registry>,
        Arc::new(HttpRegistry::new(&server.uri(), HttpRegistryOptions::default()).unwrap()),
    ]);
    let result = project.resolver_with(Arc::new(composite)).resolve("main").await;

    assert!(result.ast.is_some());
    assert_eq!(result.errors.len(), 1);
    assert!(matches!(result.errors[0].error, prs_resolver::core::PrsError::FileNotFound { .. }));
}
