//! Resolution against a Git registry backed by the on-disk clone cache.

use crate::common::TestProject;
use prs_resolver::ast::Content;
use prs_resolver::cache::GitCacheManager;
use prs_resolver::config::{GitAuthConfig, RegistryConfig, ResolverConfig};
use prs_resolver::core::PrsError;
use prs_resolver::resolver::Resolver;
use std::time::Duration;

const STANDARDS_V1: &str = "blocks:\n  standards:\n    review: required\n";
const STANDARDS_V2: &str = "blocks:\n  standards:\n    review: required\n    tests: required\n";

fn git_config(project: &TestProject, url: String, reference: &str) -> ResolverConfig {
    ResolverConfig {
        registries: vec![RegistryConfig::Git {
            url,
            reference: Some(reference.to_string()),
            path: Some("registry".to_string()),
            auth: GitAuthConfig::default(),
        }],
        ..project.config()
    }
}

fn resolver(project: &TestProject, config: ResolverConfig, ttl: Duration) -> Resolver {
    Resolver::builder()
        .config(config)
        .git_cache(GitCacheManager::new(project.cache_dir(), ttl))
        .build()
        .unwrap()
}

fn standards_keys(result: &prs_resolver::resolver::ResolutionResult) -> Vec<String> {
    let ast = result.ast.as_ref().expect("resolved tree");
    match &ast.block("standards").expect("standards block").content {
        Content::Object(map) => map.keys().cloned().collect(),
        other => panic!("expected object, got {other:?}"),
    }
}

#[tokio::test]
async fn test_fetch_within_ttl_clones_once() {
    let project = TestProject::new().unwrap();
    let git = project.git_repo("prompts", &[("registry/@acme/standards.prs", STANDARDS_V1)]).unwrap();
    git.tag("v1.0.0").unwrap();
    project.write("main.prs", "inherit: \"@acme/standards@v1.0.0\"\nblocks:\n  identity: reviewer\n");

    let resolver = resolver(&project, git_config(&project, git.file_url(), "v1.0.0"), Duration::from_secs(3600));
    let first = resolver.resolve("main").await;
    assert!(first.is_success(), "{:?}", first.errors);

    resolver.invalidate_cache();
    let second = resolver.resolve("main").await;
    assert!(second.is_success(), "{:?}", second.errors);

    let stats = resolver.git_cache().unwrap().stats();
    assert_eq!(stats.clones(), 1);
    assert_eq!(stats.updates(), 0);
    assert_eq!(standards_keys(&second), vec!["review"]);
}

#[tokio::test]
async fn test_stale_cache_is_updated_incrementally() {
    let project = TestProject::new().unwrap();
    let git = project.git_repo("prompts", &[("registry/@acme/standards.prs", STANDARDS_V1)]).unwrap();
    project.write("main.prs", "inherit: \"@acme/standards\"\nblocks:\n  identity: reviewer\n");

    let resolver = resolver(&project, git_config(&project, git.file_url(), "main"), Duration::ZERO);
    let first = resolver.resolve("main").await;
    assert_eq!(standards_keys(&first), vec!["review"]);

    git.write_file("registry/@acme/standards.prs", STANDARDS_V2).unwrap();
    let head = git.commit_all("add tests rule").unwrap();

    resolver.invalidate_cache();
    let second = resolver.resolve("main").await;
    assert!(second.is_success(), "{:?}", second.errors);
    assert_eq!(standards_keys(&second), vec!["review", "tests"]);

    let cache = resolver.git_cache().unwrap();
    assert_eq!(cache.stats().clones(), 1);
    assert_eq!(cache.stats().updates(), 1);
    assert_eq!(cache.commit_hash(&git.file_url(), "main").await.unwrap(), head);
}

#[tokio::test]
async fn test_broken_clone_is_recloned() {
    let project = TestProject::new().unwrap();
    let git = project.git_repo("prompts", &[("registry/@acme/standards.prs", STANDARDS_V1)]).unwrap();
    project.write("main.prs", "inherit: \"@acme/standards\"\nblocks:\n  identity: reviewer\n");

    let resolver = resolver(&project, git_config(&project, git.file_url(), "main"), Duration::ZERO);
    assert!(resolver.resolve("main").await.is_success());

    let entry = resolver.git_cache().unwrap().cache_path(&git.file_url(), "main");
    std::fs::write(entry.join(".git").join("index"), b"garbage").unwrap();

    resolver.invalidate_cache();
    let result = resolver.resolve("main").await;
    assert!(result.is_success(), "{:?}", result.errors);

    let stats = resolver.git_cache().unwrap().stats();
    assert_eq!(stats.updates(), 1);
    assert_eq!(stats.clones(), 2);
}

#[tokio::test]
async fn test_branch_missing_from_shallow_clone() {
    let project = TestProject::new().unwrap();
    let git = project.git_repo("prompts", &[("registry/@acme/standards.prs", STANDARDS_V1)]).unwrap();
    git.create_branch("release").unwrap();
    git.write_file("registry/@acme/standards.prs", STANDARDS_V2).unwrap();
    git.commit_all("release rules").unwrap();
    git.checkout("main").unwrap();
    project.write("main.prs", "inherit: \"@acme/standards\"\nblocks:\n  identity: reviewer\n");

    let resolver = resolver(&project, git_config(&project, git.file_url(), "release"), Duration::from_secs(3600));
    let result = resolver.resolve("main").await;

    assert!(result.is_success(), "{:?}", result.errors);
    assert_eq!(standards_keys(&result), vec!["review", "tests"]);
}

#[tokio::test]
async fn test_unknown_ref_is_recorded_on_the_inherit() {
    let project = TestProject::new().unwrap();
    let git = project.git_repo("prompts", &[("registry/@acme/standards.prs", STANDARDS_V1)]).unwrap();
    project.write("main.prs", "blocks:\n  identity: reviewer\ninherit: \"@acme/standards\"\n");

    let resolver = resolver(&project, git_config(&project, git.file_url(), "no-such-ref"), Duration::from_secs(3600));
    let result = resolver.resolve("main").await;

    assert!(result.ast.is_some(), "a failed parent does not null the tree");
    assert_eq!(result.errors.len(), 1);
    assert!(matches!(result.errors[0].error, PrsError::GitRefNotFound { .. }), "{:?}", result.errors);
    assert_eq!(result.errors[0].location.as_ref().unwrap().line, 3);
}

#[tokio::test]
async fn test_missing_document_in_repository() {
    let project = TestProject::new().unwrap();
    let git = project.git_repo("prompts", &[("registry/@acme/standards.prs", STANDARDS_V1)]).unwrap();
    project.write("main.prs", "use: [\"@acme/absent\"]\nblocks:\n  identity: reviewer\n");

    let resolver = resolver(&project, git_config(&project, git.file_url(), "main"), Duration::from_secs(3600));
    let result = resolver.resolve("main").await;

    assert!(result.ast.is_some());
    assert!(matches!(result.errors[0].error, PrsError::FileNotFound { .. }));
}
