//! Resolvers built from TOML configuration files.

use crate::common::TestProject;
use prs_resolver::ast::Content;
use prs_resolver::config::ResolverConfig;
use prs_resolver::core::PrsError;
use prs_resolver::parser::YamlDocumentParser;
use prs_resolver::resolver::Resolver;
use prs_resolver::test_utils::write_document;

#[tokio::test]
async fn test_config_file_drives_git_and_filesystem_registries() {
    let project = TestProject::new().unwrap();
    let git = project
        .git_repo("prompts", &[("@acme/security.prs", "blocks:\n  security:\n    secrets: never\n")])
        .unwrap();
    write_document(&project.root().join("vendor"), "@acme/tone.prs", "blocks:\n  tone: warm\n");
    write_document(
        project.root(),
        "app/agent.prs",
        "use: [\"@acme/tone\", \"@acme/security\"]\nblocks:\n  identity: \"Stage ${PRS_CONFIG_IT_UNSET_STAGE:-dev}\"\n",
    );

    let toml = format!(
        r#"
local_path = "app"
registry_path = "app/registry"

[cache]
dir = "{cache}"
ttl_secs = 600

[[registries]]
type = "filesystem"
path = "vendor"

[[registries]]
type = "git"
url = "{url}"
ref = "main"
"#,
        cache = project.cache_dir().display(),
        url = git.file_url(),
    );
    let config_path = write_document(project.root(), "prs.toml", &toml);

    let config = ResolverConfig::load_from(&config_path).await.unwrap();
    assert_eq!(config.local_path, project.root().join("app"));
    assert!(config.expand_env);

    let resolver = Resolver::new(config, YamlDocumentParser::new()).unwrap();
    let result = resolver.resolve("agent").await;

    assert!(result.is_success(), "{:?}", result.errors);
    let ast = result.ast.unwrap();
    assert_eq!(ast.block("identity").unwrap().content, Content::Text("Stage dev".into()));
    assert_eq!(ast.block("tone").unwrap().content, Content::Text("warm".into()));
    assert!(ast.block("security").is_some());

    let git_cache = resolver.git_cache().unwrap();
    assert_eq!(git_cache.cache_dir(), project.cache_dir());
    assert_eq!(git_cache.stats().clones(), 1);
}

#[tokio::test]
async fn test_invalid_config_file() {
    let project = TestProject::new().unwrap();
    let path = write_document(project.root(), "prs.toml", "[[registries]]\ntype = \"git\"\n");

    let error = ResolverConfig::load_from(&path).await.unwrap_err();
    assert!(matches!(PrsError::from_anyhow(&error), PrsError::ConfigError { .. }));
}

#[tokio::test]
async fn test_missing_config_file() {
    let project = TestProject::new().unwrap();

    let error = ResolverConfig::load_from(&project.root().join("absent.toml")).await.unwrap_err();
    assert!(format!("{error:#}").contains("absent.toml"));
}
