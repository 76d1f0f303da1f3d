//! End-to-end resolution of local documents.

use crate::common::TestProject;
use prs_resolver::ast::{Content, Document, ParamArgument, Value};
use prs_resolver::core::PrsError;

fn text<'a>(document: &'a Document, block: &str) -> &'a str {
    match &document.block(block).expect("block").content {
        Content::Text(text) => text,
        other => panic!("expected text in {block}, got {other:?}"),
    }
}

fn prop<'a>(document: &'a Document, block: &str, key: &str) -> &'a Value {
    document.block(block).expect("block").content.properties().expect("properties").get(key).expect("key")
}

#[tokio::test]
async fn test_agent_composed_from_every_directive() {
    let project = TestProject::new().unwrap();
    project.write(
        "base.prs",
        r#"
meta:
  version: 1
blocks:
  identity: base assistant
  standards:
    code:
      style: clean
      indent: 2
  rules: [be kind]
"#,
    );
    project.write(
        "fragments/shortcuts.prs",
        r#"
blocks:
  shortcuts:
    /test: source value
    /review: review the diff
  rules: [cite sources]
"#,
    );
    project.write(
        "agents/support.prs",
        r#"
meta:
  id: support
inherit: ../base
use:
  - ../fragments/shortcuts
blocks:
  identity: child assistant
  shortcuts:
    /test: target value
  rules: [be kind, be brief]
extend:
  - target: standards.code
    content:
      lint: true
"#,
    );

    let result = project.resolver().resolve("agents/support").await;
    assert!(result.is_success(), "{:?}", result.errors);
    let ast = result.ast.unwrap();

    assert_eq!(text(&ast, "identity"), "base assistant\n\nchild assistant");

    let Value::Object(code) = prop(&ast, "standards", "code") else {
        panic!("expected object");
    };
    assert_eq!(code.len(), 3);
    assert_eq!(code.get("lint"), Some(&Value::Bool(true)));
    assert_eq!(code.get("indent"), Some(&Value::Number(2.0)));

    assert_eq!(prop(&ast, "shortcuts", "/test"), &Value::String("source value".into()));
    assert_eq!(prop(&ast, "shortcuts", "/review"), &Value::String("review the diff".into()));

    assert_eq!(
        ast.block("rules").unwrap().content,
        Content::Array(vec!["cite sources".into(), "be kind".into(), "be brief".into()])
    );

    let meta = ast.meta.as_ref().unwrap();
    assert_eq!(meta.get("id"), Some(&Value::String("support".into())));
    assert_eq!(meta.get("version"), Some(&Value::Number(1.0)));

    assert!(ast.is_resolved());
    assert!(ast.params.is_none());
    assert_eq!(result.sources.len(), 3);
    assert!(result.sources[0].ends_with("agents/support.prs"));
}

#[tokio::test]
async fn test_four_level_chain() {
    let project = TestProject::new().unwrap();
    project.write("l0.prs", "blocks:\n  notes: level zero\n");
    project.write("l1.prs", "inherit: ./l0\nblocks:\n  notes: level one\n");
    project.write("l2.prs", "inherit: ./l1\nblocks:\n  notes: level two\n");
    project.write("l3.prs", "inherit: ./l2\nblocks:\n  notes: level three\n");

    let result = project.resolver().resolve("l3").await;
    let ast = result.ast.unwrap();

    assert_eq!(text(&ast, "notes"), "level zero\n\nlevel one\n\nlevel two\n\nlevel three");
    assert_eq!(result.sources.len(), 4);
}

#[tokio::test]
async fn test_transitive_cycle_aborts_resolution() {
    let project = TestProject::new().unwrap();
    project.write("a.prs", "inherit: ./b\nblocks:\n  x: a\n");
    project.write("b.prs", "inherit: ./c\nblocks:\n  x: b\n");
    project.write("c.prs", "inherit: ./a\nblocks:\n  x: c\n");
    project.write("other.prs", "blocks:\n  y: fine\n");

    let resolver = project.resolver();
    let result = resolver.resolve("a").await;

    assert!(result.ast.is_none());
    assert_eq!(result.errors.len(), 1);
    let message = result.errors[0].to_string();
    assert!(message.contains("Circular dependency detected"), "{message}");
    assert!(message.contains("a.prs -> "), "{message}");

    // the resolver stays usable
    assert!(resolver.resolve("other").await.is_success());
}

#[tokio::test]
async fn test_template_arguments_flow_through_imports() {
    let project = TestProject::new().unwrap();
    project.write(
        "fragments/team.prs",
        r#"
params:
  - { name: team, type: string }
  - { name: env, type: enum, options: [dev, prod], optional: true, default: dev }
blocks:
  ownership:
    team: "{{team}}"
    environment: "{{env}}"
  identity: "Owned by {{team}} in {{env}}."
"#,
    );
    project.write(
        "service.prs",
        r#"
params:
  - { name: name, type: string }
use:
  - path: ./fragments/team
    params:
      team: "{{name}}"
      env: prod
blocks:
  identity: "Service {{name}}."
"#,
    );

    let result = project
        .resolver()
        .resolve_with_params("service", vec![ParamArgument::new("name", "billing")])
        .await;
    assert!(result.is_success(), "{:?}", result.errors);
    let ast = result.ast.unwrap();

    assert_eq!(prop(&ast, "ownership", "team"), &Value::String("billing".into()));
    assert_eq!(prop(&ast, "ownership", "environment"), &Value::String("prod".into()));
    assert_eq!(text(&ast, "identity"), "Owned by billing in prod.\n\nService billing.");
}

#[tokio::test]
async fn test_parameter_errors_are_reported_not_fatal() {
    let project = TestProject::new().unwrap();
    project.write(
        "fragment.prs",
        "params:\n  - { name: env, type: enum, options: [dev, prod] }\nblocks:\n  env: \"{{env}}\"\n",
    );
    project.write(
        "main.prs",
        "use:\n  - path: ./fragment\n    params: { env: staging }\nblocks:\n  identity: main\n",
    );

    let result = project.resolver().resolve("main").await;

    assert!(result.ast.is_some());
    let error = &result.errors[0];
    assert!(matches!(
        &error.error,
        PrsError::ParamTypeMismatch { name, actual, .. } if name == "env" && actual == "'staging'"
    ));
    assert_eq!(error.location.as_ref().unwrap().line, 2);
}

#[tokio::test]
async fn test_unknown_parameter_suggestion() {
    let project = TestProject::new().unwrap();
    project.write("fragment.prs", "params:\n  - { name: color, type: string }\nblocks:\n  x: y\n");
    project.write("main.prs", "use:\n  - path: ./fragment\n    params: { colr: red }\nblocks: {}\n");

    let result = project.resolver().resolve("main").await;

    let error = anyhow::Error::new(result.errors[0].error.clone());
    let context = prs_resolver::core::user_friendly_error(error);
    assert_eq!(context.suggestion.as_deref(), Some("Did you mean 'color'?"));
}

#[tokio::test]
async fn test_registry_path_without_registry_reads_disk() {
    let project = TestProject::new().unwrap();
    project.write("registry/@acme/base.prs", "blocks:\n  identity: shared base\n");
    project.write("main.prs", "inherit: \"@acme/base@v2\"\nblocks:\n  identity: main\n");

    let result = project.resolver().resolve("main").await;

    assert!(result.is_success(), "{:?}", result.errors);
    assert_eq!(text(result.ast.as_ref().unwrap(), "identity"), "shared base\n\nmain");
}

#[tokio::test]
async fn test_concurrent_entries_share_cache() {
    let project = TestProject::new().unwrap();
    project.write("shared.prs", "blocks:\n  policy: shared policy\n");
    project.write("a.prs", "use: [./shared]\nblocks:\n  identity: a\n");
    project.write("b.prs", "use: [./shared]\nblocks:\n  identity: b\n");

    let resolver = project.resolver();
    let results = resolver.resolve_many(&["a", "b"]).await;

    for result in &results {
        assert!(result.is_success(), "{:?}", result.errors);
        assert_eq!(text(result.ast.as_ref().unwrap(), "policy"), "shared policy");
    }
    assert_eq!(resolver.cache().len(), 3);
}
