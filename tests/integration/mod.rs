//! Integration test suite for the PromptScript resolver
//!
//! End-to-end tests that drive [`Resolver`](prs_resolver::resolver::Resolver)
//! against real files, local Git repositories and mock HTTP servers.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! RUST_LOG=resolver=debug,registry=debug cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **resolution**: inheritance, imports, extends, parameters, cycles
//! - **git_registry**: clone-once, incremental update and re-clone through the resolver
//! - **http_registry**: response cache, retries, auth headers, directory index
//! - **composite**: fallback across several registries
//! - **config**: TOML configuration driving a resolver

// Shared test utilities (from parent tests/ directory)
#[path = "../common/mod.rs"]
mod common;

mod composite;
mod config;
mod git_registry;
mod http_registry;
mod resolution;
