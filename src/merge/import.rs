use std::collections::BTreeMap;

use super::content::{MergePolicy, merge_content};
use crate::ast::{Block, Content, Document};

/// An aliased import's provenance and its blocks as they were imported.
#[derive(Debug, Clone, PartialEq)]
pub struct AliasEntry {
    /// Resolved location of the imported document
    pub source: String,
    /// Imported block contents, before merging and keyed by block name
    pub blocks: BTreeMap<String, Content>,
}

impl AliasEntry {
    /// Names of the imported blocks.
    pub fn block_names(&self) -> impl Iterator<Item = &str> {
        self.blocks.keys().map(String::as_str)
    }
}

/// Aliases declared by `use ... as alias`, keyed by alias name.
///
/// Lets `extend alias.block` address the imported copy of `block` without
/// reserving any block names. The table lives for one document's resolution
/// and is dropped once its extends are applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AliasTable {
    entries: BTreeMap<String, AliasEntry>,
}

impl AliasTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, alias: &str) -> Option<&AliasEntry> {
        self.entries.get(alias)
    }

    pub fn get_mut(&mut self, alias: &str) -> Option<&mut AliasEntry> {
        self.entries.get_mut(alias)
    }

    pub fn insert(&mut self, alias: impl Into<String>, entry: AliasEntry) {
        self.entries.insert(alias.into(), entry);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Merges an imported document into `target`.
///
/// The imported content is the base and the target's content the overlay,
/// under [`MergePolicy::Import`]: plain string properties from the import win.
/// Target blocks keep their order; blocks only the import has are appended.
/// With an alias, the imported blocks are recorded in `aliases`.
#[must_use]
pub fn merge_import(
    target: &Document,
    imported: &Document,
    alias: Option<&str>,
    source: &str,
    aliases: &mut AliasTable,
) -> Document {
    let mut blocks: Vec<Block> = Vec::with_capacity(target.blocks.len() + imported.blocks.len());
    for local in &target.blocks {
        let merged = match imported.block(&local.name) {
            Some(base) => Block {
                name: local.name.clone(),
                content: merge_content(&base.content, &local.content, MergePolicy::Import),
                location: local.location.clone(),
            },
            None => local.clone(),
        };
        blocks.push(merged);
    }
    for base in &imported.blocks {
        if target.block(&base.name).is_none() {
            blocks.push(base.clone());
        }
    }

    if let Some(alias) = alias {
        aliases.insert(
            alias,
            AliasEntry {
                source: source.to_string(),
                blocks: imported.blocks.iter().map(|b| (b.name.clone(), b.content.clone())).collect(),
            },
        );
    }

    Document {
        blocks,
        ..target.clone()
    }
}
