use super::content::{MergePolicy, deep_merge, merge_content};
use crate::ast::{Block, Document};

/// Merges a resolved parent under `child`.
///
/// The parent is the base and the child the overlay. Blocks keep the parent's
/// order, followed by blocks only the child declares. Meta fields are merged
/// the same way. The result carries the child's parameters and its
/// still-unapplied `uses` and `extends`; `inherit` is cleared.
#[must_use]
pub fn merge_inheritance(parent: &Document, child: &Document) -> Document {
    let mut blocks: Vec<Block> = Vec::with_capacity(parent.blocks.len() + child.blocks.len());

    for base in &parent.blocks {
        let merged = match child.block(&base.name) {
            Some(local) => Block {
                name: base.name.clone(),
                content: merge_content(&base.content, &local.content, MergePolicy::Overlay),
                location: local.location.clone().or_else(|| base.location.clone()),
            },
            None => base.clone(),
        };
        blocks.push(merged);
    }
    for local in &child.blocks {
        if parent.block(&local.name).is_none() {
            blocks.push(local.clone());
        }
    }

    let meta = match (&parent.meta, &child.meta) {
        (Some(base), Some(local)) => Some(deep_merge(base, local, MergePolicy::Overlay)),
        (Some(only), None) | (None, Some(only)) => Some(only.clone()),
        (None, None) => None,
    };

    Document {
        meta,
        blocks,
        extends: child.extends.clone(),
        uses: child.uses.clone(),
        inherit: None,
        params: child.params.clone(),
        location: child.location.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Content, ObjectMap, Value};

    fn doc(blocks: Vec<Block>) -> Document {
        Document {
            blocks,
            ..Document::default()
        }
    }

    #[test]
    fn test_child_text_is_appended_to_parent_text() {
        let parent = doc(vec![Block::new("identity", Content::Text("base assistant".into()))]);
        let child = doc(vec![Block::new("identity", Content::Text("child assistant".into()))]);

        let merged = merge_inheritance(&parent, &child);
        assert_eq!(
            merged.block("identity").unwrap().content,
            Content::Text("base assistant\n\nchild assistant".into())
        );
        assert_eq!(parent.blocks[0].content, Content::Text("base assistant".into()));
    }

    #[test]
    fn test_block_order_is_parent_then_child_only() {
        let parent = doc(vec![
            Block::new("identity", Content::Text("a".into())),
            Block::new("context", Content::Text("b".into())),
        ]);
        let child = doc(vec![
            Block::new("extra", Content::Text("c".into())),
            Block::new("identity", Content::Text("d".into())),
        ]);

        let merged = merge_inheritance(&parent, &child);
        let names: Vec<&str> = merged.blocks.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["identity", "context", "extra"]);
        assert!(merged.inherit.is_none());
    }

    #[test]
    fn test_meta_child_wins() {
        let mut parent_meta = ObjectMap::new();
        parent_meta.insert("id".into(), Value::String("base".into()));
        parent_meta.insert("owner".into(), Value::String("core".into()));
        let mut child_meta = ObjectMap::new();
        child_meta.insert("id".into(), Value::String("child".into()));

        let parent = Document {
            meta: Some(parent_meta),
            ..Document::default()
        };
        let child = Document {
            meta: Some(child_meta),
            ..Document::default()
        };

        let meta = merge_inheritance(&parent, &child).meta.unwrap();
        assert_eq!(meta.get("id"), Some(&Value::String("child".into())));
        assert_eq!(meta.get("owner"), Some(&Value::String("core".into())));
    }
}
