/*
Rendering lives in a trait so callers can turn any document (or a single
block of it) into a `termtree::Tree` for terminal display.
 */
use serde_yaml::Value;
use termtree::Tree;
use tracing::instrument;

use crate::domain::document::{BlockKind, Document, NodeId};

pub trait ToTree {
    fn to_tree_string(&self) -> Tree<String>;
}

impl ToTree for Document {
    #[instrument(level = "debug", skip(self))]
    fn to_tree_string(&self) -> Tree<String> {
        if self.is_empty() {
            return Tree::new("(empty document)".to_string());
        }
        let mut tree = Tree::new(".".to_string());

        fn build_tree(document: &Document, section: NodeId, parent_tree: &mut Tree<String>) {
            let Some(children) = document.entries(section) else {
                return;
            };
            for (key, &child) in children {
                let Some(block) = document.block(child) else {
                    continue;
                };
                let label = match &block.kind {
                    BlockKind::Mapping(value) => format!("{key}: {}", render_value(value)),
                    _ => key.to_string(),
                };
                let label = if block.comments.is_empty() {
                    label
                } else {
                    format!("{label}  #")
                };
                let mut child_tree = Tree::new(label);
                build_tree(document, child, &mut child_tree);
                parent_tree.push(child_tree);
            }
        }

        build_tree(self, self.root(), &mut tree);
        tree
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "~".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().replace('\n', " "))
            .unwrap_or_else(|_| "<unrenderable>".to_string()),
    }
}
