//! Plain YAML adapter between text and [`Document`] trees.
//!
//! Built on `serde_yaml`, which does not expose comments: parsed documents
//! start with empty comment slots and emitted text carries none. Mappings
//! become sections; every other node becomes a value block.

use serde_yaml::{Mapping, Value};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::domain::{BlockKind, Document, DomainError, Key, KeyFormat, NodeId};

#[derive(Error, Debug)]
pub enum YamlError {
    #[error("invalid YAML: {0}")]
    Syntax(#[from] serde_yaml::Error),

    #[error("top-level YAML node must be a mapping")]
    NotAMapping,

    #[error("{0}")]
    Domain(#[from] DomainError),
}

/// Parse YAML text into a document. Empty input gives an empty document.
pub fn parse_document(text: &str) -> Result<Document, YamlError> {
    parse_document_with(text, KeyFormat::Native)
}

/// Parse YAML text, typing mapping keys per `format`.
#[instrument(level = "debug", skip(text))]
pub fn parse_document_with(text: &str, format: KeyFormat) -> Result<Document, YamlError> {
    let value: Value = serde_yaml::from_str(text)?;
    let mut document = Document::new();
    match value {
        Value::Null => {}
        Value::Mapping(mapping) => {
            let root = document.root();
            fill_section(&mut document, root, mapping, format)?;
        }
        _ => return Err(YamlError::NotAMapping),
    }
    debug!(blocks = document.len(), "parsed document");
    Ok(document)
}

fn fill_section(
    document: &mut Document,
    section: NodeId,
    mapping: Mapping,
    format: KeyFormat,
) -> Result<(), YamlError> {
    for (key, value) in mapping {
        let key = key_of(&key, format);
        match value {
            Value::Mapping(children) => {
                let child = document.insert_section(section, key)?;
                fill_section(document, child, children, format)?;
            }
            other => {
                document.insert_value(section, key, other)?;
            }
        }
    }
    Ok(())
}

/// Map a YAML key onto a path key; integers stay integers under
/// [`KeyFormat::Native`].
pub fn key_of(value: &Value, format: KeyFormat) -> Key {
    match value {
        Value::String(s) => Key::Str(s.clone()),
        Value::Number(n) => match (format, n.as_i64()) {
            (KeyFormat::Native, Some(i)) => Key::Int(i),
            _ => Key::Str(n.to_string()),
        },
        Value::Bool(b) => Key::Str(b.to_string()),
        other => Key::Str(
            serde_yaml::to_string(other)
                .map(|s| s.trim_end().to_string())
                .unwrap_or_default(),
        ),
    }
}

fn value_of(key: &Key) -> Value {
    match key {
        Key::Str(s) => Value::String(s.clone()),
        Key::Int(i) => Value::from(*i),
    }
}

/// Render a document as YAML text.
#[instrument(level = "debug", skip(document))]
pub fn emit_document(document: &Document) -> Result<String, YamlError> {
    if document.is_empty() {
        return Ok(String::new());
    }
    let value = to_value(document, document.root());
    Ok(serde_yaml::to_string(&value)?)
}

/// Convert the block at `node` back into a YAML value.
pub fn to_value(document: &Document, node: NodeId) -> Value {
    let Some(block) = document.block(node) else {
        return Value::Null;
    };
    match &block.kind {
        BlockKind::Section(children) => {
            let mut mapping = Mapping::with_capacity(children.len());
            for (key, &child) in children {
                mapping.insert(value_of(key), to_value(document, child));
            }
            Value::Mapping(mapping)
        }
        BlockKind::Mapping(value) => value.clone(),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Path;

    #[test]
    fn given_nested_yaml_when_parsed_then_mappings_become_sections() {
        let doc = parse_document("server:\n  port: 80\n  hosts: [a, b]\n1: one\n").unwrap();

        let hosts = doc.get(&Path::parse("server.hosts", '.').unwrap()).unwrap();
        assert!(!doc.is_section(hosts));
        assert!(doc.value(hosts).unwrap().is_sequence());
        assert!(doc.get(&Path::single(1i64)).is_some(), "integer keys stay integers");
    }

    #[test]
    fn given_string_format_when_parsed_then_integer_keys_become_strings() {
        let doc = parse_document_with("ports:\n  80: http\n", KeyFormat::String).unwrap();

        let path = Path::parse_with("ports.80", '.', KeyFormat::String).unwrap();
        assert!(doc.get(&path).is_some());
        assert!(doc.get(&Path::parse_with("ports.80", '.', KeyFormat::Native).unwrap()).is_none());
    }

    #[test]
    fn given_scalar_document_when_parsed_then_rejected() {
        assert!(matches!(parse_document("just text"), Err(YamlError::NotAMapping)));
        assert!(parse_document("").unwrap().is_empty());
    }

    #[test]
    fn given_document_when_emitted_then_order_preserved() {
        let doc = parse_document("b: 1\na:\n  y: 2\n  x: 3\n").unwrap();
        let text = emit_document(&doc).unwrap();
        assert_eq!(text, "b: 1\na:\n  y: 2\n  x: 3\n");
    }
}
