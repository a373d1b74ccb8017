//! Loading concept records into a tree
//!
//! Records are nested JSON objects keyed by concept name:
//!
//! ```json
//! {"Source": {"type": "default", "children": {
//!     "symptom": {"children": {
//!         "headache": {"type": "symptom", "body": "pain in the head"}
//!     }}
//! }}}
//! ```
//!
//! `children` may also be an array of records that carry their own `"name"`.
//! A missing `type` means `"default"`; a missing or null `body` leaves the
//! node without content, which is different from an empty body.
//! Files ending in `.gz` are decompressed on the fly.

use flate2::read::MultiGzDecoder;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::GraphOptions;
use crate::error::Result;
use crate::pool::StringPool;
use crate::tree::{DEFAULT_TYPE, Node, NodeId, StableId, Tree};

/// Error during record loading
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid record at {path}: {message}")]
    Format { path: String, message: String },
}

fn format_error(path: &str, message: impl Into<String>) -> LoadError {
    LoadError::Format {
        path: path.to_string(),
        message: message.into(),
    }
}

/// Load a tree from a JSON string
pub fn from_str(text: &str, options: &GraphOptions) -> Result<Tree> {
    let value: Value = serde_json::from_str(text).map_err(LoadError::from)?;
    from_value(&value, options)
}

/// Load a tree from any reader producing JSON
pub fn from_reader<R: Read>(reader: R, options: &GraphOptions) -> Result<Tree> {
    let value: Value = serde_json::from_reader(reader).map_err(LoadError::from)?;
    from_value(&value, options)
}

/// Load a tree from a `.json` or `.json.gz` file
pub fn from_file(path: impl AsRef<Path>, options: &GraphOptions) -> Result<Tree> {
    let path = path.as_ref();
    let file = File::open(path).map_err(LoadError::from)?;
    let is_gzip = path.extension().is_some_and(|ext| ext == "gz");
    debug!("Reading {:?} (gzip: {})", path, is_gzip);

    let tree = if is_gzip {
        from_reader(BufReader::new(MultiGzDecoder::new(file)), options)?
    } else {
        from_reader(BufReader::new(file), options)?
    };
    info!("Loaded {} nodes from {:?}", tree.node_count(), path);
    Ok(tree)
}

/// Build a tree from an already parsed JSON document
pub fn from_value(value: &Value, options: &GraphOptions) -> Result<Tree> {
    let (root_name, root_record) = split_root(value)?;
    let pool = StringPool::new();
    let mut next_id = 0u64;

    let root = make_node(&pool, root_name, root_record, root_name, options, &mut next_id)?;
    let mut tree = Tree::new(pool.clone(), root);

    // (parent, name, record, path, depth); pushed in reverse so ids follow pre-order
    let mut stack: Vec<(NodeId, &str, &Map<String, Value>, String, usize)> = Vec::new();
    push_children(&mut stack, tree.root(), root_record, root_name, 1)?;

    while let Some((parent, name, record, path, depth)) = stack.pop() {
        options.limits.check_depth(depth)?;
        options.limits.check_nodes(tree.node_count() + 1)?;

        let node = make_node(&pool, name, record, &path, options, &mut next_id)?;
        let id = tree.add_child(parent, node);
        push_children(&mut stack, id, record, &path, depth + 1)?;
    }

    debug!("Built tree with {} nodes", tree.node_count());
    Ok(tree)
}

/// Find the root record: either `{name: record}` or a record with `"name"`
fn split_root(value: &Value) -> Result<(&str, &Map<String, Value>)> {
    let Some(object) = value.as_object() else {
        return Err(format_error("$", "expected an object").into());
    };

    if object.len() == 1 {
        if let Some((name, Value::Object(record))) = object.iter().next() {
            return Ok((name.as_str(), record));
        }
    }

    match object.get("name") {
        Some(Value::String(name)) => Ok((name.as_str(), object)),
        _ => Err(format_error("$", "expected a single root entry or a named record").into()),
    }
}

fn push_children<'a>(
    stack: &mut Vec<(NodeId, &'a str, &'a Map<String, Value>, String, usize)>,
    parent: NodeId,
    record: &'a Map<String, Value>,
    path: &str,
    depth: usize,
) -> Result<()> {
    let mut entries: Vec<(&'a str, &'a Map<String, Value>)> = Vec::new();

    match record.get("children") {
        None | Some(Value::Null) => {}
        Some(Value::Object(children)) => {
            for (name, child) in children {
                let Value::Object(child) = child else {
                    return Err(format_error(
                        &format!("{}/{}", path, name),
                        "child record must be an object",
                    )
                    .into());
                };
                entries.push((name.as_str(), child));
            }
        }
        Some(Value::Array(children)) => {
            for (i, child) in children.iter().enumerate() {
                let Value::Object(child) = child else {
                    return Err(format_error(
                        &format!("{}[{}]", path, i),
                        "child record must be an object",
                    )
                    .into());
                };
                let Some(Value::String(name)) = child.get("name") else {
                    return Err(format_error(
                        &format!("{}[{}]", path, i),
                        "child record in a list needs a \"name\"",
                    )
                    .into());
                };
                entries.push((name.as_str(), child));
            }
        }
        Some(_) => {
            return Err(format_error(path, "\"children\" must be an object or an array").into());
        }
    }

    for (name, child) in entries.into_iter().rev() {
        stack.push((parent, name, child, format!("{}/{}", path, name), depth));
    }
    Ok(())
}

fn make_node(
    pool: &StringPool,
    name: &str,
    record: &Map<String, Value>,
    path: &str,
    options: &GraphOptions,
    next_id: &mut u64,
) -> Result<Node> {
    let node_type = match record.get("type") {
        None | Some(Value::Null) => DEFAULT_TYPE,
        Some(Value::String(t)) => t.as_str(),
        Some(_) => return Err(format_error(path, "\"type\" must be a string").into()),
    };

    let mut node = Node::new(pool.get_or_intern(name), pool.get_or_intern(node_type));

    match record.get("body") {
        None | Some(Value::Null) => {}
        Some(Value::String(body)) => node = node.with_body(body.as_str()),
        Some(_) => return Err(format_error(path, "\"body\" must be a string").into()),
    }

    if options.assign_ids {
        node = node.with_id(StableId(*next_id));
        *next_id += 1;
    }

    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Limits;
    use crate::error::Error;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    const SMALL_TREE: &str = r#"{
        "Source": {
            "type": "default",
            "children": {
                "symptom": {
                    "children": {
                        "headache": {"type": "symptom", "body": "pain in the head"},
                        "cough": {"type": "symptom", "body": ""}
                    }
                },
                "disorder": {"type": "disorder"}
            }
        }
    }"#;

    #[test]
    fn test_load_nested_objects() {
        let tree = from_str(SMALL_TREE, &GraphOptions::default()).unwrap();

        assert_eq!(
            tree.names(),
            vec!["Source", "symptom", "headache", "cough", "disorder"]
        );
        assert_eq!(tree.node_type(1), "default");
        assert_eq!(tree.node_type(4), "disorder");
        assert_eq!(tree.node(0).body, None);
        assert_eq!(tree.node(2).body.as_deref(), Some("pain in the head"));
        assert_eq!(tree.node(3).body.as_deref(), Some(""));
        assert!(tree.node(2).id.is_none());
    }

    #[test]
    fn test_assign_ids_in_pre_order() {
        let tree = from_str(SMALL_TREE, &GraphOptions::default().with_ids()).unwrap();

        let ids: Vec<_> = tree
            .pre_order()
            .map(|(id, _)| tree.node(id).id.unwrap().0)
            .collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_load_children_list() {
        let json = r#"{"name": "Source", "children": [
            {"name": "b", "type": "symptom"},
            {"name": "a", "children": [{"name": "c"}]}
        ]}"#;
        let tree = from_str(json, &GraphOptions::default()).unwrap();

        assert_eq!(tree.names(), vec!["Source", "b", "a", "c"]);
        assert_eq!(tree.parent(3), Some(2));
    }

    #[test]
    fn test_invalid_records() {
        let options = GraphOptions::default();

        assert!(matches!(
            from_str("[1, 2]", &options),
            Err(Error::Load(LoadError::Format { .. }))
        ));
        assert!(matches!(
            from_str(r#"{"Source": {"children": 3}}"#, &options),
            Err(Error::Load(LoadError::Format { .. }))
        ));
        assert!(matches!(
            from_str(r#"{"Source": {"body": 7}}"#, &options),
            Err(Error::Load(LoadError::Format { .. }))
        ));
        assert!(matches!(
            from_str("{", &options),
            Err(Error::Load(LoadError::Json(_)))
        ));
    }

    #[test]
    fn test_load_respects_limits() {
        let options = GraphOptions::default().with_limits(Limits {
            max_depth: 1,
            max_nodes: 100,
        });
        assert!(matches!(
            from_str(SMALL_TREE, &options),
            Err(Error::Resource {
                limit: "max_depth",
                ..
            })
        ));

        let options = GraphOptions::default().with_limits(Limits {
            max_depth: 100,
            max_nodes: 3,
        });
        assert!(matches!(
            from_str(SMALL_TREE, &options),
            Err(Error::Resource {
                limit: "max_nodes",
                ..
            })
        ));
    }

    #[test]
    fn test_load_plain_and_gzip_files() {
        let dir = tempfile::tempdir().unwrap();

        let plain = dir.path().join("tree.json");
        std::fs::write(&plain, SMALL_TREE).unwrap();

        let gz = dir.path().join("tree.json.gz");
        let mut encoder = GzEncoder::new(File::create(&gz).unwrap(), Compression::default());
        encoder.write_all(SMALL_TREE.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let options = GraphOptions::default();
        let a = from_file(&plain, &options).unwrap();
        let b = from_file(&gz, &options).unwrap();
        assert_eq!(a.names(), b.names());

        assert!(matches!(
            from_file(dir.path().join("missing.json"), &options),
            Err(Error::Load(LoadError::Io(_)))
        ));
    }
}
