// THEORY:
// The `ConfigStore` is the persistence boundary of the detector. It holds a tree of
// settings addressed by dot-separated paths such as `detection.blobs.minarea`.
//
// Key principles:
// 1.  **Pure path lookups**: every operation walks the tree from the root using only
//     the path it was handed. There is no cursor or "current tag", so a failed lookup
//     can never leave state behind that changes the meaning of the next one.
// 2.  **Absence is normal**: reading a missing key yields the type's zero value (or the
//     caller's default). Nothing in the read path returns an error.
// 3.  **Two leaf kinds**: leaves are integers or text. Typed reads convert between the
//     two, so a value that was migrated as text still reads back as an integer. A
//     hand-edited `50.0` is read as the integer 50.
// 4.  **Migration**: legacy flat keys are moved to their nested homes on load. Each move
//     bumps a counter that lives as long as the store, across reloads.

use crate::error::{BlobwatchError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fs;
use std::path::{Path, PathBuf};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

pub const PATH_SEPARATOR: char = '.';

type Children = BTreeMap<String, ConfigNode>;

/// A single node of the settings tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ConfigNode {
    Integer(i64),
    Text(String),
    Branch(Children),
}

impl ConfigNode {
    fn empty_branch() -> Self {
        ConfigNode::Branch(Children::new())
    }

    pub fn is_leaf(&self) -> bool {
        !matches!(self, ConfigNode::Branch(_))
    }

    /// The leaf's value rendered as text. Branches have no text form.
    pub fn as_text(&self) -> Option<String> {
        match self {
            ConfigNode::Integer(value) => Some(value.to_string()),
            ConfigNode::Text(text) => Some(text.clone()),
            ConfigNode::Branch(_) => None,
        }
    }
}

/// Types that can be stored in, and read back from, a settings leaf.
pub trait ConfigValue: Sized + Default {
    fn from_node(node: &ConfigNode) -> Option<Self>;
    fn into_node(self) -> ConfigNode;
}

macro_rules! integer_config_value {
    ($($int:ty),* $(,)?) => {
        $(
            impl ConfigValue for $int {
                fn from_node(node: &ConfigNode) -> Option<Self> {
                    match node {
                        ConfigNode::Integer(value) => <$int>::try_from(*value).ok(),
                        ConfigNode::Text(text) => text.trim().parse().ok(),
                        ConfigNode::Branch(_) => None,
                    }
                }

                fn into_node(self) -> ConfigNode {
                    i64::try_from(self)
                        .map(ConfigNode::Integer)
                        .unwrap_or_else(|_| ConfigNode::Text(self.to_string()))
                }
            }
        )*
    };
}

integer_config_value!(u8, i32, u32, i64, u64, usize);

impl ConfigValue for String {
    fn from_node(node: &ConfigNode) -> Option<Self> {
        node.as_text()
    }

    fn into_node(self) -> ConfigNode {
        ConfigNode::Text(self)
    }
}

/// Splits a path into its segments, rejecting empty segments (`""`, `a..b`, `.a`).
fn segments(path: &str) -> Option<Vec<&str>> {
    let parts: Vec<&str> = path.split(PATH_SEPARATOR).collect();
    if parts.iter().any(|part| part.is_empty()) {
        return None;
    }
    Some(parts)
}

/// Hierarchical key/value settings tree backed by a JSON document.
#[derive(Debug, Default)]
pub struct ConfigStore {
    root: Children,
    path: Option<PathBuf>,
    migrations: usize,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store bound to `path` without reading it.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Directory relative media names are resolved against.
    pub fn base_dir(&self) -> PathBuf {
        self.path
            .as_deref()
            .and_then(Path::parent)
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Number of legacy keys moved since this store was created.
    pub fn migrations(&self) -> usize {
        self.migrations
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    fn node(&self, path: &str) -> Option<&ConfigNode> {
        let parts = segments(path)?;
        let (last, parents) = parts.split_last()?;
        let mut children = &self.root;
        for part in parents {
            children = match children.get(*part)? {
                ConfigNode::Branch(map) => map,
                _ => return None,
            };
        }
        children.get(*last)
    }

    pub fn has(&self, path: &str) -> bool {
        self.node(path).is_some()
    }

    /// Reads `path` as `T`, falling back to `T::default()`.
    pub fn get<T: ConfigValue>(&self, path: &str) -> T {
        self.get_or(path, T::default())
    }

    pub fn get_or<T: ConfigValue>(&self, path: &str, default: T) -> T {
        self.node(path).and_then(T::from_node).unwrap_or(default)
    }

    /// Writes `value` at `path`, creating intermediate branches. With `overwrite` unset an
    /// existing node is left as it is. Returns whether the tree changed.
    pub fn set<T: ConfigValue>(&mut self, path: &str, value: T, overwrite: bool) -> bool {
        self.insert(path, value.into_node(), overwrite)
    }

    /// Seeds `path` with `default` unless something is already there.
    pub fn ensure<T: ConfigValue>(&mut self, path: &str, default: T) -> bool {
        self.set(path, default, false)
    }

    fn insert(&mut self, path: &str, node: ConfigNode, overwrite: bool) -> bool {
        let Some(parts) = segments(path) else {
            warn!(path, "ignoring write to malformed settings path");
            return false;
        };
        let Some((last, parents)) = parts.split_last() else {
            return false;
        };

        let mut children = &mut self.root;
        for part in parents {
            let child = children
                .entry((*part).to_string())
                .or_insert_with(ConfigNode::empty_branch);
            if child.is_leaf() {
                if !overwrite {
                    return false;
                }
                *child = ConfigNode::empty_branch();
            }
            children = match child {
                ConfigNode::Branch(map) => map,
                _ => return false,
            };
        }

        match children.entry((*last).to_string()) {
            Entry::Occupied(_) if !overwrite => false,
            Entry::Occupied(mut slot) => {
                slot.insert(node);
                true
            }
            Entry::Vacant(slot) => {
                slot.insert(node);
                true
            }
        }
    }

    /// Detaches the node at `path`, returning it if there was one.
    pub fn take(&mut self, path: &str) -> Option<ConfigNode> {
        let parts = segments(path)?;
        let (last, parents) = parts.split_last()?;
        let mut children = &mut self.root;
        for part in parents {
            children = match children.get_mut(*part)? {
                ConfigNode::Branch(map) => map,
                _ => return None,
            };
        }
        children.remove(*last)
    }

    pub fn remove(&mut self, path: &str) -> bool {
        self.take(path).is_some()
    }

    /// Moves the value at `old_path` to `new_path`, leaves becoming text.
    ///
    /// Returns false, without touching the tree, when `old_path` is absent or when
    /// `new_path` is `old_path` itself or lies beneath it. Because the old key is removed,
    /// repeating a successful migration is a no-op.
    pub fn migrate(&mut self, old_path: &str, new_path: &str) -> bool {
        if segments(new_path).is_none() || is_within(new_path, old_path) {
            return false;
        }
        let Some(old) = self.take(old_path) else {
            return false;
        };
        let moved = match old.as_text() {
            Some(text) => ConfigNode::Text(text),
            None => old,
        };
        self.insert(new_path, moved, true);
        self.migrations += 1;
        debug!(from = old_path, to = new_path, "migrated legacy setting");
        true
    }

    /// Replaces the tree with the document at `path` and remembers `path` for `save`.
    ///
    /// A missing or unreadable document is reported and leaves the current tree alone.
    pub fn load(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        self.path = Some(path.to_path_buf());

        match read_document(path) {
            Ok(root) => {
                self.root = root;
                info!(path = %path.display(), "Loaded settings from file");
                true
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Settings could not be loaded from file");
                false
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = self
            .path
            .as_deref()
            .ok_or_else(|| BlobwatchError::Config("settings have no backing file".to_string()))?;
        self.save_as(path)
    }

    pub fn save_as(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(&self.root)?;
        fs::write(path, text + "\n")?;
        info!(path = %path.display(), "Saved settings");
        Ok(())
    }

    /// Removes the backing document. Returns false if there was none to remove.
    pub fn delete(&self) -> Result<bool> {
        let Some(path) = self.path.as_deref() else {
            return Ok(false);
        };
        match fs::remove_file(path) {
            Ok(()) => {
                info!(path = %path.display(), "Deleted settings file");
                Ok(true)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    pub fn to_pretty_string(&self) -> String {
        serde_json::to_string_pretty(&self.root).unwrap_or_default()
    }
}

/// Whether `path` is `ancestor` or a descendant of it.
fn is_within(path: &str, ancestor: &str) -> bool {
    path.strip_prefix(ancestor)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(PATH_SEPARATOR))
}

fn read_document(path: &Path) -> Result<Children> {
    let text = fs::read_to_string(path)?;
    match serde_json::from_str::<Value>(&text)? {
        Value::Object(map) => children_from_json(map, ""),
        other => Err(BlobwatchError::Config(format!(
            "settings document must be an object, found {other}"
        ))),
    }
}

fn children_from_json(map: Map<String, Value>, prefix: &str) -> Result<Children> {
    map.into_iter()
        .map(|(key, value)| {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}{PATH_SEPARATOR}{key}")
            };
            let node = node_from_json(value, &path)?;
            Ok((key, node))
        })
        .collect()
}

/// Converts one JSON value, naming `path` when it has no settings form.
fn node_from_json(value: Value, path: &str) -> Result<ConfigNode> {
    match value {
        Value::String(text) => Ok(ConfigNode::Text(text)),
        Value::Object(map) => children_from_json(map, path).map(ConfigNode::Branch),
        Value::Number(number) => number
            .as_i64()
            .or_else(|| {
                number
                    .as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| f as i64)
            })
            .map(ConfigNode::Integer)
            .ok_or_else(|| BlobwatchError::Config(format!("{path}: {number} is not an integer"))),
        other => Err(BlobwatchError::Config(format!(
            "{path}: unsupported value {other}"
        ))),
    }
}
