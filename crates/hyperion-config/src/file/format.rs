//! Document formats and configuration-tree utilities.

use std::fmt;
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::ConfigError;

/// Supported configuration document formats.
///
/// Detected from the filename suffix; the parsed document always
/// normalizes into a JSON value tree regardless of the source format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// YAML (`.yaml`, `.yml`)
    Yaml,
    /// JSON (`.json`)
    Json,
    /// TOML (`.toml`)
    Toml,
}

impl Format {
    /// Detects the format from the filename suffix.
    pub fn detect(path: &Path) -> Result<Self, ConfigError> {
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase());

        match extension.as_deref() {
            Some("yaml" | "yml") => Ok(Self::Yaml),
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            _ => Err(ConfigError::UnsupportedFormat {
                path: path.to_owned(),
            }),
        }
    }

    /// Parses `text` into a JSON value tree.
    ///
    /// An empty document normalizes to an empty object.
    pub(crate) fn parse(self, text: &str, path: &Path) -> Result<Value, ConfigError> {
        let parse_error = |message: String| ConfigError::Parse {
            format: self,
            path: path.to_owned(),
            message,
        };

        let root = match self {
            Self::Yaml => serde_yaml::from_str::<Value>(text)
                .map_err(|e| parse_error(e.to_string()))?,
            Self::Json => serde_json::from_str::<Value>(text)
                .map_err(|e| parse_error(e.to_string()))?,
            Self::Toml => {
                let value = toml::from_str::<toml::Value>(text)
                    .map_err(|e| parse_error(e.to_string()))?;
                serde_json::to_value(value).map_err(|e| parse_error(e.to_string()))?
            }
        };

        Ok(match root {
            Value::Null => Value::Object(Map::new()),
            other => other,
        })
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
            Self::Toml => "toml",
        })
    }
}

/// Resolves a dot-separated key path against the tree.
///
/// The empty key resolves to the whole tree.
pub(crate) fn lookup<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    if key.is_empty() {
        return Some(root);
    }

    key.split('.')
        .try_fold(root, |value, segment| value.as_object()?.get(segment))
}

/// Collects every leaf key path in the tree, sorted.
pub(crate) fn flatten_keys(root: &Value) -> Vec<String> {
    fn visit(value: &Value, prefix: &str, out: &mut Vec<String>) {
        match value.as_object() {
            Some(map) if !map.is_empty() => {
                for (key, child) in map {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{prefix}.{key}")
                    };
                    visit(child, &path, out);
                }
            }
            _ if prefix.is_empty() => {}
            _ => out.push(prefix.to_owned()),
        }
    }

    let mut keys = Vec::new();
    visit(root, "", &mut keys);
    keys.sort();
    keys
}

/// Parses an override string into the tightest scalar it fits.
pub(crate) fn parse_scalar(text: &str) -> Value {
    if let Ok(b) = text.parse::<bool>() {
        return Value::Bool(b);
    }
    if let Ok(i) = text.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = text.parse::<f64>() {
        return Value::from(f);
    }
    Value::from(text)
}

/// Applies environment overrides onto the tree after file parsing.
///
/// Variables starting with `prefix` (already `_`-terminated) map onto
/// key paths by translating `_` to `.` and lowercasing; existing tree
/// keys match case-insensitively and absent paths are created. Only
/// scalar leaves are replaced: objects and arrays keep the parsed
/// document's shape. Keys that themselves contain underscores cannot
/// be addressed this way.
pub(crate) fn apply_env_overrides(
    root: &mut Value,
    prefix: &str,
    vars: impl Iterator<Item = (String, String)>,
) {
    for (name, value) in vars {
        let upper = name.to_ascii_uppercase();
        let Some(rest) = upper.strip_prefix(prefix) else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }

        let segments: Vec<String> = rest.split('_').map(str::to_ascii_lowercase).collect();
        if segments.iter().any(String::is_empty) {
            continue;
        }

        set_path(root, &segments, parse_scalar(&value));
    }
}

/// Sets a scalar leaf at the given path, matching existing keys
/// case-insensitively.
///
/// Overrides replace scalar leaves only: an existing object or array at
/// any point of the path keeps the parsed document's shape and the
/// override is dropped. Absent paths are created.
fn set_path(root: &mut Value, segments: &[String], value: Value) {
    let Some((last, parents)) = segments.split_last() else {
        return;
    };

    let mut node = root;
    for segment in parents {
        let Some(map) = node.as_object_mut() else {
            // A scalar or array sits in the middle of the path; never
            // clobber it to fabricate the override.
            return;
        };

        let existing = map
            .keys()
            .find(|k| k.eq_ignore_ascii_case(segment))
            .cloned()
            .unwrap_or_else(|| segment.clone());
        node = map.entry(existing).or_insert_with(|| Value::Object(Map::new()));
    }

    let Some(map) = node.as_object_mut() else {
        return;
    };
    let existing = map
        .keys()
        .find(|k| k.eq_ignore_ascii_case(last))
        .cloned()
        .unwrap_or_else(|| last.clone());
    if matches!(map.get(&existing), Some(Value::Object(_) | Value::Array(_))) {
        return;
    }
    let _ = map.insert(existing, value);
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use serde_json::{Value, json};

    use crate::error::ConfigError;
    use crate::file::format::{Format, apply_env_overrides, flatten_keys, lookup, parse_scalar};

    #[test]
    fn detect_by_suffix() {
        assert_eq!(Format::detect(Path::new("app.yaml")).unwrap(), Format::Yaml);
        assert_eq!(Format::detect(Path::new("app.yml")).unwrap(), Format::Yaml);
        assert_eq!(Format::detect(Path::new("app.json")).unwrap(), Format::Json);
        assert_eq!(Format::detect(Path::new("app.toml")).unwrap(), Format::Toml);
        assert!(matches!(
            Format::detect(Path::new("app.ini")),
            Err(ConfigError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn formats_normalize_to_the_same_tree() {
        let path = Path::new("app.x");
        let yaml = Format::Yaml
            .parse("database:\n  host: localhost\n  port: 5432\n", path)
            .unwrap();
        let json = Format::Json
            .parse(r#"{"database": {"host": "localhost", "port": 5432}}"#, path)
            .unwrap();
        let toml = Format::Toml
            .parse("[database]\nhost = \"localhost\"\nport = 5432\n", path)
            .unwrap();

        assert_eq!(yaml, json);
        assert_eq!(json, toml);
    }

    #[test]
    fn empty_document_is_an_empty_object() {
        let root = Format::Yaml.parse("", Path::new("app.yaml")).unwrap();
        assert_eq!(root, json!({}));
    }

    #[test]
    fn lookup_walks_dotted_paths() {
        let root = json!({"database": {"host": "localhost"}, "debug": true});

        assert_eq!(lookup(&root, "database.host"), Some(&json!("localhost")));
        assert_eq!(lookup(&root, "debug"), Some(&json!(true)));
        assert_eq!(lookup(&root, ""), Some(&root));
        assert_eq!(lookup(&root, "database.port"), None);
        assert_eq!(lookup(&root, "debug.nested"), None);
    }

    #[test]
    fn flatten_lists_sorted_leaves() {
        let root = json!({
            "log": {"level": "info"},
            "database": {"host": "localhost", "port": 5432},
        });

        assert_eq!(
            flatten_keys(&root),
            ["database.host", "database.port", "log.level"]
        );
    }

    #[test]
    fn scalars_parse_tightly() {
        assert_eq!(parse_scalar("true"), Value::Bool(true));
        assert_eq!(parse_scalar("42"), json!(42));
        assert_eq!(parse_scalar("2.5"), json!(2.5));
        assert_eq!(parse_scalar("localhost"), json!("localhost"));
    }

    #[test]
    fn env_overrides_replace_and_create() {
        let mut root = json!({"database": {"Host": "localhost"}, "log": {"level": "info"}});

        apply_env_overrides(
            &mut root,
            "APP_",
            vec![
                ("APP_DATABASE_HOST".to_owned(), "db.internal".to_owned()),
                ("APP_DATABASE_PORT".to_owned(), "5433".to_owned()),
                ("HOME".to_owned(), "/root".to_owned()),
                ("APP_".to_owned(), "ignored".to_owned()),
            ]
            .into_iter(),
        );

        // Case-insensitive match keeps the original key casing.
        assert_eq!(lookup(&root, "database.Host"), Some(&json!("db.internal")));
        assert_eq!(lookup(&root, "database.port"), Some(&json!(5433)));
        assert_eq!(lookup(&root, "log.level"), Some(&json!("info")));
        assert_eq!(lookup(&root, "home"), None);
    }

    #[test]
    fn env_overrides_never_replace_containers() {
        let mut root = json!({
            "database": {"host": "localhost", "port": 5432},
            "replicas": ["one", "two"],
        });

        apply_env_overrides(
            &mut root,
            "APP_",
            vec![
                // Whole-subtree and whole-array targets are dropped.
                ("APP_DATABASE".to_owned(), "foo".to_owned()),
                ("APP_REPLICAS".to_owned(), "three".to_owned()),
                // A path through an array cannot be fabricated either.
                ("APP_REPLICAS_FIRST".to_owned(), "three".to_owned()),
            ]
            .into_iter(),
        );

        assert_eq!(lookup(&root, "database.host"), Some(&json!("localhost")));
        assert_eq!(lookup(&root, "database.port"), Some(&json!(5432)));
        assert_eq!(lookup(&root, "replicas"), Some(&json!(["one", "two"])));
    }

    #[test]
    fn env_overrides_never_clobber_scalar_intermediates() {
        let mut root = json!({"database": "postgres://localhost/app"});

        apply_env_overrides(
            &mut root,
            "APP_",
            vec![("APP_DATABASE_HOST".to_owned(), "db.internal".to_owned())].into_iter(),
        );

        // The scalar keeps its value instead of becoming an object.
        assert_eq!(
            lookup(&root, "database"),
            Some(&json!("postgres://localhost/app"))
        );
    }
}
