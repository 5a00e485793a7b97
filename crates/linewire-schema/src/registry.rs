use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use jsonschema::Validator;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::RegistryConfig;
use crate::error::{Result, SchemaError};
use crate::validator::validate_params;

const SCHEMA_FILE_SUFFIX: &str = ".schema.json";

/// Keywords whose value is a map of name -> subschema.
const SUBSCHEMA_MAPS: [&str; 5] = [
    "properties",
    "patternProperties",
    "dependentSchemas",
    "$defs",
    "definitions",
];

/// Keywords whose value is a subschema or an array of subschemas.
const SUBSCHEMAS: [&str; 16] = [
    "propertyNames",
    "additionalProperties",
    "unevaluatedProperties",
    "items",
    "contains",
    "additionalItems",
    "unevaluatedItems",
    "not",
    "if",
    "then",
    "else",
    "prefixItems",
    "allOf",
    "anyOf",
    "oneOf",
    "dependencies",
];

/// Keywords that only make sense on an object schema.
const OBJECT_KEYWORDS: [&str; 8] = [
    "properties",
    "patternProperties",
    "additionalProperties",
    "unevaluatedProperties",
    "required",
    "dependentRequired",
    "dependentSchemas",
    "propertyNames",
];

/// Method-keyed registry of compiled JSON Schema validators for request params.
pub struct SchemaRegistry {
    validators: HashMap<String, Validator>,
    config: RegistryConfig,
}

impl SchemaRegistry {
    /// Create an empty registry with default config.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create an empty registry with explicit config.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            validators: HashMap::new(),
            config,
        }
    }

    /// Register the params schema for `method` from a JSON string.
    pub fn register(&mut self, method: &str, schema_json: &str) -> Result<()> {
        let schema: Value = serde_json::from_str(schema_json)?;
        self.register_value(method, &schema)
    }

    /// Register the params schema for `method` from a JSON value.
    pub fn register_value(&mut self, method: &str, schema: &Value) -> Result<()> {
        let mut schema = schema.clone();
        if self.config.strict_mode {
            close_object_schemas(&mut schema);
        }

        let compiled = jsonschema::validator_for(&schema)
            .map_err(|err| SchemaError::CompileFailed(format!("{method}: {err}")))?;

        self.validators.insert(method.to_string(), compiled);
        Ok(())
    }

    /// Load `<method>.schema.json` files from a directory.
    pub fn from_directory(path: &Path) -> Result<Self> {
        Self::from_directory_with_config(path, RegistryConfig::default())
    }

    /// Load schemas from a directory with explicit config.
    ///
    /// Files not ending in `.schema.json` are ignored. Symlinked schema files
    /// are refused, as are files over the size limit.
    pub fn from_directory_with_config(path: &Path, config: RegistryConfig) -> Result<Self> {
        let mut registry = Self::with_config(config);

        let entries = std::fs::read_dir(path)
            .map_err(|err| SchemaError::LoadFailed(format!("{}: {err}", path.display())))?;

        for entry in entries {
            let entry = entry.map_err(|err| SchemaError::LoadFailed(err.to_string()))?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let Some(method) = method_from_file_name(&file_name) else {
                continue;
            };

            let entry_path = entry.path();
            let path_metadata = std::fs::symlink_metadata(&entry_path)
                .map_err(|err| SchemaError::LoadFailed(err.to_string()))?;
            if path_metadata.file_type().is_symlink() {
                return Err(SchemaError::LoadFailed(format!(
                    "refusing to load schema symlink: {file_name}"
                )));
            }
            if !path_metadata.is_file() {
                continue;
            }

            if registry.validators.len() >= registry.config.max_schemas_from_directory {
                return Err(SchemaError::LoadFailed(format!(
                    "schema count exceeds configured max ({})",
                    registry.config.max_schemas_from_directory
                )));
            }

            let content = registry.read_schema_file(&entry_path, &path_metadata, &file_name)?;
            registry.register(method, &content)?;
            debug!(method, file = %entry_path.display(), "loaded params schema");
        }

        Ok(registry)
    }

    fn read_schema_file(
        &self,
        path: &Path,
        path_metadata: &std::fs::Metadata,
        file_name: &str,
    ) -> Result<String> {
        let file = std::fs::File::open(path).map_err(|err| {
            SchemaError::LoadFailed(format!("failed opening schema {}: {err}", path.display()))
        })?;
        let opened_metadata = file
            .metadata()
            .map_err(|err| SchemaError::LoadFailed(err.to_string()))?;

        #[cfg(unix)]
        if !same_file_identity(path_metadata, &opened_metadata) {
            return Err(SchemaError::LoadFailed(format!(
                "schema file changed during load: {file_name}"
            )));
        }
        #[cfg(not(unix))]
        let _ = path_metadata;

        let max_bytes = self.config.max_schema_file_size;
        if opened_metadata.len() > max_bytes as u64 {
            return Err(SchemaError::LoadFailed(format!(
                "schema file too large ({} bytes): {file_name}",
                opened_metadata.len()
            )));
        }

        // The file may grow between stat and read; cap the read as well.
        let read_limit = u64::try_from(max_bytes.saturating_add(1)).unwrap_or(u64::MAX);
        let mut content = String::new();
        file.take(read_limit)
            .read_to_string(&mut content)
            .map_err(|err| {
                SchemaError::LoadFailed(format!("failed reading schema {}: {err}", path.display()))
            })?;
        if content.len() > max_bytes {
            return Err(SchemaError::LoadFailed(format!(
                "schema file too large while reading: {file_name}"
            )));
        }
        Ok(content)
    }

    /// Load from embedded `(method, schema)` pairs.
    pub fn from_embedded(schemas: &[(&str, &str)]) -> Result<Self> {
        let mut registry = Self::new();
        for (method, schema) in schemas {
            registry.register(method, schema)?;
        }
        Ok(registry)
    }

    /// Validate `params` against the schema registered for `method`.
    pub fn validate(&self, method: &str, params: &Value) -> Result<()> {
        match self.validators.get(method) {
            Some(validator) => validate_params(method, params, validator),
            None if self.config.fail_on_missing_schema => {
                Err(SchemaError::NoSchema(method.to_string()))
            }
            None => Ok(()),
        }
    }

    /// Check if a method has a registered schema.
    pub fn has_schema(&self, method: &str) -> bool {
        self.validators.contains_key(method)
    }

    /// Methods with registered schemas, sorted.
    pub fn methods(&self) -> Vec<&str> {
        let mut methods: Vec<&str> = self.validators.keys().map(String::as_str).collect();
        methods.sort_unstable();
        methods
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("methods", &self.methods())
            .field("config", &self.config)
            .finish()
    }
}

fn method_from_file_name(file_name: &str) -> Option<&str> {
    let method = file_name.strip_suffix(SCHEMA_FILE_SUFFIX)?;
    if method.is_empty() || method.starts_with('.') {
        return None;
    }
    Some(method)
}

/// Add `additionalProperties: false` to every object schema that doesn't
/// already say otherwise, recursing through nested subschemas.
fn close_object_schemas(schema: &mut Value) {
    match schema {
        Value::Array(items) => items.iter_mut().for_each(close_object_schemas),
        Value::Object(map) => {
            if describes_object(map) {
                map.entry("additionalProperties")
                    .or_insert(Value::Bool(false));
            }
            for (keyword, child) in map.iter_mut() {
                let keyword = keyword.as_str();
                if SUBSCHEMA_MAPS.contains(&keyword) {
                    if let Value::Object(children) = child {
                        children.values_mut().for_each(close_object_schemas);
                    }
                } else if SUBSCHEMAS.contains(&keyword) {
                    close_object_schemas(child);
                }
            }
        }
        _ => {}
    }
}

fn describes_object(map: &Map<String, Value>) -> bool {
    match map.get("type") {
        Some(Value::String(kind)) => kind == "object",
        Some(Value::Array(kinds)) => kinds.iter().any(|kind| kind == "object"),
        _ => OBJECT_KEYWORDS.iter().any(|keyword| map.contains_key(*keyword)),
    }
}

#[cfg(unix)]
fn same_file_identity(a: &std::fs::Metadata, b: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    a.dev() == b.dev() && a.ino() == b.ino()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serde_json::json;

    use super::*;

    const GREET_SCHEMA: &str = r#"{
        "type": "object",
        "properties": {
            "name": { "type": "string" },
            "times": { "type": "integer", "minimum": 1 }
        },
        "required": ["name"]
    }"#;

    #[test]
    fn register_and_validate() {
        let mut registry = SchemaRegistry::new();
        registry.register("greet", GREET_SCHEMA).unwrap();

        assert!(registry.validate("greet", &json!({"name": "ada"})).is_ok());
        assert!(matches!(
            registry.validate("greet", &json!({"name": 7})),
            Err(SchemaError::ValidationFailed { method, .. }) if method == "greet"
        ));
    }

    #[test]
    fn validation_message_lists_several_violations() {
        let mut registry = SchemaRegistry::new();
        registry.register("greet", GREET_SCHEMA).unwrap();

        let err = registry
            .validate("greet", &json!({"name": 1, "times": 0}))
            .unwrap_err();
        let SchemaError::ValidationFailed { message, .. } = err else {
            panic!("expected validation failure");
        };
        assert!(message.contains("; "), "message was: {message}");
    }

    #[test]
    fn methods_validate_independently() {
        let registry = SchemaRegistry::from_embedded(&[
            ("greet", GREET_SCHEMA),
            ("sum", r#"{"type":"array","items":{"type":"number"}}"#),
        ])
        .unwrap();

        assert!(registry.validate("sum", &json!([1, 2.5])).is_ok());
        assert!(registry.validate("sum", &json!([1, "2"])).is_err());
        assert!(registry.validate("greet", &json!([1, 2])).is_err());
        assert_eq!(registry.methods(), vec!["greet", "sum"]);
    }

    #[test]
    fn missing_schema_permissive_passes() {
        let registry = SchemaRegistry::new();
        assert!(registry.validate("anything", &json!(null)).is_ok());
        assert!(!registry.has_schema("anything"));
    }

    #[test]
    fn missing_schema_strict_fails() {
        let registry = SchemaRegistry::with_config(RegistryConfig {
            fail_on_missing_schema: true,
            ..RegistryConfig::default()
        });

        assert!(matches!(
            registry.validate("ping", &json!({})),
            Err(SchemaError::NoSchema(method)) if method == "ping"
        ));
    }

    #[test]
    fn strict_mode_rejects_undeclared_properties() {
        let mut permissive = SchemaRegistry::new();
        permissive.register("greet", GREET_SCHEMA).unwrap();

        let mut strict = SchemaRegistry::with_config(RegistryConfig {
            strict_mode: true,
            ..RegistryConfig::default()
        });
        strict.register("greet", GREET_SCHEMA).unwrap();

        let params = json!({"name": "ada", "extra": true});
        assert!(permissive.validate("greet", &params).is_ok());
        assert!(strict.validate("greet", &params).is_err());
    }

    #[test]
    fn strict_mode_reaches_nested_and_combined_schemas() {
        let mut schema = json!({
            "properties": {
                "inner": { "type": "object", "properties": { "v": { "type": "integer" } } }
            },
            "anyOf": [ { "type": "object", "required": ["inner"] } ],
            "additionalProperties": true
        });
        close_object_schemas(&mut schema);

        assert_eq!(schema["additionalProperties"], json!(true));
        assert_eq!(
            schema["properties"]["inner"]["additionalProperties"],
            json!(false)
        );
        assert_eq!(schema["anyOf"][0]["additionalProperties"], json!(false));
        assert!(schema["properties"]["inner"]["properties"]["v"]
            .get("additionalProperties")
            .is_none());
    }

    #[test]
    fn invalid_schema_fails_compile() {
        let mut registry = SchemaRegistry::new();
        let result = registry.register("bad", r#"{"type":"definitely-not-a-type"}"#);
        assert!(matches!(result, Err(SchemaError::CompileFailed(_))));
    }

    #[test]
    fn non_json_schema_text_fails() {
        let mut registry = SchemaRegistry::new();
        assert!(matches!(
            registry.register("bad", "not json"),
            Err(SchemaError::InvalidJson(_))
        ));
    }

    fn make_temp_schema_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "linewire-schema-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_schema(dir: &Path, file_name: &str, contents: &str) {
        std::fs::write(dir.join(file_name), contents.as_bytes()).unwrap();
    }

    #[test]
    fn from_directory_loads_method_files() {
        let dir = make_temp_schema_dir("from-directory");
        write_schema(&dir, "greet.schema.json", GREET_SCHEMA);
        write_schema(&dir, "files.list.schema.json", r#"{"type":"object"}"#);
        write_schema(&dir, "notes.json", GREET_SCHEMA);

        let registry = SchemaRegistry::from_directory(&dir).unwrap();
        assert_eq!(registry.methods(), vec!["files.list", "greet"]);
        assert!(registry.validate("greet", &json!({"name": "x"})).is_ok());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_directory_fails() {
        let dir = make_temp_schema_dir("missing").join("nope");
        assert!(matches!(
            SchemaRegistry::from_directory(&dir),
            Err(SchemaError::LoadFailed(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_schema_is_rejected() {
        let dir = make_temp_schema_dir("symlink-schema");
        let target = dir.join("target.json");
        std::fs::write(&target, GREET_SCHEMA.as_bytes()).unwrap();
        std::os::unix::fs::symlink(&target, dir.join("greet.schema.json")).unwrap();

        let result = SchemaRegistry::from_directory(&dir);
        assert!(matches!(result, Err(SchemaError::LoadFailed(_))));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn schema_count_limit_is_enforced() {
        let dir = make_temp_schema_dir("count-limit");
        write_schema(&dir, "a.schema.json", GREET_SCHEMA);
        write_schema(&dir, "b.schema.json", GREET_SCHEMA);

        let config = RegistryConfig {
            max_schemas_from_directory: 1,
            ..RegistryConfig::default()
        };
        let result = SchemaRegistry::from_directory_with_config(&dir, config);
        assert!(matches!(result, Err(SchemaError::LoadFailed(_))));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn schema_file_size_limit_is_enforced() {
        let dir = make_temp_schema_dir("size-limit");
        write_schema(&dir, "greet.schema.json", GREET_SCHEMA);

        let config = RegistryConfig {
            max_schema_file_size: 8,
            ..RegistryConfig::default()
        };
        let result = SchemaRegistry::from_directory_with_config(&dir, config);
        assert!(matches!(result, Err(SchemaError::LoadFailed(_))));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn method_names_come_from_file_names() {
        assert_eq!(method_from_file_name("ping.schema.json"), Some("ping"));
        assert_eq!(method_from_file_name("a.b.schema.json"), Some("a.b"));
        assert_eq!(method_from_file_name(".schema.json"), None);
        assert_eq!(method_from_file_name(".hidden.schema.json"), None);
        assert_eq!(method_from_file_name("ping.json"), None);
    }
}
