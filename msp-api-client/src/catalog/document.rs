//! Parsed OpenAPI document and its flattened endpoint view

use msp_mcp_shared::{MspError, Result};
use serde_json::{Map, Value};

/// Operation keys under a path item. Anything else (`parameters`,
/// `summary`, `servers`, extensions) is not an endpoint.
pub const HTTP_METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// An OpenAPI 3 or Swagger 2 document, reduced to the parts the catalog reads
#[derive(Debug, Clone)]
pub struct SchemaDocument {
    pub info: Value,
    pub servers: Value,
    pub paths: Map<String, Value>,
    pub schemas: Map<String, Value>,
}

impl SchemaDocument {
    /// Parse JSON, falling back to YAML
    pub fn parse(content: &str, origin: &str) -> Result<Self> {
        let root: Value = match serde_json::from_str(content) {
            Ok(value) => value,
            Err(json_err) => serde_yaml::from_str(content).map_err(|yaml_err| {
                MspError::SchemaLoad(format!(
                    "{origin} is neither JSON ({json_err}) nor YAML ({yaml_err})"
                ))
            })?,
        };
        Self::from_value(root, origin)
    }

    pub fn from_value(mut root: Value, origin: &str) -> Result<Self> {
        let Some(object) = root.as_object_mut() else {
            return Err(MspError::SchemaLoad(format!(
                "{origin} is not an API description object"
            )));
        };

        let paths = match object.remove("paths") {
            Some(Value::Object(paths)) => paths,
            _ => {
                return Err(MspError::SchemaLoad(format!(
                    "{origin} has no paths object"
                )))
            }
        };

        let schemas = object
            .get_mut("components")
            .and_then(|c| c.get_mut("schemas"))
            .map(Value::take)
            .or_else(|| object.remove("definitions"))
            .and_then(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .unwrap_or_default();

        let servers = match object.remove("servers") {
            Some(servers) => servers,
            None => swagger_servers(object),
        };

        Ok(Self {
            info: object.remove("info").unwrap_or(Value::Null),
            servers,
            paths,
            schemas,
        })
    }

    /// Every (path, method) pair in document order
    pub fn endpoints(&self) -> impl Iterator<Item = Endpoint<'_>> {
        self.paths.iter().flat_map(|(path, item)| {
            let path_parameters = item.get("parameters");
            item.as_object()
                .into_iter()
                .flat_map(|ops| ops.iter())
                .filter(|(key, _)| HTTP_METHODS.contains(&key.to_ascii_lowercase().as_str()))
                .filter_map(move |(method, op)| {
                    op.as_object().map(|operation| Endpoint {
                        path,
                        method,
                        operation,
                        path_parameters,
                    })
                })
        })
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints().count()
    }

    pub fn title(&self) -> Option<&str> {
        self.info.get("title").and_then(Value::as_str)
    }
}

/// Swagger 2 carries host/basePath instead of a servers list
fn swagger_servers(object: &Map<String, Value>) -> Value {
    let host = object.get("host").and_then(Value::as_str);
    let base = object.get("basePath").and_then(Value::as_str).unwrap_or("");
    match host {
        Some(host) => {
            let scheme = object
                .get("schemes")
                .and_then(|s| s.get(0))
                .and_then(Value::as_str)
                .unwrap_or("https");
            serde_json::json!([{ "url": format!("{scheme}://{host}{base}") }])
        }
        None => Value::Array(Vec::new()),
    }
}

/// One operation, borrowed from the document
#[derive(Debug, Clone, Copy)]
pub struct Endpoint<'a> {
    pub path: &'a str,
    pub method: &'a str,
    pub operation: &'a Map<String, Value>,
    path_parameters: Option<&'a Value>,
}

impl<'a> Endpoint<'a> {
    pub fn method_upper(&self) -> String {
        self.method.to_ascii_uppercase()
    }

    pub fn operation_id(&self) -> Option<&'a str> {
        self.operation.get("operationId").and_then(Value::as_str)
    }

    pub fn summary(&self) -> Option<&'a str> {
        self.operation.get("summary").and_then(Value::as_str)
    }

    pub fn description(&self) -> Option<&'a str> {
        self.operation.get("description").and_then(Value::as_str)
    }

    pub fn tags(&self) -> Vec<&'a str> {
        self.operation
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| tags.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Path-level parameters followed by operation parameters. An operation
    /// parameter replaces a path-level one with the same name and location.
    pub fn parameters(&self) -> Vec<Value> {
        let own: Vec<Value> = self
            .operation
            .get("parameters")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut merged: Vec<Value> = self
            .path_parameters
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter(|inherited| !own.iter().any(|p| same_parameter(p, inherited)))
            .cloned()
            .collect();
        merged.extend(own);
        merged
    }

    /// Lower-cased text searched by keyword queries
    pub fn search_text(&self) -> String {
        let mut text = format!("{} {}", self.path, self.method);
        for part in [self.operation_id(), self.summary(), self.description()]
            .into_iter()
            .flatten()
        {
            text.push(' ');
            text.push_str(part);
        }
        for tag in self.tags() {
            text.push(' ');
            text.push_str(tag);
        }
        text.to_lowercase()
    }

    /// Operation object with path-level parameters merged in
    pub fn rendered_operation(&self) -> Map<String, Value> {
        let mut operation = self.operation.clone();
        let parameters = self.parameters();
        if !parameters.is_empty() {
            operation.insert("parameters".to_string(), Value::Array(parameters));
        }
        operation
    }
}

fn same_parameter(a: &Value, b: &Value) -> bool {
    match (a.get("$ref"), b.get("$ref")) {
        (Some(x), Some(y)) => x == y,
        _ => a.get("name").is_some() && a.get("name") == b.get("name") && a.get("in") == b.get("in"),
    }
}
