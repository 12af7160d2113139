//! Bounded queries over a loaded [`SchemaDocument`]
//!
//! Everything here is a linear scan over the document. Results carry enough
//! counts for a caller to tell whether it saw everything.

use super::categorize::CategoryRules;
use super::document::{Endpoint, SchemaDocument};
use msp_mcp_shared::{MspError, Result};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Hard ceiling on endpoints returned by a detail query
pub const MAX_DETAIL_ENDPOINTS: usize = 50;
/// Component schemas attached to one detail response
pub const MAX_ATTACHED_SCHEMAS: usize = 20;
/// Endpoints listed in the overview
pub const OVERVIEW_SAMPLE: usize = 100;
/// Schema listings at or below this size include names without asking
pub const LIST_NAMES_THRESHOLD: usize = 20;
pub const DEFAULT_SEARCH_LIMIT: usize = 20;
pub const MAX_SEARCH_LIMIT: usize = 100;
pub const DEFAULT_SCHEMA_LIMIT: usize = 50;
pub const MAX_SCHEMA_LIMIT: usize = 500;
const MAX_SUGGESTIONS: usize = 10;

const SCHEMA_REF_PREFIXES: [&str; 2] = ["#/components/schemas/", "#/definitions/"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult<T> {
    pub matches: Vec<T>,
    pub match_count: usize,
    pub total_matches: usize,
    pub limited: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_more: Option<bool>,
}

impl<T> QueryResult<T> {
    /// First-N query without pagination
    fn capped(matches: Vec<T>, total_matches: usize) -> Self {
        Self {
            match_count: matches.len(),
            limited: total_matches > matches.len(),
            matches,
            total_matches,
            has_more: None,
        }
    }

    /// Page taken after skipping `skip` matches
    fn paged(matches: Vec<T>, total_matches: usize, skip: usize) -> Self {
        let has_more = skip + matches.len() < total_matches;
        Self {
            match_count: matches.len(),
            limited: has_more,
            matches,
            total_matches,
            has_more: Some(has_more),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSummary {
    pub path: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub category: String,
}

impl EndpointSummary {
    fn from_endpoint(endpoint: &Endpoint<'_>, rules: &CategoryRules) -> Self {
        Self {
            path: endpoint.path.to_string(),
            method: endpoint.method_upper(),
            operation_id: endpoint.operation_id().map(str::to_string),
            summary: endpoint.summary().map(str::to_string),
            tags: endpoint.tags().into_iter().map(str::to_string).collect(),
            category: rules.categorize(endpoint.path).to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub info: Value,
    pub servers: Value,
    pub total_endpoints: usize,
    pub total_paths: usize,
    pub total_schemas: usize,
    pub categories: Vec<String>,
    pub paths_by_category: BTreeMap<String, Vec<String>>,
    pub endpoints: QueryResult<EndpointSummary>,
}

pub fn overview(doc: &SchemaDocument, rules: &CategoryRules) -> Overview {
    let mut paths_by_category: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for path in doc.paths.keys() {
        paths_by_category
            .entry(rules.categorize(path).to_string())
            .or_default()
            .push(path.clone());
    }

    let total_endpoints = doc.endpoint_count();
    let sample = doc
        .endpoints()
        .take(OVERVIEW_SAMPLE)
        .map(|e| EndpointSummary::from_endpoint(&e, rules))
        .collect();

    Overview {
        info: json!({
            "title": doc.info.get("title").cloned().unwrap_or(Value::Null),
            "version": doc.info.get("version").cloned().unwrap_or(Value::Null),
        }),
        servers: doc.servers.clone(),
        total_endpoints,
        total_paths: doc.paths.len(),
        total_schemas: doc.schemas.len(),
        categories: paths_by_category.keys().cloned().collect(),
        paths_by_category,
        endpoints: QueryResult::capped(sample, total_endpoints),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DetailOptions {
    pub include_schemas: bool,
    pub include_examples: bool,
    pub summary_only: bool,
    pub max_endpoints: usize,
}

impl Default for DetailOptions {
    fn default() -> Self {
        Self {
            include_schemas: true,
            include_examples: false,
            summary_only: false,
            max_endpoints: 10,
        }
    }
}

impl DetailOptions {
    pub fn effective_limit(&self) -> usize {
        self.max_endpoints.min(MAX_DETAIL_ENDPOINTS)
    }

    /// Options that cannot change the result are reset, for cache keys
    pub fn normalized(self) -> Self {
        let max_endpoints = self.effective_limit();
        if self.summary_only {
            Self {
                summary_only: true,
                max_endpoints,
                ..Self::default()
            }
        } else {
            Self {
                max_endpoints,
                ..self
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDetails {
    #[serde(flatten)]
    pub result: QueryResult<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schemas: Option<Map<String, Value>>,
    /// Distinct schemas referenced by the returned operations, before the cap
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referenced_schemas: Option<usize>,
}

pub fn endpoint_details(
    doc: &SchemaDocument,
    path_pattern: &str,
    options: DetailOptions,
) -> EndpointDetails {
    let needle = path_pattern.to_lowercase();
    let limit = options.effective_limit();
    let mut total = 0;
    let mut matches = Vec::new();

    for (path, item) in &doc.paths {
        if !path.to_lowercase().contains(&needle) {
            continue;
        }
        total += 1;
        if matches.len() < limit {
            matches.push(render_path(doc, path, item, options));
        }
    }

    let mut details = EndpointDetails {
        result: QueryResult::capped(matches, total),
        schemas: None,
        referenced_schemas: None,
    };

    if options.include_schemas && !options.summary_only && !details.result.matches.is_empty() {
        let mut refs = Vec::new();
        for rendered in &details.result.matches {
            collect_schema_refs(rendered, &mut refs);
        }
        refs.retain(|name| doc.schemas.contains_key(name));

        let mut schemas = Map::new();
        for name in refs.iter().take(MAX_ATTACHED_SCHEMAS) {
            if let Some(schema) = doc.schemas.get(name) {
                let mut schema = schema.clone();
                if !options.include_examples {
                    strip_examples(&mut schema);
                }
                schemas.insert(name.clone(), schema);
            }
        }
        details.referenced_schemas = Some(refs.len());
        details.schemas = Some(schemas);
    }

    details
}

fn render_path(doc: &SchemaDocument, path: &str, item: &Value, options: DetailOptions) -> Value {
    let endpoints: Vec<Endpoint<'_>> = doc.endpoints().filter(|e| e.path == path).collect();

    if options.summary_only {
        let methods: Vec<String> = endpoints.iter().map(Endpoint::method_upper).collect();
        let summary = endpoints
            .iter()
            .find_map(|e| e.summary().filter(|s| !s.is_empty()))
            .or_else(|| item.get("summary").and_then(Value::as_str));
        return json!({ "path": path, "methods": methods, "summary": summary });
    }

    let mut operations = Map::new();
    for endpoint in &endpoints {
        let mut operation = endpoint.rendered_operation();
        if !options.include_schemas {
            for key in ["parameters", "requestBody", "responses"] {
                operation.shift_remove(key);
            }
        }
        let mut operation = Value::Object(operation);
        if !options.include_examples {
            strip_examples(&mut operation);
        }
        operations.insert(endpoint.method_upper(), operation);
    }
    json!({ "path": path, "operations": operations })
}

/// Schema names referenced directly by `value`, in first-seen order
fn collect_schema_refs(value: &Value, refs: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                let name = SCHEMA_REF_PREFIXES
                    .iter()
                    .find_map(|prefix| reference.strip_prefix(prefix));
                if let Some(name) = name {
                    if !refs.iter().any(|r| r == name) {
                        refs.push(name.to_string());
                    }
                }
            }
            for child in map.values() {
                collect_schema_refs(child, refs);
            }
        }
        Value::Array(items) => {
            for child in items {
                collect_schema_refs(child, refs);
            }
        }
        _ => {}
    }
}

/// Remove `example`/`examples` keywords. Property names under `properties`
/// are left alone.
fn strip_examples(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.shift_remove("example");
            map.shift_remove("examples");
            for (key, child) in map.iter_mut() {
                if key == "properties" {
                    if let Value::Object(properties) = child {
                        for property in properties.values_mut() {
                            strip_examples(property);
                        }
                    }
                } else {
                    strip_examples(child);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(strip_examples),
        _ => {}
    }
}

/// Lower-cased whitespace tokens of a search query
pub fn search_terms(query: &str) -> Result<Vec<String>> {
    let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
    if terms.is_empty() {
        return Err(MspError::Validation(
            "search query must contain at least one keyword".to_string(),
        ));
    }
    Ok(terms)
}

/// Endpoints containing every term, paginated in document order
pub fn search(
    doc: &SchemaDocument,
    rules: &CategoryRules,
    terms: &[String],
    limit: usize,
    skip: usize,
) -> QueryResult<EndpointSummary> {
    let limit = limit.min(MAX_SEARCH_LIMIT);
    let mut total = 0;
    let mut matches = Vec::new();

    for endpoint in doc.endpoints() {
        let text = endpoint.search_text();
        if !terms.iter().all(|term| text.contains(term.as_str())) {
            continue;
        }
        total += 1;
        if total > skip && matches.len() < limit {
            matches.push(EndpointSummary::from_endpoint(&endpoint, rules));
        }
    }

    QueryResult::paged(matches, total, skip)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaListing {
    /// When names are withheld nothing is returned, so `matchCount` is 0 and
    /// `hasMore` reports that the matches are still to be fetched.
    #[serde(flatten)]
    pub result: QueryResult<String>,
    pub names_included: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

pub fn list_schemas(
    doc: &SchemaDocument,
    pattern: Option<&str>,
    limit: usize,
    skip: usize,
    list_names: bool,
) -> SchemaListing {
    let needle = pattern.map(str::to_lowercase).unwrap_or_default();
    let limit = limit.min(MAX_SCHEMA_LIMIT);

    let matching: Vec<&String> = doc
        .schemas
        .keys()
        .filter(|name| name.to_lowercase().contains(&needle))
        .collect();
    let total = matching.len();
    let page: Vec<String> = matching
        .into_iter()
        .skip(skip)
        .take(limit)
        .cloned()
        .collect();

    let names_included = list_names || total <= LIST_NAMES_THRESHOLD;
    let (result, hint) = if names_included {
        (QueryResult::paged(page, total, skip), None)
    } else {
        (
            QueryResult::paged(Vec::new(), total, skip),
            Some(format!(
                "{total} schemas match; narrow the pattern or set list_names=true to receive names"
            )),
        )
    };

    SchemaListing {
        result,
        names_included,
        hint,
    }
}

/// One component schema by exact name
pub fn get_schema(doc: &SchemaDocument, name: &str) -> Result<Value> {
    if let Some(schema) = doc.schemas.get(name) {
        return Ok(json!({ "name": name, "schema": schema }));
    }

    let needle = name.to_lowercase();
    let suggestions: Vec<&str> = doc
        .schemas
        .keys()
        .filter(|candidate| candidate.to_lowercase().contains(&needle))
        .take(MAX_SUGGESTIONS)
        .map(String::as_str)
        .collect();

    let message = if suggestions.is_empty() {
        format!("schema '{name}' not found")
    } else {
        format!(
            "schema '{name}' not found; did you mean: {}",
            suggestions.join(", ")
        )
    };
    Err(MspError::NotFound(message))
}
