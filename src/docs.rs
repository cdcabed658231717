//! API documentation registry.
//!
//! Routes may carry a documentation fragment; the registrar collects them
//! into one document keyed by path, then by lowercase verb. Paths and verbs
//! are kept sorted so the rendered document is stable across builds, and
//! registering a second fragment for the same verb and path is a startup
//! error rather than a silent overwrite.

use std::collections::BTreeMap;

use crate::error::Error;
use crate::method::Method;

/// The aggregated documentation for every registered route.
#[derive(Default)]
pub struct ApiDocument {
    paths: BTreeMap<String, BTreeMap<&'static str, serde_json::Value>>,
}

impl ApiDocument {
    /// Registers a route's fragment under its documentation path.
    pub(crate) fn register(
        &mut self,
        method: Method,
        route_path: &str,
        fragment: serde_json::Value,
    ) -> Result<(), Error> {
        let doc_path = to_doc_path(route_path);
        let operations = self.paths.entry(doc_path.clone()).or_default();

        if operations.contains_key(method.doc_key()) {
            return Err(Error::DuplicateDocumentation { method, path: doc_path });
        }
        operations.insert(method.doc_key(), fragment);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Renders the document as an OpenAPI 3 skeleton.
    pub fn to_json(&self) -> serde_json::Value {
        let mut paths = serde_json::Map::new();
        for (path, operations) in &self.paths {
            let mut by_verb = serde_json::Map::new();
            for (verb, fragment) in operations {
                by_verb.insert((*verb).to_owned(), fragment.clone());
            }
            paths.insert(path.clone(), serde_json::Value::Object(by_verb));
        }

        serde_json::json!({
            "openapi": "3.0.3",
            "paths": paths,
        })
    }
}

/// Rewrites `:name` route parameters into the `{name}` documentation form.
fn to_doc_path(route_path: &str) -> String {
    let segments: Vec<String> = route_path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| match s.strip_prefix(':') {
            Some(name) => format!("{{{name}}}"),
            None => s.to_owned(),
        })
        .collect();

    if segments.is_empty() {
        "/".to_owned()
    } else {
        format!("/{}", segments.join("/"))
    }
}
