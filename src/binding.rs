//! Parameter binding: mapping declared handler arguments to request facets.
//!
//! A handler declares where each of its arguments comes from — the parsed
//! body, a header, a query parameter, a path parameter — and optionally how
//! to coerce it. The binder compiles those declarations once at startup
//! (unknown sources fail here, never per request) and evaluates them per
//! matched request into the argument array the handler receives.
//!
//! Argument indices 0 and 1 are reserved for the raw request and response
//! slots unless a spec explicitly overrides them; overridden slots cause the
//! raw markers to be appended at the end so the handler still receives them.

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::Error;
use crate::request::Request;
use crate::value::{Transform, Value};

/// Where a bound argument's raw value is extracted from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    Body,
    Header,
    Headers,
    Query,
    Queries,
    Request,
    Response,
    Url,
    Urls,
}

/// Parses a source name. The empty string is the default source (`url`).
/// Anything outside the vocabulary fails fast at bind-spec construction.
impl FromStr for Source {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().trim() {
            "body" => Ok(Self::Body),
            "header" => Ok(Self::Header),
            "headers" => Ok(Self::Headers),
            "query" => Ok(Self::Query),
            "queries" => Ok(Self::Queries),
            "request" => Ok(Self::Request),
            "response" => Ok(Self::Response),
            "" | "url" => Ok(Self::Url),
            "urls" => Ok(Self::Urls),
            other => Err(Error::UnsupportedSource(other.to_owned())),
        }
    }
}

/// Instruction for extracting and transforming one handler argument.
#[derive(Clone, Debug)]
pub struct BindingSpec {
    pub(crate) index: usize,
    pub(crate) name: String,
    pub(crate) source: Source,
    pub(crate) names: Vec<String>,
    pub(crate) transform: Option<Transform>,
}

impl BindingSpec {
    /// A spec for argument `index`, named `name`, sourced from the matching
    /// path parameter by default.
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            source: Source::Url,
            names: Vec::new(),
            transform: None,
        }
    }

    pub fn source(mut self, source: Source) -> Self {
        self.source = source;
        self
    }

    /// Sets the source from its string name, failing fast on unknown names.
    pub fn source_str(mut self, source: &str) -> Result<Self, Error> {
        self.source = source.parse()?;
        Ok(self)
    }

    /// Explicit sub-key list for the multi-value sources (`headers`,
    /// `queries`, `urls`). An empty list means "all keys on the facet".
    pub fn names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Sets the transform from its tag, failing fast on unknown tags.
    pub fn transform_str(mut self, tag: &str) -> Result<Self, Error> {
        self.transform = Some(tag.parse()?);
        Ok(self)
    }

    fn apply(&self, value: Value) -> Result<Value, Error> {
        match &self.transform {
            Some(t) => t.apply(&self.name, value),
            None => Ok(value),
        }
    }
}

/// The frozen set of binding specs for one handler, validated once at
/// startup.
#[derive(Debug)]
pub(crate) struct Bindings {
    specs: Vec<BindingSpec>,
    arg_count: usize,
    request_overwritten: bool,
    response_overwritten: bool,
    has_request_import: bool,
    has_response_import: bool,
}

impl Bindings {
    /// Validates and freezes the specs: exactly one spec per index.
    pub(crate) fn freeze(mut specs: Vec<BindingSpec>) -> Result<Self, Error> {
        specs.sort_by_key(|s| s.index);
        for pair in specs.windows(2) {
            if pair[0].index == pair[1].index {
                return Err(Error::DuplicateBinding(pair[0].index));
            }
        }

        let arg_count = specs
            .iter()
            .map(|s| s.index + 1)
            .max()
            .unwrap_or(0)
            .max(2);

        Ok(Self {
            request_overwritten: specs.iter().any(|s| s.index == 0),
            response_overwritten: specs.iter().any(|s| s.index == 1),
            has_request_import: specs.iter().any(|s| s.source == Source::Request),
            has_response_import: specs.iter().any(|s| s.source == Source::Response),
            arg_count,
            specs,
        })
    }

    /// Evaluates every spec against the live request, in ascending index
    /// order, producing the handler's argument array.
    pub(crate) fn bind(&self, request: &Request) -> Result<Vec<Value>, Error> {
        let mut args = vec![Value::None; self.arg_count];
        args[0] = Value::Request;
        args[1] = Value::Response;

        for spec in &self.specs {
            args[spec.index] = self.extract(spec, request)?;
        }

        // A handler that rebinds slot 0 or 1 still receives the raw objects,
        // appended at the end, unless it imports them explicitly elsewhere.
        if self.request_overwritten && !self.has_request_import {
            args.push(Value::Request);
        }
        if self.response_overwritten && !self.has_response_import {
            args.push(Value::Response);
        }

        Ok(args)
    }

    fn extract(&self, spec: &BindingSpec, request: &Request) -> Result<Value, Error> {
        match spec.source {
            Source::Request => Ok(Value::Request),
            Source::Response => Ok(Value::Response),
            Source::Body => spec.apply(request.body_value()),
            Source::Header => {
                let name = spec.name.to_lowercase();
                let raw = request
                    .header(name.trim())
                    .map(Value::from)
                    .unwrap_or(Value::None);
                spec.apply(raw)
            }
            Source::Query => {
                let raw = request
                    .query()
                    .and_then(|q| q.get(spec.name.trim()))
                    .map(|v| Value::from(v.as_str()))
                    .unwrap_or(Value::None);
                spec.apply(raw)
            }
            Source::Url => {
                let raw = request
                    .param(spec.name.trim())
                    .map(Value::from)
                    .unwrap_or(Value::None);
                spec.apply(raw)
            }
            Source::Headers => {
                let keys = self.key_set(spec, request.headers().keys().map(|k| k.as_str()));
                let mut map = BTreeMap::new();
                for key in keys {
                    let raw = request.header(&key).map(Value::from).unwrap_or(Value::None);
                    map.insert(key, spec.apply(raw)?);
                }
                Ok(Value::Map(map))
            }
            Source::Queries => {
                let keys = match request.query() {
                    Some(q) => self.key_set(spec, q.keys().map(String::as_str)),
                    None => self.key_set(spec, std::iter::empty()),
                };
                let mut map = BTreeMap::new();
                for key in keys {
                    let raw = request
                        .query()
                        .and_then(|q| q.get(&key))
                        .map(|v| Value::from(v.as_str()))
                        .unwrap_or(Value::None);
                    map.insert(key, spec.apply(raw)?);
                }
                Ok(Value::Map(map))
            }
            Source::Urls => {
                let keys = self.key_set(spec, request.params().keys().map(String::as_str));
                let mut map = BTreeMap::new();
                for key in keys {
                    let raw = request.param(&key).map(Value::from).unwrap_or(Value::None);
                    map.insert(key, spec.apply(raw)?);
                }
                Ok(Value::Map(map))
            }
        }
    }

    /// Key set for a multi-value source: the explicit name list, or every
    /// key present on the facet. Keys are lower-cased and trimmed.
    fn key_set<'a>(
        &self,
        spec: &BindingSpec,
        facet_keys: impl Iterator<Item = &'a str>,
    ) -> Vec<String> {
        if spec.names.is_empty() {
            facet_keys.map(|k| k.to_lowercase().trim().to_owned()).collect()
        } else {
            spec.names.iter().map(|k| k.to_lowercase().trim().to_owned()).collect()
        }
    }
}
