//! Remote query façade.
//!
//! A query names one root entity plus the fields and nested relations to
//! return. The join engine finds the service that answers for the entity,
//! fetches its rows, then follows joiner relationships (and `extends` from
//! other configs) to fetch and stitch nested data from other services.
//!
//! Three input shapes are accepted:
//!
//! ```text
//! Graphql:    query { cart(id: $id) { id items { id product { title } } } }
//! Structured: RemoteJoinerQuery { alias: "cart", fields: [...], expands: [{ property: "items.product", ... }] }
//! Object:     { "cart": { "fields": ["id"], "__args": { "id": "c1" }, "items": { "fields": ["id"] } } }
//! ```

mod engine;
mod fetch;
pub mod filter;
mod parse;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

use crate::joiner::JoinerConfig;

pub use fetch::{RemoteFetchData, ServiceFetcher};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid query: {0}")]
    Parse(String),

    #[error("invalid query: {0}")]
    Invalid(String),

    #[error("variable `${0}` is not defined")]
    MissingVariable(String),

    #[error("entity '{0}' is not served by any loaded module")]
    UnknownEntity(String),

    #[error("no joiner config for service '{0}'")]
    UnknownService(String),

    #[error("fetching from '{service}' failed")]
    Fetch {
        service: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Nested selection in a [`RemoteJoinerQuery`], addressed by a dotted path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteExpandProperty {
    pub property: String,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub args: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteJoinerQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub args: Map<String, Value>,
    #[serde(default)]
    pub expands: Vec<RemoteExpandProperty>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemoteQueryInput {
    Graphql(String),
    Structured(RemoteJoinerQuery),
    Object(Value),
}

impl From<&str> for RemoteQueryInput {
    fn from(s: &str) -> Self {
        RemoteQueryInput::Graphql(s.to_owned())
    }
}

impl From<String> for RemoteQueryInput {
    fn from(s: String) -> Self {
        RemoteQueryInput::Graphql(s)
    }
}

impl From<RemoteJoinerQuery> for RemoteQueryInput {
    fn from(q: RemoteJoinerQuery) -> Self {
        RemoteQueryInput::Structured(q)
    }
}

impl From<Value> for RemoteQueryInput {
    fn from(v: Value) -> Self {
        RemoteQueryInput::Object(v)
    }
}

/// Normalized query tree shared by every input shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryNode {
    pub entity: String,
    pub fields: Vec<String>,
    pub args: Map<String, Value>,
    pub children: IndexMap<String, QueryNode>,
}

impl QueryNode {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            ..Default::default()
        }
    }

    /// Child at `path`, created on the way down.
    fn child_at(&mut self, path: &str) -> &mut QueryNode {
        path.split('.')
            .filter(|p| !p.is_empty())
            .fold(self, |node, segment| {
                node.children
                    .entry(segment.to_owned())
                    .or_insert_with(|| QueryNode::new(segment))
            })
    }
}

/// Query entry point over a fixed set of joiner configs.
#[derive(Clone)]
pub struct RemoteQuery {
    configs: Arc<Vec<JoinerConfig>>,
    fetcher: Arc<dyn RemoteFetchData>,
}

impl std::fmt::Debug for RemoteQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let services: Vec<_> = self
            .configs
            .iter()
            .filter_map(|c| c.service_name.as_deref())
            .collect();
        f.debug_struct("RemoteQuery")
            .field("services", &services)
            .finish()
    }
}

impl RemoteQuery {
    pub fn new(services: Vec<JoinerConfig>, fetcher: Arc<dyn RemoteFetchData>) -> Self {
        Self {
            configs: Arc::new(services),
            fetcher,
        }
    }

    pub fn services(&self) -> &[JoinerConfig] {
        &self.configs
    }

    /// Parse `input` into a query tree without running it.
    pub fn parse(
        input: RemoteQueryInput,
        variables: &Map<String, Value>,
    ) -> Result<QueryNode, QueryError> {
        match input {
            RemoteQueryInput::Graphql(source) => parse::from_graphql(&source, variables),
            RemoteQueryInput::Structured(q) => {
                let mut node = parse::from_structured(q)?;
                parse::fill_root_args(&mut node, variables);
                Ok(node)
            }
            RemoteQueryInput::Object(v) => {
                let mut node = parse::from_object(&v)?;
                parse::fill_root_args(&mut node, variables);
                Ok(node)
            }
        }
    }

    /// Run a query; returns the root rows as a JSON array.
    pub async fn query(
        &self,
        input: impl Into<RemoteQueryInput>,
        variables: Option<Map<String, Value>>,
    ) -> Result<Value, QueryError> {
        let variables = variables.unwrap_or_default();
        let root = Self::parse(input.into(), &variables)?;
        tracing::debug!(entity = %root.entity, "Running remote query");
        let engine = engine::JoinEngine::new(&self.configs, self.fetcher.as_ref());
        let rows = engine.run(&root).await?;
        Ok(Value::Array(rows))
    }
}

#[cfg(test)]
mod tests;
