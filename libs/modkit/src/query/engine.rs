use futures::future::{BoxFuture, FutureExt};
use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::filter::{key_of, keys_of, paginate, project};
use super::{QueryError, QueryNode, RemoteFetchData};
use crate::contracts::ListRequest;
use crate::joiner::{JoinerConfig, JoinerRelationship};

const TAKE: &str = "take";
const SKIP: &str = "skip";

/// Resolves one query tree against a set of joiner configs.
pub(super) struct JoinEngine<'a> {
    configs: &'a [JoinerConfig],
    fetcher: &'a dyn RemoteFetchData,
}

impl<'a> JoinEngine<'a> {
    pub(super) fn new(configs: &'a [JoinerConfig], fetcher: &'a dyn RemoteFetchData) -> Self {
        Self { configs, fetcher }
    }

    pub(super) async fn run(&self, root: &QueryNode) -> Result<Vec<Value>, QueryError> {
        let config = self
            .configs
            .iter()
            .find(|c| c.answers_to(&root.entity))
            .ok_or_else(|| QueryError::UnknownEntity(root.entity.clone()))?;

        let mut args = config
            .alias_args(&root.entity)
            .cloned()
            .unwrap_or_default();
        args.extend(root.args.clone());

        let rows = self.resolve(config, root, args, Vec::new()).await?;
        Ok(rows.iter().map(|row| shape(row, root)).collect())
    }

    fn config_for_service(&self, service: &str) -> Result<&'a JoinerConfig, QueryError> {
        self.configs
            .iter()
            .find(|c| c.service_name.as_deref() == Some(service))
            .ok_or_else(|| QueryError::UnknownService(service.to_owned()))
    }

    /// Relationship named `alias` on `owner`, either declared by the owner or
    /// grafted onto it through another config's `extends`.
    fn relationship(&self, owner: &'a JoinerConfig, alias: &str) -> Option<&'a JoinerRelationship> {
        if let Some(rel) = owner.relationships.iter().find(|r| r.alias == alias) {
            return Some(rel);
        }
        let owner_name = owner.service_name.as_deref()?;
        self.configs
            .iter()
            .flat_map(|c| c.extends.iter())
            .find(|e| e.service_name == owner_name && e.relationship.alias == alias)
            .map(|e| &e.relationship)
    }

    /// Fetch rows of `config` for `node`, then fetch and attach every child
    /// that maps to a relationship. `extra_fields` are kept for the caller's
    /// stitching.
    fn resolve<'s>(
        &'s self,
        config: &'a JoinerConfig,
        node: &'s QueryNode,
        mut args: Map<String, Value>,
        extra_fields: Vec<String>,
    ) -> BoxFuture<'s, Result<Vec<Value>, QueryError>> {
        async move {
            let service = config
                .service_name
                .clone()
                .ok_or_else(|| QueryError::UnknownEntity(node.entity.clone()))?;

            let take = take_count(&mut args, TAKE);
            let skip = take_count(&mut args, SKIP);

            let mut joins = Vec::new();
            let mut relations = Vec::new();
            for (name, child) in &node.children {
                match self.relationship(config, name) {
                    Some(rel) => joins.push((name, child, rel)),
                    None => relations.push(name.clone()),
                }
            }

            let mut fields = Vec::new();
            if !node.fields.is_empty() {
                let wanted = node
                    .fields
                    .iter()
                    .chain(&extra_fields)
                    .chain(joins.iter().map(|(_, _, rel)| &rel.foreign_key));
                for f in wanted {
                    if !fields.contains(f) {
                        fields.push(f.clone());
                    }
                }
            }

            let request = ListRequest {
                filters: args,
                fields,
                relations,
                take,
                skip,
            };
            tracing::trace!(%service, ?request, "Fetching rows");
            let mut rows = self
                .fetcher
                .fetch(&service, &request)
                .await
                .map_err(|source| QueryError::Fetch {
                    service: service.clone(),
                    source,
                })?;

            for (name, child, rel) in joins {
                self.join(&mut rows, name, child, rel).await?;
            }
            Ok(rows)
        }
        .boxed()
    }

    async fn join(
        &self,
        rows: &mut [Value],
        name: &str,
        child: &QueryNode,
        rel: &'a JoinerRelationship,
    ) -> Result<(), QueryError> {
        let mut keys: Vec<String> = Vec::new();
        for row in rows.iter() {
            for key in row.get(&rel.foreign_key).map(keys_of).unwrap_or_default() {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }

        let mut by_key: IndexMap<String, Vec<Value>> = IndexMap::new();
        let mut window = (None, None);
        if !keys.is_empty() {
            let target = self.config_for_service(&rel.service_name)?;
            let mut args = child.args.clone();
            args.extend(rel.args.clone());
            // Pagination applies per parent, not to the batched fetch.
            window = (take_count(&mut args, SKIP), take_count(&mut args, TAKE));
            args.insert(
                rel.primary_key.clone(),
                Value::Array(keys.into_iter().map(Value::String).collect()),
            );
            let related = self
                .resolve(target, child, args, vec![rel.primary_key.clone()])
                .await?;
            for item in related {
                for key in item.get(&rel.primary_key).map(keys_of).unwrap_or_default() {
                    by_key.entry(key).or_default().push(item.clone());
                }
            }
        }

        for row in rows.iter_mut() {
            let Value::Object(map) = row else { continue };
            let row_keys = map.get(&rel.foreign_key).map(keys_of).unwrap_or_default();
            let matches: Vec<Value> = row_keys
                .iter()
                .filter_map(|k| by_key.get(k))
                .flatten()
                .cloned()
                .collect();
            let mut matches = paginate(matches, window.0, window.1).into_iter();
            let value = if rel.is_list {
                Value::Array(matches.collect())
            } else {
                matches.next().unwrap_or(Value::Null)
            };
            map.insert(name.to_owned(), value);
        }
        Ok(())
    }
}

fn take_count(args: &mut Map<String, Value>, key: &str) -> Option<usize> {
    let value = args.remove(key)?;
    value
        .as_u64()
        .or_else(|| key_of(&value).and_then(|s| s.parse().ok()))
        .and_then(|n| usize::try_from(n).ok())
}

/// Trim a stitched row to what `node` asked for. An empty field list keeps
/// every field the service returned.
fn shape(row: &Value, node: &QueryNode) -> Value {
    let Value::Object(map) = row else {
        return row.clone();
    };
    let mut out = if node.fields.is_empty() {
        map.clone()
    } else {
        match project(row, &node.fields) {
            Value::Object(m) => m,
            _ => Map::new(),
        }
    };
    for (name, child) in &node.children {
        let value = match map.get(name) {
            Some(Value::Array(items)) => {
                Value::Array(items.iter().map(|i| shape(i, child)).collect())
            }
            Some(v) => shape(v, child),
            None => continue,
        };
        out.insert(name.clone(), value);
    }
    Value::Object(out)
}
