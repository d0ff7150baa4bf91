use async_graphql::parser::parse_query;
use async_graphql::parser::types::{
    DocumentOperations, ExecutableDocument, Selection, SelectionSet,
};
use async_graphql::{Name, Value as ConstValue};
use serde_json::{Map, Value};

use super::{QueryError, QueryNode, RemoteJoinerQuery};

const FIELDS_KEY: &str = "fields";
const ARGS_KEY: &str = "__args";

/// Variables fill root args that the query does not set itself.
pub(super) fn fill_root_args(node: &mut QueryNode, variables: &Map<String, Value>) {
    for (k, v) in variables {
        node.args.entry(k.clone()).or_insert_with(|| v.clone());
    }
}

pub(super) fn from_structured(q: RemoteJoinerQuery) -> Result<QueryNode, QueryError> {
    let entity = q
        .alias
        .or(q.service)
        .ok_or_else(|| QueryError::Invalid("structured query needs `alias` or `service`".into()))?;
    let mut root = QueryNode {
        entity,
        fields: q.fields,
        args: q.args,
        ..Default::default()
    };
    for expand in q.expands {
        let child = root.child_at(&expand.property);
        child.fields.extend(expand.fields);
        child.args.extend(expand.args);
    }
    Ok(root)
}

fn object_node(entity: &str, body: &Value) -> Result<QueryNode, QueryError> {
    let mut node = QueryNode::new(entity);
    let Value::Object(map) = body else {
        return if body == &Value::Bool(true) {
            Ok(node)
        } else {
            Err(QueryError::Invalid(format!("`{entity}` must be an object")))
        };
    };
    for (key, value) in map {
        match (key.as_str(), value) {
            (FIELDS_KEY, Value::Array(items)) => {
                for item in items {
                    let field = item.as_str().ok_or_else(|| {
                        QueryError::Invalid(format!("`{entity}.fields` must list strings"))
                    })?;
                    node.fields.push(field.to_owned());
                }
            }
            (ARGS_KEY, Value::Object(args)) => node.args = args.clone(),
            (FIELDS_KEY | ARGS_KEY, _) => {
                return Err(QueryError::Invalid(format!("malformed `{entity}.{key}`")))
            }
            (_, Value::Bool(true)) => node.fields.push(key.clone()),
            (_, Value::Object(_)) => {
                node.children.insert(key.clone(), object_node(key, value)?);
            }
            _ => {
                return Err(QueryError::Invalid(format!(
                    "unsupported selection `{entity}.{key}`"
                )))
            }
        }
    }
    Ok(node)
}

/// `{ entity: { fields, __args, relation: {...} } }`
pub(super) fn from_object(value: &Value) -> Result<QueryNode, QueryError> {
    let map = value
        .as_object()
        .ok_or_else(|| QueryError::Invalid("object query must be a map".into()))?;
    let mut roots = map.iter();
    match (roots.next(), roots.next()) {
        (Some((entity, body)), None) => object_node(entity, body),
        _ => Err(QueryError::Invalid(
            "object query must have exactly one root entity".into(),
        )),
    }
}

struct GraphqlCtx<'a> {
    doc: &'a ExecutableDocument,
    variables: &'a Map<String, Value>,
}

impl GraphqlCtx<'_> {
    fn resolve_var(&self, name: Name) -> Result<ConstValue, QueryError> {
        let value = self
            .variables
            .get(name.as_str())
            .ok_or_else(|| QueryError::MissingVariable(name.to_string()))?;
        ConstValue::from_json(value.clone()).map_err(|e| QueryError::Parse(e.to_string()))
    }

    fn collect(&self, set: &SelectionSet, node: &mut QueryNode) -> Result<(), QueryError> {
        for item in &set.items {
            match &item.node {
                Selection::Field(field) => {
                    let field = &field.node;
                    let name = field.name.node.to_string();
                    if field.selection_set.node.items.is_empty() && field.arguments.is_empty() {
                        if !node.fields.contains(&name) {
                            node.fields.push(name);
                        }
                        continue;
                    }
                    let mut child = node
                        .children
                        .shift_remove(&name)
                        .unwrap_or_else(|| QueryNode::new(&name));
                    for (arg, value) in &field.arguments {
                        let value = value
                            .node
                            .clone()
                            .into_const_with(|var| self.resolve_var(var))?
                            .into_json()
                            .map_err(|e| QueryError::Parse(e.to_string()))?;
                        child.args.insert(arg.node.to_string(), value);
                    }
                    self.collect(&field.selection_set.node, &mut child)?;
                    node.children.insert(name, child);
                }
                Selection::FragmentSpread(spread) => {
                    let name = &spread.node.fragment_name.node;
                    let fragment = self.doc.fragments.get(name).ok_or_else(|| {
                        QueryError::Invalid(format!("unknown fragment `{name}`"))
                    })?;
                    self.collect(&fragment.node.selection_set.node, node)?;
                }
                Selection::InlineFragment(inline) => {
                    self.collect(&inline.node.selection_set.node, node)?;
                }
            }
        }
        Ok(())
    }
}

pub(super) fn from_graphql(
    source: &str,
    variables: &Map<String, Value>,
) -> Result<QueryNode, QueryError> {
    let doc = parse_query(source).map_err(|e| QueryError::Parse(e.to_string()))?;
    let operation = match &doc.operations {
        DocumentOperations::Single(op) => op,
        DocumentOperations::Multiple(ops) if ops.len() == 1 => ops
            .values()
            .next()
            .ok_or_else(|| QueryError::Invalid("empty document".into()))?,
        DocumentOperations::Multiple(_) => {
            return Err(QueryError::Invalid(
                "documents with several operations are not supported".into(),
            ))
        }
    };

    let ctx = GraphqlCtx {
        doc: &doc,
        variables,
    };
    let mut holder = QueryNode::default();
    ctx.collect(&operation.node.selection_set.node, &mut holder)?;

    if !holder.fields.is_empty() || holder.children.len() != 1 {
        return Err(QueryError::Invalid(
            "query must select exactly one root entity with a selection set".into(),
        ));
    }
    holder
        .children
        .into_iter()
        .next()
        .map(|(_, root)| root)
        .ok_or_else(|| QueryError::Invalid("empty query".into()))
}
