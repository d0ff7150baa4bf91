//! Joiner configs: per-service schema fragment and relationship metadata used
//! by the schema merger and the remote query engine.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name(s) under which a service's entity can be queried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinerAlias {
    #[serde(with = "one_or_many")]
    pub name: Vec<String>,
    /// Default args merged into queries issued through this alias.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub args: Map<String, Value>,
}

impl JoinerAlias {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: vec![name.into()],
            args: Map::new(),
        }
    }
}

/// Edge from the owning service to `service_name`: rows of the owner carry
/// `foreign_key`, matched against `primary_key` of the target rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinerRelationship {
    pub service_name: String,
    pub primary_key: String,
    pub foreign_key: String,
    pub alias: String,
    #[serde(default)]
    pub is_list: bool,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub args: Map<String, Value>,
}

/// Relationship that this config grafts onto another service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinerExtend {
    pub service_name: String,
    pub relationship: JoinerRelationship,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default)]
    pub is_read_only_link: bool,
    #[serde(default)]
    pub is_link: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primary_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alias: Vec<JoinerAlias>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<JoinerRelationship>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extends: Vec<JoinerExtend>,
}

impl JoinerConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: Some(service_name.into()),
            ..Default::default()
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_alias(mut self, alias: JoinerAlias) -> Self {
        self.alias.push(alias);
        self
    }

    pub fn with_primary_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_relationship(mut self, rel: JoinerRelationship) -> Self {
        self.relationships.push(rel);
        self
    }

    pub fn read_only_link(mut self) -> Self {
        self.is_read_only_link = true;
        self
    }

    /// True when `entity` names this service directly or through an alias.
    pub fn answers_to(&self, entity: &str) -> bool {
        self.service_name.as_deref() == Some(entity)
            || self.alias.iter().any(|a| a.name.iter().any(|n| n == entity))
    }

    /// Default args of the alias matching `entity`, if any.
    pub fn alias_args(&self, entity: &str) -> Option<&Map<String, Value>> {
        self.alias
            .iter()
            .find(|a| a.name.iter().any(|n| n == entity))
            .map(|a| &a.args)
    }

    pub fn primary_key(&self) -> &str {
        self.primary_keys.first().map(String::as_str).unwrap_or("id")
    }
}

mod one_or_many {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    pub fn serialize<S: Serializer>(v: &[String], s: S) -> Result<S::Ok, S::Error> {
        match v {
            [one] => one.serialize(s),
            many => many.serialize(s),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        Ok(match OneOrMany::deserialize(d)? {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_snake_case_config_with_single_alias_name() {
        let cfg: JoinerConfig = serde_json::from_value(json!({
            "service_name": "cart",
            "schema": "type Cart { id: ID! }",
            "primary_keys": ["id"],
            "alias": [{ "name": "cart" }, { "name": ["carts", "basket"], "args": { "take": 5 } }],
            "relationships": [{
                "service_name": "product",
                "primary_key": "id",
                "foreign_key": "product_id",
                "alias": "product"
            }]
        }))
        .unwrap();

        assert!(cfg.answers_to("cart"));
        assert!(cfg.answers_to("basket"));
        assert!(!cfg.answers_to("product"));
        assert_eq!(cfg.alias_args("carts").unwrap()["take"], 5);
        assert!(!cfg.relationships[0].is_list);
        assert_eq!(cfg.primary_key(), "id");
    }

    #[test]
    fn single_alias_name_serializes_as_string() {
        let cfg = JoinerConfig::new("product").with_alias(JoinerAlias::new("product"));
        let v = serde_json::to_value(&cfg).unwrap();
        assert_eq!(v["alias"][0]["name"], "product");
        assert!(v.get("relationships").is_none());
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = serde_json::from_value::<JoinerConfig>(json!({ "serviceName": "x" }));
        assert!(err.is_err());
    }
}
