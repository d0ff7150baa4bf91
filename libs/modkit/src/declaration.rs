//! Module declarations and the modules config that lists them.

use crate::definitions::ModuleDefinition;
use crate::error::LoadError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleScope {
    #[default]
    Internal,
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleResources {
    Shared,
    Isolated,
}

/// Where an external-scope module is served from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExternalServer {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    #[serde(default)]
    pub keep_alive: bool,
}

/// One module entry of the modules config. Every field is optional; see
/// [`ModuleDeclaration::normalized`] for the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleDeclaration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ModuleScope>,
    /// Resolution path override; defaults to the well-known package.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolve: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ModuleResources>,
    /// Explicit definition, used instead of the well-known one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<Box<ModuleDefinition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<ExternalServer>,
    /// Free-form module options, passed through to the bootstrap.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub options: Value,
}

impl ModuleDeclaration {
    pub fn resolve(path: impl Into<String>) -> Self {
        Self {
            resolve: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = options;
        self
    }

    pub fn with_resources(mut self, resources: ModuleResources) -> Self {
        self.resources = Some(resources);
        self
    }

    pub fn external(server: ExternalServer) -> Self {
        Self {
            scope: Some(ModuleScope::External),
            server: Some(server),
            ..Default::default()
        }
    }

    /// Scope defaults to internal; internal modules without an explicit
    /// resources setting use shared resources.
    pub fn normalized(mut self) -> Self {
        let scope = *self.scope.get_or_insert(ModuleScope::Internal);
        if scope == ModuleScope::Internal && self.resources.is_none() {
            self.resources = Some(ModuleResources::Shared);
        }
        self
    }

    pub fn scope(&self) -> ModuleScope {
        self.scope.unwrap_or_default()
    }

    pub fn validate(&self, module: &str) -> Result<(), LoadError> {
        if self.scope() == ModuleScope::External && self.server.is_none() {
            return Err(LoadError::InvalidDeclaration {
                module: module.to_owned(),
                reason: "external scope requires a `server` section".to_owned(),
            });
        }
        Ok(())
    }
}

/// Ordered list of `(module name, declaration)` pairs. The same name may
/// appear more than once; each occurrence loads its own instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModulesConfig {
    entries: Vec<(String, ModuleDeclaration)>,
}

impl ModulesConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `name` with default settings (the `name: true` form).
    pub fn enable(self, name: impl Into<String>) -> Self {
        self.with(name, ModuleDeclaration::default())
    }

    pub fn with(mut self, name: impl Into<String>, declaration: ModuleDeclaration) -> Self {
        self.push(name, declaration);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, declaration: ModuleDeclaration) {
        self.entries.push((name.into(), declaration));
    }

    pub fn entries(&self) -> &[(String, ModuleDeclaration)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse either form:
    ///
    /// ```yaml
    /// # map form
    /// cart: true
    /// product: { resources: isolated }
    /// pricing: false          # disabled
    /// custom: "./modules/custom"   # resolve shorthand
    ///
    /// # list form (keeps duplicates)
    /// - cart
    /// - { name: product, resolve: "@acme/product" }
    /// ```
    pub fn from_value(value: &Value) -> Result<Self, LoadError> {
        let mut cfg = ModulesConfig::new();
        match value {
            Value::Null => {}
            Value::Object(map) => {
                for (name, entry) in map {
                    if let Some(decl) = entry_declaration(name, entry)? {
                        cfg.push(name.clone(), decl);
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    let (name, decl) = list_item(item)?;
                    cfg.push(name, decl);
                }
            }
            other => {
                return Err(LoadError::InvalidDeclaration {
                    module: "<modules>".to_owned(),
                    reason: format!("expected a map or a list, got {}", kind_of(other)),
                })
            }
        }
        Ok(cfg)
    }
}

impl TryFrom<Value> for ModulesConfig {
    type Error = LoadError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        ModulesConfig::from_value(&value)
    }
}

impl<'de> Deserialize<'de> for ModulesConfig {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        ModulesConfig::from_value(&value).map_err(serde::de::Error::custom)
    }
}

fn entry_declaration(name: &str, entry: &Value) -> Result<Option<ModuleDeclaration>, LoadError> {
    match entry {
        Value::Bool(true) | Value::Null => Ok(Some(ModuleDeclaration::default())),
        Value::Bool(false) => {
            tracing::debug!(module = name, "Module disabled in config, skipping");
            Ok(None)
        }
        Value::String(path) => Ok(Some(ModuleDeclaration::resolve(path.clone()))),
        Value::Object(_) => serde_json::from_value(entry.clone())
            .map(Some)
            .map_err(|e| LoadError::InvalidDeclaration {
                module: name.to_owned(),
                reason: e.to_string(),
            }),
        other => Err(LoadError::InvalidDeclaration {
            module: name.to_owned(),
            reason: format!("unsupported entry of type {}", kind_of(other)),
        }),
    }
}

fn list_item(item: &Value) -> Result<(String, ModuleDeclaration), LoadError> {
    match item {
        Value::String(name) => Ok((name.clone(), ModuleDeclaration::default())),
        Value::Object(map) => {
            let name = map
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| LoadError::InvalidDeclaration {
                    module: "<modules>".to_owned(),
                    reason: "list entry is missing `name`".to_owned(),
                })?
                .to_owned();
            let mut rest = map.clone();
            rest.shift_remove("name");
            let decl = serde_json::from_value(Value::Object(rest)).map_err(|e| {
                LoadError::InvalidDeclaration {
                    module: name.clone(),
                    reason: e.to_string(),
                }
            })?;
            Ok((name, decl))
        }
        other => Err(LoadError::InvalidDeclaration {
            module: "<modules>".to_owned(),
            reason: format!("unsupported list entry of type {}", kind_of(other)),
        }),
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn internal_scope_defaults_to_shared_resources() {
        let d = ModuleDeclaration::default().normalized();
        assert_eq!(d.scope, Some(ModuleScope::Internal));
        assert_eq!(d.resources, Some(ModuleResources::Shared));

        let d = ModuleDeclaration::default()
            .with_resources(ModuleResources::Isolated)
            .normalized();
        assert_eq!(d.resources, Some(ModuleResources::Isolated));
    }

    #[test]
    fn external_scope_keeps_resources_unset_and_needs_server() {
        let d = ModuleDeclaration {
            scope: Some(ModuleScope::External),
            ..Default::default()
        }
        .normalized();
        assert_eq!(d.resources, None);
        assert!(matches!(
            d.validate("remote"),
            Err(LoadError::InvalidDeclaration { module, .. }) if module == "remote"
        ));

        let ok = ModuleDeclaration::external(ExternalServer {
            kind: "http".into(),
            url: "http://inventory:9000".into(),
            keep_alive: true,
        });
        assert!(ok.normalized().validate("remote").is_ok());
    }

    #[test]
    fn map_form_keeps_order_and_skips_disabled() {
        let cfg = ModulesConfig::from_value(&json!({
            "product": { "resources": "isolated", "options": { "page_size": 5 } },
            "pricing": false,
            "cart": true,
            "custom": "./modules/custom",
        }))
        .unwrap();

        let names: Vec<_> = cfg.entries().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["product", "cart", "custom"]);
        assert_eq!(cfg.entries()[0].1.options["page_size"], 5);
        assert_eq!(
            cfg.entries()[2].1.resolve.as_deref(),
            Some("./modules/custom")
        );
    }

    #[test]
    fn list_form_keeps_duplicates() {
        let cfg = ModulesConfig::from_value(&json!([
            "cart",
            { "name": "cart", "resolve": "@acme/cart" },
        ]))
        .unwrap();
        assert_eq!(cfg.len(), 2);
        assert_eq!(cfg.entries()[1].1.resolve.as_deref(), Some("@acme/cart"));
    }

    #[test]
    fn unknown_declaration_fields_are_rejected() {
        let err = ModulesConfig::from_value(&json!({ "cart": { "reslove": "x" } })).unwrap_err();
        assert!(matches!(err, LoadError::InvalidDeclaration { module, .. } if module == "cart"));

        assert!(ModulesConfig::from_value(&json!([{ "resolve": "x" }])).is_err());
        assert!(ModulesConfig::from_value(&json!(3)).is_err());
    }

    #[test]
    fn deserializes_from_yaml() {
        let cfg: ModulesConfig = serde_yaml::from_str("cart: true\nproduct:\n  scope: internal\n").unwrap();
        assert_eq!(cfg.len(), 2);
        assert_eq!(cfg.entries()[1].1.scope, Some(ModuleScope::Internal));
    }
}
