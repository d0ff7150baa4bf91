//! Cross-module links: definitions, the optional link-modules capability and
//! the [`RemoteLink`] handle used to create and remove links at runtime.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::contracts::{ListRequest, ModuleService};
use crate::deps::InjectedDependencies;
use crate::registry::ModuleRegistry;

/// One side of a link definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkEnd {
    pub service_name: String,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    /// Column on the link row pointing at this side; `<service>_<pk>` if unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<String>,
    /// Name of this side on link rows; the service name if unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

fn default_primary_key() -> String {
    "id".to_owned()
}

impl LinkEnd {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            primary_key: default_primary_key(),
            foreign_key: None,
            alias: None,
        }
    }

    pub fn foreign_key(&self) -> String {
        self.foreign_key
            .clone()
            .unwrap_or_else(|| format!("{}_{}", self.service_name, self.primary_key))
    }

    pub fn alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.service_name)
    }
}

/// A many-to-many link between two modules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    pub left: LinkEnd,
    pub right: LinkEnd,
}

impl LinkDefinition {
    pub fn between(left: LinkEnd, right: LinkEnd) -> Self {
        Self {
            service_name: None,
            left,
            right,
        }
    }

    /// Explicit name, or `<left>_<right>_link`.
    pub fn service_name(&self) -> String {
        self.service_name.clone().unwrap_or_else(|| {
            format!("{}_{}_link", self.left.service_name, self.right.service_name)
        })
    }

    /// True when this definition joins `a` and `b`, in either order.
    pub fn joins(&self, a: &str, b: &str) -> bool {
        (self.left.service_name == a && self.right.service_name == b)
            || (self.left.service_name == b && self.right.service_name == a)
    }

    pub fn side_of(&self, module: &str) -> Option<LinkSide> {
        if self.left.service_name == module {
            Some(LinkSide::Left)
        } else if self.right.service_name == module {
            Some(LinkSide::Right)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSide {
    Left,
    Right,
}

/// A stored link service for one definition.
#[async_trait]
pub trait LinkService: Send + Sync + 'static {
    fn definition(&self) -> &LinkDefinition;

    async fn create(&self, left_id: &str, right_id: &str) -> anyhow::Result<()>;

    /// Returns whether a link was removed.
    async fn dismiss(&self, left_id: &str, right_id: &str) -> anyhow::Result<bool>;

    /// Soft-delete every link whose `side` id is in `ids`; returns the count.
    async fn soft_delete(&self, side: LinkSide, ids: &[String]) -> anyhow::Result<usize>;

    async fn restore(&self, side: LinkSide, ids: &[String]) -> anyhow::Result<usize>;

    async fn list(&self, request: &ListRequest) -> anyhow::Result<Vec<Value>>;

    /// The same service seen as a queryable module service.
    fn as_service(self: Arc<Self>) -> Arc<dyn ModuleService>;
}

/// The link-modules package.
#[async_trait]
pub trait LinkModulesInitializer: Send + Sync {
    async fn initialize(
        &self,
        definitions: &[LinkDefinition],
        registry: &ModuleRegistry,
        deps: Arc<InjectedDependencies>,
    ) -> anyhow::Result<Vec<Arc<dyn LinkService>>>;
}

/// Submitted by the crate providing link modules.
pub struct LinkModulesRegistration {
    pub name: &'static str,
    pub factory: fn() -> Arc<dyn LinkModulesInitializer>,
}

inventory::collect!(LinkModulesRegistration);

/// Whether link modules are available to this composition.
#[derive(Clone)]
pub enum LinkCapability {
    Present(Arc<dyn LinkModulesInitializer>),
    Absent,
}

impl std::fmt::Debug for LinkCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkCapability::Present(_) => f.write_str("LinkCapability::Present"),
            LinkCapability::Absent => f.write_str("LinkCapability::Absent"),
        }
    }
}

impl LinkCapability {
    /// First link-modules provider linked into the binary, if any.
    pub fn discover() -> Self {
        match ::inventory::iter::<LinkModulesRegistration>.into_iter().next() {
            Some(reg) => {
                tracing::debug!(provider = reg.name, "Discovered link modules provider");
                LinkCapability::Present((reg.factory)())
            }
            None => LinkCapability::Absent,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, LinkCapability::Present(_))
    }
}

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("no link defined between '{left}' and '{right}'")]
    NoLink { left: String, right: String },

    #[error("link service '{service}' failed")]
    Service {
        service: String,
        #[source]
        source: anyhow::Error,
    },
}

/// One end of a link to create or dismiss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRef {
    pub module: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPair {
    pub a: LinkRef,
    pub b: LinkRef,
}

impl LinkPair {
    pub fn new(a: (&str, &str), b: (&str, &str)) -> Self {
        Self {
            a: LinkRef {
                module: a.0.to_owned(),
                id: a.1.to_owned(),
            },
            b: LinkRef {
                module: b.0.to_owned(),
                id: b.1.to_owned(),
            },
        }
    }
}

/// Handle over every initialized link service.
#[derive(Clone, Default)]
pub struct RemoteLink {
    services: Vec<Arc<dyn LinkService>>,
}

impl std::fmt::Debug for RemoteLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.service_names()).finish()
    }
}

impl RemoteLink {
    pub fn new(services: Vec<Arc<dyn LinkService>>) -> Self {
        Self { services }
    }

    pub fn service_names(&self) -> Vec<String> {
        self.services
            .iter()
            .map(|s| s.definition().service_name())
            .collect()
    }

    fn route(&self, a: &str, b: &str) -> Result<&Arc<dyn LinkService>, LinkError> {
        self.services
            .iter()
            .find(|s| s.definition().joins(a, b))
            .ok_or_else(|| LinkError::NoLink {
                left: a.to_owned(),
                right: b.to_owned(),
            })
    }

    /// `(left id, right id)` of `pair` as the link service orders them.
    fn ordered<'p>(svc: &dyn LinkService, pair: &'p LinkPair) -> (&'p str, &'p str) {
        if svc.definition().left.service_name == pair.a.module {
            (&pair.a.id, &pair.b.id)
        } else {
            (&pair.b.id, &pair.a.id)
        }
    }

    fn service_error(svc: &dyn LinkService, source: anyhow::Error) -> LinkError {
        LinkError::Service {
            service: svc.definition().service_name(),
            source,
        }
    }

    /// Create one link per pair; pairs may name their modules in any order.
    pub async fn create(&self, pairs: &[LinkPair]) -> Result<usize, LinkError> {
        for pair in pairs {
            let svc = self.route(&pair.a.module, &pair.b.module)?;
            let (left, right) = Self::ordered(svc.as_ref(), pair);
            svc.create(left, right)
                .await
                .map_err(|e| Self::service_error(svc.as_ref(), e))?;
        }
        Ok(pairs.len())
    }

    /// Remove links; returns how many existed.
    pub async fn dismiss(&self, pairs: &[LinkPair]) -> Result<usize, LinkError> {
        let mut removed = 0;
        for pair in pairs {
            let svc = self.route(&pair.a.module, &pair.b.module)?;
            let (left, right) = Self::ordered(svc.as_ref(), pair);
            if svc
                .dismiss(left, right)
                .await
                .map_err(|e| Self::service_error(svc.as_ref(), e))?
            {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Cascade a soft delete of `ids` in `module` to every link touching it.
    pub async fn delete(&self, module: &str, ids: &[String]) -> Result<usize, LinkError> {
        let mut total = 0;
        for svc in &self.services {
            if let Some(side) = svc.definition().side_of(module) {
                total += svc
                    .soft_delete(side, ids)
                    .await
                    .map_err(|e| Self::service_error(svc.as_ref(), e))?;
            }
        }
        Ok(total)
    }

    /// Undo [`delete`](Self::delete).
    pub async fn restore(&self, module: &str, ids: &[String]) -> Result<usize, LinkError> {
        let mut total = 0;
        for svc in &self.services {
            if let Some(side) = svc.definition().side_of(module) {
                total += svc
                    .restore(side, ids)
                    .await
                    .map_err(|e| Self::service_error(svc.as_ref(), e))?;
            }
        }
        Ok(total)
    }

    /// Active links between `a` and `b`.
    pub async fn list(
        &self,
        a: &str,
        b: &str,
        request: &ListRequest,
    ) -> Result<Vec<Value>, LinkError> {
        let svc = self.route(a, b)?;
        svc.list(request)
            .await
            .map_err(|e| Self::service_error(svc.as_ref(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_end_defaults() {
        let end = LinkEnd::new("cart");
        assert_eq!(end.primary_key, "id");
        assert_eq!(end.foreign_key(), "cart_id");
        assert_eq!(end.alias(), "cart");
    }

    #[test]
    fn definition_names_and_sides() {
        let def: LinkDefinition = serde_json::from_value(serde_json::json!({
            "left": { "service_name": "cart" },
            "right": { "service_name": "product", "foreign_key": "variant_id", "alias": "variant" }
        }))
        .unwrap();
        assert_eq!(def.service_name(), "cart_product_link");
        assert!(def.joins("product", "cart"));
        assert_eq!(def.side_of("product"), Some(LinkSide::Right));
        assert_eq!(def.side_of("pricing"), None);
        assert_eq!(def.right.foreign_key(), "variant_id");
    }

    #[tokio::test]
    async fn unknown_pairs_are_rejected() {
        let link = RemoteLink::default();
        let err = link
            .create(&[LinkPair::new(("cart", "c1"), ("pricing", "p1"))])
            .await
            .unwrap_err();
        assert!(matches!(err, LinkError::NoLink { .. }));
        assert_eq!(link.delete("cart", &["c1".into()]).await.unwrap(), 0);
    }
}
