use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use modkit::query::filter;
use modkit::{
    JoinerConfig, JoinerExtend, JoinerRelationship, LinkDefinition, LinkEnd, LinkService,
    LinkSide, ListRequest, ModuleService,
};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::domain::model::{type_name, LinkRow};

/// Link store for one definition, keyed by `(left id, right id)`.
pub struct InMemoryLink {
    definition: LinkDefinition,
    service_name: String,
    rows: RwLock<IndexMap<(String, String), LinkRow>>,
}

impl InMemoryLink {
    pub fn new(definition: LinkDefinition) -> Self {
        let service_name = definition.service_name();
        Self {
            definition,
            service_name,
            rows: RwLock::new(IndexMap::new()),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Active rows matching `request`.
    fn active_rows(&self, request: &ListRequest) -> Vec<Value> {
        let rows: Vec<Value> = self
            .rows
            .read()
            .values()
            .filter(|r| r.is_active())
            .map(|r| r.to_value(&self.definition))
            .collect();
        filter::apply(rows, request)
    }

    /// Set or clear `deleted_at` on rows whose `side` id is in `ids`.
    fn mark(&self, side: LinkSide, ids: &[String], deleted: bool) -> usize {
        let now = Utc::now();
        let mut changed = 0;
        for row in self.rows.write().values_mut() {
            if row.is_active() != deleted || !ids.iter().any(|id| id == row.side_id(side)) {
                continue;
            }
            row.deleted_at = deleted.then_some(now);
            changed += 1;
        }
        changed
    }

    fn schema(&self) -> String {
        let def = &self.definition;
        let link_type = type_name(&self.service_name);
        let left_type = type_name(&def.left.service_name);
        let right_type = type_name(&def.right.service_name);

        let mut sdl = String::new();
        let _ = writeln!(sdl, "type {link_type} {{");
        let _ = writeln!(sdl, "  id: ID!");
        let _ = writeln!(sdl, "  {}: String!", def.left.foreign_key());
        let _ = writeln!(sdl, "  {}: String!", def.right.foreign_key());
        let _ = writeln!(sdl, "  created_at: String!");
        let _ = writeln!(sdl, "  deleted_at: String");
        let _ = writeln!(sdl, "  {}: {left_type}", def.left.alias());
        let _ = writeln!(sdl, "  {}: {right_type}", def.right.alias());
        let _ = writeln!(sdl, "}}");
        let _ = writeln!(
            sdl,
            "extend type {left_type} {{ {}_link: [{link_type}] }}",
            def.right.alias()
        );
        let _ = writeln!(
            sdl,
            "extend type {right_type} {{ {}_link: [{link_type}] }}",
            def.left.alias()
        );
        sdl
    }

    /// Link row → side record.
    fn to_side(end: &LinkEnd) -> JoinerRelationship {
        JoinerRelationship {
            service_name: end.service_name.clone(),
            primary_key: end.primary_key.clone(),
            foreign_key: end.foreign_key(),
            alias: end.alias().to_owned(),
            is_list: false,
            args: Default::default(),
        }
    }

    /// Side record → its link rows, grafted onto `end`'s service.
    fn from_side(&self, end: &LinkEnd, other: &LinkEnd) -> JoinerExtend {
        JoinerExtend {
            service_name: end.service_name.clone(),
            relationship: JoinerRelationship {
                service_name: self.service_name.clone(),
                primary_key: end.foreign_key(),
                foreign_key: end.primary_key.clone(),
                alias: format!("{}_link", other.alias()),
                is_list: true,
                args: Default::default(),
            },
        }
    }

    pub fn link_joiner_config(&self) -> JoinerConfig {
        let def = &self.definition;
        let mut cfg = JoinerConfig::new(self.service_name.clone())
            .with_schema(self.schema())
            .with_primary_keys([def.left.foreign_key(), def.right.foreign_key()])
            .with_relationship(Self::to_side(&def.left))
            .with_relationship(Self::to_side(&def.right));
        cfg.is_link = true;
        cfg.extends = vec![
            self.from_side(&def.left, &def.right),
            self.from_side(&def.right, &def.left),
        ];
        cfg
    }
}

#[async_trait]
impl LinkService for InMemoryLink {
    fn definition(&self) -> &LinkDefinition {
        &self.definition
    }

    async fn create(&self, left_id: &str, right_id: &str) -> anyhow::Result<()> {
        let mut rows = self.rows.write();
        let key = (left_id.to_owned(), right_id.to_owned());
        match rows.get_mut(&key) {
            Some(row) => row.deleted_at = None,
            None => {
                rows.insert(key, LinkRow::new(left_id, right_id));
            }
        }
        debug!(link = %self.service_name, left_id, right_id, "Link created");
        Ok(())
    }

    async fn dismiss(&self, left_id: &str, right_id: &str) -> anyhow::Result<bool> {
        let key = (left_id.to_owned(), right_id.to_owned());
        let removed = self.rows.write().shift_remove(&key).is_some();
        if removed {
            debug!(link = %self.service_name, left_id, right_id, "Link dismissed");
        }
        Ok(removed)
    }

    async fn soft_delete(&self, side: LinkSide, ids: &[String]) -> anyhow::Result<usize> {
        Ok(self.mark(side, ids, true))
    }

    async fn restore(&self, side: LinkSide, ids: &[String]) -> anyhow::Result<usize> {
        Ok(self.mark(side, ids, false))
    }

    async fn list(&self, request: &ListRequest) -> anyhow::Result<Vec<Value>> {
        Ok(self.active_rows(request))
    }

    fn as_service(self: Arc<Self>) -> Arc<dyn ModuleService> {
        self
    }
}

#[async_trait]
impl ModuleService for InMemoryLink {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn joiner_config(&self) -> Option<JoinerConfig> {
        Some(self.link_joiner_config())
    }

    async fn list(&self, request: &ListRequest) -> anyhow::Result<Vec<Value>> {
        Ok(self.active_rows(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cart_product() -> Arc<InMemoryLink> {
        Arc::new(InMemoryLink::new(LinkDefinition::between(
            LinkEnd::new("cart"),
            LinkEnd::new("product"),
        )))
    }

    #[tokio::test]
    async fn create_is_idempotent_and_dismiss_removes() {
        let link = cart_product();
        link.create("c1", "p1").await.unwrap();
        link.create("c1", "p1").await.unwrap();
        link.create("c1", "p2").await.unwrap();

        let rows = LinkService::list(link.as_ref(), &ListRequest::default()).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["cart_id"], "c1");
        assert_eq!(rows[1]["product_id"], "p2");

        assert!(link.dismiss("c1", "p1").await.unwrap());
        assert!(!link.dismiss("c1", "p1").await.unwrap());
    }

    #[tokio::test]
    async fn soft_delete_hides_rows_until_restored() {
        let link = cart_product();
        link.create("c1", "p1").await.unwrap();
        link.create("c2", "p1").await.unwrap();

        assert_eq!(link.soft_delete(LinkSide::Right, &["p1".into()]).await.unwrap(), 2);
        assert_eq!(link.soft_delete(LinkSide::Right, &["p1".into()]).await.unwrap(), 0);
        let service = Arc::clone(&link).as_service();
        assert!(service.list(&ListRequest::default()).await.unwrap().is_empty());

        assert_eq!(link.restore(LinkSide::Left, &["c2".into()]).await.unwrap(), 1);
        let rows = service
            .list(&ListRequest::default().filter("cart_id", "c2"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn joiner_config_links_both_sides() {
        let cfg = cart_product().link_joiner_config();
        assert!(cfg.is_link);
        assert_eq!(cfg.service_name.as_deref(), Some("cart_product_link"));
        assert_eq!(cfg.primary_keys, ["cart_id", "product_id"]);
        assert_eq!(cfg.relationships[1].foreign_key, "product_id");

        let cart_side = &cfg.extends[0];
        assert_eq!(cart_side.service_name, "cart");
        assert_eq!(cart_side.relationship.alias, "product_link");
        assert_eq!(cart_side.relationship.primary_key, "cart_id");
        assert!(cart_side.relationship.is_list);

        let schema = cfg.schema.unwrap();
        assert!(schema.contains("type CartProductLink {"));
        assert!(schema.contains("extend type Product { cart_link: [CartProductLink] }"));
    }
}
