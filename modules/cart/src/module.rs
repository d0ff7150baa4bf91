use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use modkit::query::filter;
use modkit::{
    BootstrapRegistration, BootstrapRequest, DbHandle, JoinerAlias, JoinerConfig, ListRequest,
    ModuleBootstrap, ModuleService,
};
use serde_json::{json, Value};
use tracing::info;

use crate::config::CartConfig;
use crate::domain::{Cart, CartService, DomainError, LineItem};

pub const CART_PACKAGE: &str = "@commerce/cart";
pub const SERVICE_NAME: &str = "cart";

const SCHEMA: &str = r#"
type Cart {
  id: ID!
  email: String
  currency_code: String!
  total: Int!
  created_at: String!
  items: [LineItem!]!
}

type LineItem {
  id: ID!
  cart_id: String!
  product_id: String
  title: String!
  quantity: Int!
  unit_price: Int!
  subtotal: Int!
}
"#;

/// Filter key selecting which entity of the module a list call reads.
const ENTITY_ARG: &str = "entity";

pub struct CartModule {
    service: Arc<CartService>,
    shared_db: Option<Arc<DbHandle>>,
}

impl CartModule {
    pub fn new(service: Arc<CartService>, shared_db: Option<Arc<DbHandle>>) -> Self {
        Self { service, shared_db }
    }

    pub fn service(&self) -> &Arc<CartService> {
        &self.service
    }

    pub fn shared_db(&self) -> Option<&Arc<DbHandle>> {
        self.shared_db.as_ref()
    }
}

fn entity_alias(names: &[&str], entity: &str) -> JoinerAlias {
    JoinerAlias {
        name: names.iter().map(|n| (*n).to_owned()).collect(),
        args: [(ENTITY_ARG.to_owned(), Value::from(entity))]
            .into_iter()
            .collect(),
    }
}

fn item_row(item: &LineItem) -> Value {
    json!({
        "id": item.id,
        "cart_id": item.cart_id,
        "product_id": item.product_id,
        "title": item.title,
        "quantity": item.quantity,
        "unit_price": item.unit_price,
        "subtotal": item.subtotal(),
    })
}

fn cart_row(cart: &Cart, with_items: bool) -> Value {
    let mut row = json!({
        "id": cart.id,
        "email": cart.email,
        "currency_code": cart.currency_code,
        "total": cart.total(),
        "created_at": cart.created_at.to_rfc3339(),
    });
    if with_items {
        row["items"] = Value::Array(cart.items.iter().map(item_row).collect());
    }
    row
}

#[async_trait]
impl ModuleService for CartModule {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn joiner_config(&self) -> Option<JoinerConfig> {
        Some(
            JoinerConfig::new(SERVICE_NAME)
                .with_schema(SCHEMA)
                .with_primary_keys(["id"])
                .with_alias(entity_alias(&["cart", "carts"], "Cart"))
                .with_alias(entity_alias(&["line_item", "line_items"], "LineItem")),
        )
    }

    async fn list(&self, request: &ListRequest) -> anyhow::Result<Vec<Value>> {
        let mut request = request.clone();
        let entity = match request.filters.remove(ENTITY_ARG) {
            Some(Value::String(e)) => e,
            Some(other) => other.to_string(),
            None => "Cart".to_owned(),
        };

        let rows: Vec<Value> = match entity.as_str() {
            "Cart" => {
                let with_items = request.relations.iter().any(|r| r == "items");
                self.service
                    .list_carts()
                    .iter()
                    .map(|c| cart_row(c, with_items))
                    .collect()
            }
            "LineItem" => self.service.line_items().iter().map(item_row).collect(),
            _ => return Err(DomainError::UnknownEntity { entity }.into()),
        };
        Ok(filter::apply(rows, &request))
    }

    async fn stop(&self) -> anyhow::Result<()> {
        info!(carts = self.service.len(), "Cart module stopped");
        Ok(())
    }
}

async fn bootstrap(req: BootstrapRequest) -> anyhow::Result<Arc<dyn ModuleService>> {
    let cfg: CartConfig = req
        .options()
        .with_context(|| format!("invalid options for module '{}'", req.module_name))?;
    let shared_db = req.shared_connection();

    info!(
        module = %req.module_name,
        path = %req.path,
        seeded = cfg.seed.len(),
        shared_db = shared_db.is_some(),
        "Cart module bootstrapped"
    );

    Ok(Arc::new(CartModule::new(
        Arc::new(CartService::new(&cfg)),
        shared_db,
    )))
}

fn factory() -> Arc<dyn ModuleBootstrap> {
    Arc::new(bootstrap)
}

inventory::submit! {
    BootstrapRegistration { path: CART_PACKAGE, factory }
}
