use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use modkit::query::filter;
use modkit::{
    BootstrapRegistration, BootstrapRequest, DbHandle, JoinerAlias, JoinerConfig, ListRequest,
    ModuleBootstrap, ModuleService,
};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::config::ProductConfig;
use crate::domain::{DomainError, Product, ProductService, ProductVariant};

pub const PRODUCT_PACKAGE: &str = "@commerce/product";
pub const SERVICE_NAME: &str = "product";

const SCHEMA: &str = r#"
enum ProductStatus {
  draft
  published
}

type Product {
  id: ID!
  title: String!
  handle: String!
  description: String
  status: ProductStatus!
  created_at: String!
  variants: [ProductVariant!]!
}

type ProductVariant {
  id: ID!
  product_id: String!
  sku: String!
  title: String!
  price: Int!
}
"#;

const ENTITY_ARG: &str = "entity";

pub struct ProductModule {
    service: Arc<ProductService>,
    shared_db: Option<Arc<DbHandle>>,
}

impl ProductModule {
    pub fn new(service: Arc<ProductService>, shared_db: Option<Arc<DbHandle>>) -> Self {
        Self { service, shared_db }
    }

    pub fn service(&self) -> &Arc<ProductService> {
        &self.service
    }

    pub fn shared_db(&self) -> Option<&Arc<DbHandle>> {
        self.shared_db.as_ref()
    }
}

fn variant_row(v: &ProductVariant) -> Value {
    json!({
        "id": v.id,
        "product_id": v.product_id,
        "sku": v.sku,
        "title": v.title,
        "price": v.price,
    })
}

fn product_row(p: &Product, with_variants: bool) -> Value {
    let mut row = json!({
        "id": p.id,
        "title": p.title,
        "handle": p.handle,
        "description": p.description,
        "status": p.status,
        "created_at": p.created_at.to_rfc3339(),
    });
    if with_variants {
        row["variants"] = Value::Array(p.variants.iter().map(variant_row).collect());
    }
    row
}

#[async_trait]
impl ModuleService for ProductModule {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn joiner_config(&self) -> Option<JoinerConfig> {
        let entity = |name: &str| -> Map<String, Value> {
            [(ENTITY_ARG.to_owned(), Value::from(name))].into_iter().collect()
        };
        Some(
            JoinerConfig::new(SERVICE_NAME)
                .with_schema(SCHEMA)
                .with_primary_keys(["id"])
                .with_alias(JoinerAlias {
                    name: vec!["product".into(), "products".into()],
                    args: entity("Product"),
                })
                .with_alias(JoinerAlias {
                    name: vec!["variant".into(), "variants".into()],
                    args: entity("ProductVariant"),
                }),
        )
    }

    async fn list(&self, request: &ListRequest) -> anyhow::Result<Vec<Value>> {
        let mut request = request.clone();
        let entity = request
            .filters
            .remove(ENTITY_ARG)
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_else(|| "Product".to_owned());

        let rows: Vec<Value> = match entity.as_str() {
            "Product" => {
                let with_variants = request.relations.iter().any(|r| r == "variants");
                self.service
                    .list_products()
                    .iter()
                    .map(|p| product_row(p, with_variants))
                    .collect()
            }
            "ProductVariant" => self.service.variants().iter().map(variant_row).collect(),
            _ => return Err(DomainError::UnknownEntity { entity }.into()),
        };
        Ok(filter::apply(rows, &request))
    }

    async fn stop(&self) -> anyhow::Result<()> {
        info!(products = self.service.len(), "Product module stopped");
        Ok(())
    }
}

async fn bootstrap(req: BootstrapRequest) -> anyhow::Result<Arc<dyn ModuleService>> {
    let cfg: ProductConfig = req
        .options()
        .with_context(|| format!("invalid options for module '{}'", req.module_name))?;
    let shared_db = req.shared_connection();

    info!(
        module = %req.module_name,
        path = %req.path,
        seeded = cfg.seed.len(),
        shared_db = shared_db.is_some(),
        "Product module bootstrapped"
    );

    Ok(Arc::new(ProductModule::new(
        Arc::new(ProductService::new(&cfg)),
        shared_db,
    )))
}

fn factory() -> Arc<dyn ModuleBootstrap> {
    Arc::new(bootstrap)
}

inventory::submit! {
    BootstrapRegistration { path: PRODUCT_PACKAGE, factory }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewVariant;
    use modkit::{InjectedDependencies, ModuleDeclaration};

    fn request(options: Value) -> BootstrapRequest {
        BootstrapRequest {
            module_name: "product".into(),
            path: PRODUCT_PACKAGE.into(),
            declaration: ModuleDeclaration::default().with_options(options).normalized(),
            dependencies: Arc::new(InjectedDependencies::new()),
            definition: modkit::module_definition("product").cloned(),
        }
    }

    #[tokio::test]
    async fn lists_products_and_variants() {
        let svc = bootstrap(request(json!({
            "seed": [{
                "id": "prod_1",
                "title": "Coffee Mug",
                "status": "published",
                "variants": [{ "id": "variant_1", "sku": "MUG-1", "title": "Default", "price": 800 }]
            }]
        })))
        .await
        .unwrap();

        let products = svc
            .list(&ListRequest {
                fields: vec!["handle".into(), "status".into()],
                relations: vec!["variants".into()],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(
            products,
            vec![json!({
                "handle": "coffee-mug",
                "status": "published",
                "variants": [{ "id": "variant_1", "product_id": "prod_1", "sku": "MUG-1", "title": "Default", "price": 800 }]
            })]
        );

        let variants = svc
            .list(&ListRequest::default().filter("entity", "ProductVariant").filter("sku", "MUG-1"))
            .await
            .unwrap();
        assert_eq!(variants[0]["price"], 800);
    }

    #[tokio::test]
    async fn runtime_changes_show_up_in_list() {
        let svc = bootstrap(request(Value::Null)).await.unwrap();
        let module = svc.as_any().downcast_ref::<ProductModule>().unwrap();
        let p = module
            .service()
            .create_product(crate::domain::NewProduct {
                title: "Hat".into(),
                ..Default::default()
            })
            .unwrap();
        module
            .service()
            .add_variant(
                &p.id,
                NewVariant {
                    sku: "HAT".into(),
                    title: "One size".into(),
                    price: 2000,
                },
            )
            .unwrap();

        let rows = svc.list(&ListRequest::default().filter("id", p.id.as_str())).await.unwrap();
        assert_eq!(rows[0]["status"], "draft");
        assert!(rows[0].get("variants").is_none(), "variants only as a relation");
    }

    #[test]
    fn schema_fragment_is_self_contained() {
        let module = ProductModule::new(Arc::new(ProductService::new(&ProductConfig::default())), None);
        let joiner = module.joiner_config().unwrap();
        let build = modkit::schema::build_schema_from_fragments(&[(
            SERVICE_NAME.to_owned(),
            joiner.schema.unwrap_or_default(),
        )]);
        assert!(build.not_found.is_empty(), "{:?}", build.not_found);
        assert_eq!(build.schema.get("Product").unwrap().fields["status"].ty, "ProductStatus!");
    }

    #[test]
    fn registered_in_the_catalog() {
        assert!(modkit::BootstrapCatalog::discover().contains(PRODUCT_PACKAGE));
    }
}
