use chrono::Utc;
use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::ProductConfig;
use crate::domain::error::DomainError;
use crate::domain::model::{handleize, NewProduct, NewVariant, Product, ProductStatus, ProductVariant};

fn new_id(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

/// In-memory product catalog.
pub struct ProductService {
    products: RwLock<IndexMap<String, Product>>,
    publish_on_create: bool,
}

impl ProductService {
    pub fn new(cfg: &ProductConfig) -> Self {
        let products = cfg
            .seed
            .iter()
            .cloned()
            .map(|mut p| {
                if p.handle.is_empty() {
                    p.handle = handleize(&p.title);
                }
                for v in &mut p.variants {
                    v.product_id = p.id.clone();
                }
                (p.id.clone(), p)
            })
            .collect();

        Self {
            products: RwLock::new(products),
            publish_on_create: cfg.publish_on_create,
        }
    }

    #[instrument(name = "product.service.create_product", skip(self, new), fields(title = %new.title))]
    pub fn create_product(&self, new: NewProduct) -> Result<Product, DomainError> {
        if new.title.trim().is_empty() {
            return Err(DomainError::EmptyTitle);
        }
        let handle = new
            .handle
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| handleize(&new.title));

        let mut products = self.products.write();
        if products.values().any(|p| p.handle == handle) {
            return Err(DomainError::HandleAlreadyExists { handle });
        }

        let product = Product {
            id: new_id("prod"),
            title: new.title,
            handle,
            description: new.description,
            status: if self.publish_on_create {
                ProductStatus::Published
            } else {
                ProductStatus::Draft
            },
            variants: Vec::new(),
            created_at: Utc::now(),
        };
        products.insert(product.id.clone(), product.clone());
        info!(product_id = %product.id, handle = %product.handle, "Product created");
        Ok(product)
    }

    pub fn add_variant(&self, product_id: &str, new: NewVariant) -> Result<ProductVariant, DomainError> {
        let mut products = self.products.write();
        if products
            .values()
            .flat_map(|p| p.variants.iter())
            .any(|v| v.sku == new.sku)
        {
            return Err(DomainError::SkuAlreadyExists { sku: new.sku });
        }
        let product = products
            .get_mut(product_id)
            .ok_or_else(|| DomainError::product_not_found(product_id))?;

        let variant = ProductVariant {
            id: new_id("variant"),
            product_id: product_id.to_owned(),
            sku: new.sku,
            title: new.title,
            price: new.price,
        };
        product.variants.push(variant.clone());
        Ok(variant)
    }

    pub fn publish(&self, product_id: &str) -> Result<Product, DomainError> {
        let mut products = self.products.write();
        let product = products
            .get_mut(product_id)
            .ok_or_else(|| DomainError::product_not_found(product_id))?;
        product.status = ProductStatus::Published;
        Ok(product.clone())
    }

    pub fn retrieve(&self, id: &str) -> Result<Product, DomainError> {
        self.products
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| DomainError::product_not_found(id))
    }

    pub fn retrieve_by_handle(&self, handle: &str) -> Option<Product> {
        self.products
            .read()
            .values()
            .find(|p| p.handle == handle)
            .cloned()
    }

    pub fn list_products(&self) -> Vec<Product> {
        self.products.read().values().cloned().collect()
    }

    pub fn variants(&self) -> Vec<ProductVariant> {
        self.products
            .read()
            .values()
            .flat_map(|p| p.variants.iter().cloned())
            .collect()
    }

    pub fn delete_product(&self, id: &str) -> Result<Product, DomainError> {
        self.products
            .write()
            .shift_remove(id)
            .ok_or_else(|| DomainError::product_not_found(id))
    }

    pub fn len(&self) -> usize {
        self.products.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.read().is_empty()
    }
}
