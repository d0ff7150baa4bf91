use chrono::Utc;
use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::config::CartConfig;
use crate::domain::error::DomainError;
use crate::domain::model::{Cart, LineItem, NewLineItem};

fn new_id(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

/// In-memory cart store.
pub struct CartService {
    carts: RwLock<IndexMap<String, Cart>>,
    default_currency_code: String,
    max_line_items: usize,
}

impl CartService {
    pub fn new(cfg: &CartConfig) -> Self {
        let carts = cfg
            .seed
            .iter()
            .cloned()
            .map(|mut cart| {
                if cart.currency_code.is_empty() {
                    cart.currency_code = cfg.default_currency_code.clone();
                }
                for item in &mut cart.items {
                    item.cart_id = cart.id.clone();
                }
                (cart.id.clone(), cart)
            })
            .collect();

        Self {
            carts: RwLock::new(carts),
            default_currency_code: cfg.default_currency_code.clone(),
            max_line_items: cfg.max_line_items,
        }
    }

    #[instrument(name = "cart.service.create_cart", skip(self))]
    pub fn create_cart(&self, email: Option<String>, currency_code: Option<String>) -> Cart {
        let cart = Cart {
            id: new_id("cart"),
            email,
            currency_code: currency_code.unwrap_or_else(|| self.default_currency_code.clone()),
            items: Vec::new(),
            created_at: Utc::now(),
        };
        self.carts.write().insert(cart.id.clone(), cart.clone());
        info!(cart_id = %cart.id, "Cart created");
        cart
    }

    pub fn retrieve(&self, id: &str) -> Result<Cart, DomainError> {
        self.carts
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| DomainError::cart_not_found(id))
    }

    pub fn list_carts(&self) -> Vec<Cart> {
        self.carts.read().values().cloned().collect()
    }

    /// Every line item across carts, in cart order.
    pub fn line_items(&self) -> Vec<LineItem> {
        self.carts
            .read()
            .values()
            .flat_map(|c| c.items.iter().cloned())
            .collect()
    }

    /// Adding a product already in the cart bumps its quantity.
    #[instrument(name = "cart.service.add_line_item", skip(self, item), fields(product_id = ?item.product_id))]
    pub fn add_line_item(&self, cart_id: &str, item: NewLineItem) -> Result<LineItem, DomainError> {
        if item.quantity == 0 {
            return Err(DomainError::InvalidQuantity { quantity: 0 });
        }

        let mut carts = self.carts.write();
        let cart = carts
            .get_mut(cart_id)
            .ok_or_else(|| DomainError::cart_not_found(cart_id))?;

        if let Some(existing) = cart
            .items
            .iter_mut()
            .find(|i| i.product_id.is_some() && i.product_id == item.product_id)
        {
            existing.quantity += item.quantity;
            debug!(line_item = %existing.id, quantity = existing.quantity, "Line item quantity increased");
            return Ok(existing.clone());
        }

        if cart.items.len() >= self.max_line_items {
            return Err(DomainError::TooManyItems {
                cart_id: cart_id.to_owned(),
                max: self.max_line_items,
            });
        }

        let line = LineItem {
            id: new_id("cali"),
            cart_id: cart_id.to_owned(),
            product_id: item.product_id,
            title: item.title,
            quantity: item.quantity,
            unit_price: item.unit_price,
        };
        cart.items.push(line.clone());
        Ok(line)
    }

    pub fn update_quantity(
        &self,
        cart_id: &str,
        item_id: &str,
        quantity: u32,
    ) -> Result<LineItem, DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity { quantity });
        }
        let mut carts = self.carts.write();
        let cart = carts
            .get_mut(cart_id)
            .ok_or_else(|| DomainError::cart_not_found(cart_id))?;
        let item = cart
            .items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| DomainError::line_item_not_found(cart_id, item_id))?;
        item.quantity = quantity;
        Ok(item.clone())
    }

    pub fn remove_line_item(&self, cart_id: &str, item_id: &str) -> Result<(), DomainError> {
        let mut carts = self.carts.write();
        let cart = carts
            .get_mut(cart_id)
            .ok_or_else(|| DomainError::cart_not_found(cart_id))?;
        let before = cart.items.len();
        cart.items.retain(|i| i.id != item_id);
        if cart.items.len() == before {
            return Err(DomainError::line_item_not_found(cart_id, item_id));
        }
        Ok(())
    }

    pub fn delete_cart(&self, id: &str) -> Result<Cart, DomainError> {
        let removed = self
            .carts
            .write()
            .shift_remove(id)
            .ok_or_else(|| DomainError::cart_not_found(id))?;
        info!(cart_id = %id, "Cart deleted");
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.carts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.carts.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shirt(quantity: u32) -> NewLineItem {
        NewLineItem {
            product_id: Some("prod_shirt".into()),
            title: "Shirt".into(),
            quantity,
            unit_price: 1500,
        }
    }

    #[test]
    fn create_and_fill_cart() {
        let svc = CartService::new(&CartConfig::default());
        let cart = svc.create_cart(Some("a@example.com".into()), None);
        assert_eq!(cart.currency_code, "usd");
        assert!(cart.id.starts_with("cart_"));

        svc.add_line_item(&cart.id, shirt(1)).unwrap();
        let bumped = svc.add_line_item(&cart.id, shirt(2)).unwrap();
        assert_eq!(bumped.quantity, 3);

        let cart = svc.retrieve(&cart.id).unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.total(), 4500);
    }

    #[test]
    fn seed_items_inherit_cart_id_and_currency() {
        let cfg: CartConfig = serde_json::from_value(serde_json::json!({
            "default_currency_code": "eur",
            "seed": [{
                "id": "cart_1",
                "items": [{ "id": "cali_1", "title": "Mug", "quantity": 2, "unit_price": 800 }]
            }]
        }))
        .unwrap();
        let svc = CartService::new(&cfg);
        let cart = svc.retrieve("cart_1").unwrap();
        assert_eq!(cart.currency_code, "eur");
        assert_eq!(svc.line_items()[0].cart_id, "cart_1");
    }

    #[test]
    fn rejects_zero_quantity_and_item_overflow() {
        let svc = CartService::new(&CartConfig {
            max_line_items: 1,
            ..Default::default()
        });
        let cart = svc.create_cart(None, Some("eur".into()));
        assert_eq!(
            svc.add_line_item(&cart.id, shirt(0)).unwrap_err(),
            DomainError::InvalidQuantity { quantity: 0 }
        );

        svc.add_line_item(&cart.id, shirt(1)).unwrap();
        let mug = NewLineItem {
            product_id: Some("prod_mug".into()),
            title: "Mug".into(),
            quantity: 1,
            unit_price: 800,
        };
        assert!(matches!(
            svc.add_line_item(&cart.id, mug),
            Err(DomainError::TooManyItems { max: 1, .. })
        ));
    }

    #[test]
    fn update_remove_and_delete() {
        let svc = CartService::new(&CartConfig::default());
        let cart = svc.create_cart(None, None);
        let line = svc.add_line_item(&cart.id, shirt(1)).unwrap();

        assert_eq!(svc.update_quantity(&cart.id, &line.id, 5).unwrap().quantity, 5);
        svc.remove_line_item(&cart.id, &line.id).unwrap();
        assert!(matches!(
            svc.remove_line_item(&cart.id, &line.id),
            Err(DomainError::LineItemNotFound { .. })
        ));

        svc.delete_cart(&cart.id).unwrap();
        assert!(svc.is_empty());
        assert_eq!(
            svc.retrieve(&cart.id).unwrap_err(),
            DomainError::cart_not_found(cart.id.clone())
        );
    }
}
