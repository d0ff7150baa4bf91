//! Cart and product composed with the link-modules capability discovered
//! from the binary.

use cart as _;
use link_modules as _;
use product as _;

use modkit::{compose, AppOptions, ComposedApp, LinkPair, ModulesConfig};
use serde_json::{json, Value};

async fn composed() -> ComposedApp {
    let modules = json!({
        "cart": {
            "resources": "isolated",
            "options": { "seed": [{ "id": "cart_1" }, { "id": "cart_2" }] }
        },
        "product": {
            "resources": "isolated",
            "options": {
                "seed": [
                    { "id": "prod_1", "title": "Coffee Mug" },
                    { "id": "prod_2", "title": "Summer Shirt" }
                ]
            }
        }
    });
    compose(AppOptions::new(ModulesConfig::from_value(&modules).unwrap()))
        .await
        .unwrap()
}

fn titles(cart: &Value) -> Vec<String> {
    cart["product_link"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["product"]["title"].as_str().unwrap_or_default().to_owned())
        .collect()
}

#[tokio::test]
async fn builtin_cart_product_link_is_queryable() {
    let app = composed().await;
    let link = app.link.clone().expect("link modules are linked into this binary");
    assert_eq!(link.service_names(), ["cart_product_link"]);

    link.create(&[
        LinkPair::new(("cart", "cart_1"), ("product", "prod_1")),
        LinkPair::new(("product", "prod_2"), ("cart", "cart_1")),
    ])
    .await
    .unwrap();

    let rows = app
        .query(
            r#"{ cart(id: "cart_1") { id product_link { product { title } } } }"#,
            None,
        )
        .await
        .unwrap();
    assert_eq!(titles(&rows[0]), ["Coffee Mug", "Summer Shirt"]);

    let rows = app
        .query(r#"{ product(id: "prod_2") { title cart_link { cart_id } } }"#, None)
        .await
        .unwrap();
    assert_eq!(rows[0]["cart_link"][0]["cart_id"], "cart_1");
}

#[tokio::test]
async fn deleting_a_product_cascades_to_its_links() {
    let app = composed().await;
    let link = app.link.clone().unwrap();
    link.create(&[
        LinkPair::new(("cart", "cart_1"), ("product", "prod_1")),
        LinkPair::new(("cart", "cart_2"), ("product", "prod_1")),
        LinkPair::new(("cart", "cart_1"), ("product", "prod_2")),
    ])
    .await
    .unwrap();

    assert_eq!(link.delete("product", &["prod_1".into()]).await.unwrap(), 2);
    let rows = app
        .query(r#"{ cart(id: "cart_1") { product_link { product { title } } } }"#, None)
        .await
        .unwrap();
    assert_eq!(titles(&rows[0]), ["Summer Shirt"]);

    assert_eq!(link.restore("product", &["prod_1".into()]).await.unwrap(), 2);
    let active = link
        .list("product", "cart", &modkit::ListRequest::default())
        .await
        .unwrap();
    assert_eq!(active.len(), 3);
}

#[tokio::test]
async fn link_schema_is_merged_into_both_sides() {
    let app = composed().await;

    let map = app.entities_map();
    assert!(map.contains_key("CartProductLink"));
    assert!(map["Cart"].fields.contains_key("product_link"));
    assert!(map["Product"].fields.contains_key("cart_link"));
    assert!(app.not_found.is_empty(), "{:?}", app.not_found);
}
