use super::*;
use crate::contracts::ListRequest;
use crate::joiner::{JoinerAlias, JoinerExtend, JoinerRelationship};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;

#[derive(Default)]
struct TableFetcher {
    tables: HashMap<String, Vec<Value>>,
    calls: Mutex<Vec<(String, ListRequest)>>,
}

impl TableFetcher {
    fn with(mut self, service: &str, rows: Value) -> Self {
        let rows = rows.as_array().cloned().unwrap_or_default();
        self.tables.insert(service.to_owned(), rows);
        self
    }

    fn calls_to(&self, service: &str) -> Vec<ListRequest> {
        self.calls
            .lock()
            .iter()
            .filter(|(s, _)| s == service)
            .map(|(_, r)| r.clone())
            .collect()
    }
}

#[async_trait]
impl RemoteFetchData for TableFetcher {
    async fn fetch(&self, service_name: &str, request: &ListRequest) -> anyhow::Result<Vec<Value>> {
        self.calls
            .lock()
            .push((service_name.to_owned(), request.clone()));
        let rows = self
            .tables
            .get(service_name)
            .ok_or_else(|| anyhow::anyhow!("no table for {service_name}"))?;
        Ok(filter::apply(rows.iter().cloned(), request))
    }
}

fn rel(service: &str, pk: &str, fk: &str, alias: &str, is_list: bool) -> JoinerRelationship {
    JoinerRelationship {
        service_name: service.into(),
        primary_key: pk.into(),
        foreign_key: fk.into(),
        alias: alias.into(),
        is_list,
        args: Map::new(),
    }
}

fn configs() -> Vec<JoinerConfig> {
    vec![
        JoinerConfig::new("cart")
            .with_alias(JoinerAlias::new("cart"))
            .with_alias(JoinerAlias {
                name: vec!["carts".into()],
                args: json!({ "take": 1 }).as_object().cloned().unwrap(),
            })
            .with_relationship(rel("line_item", "cart_id", "id", "items", true)),
        JoinerConfig::new("line_item")
            .with_relationship(rel("product", "id", "product_id", "product", false)),
        JoinerConfig::new("product").with_alias(JoinerAlias::new("product")),
    ]
}

fn fetcher() -> Arc<TableFetcher> {
    Arc::new(
        TableFetcher::default()
            .with(
                "cart",
                json!([
                    { "id": "c1", "email": "a@x.io", "total": 30 },
                    { "id": "c2", "email": "b@x.io", "total": 0 }
                ]),
            )
            .with(
                "line_item",
                json!([
                    { "id": "li1", "cart_id": "c1", "product_id": "p1", "quantity": 1 },
                    { "id": "li2", "cart_id": "c1", "product_id": "p2", "quantity": 2 }
                ]),
            )
            .with(
                "product",
                json!([
                    { "id": "p1", "title": "Shirt", "price": 10 },
                    { "id": "p2", "title": "Mug", "price": 10 }
                ]),
            ),
    )
}

fn remote(fetcher: Arc<TableFetcher>) -> RemoteQuery {
    RemoteQuery::new(configs(), fetcher)
}

#[tokio::test]
async fn graphql_query_joins_nested_relationships() {
    let data = fetcher();
    let rq = remote(data.clone());

    let out = rq
        .query(
            "query($id: String) { cart(id: $id) { id items { quantity product { title } } } }",
            Some(json!({ "id": "c1" }).as_object().cloned().unwrap()),
        )
        .await
        .unwrap();

    assert_eq!(
        out,
        json!([{
            "id": "c1",
            "items": [
                { "quantity": 1, "product": { "title": "Shirt" } },
                { "quantity": 2, "product": { "title": "Mug" } }
            ]
        }])
    );

    // one batched fetch per relationship
    let products = data.calls_to("product");
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].filters["id"], json!(["p1", "p2"]));
    assert!(products[0].fields.contains(&"id".to_owned()));
}

#[tokio::test]
async fn fragments_and_inline_fragments_are_flattened() {
    let rq = remote(fetcher());
    let out = rq
        .query(
            "query { cart(id: \"c2\") { ...CartBits ... { total } } } fragment CartBits on Cart { email }",
            None,
        )
        .await
        .unwrap();
    assert_eq!(out, json!([{ "email": "b@x.io", "total": 0 }]));
}

#[tokio::test]
async fn object_query_with_args_and_child_selection() {
    let rq = remote(fetcher());
    let out = rq
        .query(
            json!({
                "cart": {
                    "fields": ["id"],
                    "__args": { "id": "c1" },
                    "items": { "fields": ["id"], "__args": { "product_id": "p2" } }
                }
            }),
            None,
        )
        .await
        .unwrap();
    assert_eq!(out, json!([{ "id": "c1", "items": [{ "id": "li2" }] }]));
}

#[tokio::test]
async fn structured_query_expands_dotted_paths() {
    let rq = remote(fetcher());
    let query = RemoteJoinerQuery {
        alias: Some("cart".into()),
        fields: vec!["id".into()],
        args: json!({ "id": "c1" }).as_object().cloned().unwrap(),
        expands: vec![
            RemoteExpandProperty {
                property: "items".into(),
                fields: vec!["id".into()],
                ..Default::default()
            },
            RemoteExpandProperty {
                property: "items.product".into(),
                fields: vec!["price".into()],
                ..Default::default()
            },
        ],
        ..Default::default()
    };
    let out = rq.query(query, None).await.unwrap();
    assert_eq!(out[0]["items"][1], json!({ "id": "li2", "product": { "price": 10 } }));
}

#[tokio::test]
async fn alias_default_args_apply() {
    let data = fetcher();
    let out = remote(data.clone())
        .query("{ carts { id } }", None)
        .await
        .unwrap();
    assert_eq!(out, json!([{ "id": "c1" }]));
    assert_eq!(data.calls_to("cart")[0].take, Some(1));
}

#[tokio::test]
async fn child_pagination_applies_to_each_parent() {
    let data = Arc::new(
        TableFetcher::default()
            .with("cart", json!([{ "id": "c1" }, { "id": "c2" }]))
            .with(
                "line_item",
                json!([
                    { "id": "a", "cart_id": "c1" },
                    { "id": "b", "cart_id": "c1" },
                    { "id": "c", "cart_id": "c2" }
                ]),
            ),
    );
    let rq = remote(data.clone());

    let out = rq
        .query("{ cart { id items(take: 1) { id } } }", None)
        .await
        .unwrap();
    assert_eq!(
        out,
        json!([
            { "id": "c1", "items": [{ "id": "a" }] },
            { "id": "c2", "items": [{ "id": "c" }] }
        ])
    );

    let out = rq
        .query("{ cart { id items(skip: 1) { id } } }", None)
        .await
        .unwrap();
    assert_eq!(out[0]["items"], json!([{ "id": "b" }]));
    assert_eq!(out[1]["items"], json!([]));

    let batched = data.calls_to("line_item");
    assert!(batched.iter().all(|r| r.take.is_none() && r.skip.is_none()));
}

#[tokio::test]
async fn extends_from_another_config_are_followed() {
    let mut cfgs = configs();
    cfgs.push(JoinerConfig {
        service_name: Some("cart_product_link".into()),
        is_link: true,
        relationships: vec![rel("product", "id", "product_id", "product", false)],
        extends: vec![JoinerExtend {
            service_name: "cart".into(),
            relationship: rel("cart_product_link", "cart_id", "id", "cart_product_link", true),
        }],
        ..Default::default()
    });
    let data = Arc::new(
        TableFetcher::default()
            .with("cart", json!([{ "id": "c1" }]))
            .with("product", json!([{ "id": "p9", "title": "Hat" }]))
            .with(
                "cart_product_link",
                json!([{ "id": "l1", "cart_id": "c1", "product_id": "p9" }]),
            ),
    );
    let rq = RemoteQuery::new(cfgs, data);

    let out = rq
        .query(
            "{ cart { id cart_product_link { product_id product { title } } } }",
            None,
        )
        .await
        .unwrap();
    assert_eq!(
        out,
        json!([{
            "id": "c1",
            "cart_product_link": [{ "product_id": "p9", "product": { "title": "Hat" } }]
        }])
    );
}

#[tokio::test]
async fn missing_relation_targets_become_null_or_empty() {
    let data = Arc::new(
        TableFetcher::default()
            .with("cart", json!([{ "id": "c3" }]))
            .with("line_item", json!([{ "id": "li9", "cart_id": "c3", "product_id": null }]))
            .with("product", json!([])),
    );
    let out = RemoteQuery::new(configs(), data.clone())
        .query("{ cart { id items { id product { title } } } }", None)
        .await
        .unwrap();
    assert_eq!(out, json!([{ "id": "c3", "items": [{ "id": "li9", "product": null }] }]));
    assert!(data.calls_to("product").is_empty(), "no keys, no fetch");
}

#[tokio::test]
async fn unknown_relations_are_passed_to_the_service() {
    let data = fetcher();
    let _ = remote(data.clone())
        .query("{ product { title variants { sku } } }", None)
        .await
        .unwrap();
    assert_eq!(data.calls_to("product")[0].relations, ["variants"]);
}

#[tokio::test]
async fn unknown_entity_is_an_error() {
    let err = remote(fetcher()).query("{ wishlist { id } }", None).await.unwrap_err();
    assert!(matches!(err, QueryError::UnknownEntity(e) if e == "wishlist"));
}

#[tokio::test]
async fn undefined_variable_is_an_error() {
    let err = remote(fetcher())
        .query("query { cart(id: $nope) { id } }", None)
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::MissingVariable(v) if v == "nope"));
}

#[tokio::test]
async fn fetch_failures_name_the_service() {
    let rq = RemoteQuery::new(configs(), Arc::new(TableFetcher::default()));
    let err = rq.query("{ cart { id } }", None).await.unwrap_err();
    assert!(matches!(err, QueryError::Fetch { ref service, .. } if service == "cart"));
}

#[test]
fn parse_rejects_several_roots() {
    let vars = Map::new();
    let err = RemoteQuery::parse(json!({ "a": {}, "b": {} }).into(), &vars).unwrap_err();
    assert!(matches!(err, QueryError::Invalid(_)));
    let err = RemoteQuery::parse("{ a { id } b { id } }".into(), &vars).unwrap_err();
    assert!(matches!(err, QueryError::Invalid(_)));
}

#[test]
fn variables_fill_structured_root_args() {
    let vars = json!({ "id": "c1", "take": 2 }).as_object().cloned().unwrap();
    let node = RemoteQuery::parse(
        RemoteJoinerQuery {
            service: Some("cart".into()),
            args: json!({ "take": 5 }).as_object().cloned().unwrap(),
            ..Default::default()
        }
        .into(),
        &vars,
    )
    .unwrap();
    assert_eq!(node.entity, "cart");
    assert_eq!(node.args["id"], "c1");
    assert_eq!(node.args["take"], 5);
}
