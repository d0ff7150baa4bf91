use super::*;
use crate::joiner::JoinerConfig;

fn fragments(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items
        .iter()
        .map(|(s, sdl)| ((*s).to_owned(), (*sdl).to_owned()))
        .collect()
}

#[test]
fn non_overlapping_fragments_produce_the_union() {
    let build = build_schema_from_fragments(&fragments(&[
        ("cart", "type Cart { id: ID! total: Int }"),
        ("product", "type Product { id: ID! title: String }"),
    ]));

    let map = build.schema.type_map();
    assert!(map.contains_key("Cart"));
    assert!(map.contains_key("Product"));
    assert!(map.contains_key("String"), "built-in scalars are part of the map");
    assert!(build.not_found.is_empty());
    assert_eq!(map["Cart"].services, ["cart"]);
}

#[test]
fn undeclared_type_is_reported_and_rest_survives() {
    let build = build_schema_from_fragments(&fragments(&[(
        "cart",
        "type Cart { id: ID! customer: Customer items: [LineItem!]! }\ntype LineItem { id: ID! }",
    )]));

    let cart = &build.not_found["cart"];
    assert_eq!(cart["Cart.customer"], "Type \"Customer\" not found");
    assert_eq!(cart.len(), 1);

    let ty = build.schema.get("Cart").unwrap();
    let fields: Vec<_> = ty.fields.keys().map(String::as_str).collect();
    assert_eq!(fields, ["id", "items"]);
    assert!(build.schema.get("LineItem").is_some());
}

#[test]
fn references_across_services_resolve() {
    let build = build_schema_from_fragments(&fragments(&[
        ("cart", "type Cart { id: ID! product: Product }"),
        ("product", "type Product { id: ID! }"),
    ]));
    assert!(build.not_found.is_empty());
    assert_eq!(build.schema.get("Cart").unwrap().fields["product"].ty, "Product");
}

#[test]
fn extensions_merge_and_first_field_wins() {
    let build = build_schema_from_fragments(&fragments(&[
        ("link", "extend type Cart { products: [Product] total: String }"),
        ("cart", "type Cart { id: ID! total: Int }"),
        ("product", "type Product { id: ID! }"),
    ]));

    let cart = build.schema.get("Cart").unwrap();
    let fields: Vec<_> = cart.fields.keys().map(String::as_str).collect();
    assert_eq!(fields, ["id", "total", "products"]);
    assert_eq!(cart.fields["total"].ty, "Int");
    assert_eq!(cart.fields["products"].ty, "[Product]");
    assert_eq!(cart.services, ["cart", "link"]);
}

#[test]
fn extending_an_unknown_type_is_reported() {
    let build = build_schema_from_fragments(&fragments(&[(
        "link",
        "extend type Wishlist { id: ID }",
    )]));
    assert!(build.not_found["link"].contains_key("Wishlist"));
    assert!(build.schema.get("Wishlist").is_none());
}

#[test]
fn unparseable_fragment_is_reported_under_schema_key() {
    let build = build_schema_from_fragments(&fragments(&[
        ("broken", "type { nope"),
        ("cart", "type Cart { id: ID }"),
    ]));
    assert!(build.not_found["broken"]["<schema>"].starts_with("Invalid schema"));
    assert!(build.schema.get("Cart").is_some());
}

#[test]
fn union_and_interface_members_are_cleaned() {
    let build = build_schema_from_fragments(&fragments(&[(
        "search",
        "interface Node { id: ID! }\n\
         type Cart implements Node & Missing { id: ID! }\n\
         union Result = Cart | Ghost",
    )]));
    let issues = &build.not_found["search"];
    assert!(issues.contains_key("Cart.Missing"));
    assert!(issues.contains_key("Result.Ghost"));
    assert_eq!(build.schema.get("Cart").unwrap().implements, ["Node"]);
    assert_eq!(build.schema.get("Result").unwrap().members, ["Cart"]);
}

#[test]
fn kind_conflicts_are_reported() {
    let build = build_schema_from_fragments(&fragments(&[
        ("a", "type Money { amount: Int }"),
        ("b", "scalar Money"),
    ]));
    assert!(build.not_found["b"].contains_key("Money"));
    assert_eq!(build.schema.get("Money").unwrap().kind, TypeKind::Object);
}

#[test]
fn sdl_round_trips_through_the_parser() {
    let build = build_schema_from_fragments(&fragments(&[(
        "cart",
        "enum Status { OPEN CLOSED }\n\
         type Cart @entity(table: \"carts\") { id: ID! status: Status items(take: Int = 10): [String!] }",
    )]));
    let sdl = build.schema.to_sdl();
    assert!(sdl.contains("items(take: Int = 10): [String!]"), "{sdl}");
    assert!(sdl.contains("@entity(table: \"carts\")"), "{sdl}");
    assert!(!sdl.contains("scalar String"));
    async_graphql::parser::parse_schema(&sdl).expect("rendered SDL parses");
}

#[test]
fn build_schema_reads_registry_order() {
    let registry = ModuleRegistry::new();
    registry.register_custom_joiner_configs(&[
        JoinerConfig::new("product").with_schema("type Product { id: ID! }"),
        JoinerConfig::new("cart").with_schema("type Cart { id: ID! }"),
    ]);
    let build = build_schema(&registry);
    let user_types: Vec<_> = build
        .schema
        .type_map()
        .values()
        .filter(|t| !t.is_builtin())
        .map(|t| t.name.as_str())
        .collect();
    assert_eq!(user_types, ["Product", "Cart"]);
}
