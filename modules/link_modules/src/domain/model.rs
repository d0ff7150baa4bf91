use chrono::{DateTime, Utc};
use modkit::{LinkDefinition, LinkSide};
use serde_json::{json, Value};
use uuid::Uuid;

/// One stored link between a left and a right record.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkRow {
    pub id: Uuid,
    pub left_id: String,
    pub right_id: String,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl LinkRow {
    pub fn new(left_id: &str, right_id: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            left_id: left_id.to_owned(),
            right_id: right_id.to_owned(),
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    pub fn side_id(&self, side: LinkSide) -> &str {
        match side {
            LinkSide::Left => &self.left_id,
            LinkSide::Right => &self.right_id,
        }
    }

    /// Row as the query engine sees it, keyed by each side's foreign key.
    pub fn to_value(&self, def: &LinkDefinition) -> Value {
        let mut row = json!({
            "id": self.id.to_string(),
            "created_at": self.created_at.to_rfc3339(),
            "deleted_at": self.deleted_at.map(|t| t.to_rfc3339()),
        });
        row[def.left.foreign_key()] = Value::from(self.left_id.clone());
        row[def.right.foreign_key()] = Value::from(self.right_id.clone());
        row
    }
}

/// `cart_product_link` → `CartProductLink`.
pub fn type_name(service_name: &str) -> String {
    service_name
        .split(|c: char| c == '_' || c == '-')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}
