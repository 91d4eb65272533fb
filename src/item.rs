use serde::{Deserialize, Serialize};

/// A catalog entry served to clients on `GET_DATA`.
///
/// Field declaration order is the JSON field order on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub quantity: u32,
    pub price: f64,
    pub description: String,
}

impl Item {
    pub fn new(
        id: i64,
        name: impl Into<String>,
        quantity: u32,
        price: f64,
        description: impl Into<String>,
    ) -> Item {
        Item {
            id,
            name: name.into(),
            quantity,
            price,
            description: description.into(),
        }
    }
}
