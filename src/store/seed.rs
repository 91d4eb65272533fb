use crate::item::Item;

/// Default catalog size created on startup.
pub const DEFAULT_ITEM_COUNT: usize = 5000;

/// Generates the demo catalog: `count` items with sequential ids starting at 1.
pub fn catalog(count: usize) -> impl Iterator<Item = Item> {
    (0..count).map(|i| {
        let n = i + 1;
        Item {
            id: n as i64,
            name: format!("Item {}", n),
            quantity: (i % 100) as u32,
            price: i as f64 * 0.1,
            description: format!("Description for item {}", n),
        }
    })
}
