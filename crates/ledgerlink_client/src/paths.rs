//! Request paths understood by the validator's router.
//!
//! These must match the validator byte for byte:
//! - store: `store[/<name>][/<key>]?[blockid=<id>][&delta=1]`
//! - list: `<block|transaction>[?blockcount=<n>]`
//! - item: `<block|transaction>/<id>[/<field>]`

use url::form_urlencoded;

/// Key sentinel meaning "every object in the store".
pub const ALL_OBJECTS: &str = "*";

/// Kinds of ledger items with list and item paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    /// Blocks.
    Block,
    /// Transactions.
    Transaction,
}

impl ItemKind {
    /// Path segment for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Block => "block",
            ItemKind::Transaction => "transaction",
        }
    }
}

/// Builds a store path.
///
/// The query separator is always present, even with an empty query.
/// `delta` is only sent together with a key.
pub fn store_path(name: Option<&str>, key: Option<&str>, block_id: Option<&str>, delta: bool) -> String {
    let mut path = String::from("store");
    if let Some(name) = name {
        path.push('/');
        path.push_str(name.trim_matches('/'));
    }
    if let Some(key) = key {
        path.push('/');
        path.push_str(key.trim_matches('/'));
    }

    let mut query = form_urlencoded::Serializer::new(String::new());
    if let Some(block_id) = block_id {
        query.append_pair("blockid", block_id);
    }
    if delta && key.is_some() {
        query.append_pair("delta", "1");
    }
    path.push('?');
    path.push_str(&query.finish());
    path
}

/// Builds a list path, e.g. `block?blockcount=10`.
pub fn list_path(kind: ItemKind, count: Option<usize>) -> String {
    match count {
        Some(count) => {
            let query = form_urlencoded::Serializer::new(String::new())
                .append_pair("blockcount", &count.to_string())
                .finish();
            format!("{}?{query}", kind.as_str())
        }
        None => kind.as_str().to_string(),
    }
}

/// Builds an item path, e.g. `transaction/<id>/Status`.
pub fn item_path(kind: ItemKind, id: &str, field: Option<&str>) -> String {
    match field {
        Some(field) => format!("{}/{id}/{field}", kind.as_str()),
        None => format!("{}/{id}", kind.as_str()),
    }
}
