//! Request routing and handlers.

use crate::config::ValidatorConfig;
use crate::error::{ValidatorError, ValidatorResult};
use crate::ledger::{transaction_value, Block, Ledger, TransactionState};
use ledgerlink_codec::{decode_body, Body, ContentType, Decode, Encode, Value};
use ledgerlink_protocol::{MessageEnvelope, TransactionFamily, TransactionId};
use ledgerlink_store::{BlockId, Delta};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};
use url::form_urlencoded;

/// Key meaning "every object in the store".
const ALL_OBJECTS: &str = "*";

/// A parsed read route.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Route<'a> {
    Status,
    StoreList,
    Store { name: &'a str, key: Option<&'a str> },
    BlockList,
    Block { id: &'a str, field: Option<&'a str> },
    TransactionList,
    Transaction { id: &'a str, field: Option<&'a str> },
}

impl<'a> Route<'a> {
    fn parse(route: &'a str) -> ValidatorResult<Self> {
        let segments: Vec<&str> = route.split('/').filter(|s| !s.is_empty()).collect();
        let parsed = match segments[..] {
            ["status"] => Route::Status,
            ["store"] => Route::StoreList,
            ["store", name] => Route::Store { name, key: None },
            ["store", name, key] => Route::Store {
                name,
                key: Some(key),
            },
            ["block"] => Route::BlockList,
            ["block", id] => Route::Block { id, field: None },
            ["block", id, field] => Route::Block {
                id,
                field: Some(field),
            },
            ["transaction"] => Route::TransactionList,
            ["transaction", id] => Route::Transaction { id, field: None },
            ["transaction", id, field] => Route::Transaction {
                id,
                field: Some(field),
            },
            _ => return Err(ValidatorError::NotFound(format!("no route for '{route}'"))),
        };
        Ok(parsed)
    }
}

/// Query parameters understood by the read routes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Query {
    block_id: Option<BlockId>,
    delta: bool,
    block_count: Option<usize>,
}

impl Query {
    fn parse(query: &str) -> ValidatorResult<Self> {
        let mut parsed = Query::default();
        for (name, value) in form_urlencoded::parse(query.as_bytes()) {
            match &*name {
                "blockid" => parsed.block_id = Some(BlockId::from(value.into_owned())),
                "delta" => parsed.delta = !matches!(&*value, "" | "0" | "false"),
                "blockcount" => {
                    let count = value.parse::<usize>().map_err(|_| {
                        ValidatorError::InvalidRequest(format!("invalid blockcount '{value}'"))
                    })?;
                    parsed.block_count = Some(count);
                }
                _ => {}
            }
        }
        Ok(parsed)
    }
}

/// Context for request handling.
pub struct HandlerContext {
    /// Validator configuration.
    pub config: ValidatorConfig,
    /// The ledger (shared across all handlers).
    pub ledger: RwLock<Ledger>,
    /// Registered families, keyed by message endpoint.
    families: RwLock<BTreeMap<String, Arc<dyn TransactionFamily>>>,
    /// Messages posted to `forward`.
    forwarded: Mutex<Vec<Value>>,
}

impl HandlerContext {
    /// Creates a new handler context.
    pub fn new(config: ValidatorConfig) -> Self {
        Self {
            config,
            ledger: RwLock::new(Ledger::new()),
            families: RwLock::new(BTreeMap::new()),
            forwarded: Mutex::new(Vec::new()),
        }
    }

    /// Registers a family and its store.
    pub fn register_family(&self, family: Arc<dyn TransactionFamily>) {
        let endpoint = family.message_type().trim_start_matches('/').to_string();
        self.ledger.write().register_store(family.store_name());
        debug!(%endpoint, store = family.store_name(), "registered transaction family");
        self.families.write().insert(endpoint, family);
    }

    fn family(&self, endpoint: &str) -> Option<Arc<dyn TransactionFamily>> {
        self.families.read().get(endpoint).cloned()
    }

    /// Messages received on `forward`, oldest first.
    pub fn forwarded(&self) -> Vec<Value> {
        self.forwarded.lock().clone()
    }
}

/// Handler for validator requests.
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Handles a GET on `route` with `query`.
    pub fn handle_get(&self, route: &str, query: &str) -> ValidatorResult<Value> {
        let route = Route::parse(route)?;
        let query = Query::parse(query)?;
        let ledger = self.context.ledger.read();

        match route {
            Route::Status => Ok(self.status(&ledger)),
            Route::StoreList => Ok(Value::from(ledger.store_names())),
            Route::Store { name, key } => store_query(&ledger, name, key, &query),
            Route::BlockList => Ok(Value::Array(
                ledger
                    .recent_blocks(query.block_count)
                    .map(|block| Value::from(block.id().as_str()))
                    .collect(),
            )),
            Route::Block { id, field } => {
                let block = find_block(&ledger, &BlockId::from(id))?;
                select_field(block.to_value(), field, "block")
            }
            Route::TransactionList => Ok(Value::Array(
                ledger
                    .recent_blocks(query.block_count)
                    .flat_map(|block| block.transaction_ids().iter().rev())
                    .map(|id| Value::from(id.as_str()))
                    .collect(),
            )),
            Route::Transaction { id, field } => {
                let id = TransactionId::from(id);
                let (transaction, block) = ledger
                    .transaction(&id)
                    .ok_or_else(|| ValidatorError::NotFound(format!("transaction {id}")))?;
                select_field(transaction_value(transaction, block), field, "transaction")
            }
        }
    }

    /// Handles a HEAD on `route`, returning only a status code.
    ///
    /// Transaction items answer 200 when committed, 302 while pending and
    /// 404 when unknown.
    pub fn handle_head(&self, route: &str, query: &str) -> u16 {
        if let Ok(Route::Transaction { id, field: None }) = Route::parse(route) {
            return match self
                .context
                .ledger
                .read()
                .transaction_state(&TransactionId::from(id))
            {
                TransactionState::Committed(_) => 200,
                TransactionState::Pending => 302,
                TransactionState::Unknown => 404,
            };
        }
        match self.handle_get(route, query) {
            Ok(_) => 200,
            Err(e) => e.status_code(),
        }
    }

    /// Handles a POST to `route`: either `forward`, or a family's message
    /// endpoint.
    pub fn handle_post(&self, route: &str, content_type: Option<&str>, body: &[u8]) -> ValidatorResult<Value> {
        let content_type = ContentType::parse(content_type);
        let message = match decode_body(&content_type, body)? {
            Body::Structured(value) => value,
            Body::Opaque(_) => {
                return Err(ValidatorError::InvalidRequest(format!(
                    "unsupported content type '{content_type}'"
                )))
            }
        };

        let route = route.trim_matches('/');
        if route == "forward" {
            debug!("message queued for forwarding");
            self.context.forwarded.lock().push(message);
            return Ok(Value::map([("Status", "forwarded")]));
        }

        let family = self
            .context
            .family(route)
            .ok_or_else(|| ValidatorError::UnknownMessageType(route.to_string()))?;
        self.submit(family.as_ref(), route, &message)
    }

    fn submit(&self, family: &dyn TransactionFamily, endpoint: &str, message: &Value) -> ValidatorResult<Value> {
        let envelope = MessageEnvelope::from_value(message)?;
        if envelope.endpoint() != endpoint {
            return Err(ValidatorError::InvalidRequest(format!(
                "message type {} posted to {endpoint}",
                envelope.message_type()
            )));
        }
        envelope.verify()?;

        let transaction = envelope.into_transaction();
        if transaction.type_name() != family.type_name() {
            return Err(ValidatorError::InvalidTransaction(format!(
                "expected transaction type {}, got {}",
                family.type_name(),
                transaction.type_name()
            )));
        }

        let id = self
            .context
            .ledger
            .write()
            .submit(family, transaction)
            .inspect_err(|e| warn!(endpoint, error = %e, "transaction rejected"))?;
        debug!(transaction = %id, endpoint, "transaction accepted");
        Ok(Value::map([
            ("Status", Value::from("accepted")),
            ("TransactionID", Value::from(id.as_str())),
        ]))
    }

    fn status(&self, ledger: &Ledger) -> Value {
        Value::map([
            ("Name", Value::from(self.context.config.name.as_str())),
            ("BlockCount", Value::Integer(ledger.block_count() as i64)),
            ("HeadBlockID", Value::from(ledger.head().id().as_str())),
            ("PendingTransactions", Value::Integer(ledger.pending_count() as i64)),
            ("Stores", Value::from(ledger.store_names())),
        ])
    }
}

fn find_block<'l>(ledger: &'l Ledger, id: &BlockId) -> ValidatorResult<&'l Block> {
    ledger
        .block(id)
        .ok_or_else(|| ValidatorError::NotFound(format!("block {id}")))
}

fn select_field(value: Value, field: Option<&str>, what: &str) -> ValidatorResult<Value> {
    match field {
        None => Ok(value),
        Some(field) => value
            .get(field)
            .cloned()
            .ok_or_else(|| ValidatorError::NotFound(format!("{what} field {field}"))),
    }
}

/// `store/<name>[/<key>]`, as of `blockid` or the head.
///
/// Without a key the store's keys are listed; `*` returns every object.
/// With `delta` the block's own effect is returned instead of the state
/// through it.
fn store_query(ledger: &Ledger, name: &str, key: Option<&str>, query: &Query) -> ValidatorResult<Value> {
    let block = match &query.block_id {
        Some(id) => find_block(ledger, id)?,
        None => ledger.head(),
    };
    let store = ledger.store_at(name, block)?;

    match (key, query.delta) {
        (None, _) => Ok(Value::Array(store.keys().cloned().map(Value::Text).collect())),
        (Some(ALL_OBJECTS), false) => Ok(store.to_value()),
        (Some(ALL_OBJECTS), true) => Ok(block.delta(name).to_value()),
        (Some(key), false) => store
            .get(key)
            .cloned()
            .ok_or_else(|| ValidatorError::NotFound(format!("key {key} in store {name}"))),
        (Some(key), true) => {
            let full = block.delta(name);
            let mut delta = Delta::new();
            if let Some(value) = full.updated.get(key) {
                delta.set(key, value.clone());
            } else if full.deleted.contains(key) {
                delta.delete(key);
            }
            Ok(delta.to_value())
        }
    }
}
