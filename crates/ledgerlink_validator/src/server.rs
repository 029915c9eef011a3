//! The reference validator.

use crate::config::ValidatorConfig;
use crate::handler::{HandlerContext, RequestHandler};
use crate::ledger::TransactionState;
use crate::request::{Method, Request, Response};
use ledgerlink_codec::Value;
use ledgerlink_protocol::{short_digest, TransactionFamily, TransactionId};
use ledgerlink_store::BlockId;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// In-memory validator serving the ledger's HTTP surface.
///
/// There is no consensus: accepted transactions wait in a queue until
/// [`produce_block`](Self::produce_block) commits them.
///
/// # Example
///
/// ```
/// use ledgerlink_protocol::IntegerKey;
/// use ledgerlink_validator::{LedgerValidator, Request, ValidatorConfig};
/// use std::sync::Arc;
///
/// let validator = LedgerValidator::new(ValidatorConfig::default())
///     .with_family(Arc::new(IntegerKey));
///
/// let response = validator.handle(&Request::get("store"));
/// assert_eq!(response.status, 200);
///
/// validator.produce_block();
/// assert_eq!(validator.block_count(), 2);
/// ```
pub struct LedgerValidator {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
    sessions: RwLock<HashSet<String>>,
    next_session: AtomicU64,
}

impl LedgerValidator {
    /// Creates a validator holding only the genesis block.
    pub fn new(config: ValidatorConfig) -> Self {
        let context = Arc::new(HandlerContext::new(config));
        let handler = RequestHandler::new(Arc::clone(&context));

        Self {
            handler,
            context,
            sessions: RwLock::new(HashSet::new()),
            next_session: AtomicU64::new(1),
        }
    }

    /// Registers a transaction family.
    #[must_use]
    pub fn with_family(self, family: Arc<dyn TransactionFamily>) -> Self {
        self.register_family(family);
        self
    }

    /// Registers a transaction family on a running validator.
    pub fn register_family(&self, family: Arc<dyn TransactionFamily>) {
        self.context.register_family(family);
    }

    /// Serves one request.
    pub fn handle(&self, request: &Request) -> Response {
        let (route, query) = request.route_and_query();
        debug!(method = ?request.method, route, query, "request");
        let format = self.context.config.response_format;

        let mut response = match request.method {
            Method::Head => Ok(Response::empty(self.handler.handle_head(route, query))),
            Method::Get => self
                .handler
                .handle_get(route, query)
                .and_then(|value| Response::structured(200, &value, format)),
            Method::Post => self
                .handler
                .handle_post(route, request.content_type.as_deref(), &request.body)
                .and_then(|value| Response::structured(200, &value, format)),
        }
        .unwrap_or_else(|e| {
            debug!(route, error = %e, "request failed");
            Response::error(&e, format)
        });

        if !self.is_known_session(request.cookie.as_deref()) {
            response.set_cookie = Some(self.open_session());
        }
        response
    }

    fn is_known_session(&self, cookie: Option<&str>) -> bool {
        let Some(cookie) = cookie else {
            return false;
        };
        let sessions = self.sessions.read();
        cookie
            .split(';')
            .map(str::trim)
            .any(|pair| sessions.contains(pair))
    }

    fn open_session(&self) -> String {
        let n = self.next_session.fetch_add(1, Ordering::Relaxed);
        let name = &self.context.config.cookie_name;
        let pair = format!("{name}={}", short_digest(format!("{name}:{n}").as_bytes()));
        debug!(session = %pair, "new session");
        self.sessions.write().insert(pair.clone());
        format!("{pair}; Path=/")
    }

    /// Commits every queued transaction into a new block.
    pub fn produce_block(&self) -> BlockId {
        let mut ledger = self.context.ledger.write();
        let block = ledger.commit_pending();
        info!(
            block = %block.id(),
            number = block.number(),
            transactions = block.transaction_ids().len(),
            "block produced"
        );
        block.id().clone()
    }

    /// Id of the newest block.
    pub fn head(&self) -> BlockId {
        self.context.ledger.read().head().id().clone()
    }

    /// Number of blocks, genesis included.
    pub fn block_count(&self) -> usize {
        self.context.ledger.read().block_count()
    }

    /// Number of transactions waiting for the next block.
    pub fn pending_count(&self) -> usize {
        self.context.ledger.read().pending_count()
    }

    /// Where a transaction stands.
    pub fn transaction_state(&self, id: &TransactionId) -> TransactionState {
        self.context.ledger.read().transaction_state(id)
    }

    /// Messages received on `forward`, oldest first.
    pub fn forwarded_messages(&self) -> Vec<Value> {
        self.context.forwarded()
    }

    /// Number of sessions handed out.
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResponseFormat;
    use ledgerlink_codec::{from_cbor, from_json, to_cbor, Encode};
    use ledgerlink_protocol::{integer_key, IntegerKey, MessageEnvelope, SigningIdentity, Transaction};

    fn validator() -> LedgerValidator {
        LedgerValidator::new(ValidatorConfig::default()).with_family(Arc::new(IntegerKey))
    }

    fn sealed(signer: &SigningIdentity, updates: Vec<Value>) -> (TransactionId, Vec<u8>) {
        let mut transaction = Transaction::new(integer_key::TYPE_NAME, updates, vec![]);
        let id = transaction.sign(signer).unwrap();
        let envelope = MessageEnvelope::seal(integer_key::MESSAGE_TYPE, transaction, signer).unwrap();
        (id, to_cbor(&envelope.to_value()).unwrap())
    }

    fn post(validator: &LedgerValidator, body: Vec<u8>) -> Response {
        validator.handle(&Request::post("IntegerKey/Transaction", "application/cbor", body))
    }

    #[test]
    fn validator_lifecycle() {
        let validator = validator();
        assert_eq!(validator.block_count(), 1);
        assert_eq!(validator.pending_count(), 0);

        let response = validator.handle(&Request::get("status"));
        assert_eq!(response.status, 200);
        let status = from_cbor(&response.body).unwrap();
        assert_eq!(status.get("BlockCount"), Some(&Value::Integer(1)));
    }

    #[test]
    fn submit_then_commit() {
        let validator = validator();
        let signer = SigningIdentity::generate();
        let (id, body) = sealed(&signer, vec![integer_key::set("a", 1)]);

        let response = post(&validator, body);
        assert_eq!(response.status, 200);
        let path = format!("transaction/{id}");
        assert_eq!(validator.handle(&Request::head(path.as_str())).status, 302);

        let block = validator.produce_block();
        assert_eq!(validator.handle(&Request::head(path.as_str())).status, 200);
        assert_eq!(validator.transaction_state(&id), TransactionState::Committed(block));

        let response = validator.handle(&Request::get("store/IntegerKeyTransaction/a?"));
        assert_eq!(from_cbor(&response.body).unwrap(), Value::Integer(1));
    }

    #[test]
    fn unknown_transaction_is_404() {
        let validator = validator();
        assert_eq!(validator.handle(&Request::head("transaction/nope")).status, 404);
    }

    #[test]
    fn invalid_transaction_is_rejected_with_payload() {
        let validator = validator();
        let signer = SigningIdentity::generate();
        let (_, body) = sealed(&signer, vec![integer_key::inc("missing", 1)]);

        let response = post(&validator, body);
        assert_eq!(response.status, 400);
        let payload = from_cbor(&response.body).unwrap();
        assert_eq!(
            payload.get("errorType").and_then(Value::as_text),
            Some("InvalidTransactionError")
        );
        assert_eq!(validator.pending_count(), 0);
    }

    #[test]
    fn tampered_envelope_is_rejected() {
        let validator = validator();
        let signer = SigningIdentity::generate();
        let (_, body) = sealed(&signer, vec![integer_key::set("a", 1)]);
        let mut value = from_cbor(&body).unwrap();
        if let Value::Map(map) = &mut value {
            map.insert("SenderID".into(), Value::from("someone-else"));
        }

        let response = post(&validator, to_cbor(&value).unwrap());
        assert_eq!(response.status, 400);
        assert_eq!(validator.pending_count(), 0);
    }

    #[test]
    fn unknown_message_type_is_404() {
        let validator = validator();
        let body = to_cbor(&Value::empty_map()).unwrap();
        let response = validator.handle(&Request::post("Other/Transaction", "application/cbor", body));
        assert_eq!(response.status, 404);
    }

    #[test]
    fn session_cookie_is_assigned_once() {
        let validator = validator();
        let first = validator.handle(&Request::get("status"));
        let cookie = first.set_cookie.expect("cookie on first contact");
        let pair = cookie.split(';').next().unwrap().to_string();
        assert!(pair.starts_with("ledgerlink_session="));

        let second = validator.handle(&Request::get("status").with_cookie(pair));
        assert_eq!(second.set_cookie, None);
        assert_eq!(validator.session_count(), 1);
    }

    #[test]
    fn json_responses() {
        let validator = LedgerValidator::new(
            ValidatorConfig::default().with_response_format(ResponseFormat::Json),
        )
        .with_family(Arc::new(IntegerKey));
        let response = validator.handle(&Request::get("store"));
        assert_eq!(response.content_type.as_deref(), Some("application/json"));
        assert_eq!(
            from_json(&response.body).unwrap(),
            Value::from(vec!["IntegerKeyTransaction".to_string()])
        );
    }

    #[test]
    fn block_routes() {
        let validator = validator();
        let genesis = validator.head();
        let block = validator.produce_block();

        let response = validator.handle(&Request::get("block?blockcount=5"));
        let ids = from_cbor(&response.body).unwrap();
        assert_eq!(
            ids,
            Value::Array(vec![Value::from(block.as_str()), Value::from(genesis.as_str())])
        );

        let response = validator.handle(&Request::get(format!("block/{block}/PreviousBlockID")));
        assert_eq!(from_cbor(&response.body).unwrap(), Value::from(genesis.as_str()));

        let response = validator.handle(&Request::get(format!("block/{block}/Nope")));
        assert_eq!(response.status, 404);
    }
}
