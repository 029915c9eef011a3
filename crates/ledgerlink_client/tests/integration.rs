//! Integration tests for the client against the reference validator.

use ledgerlink_client::{
    ClientConfig, ClientError, CommitOutcome, Headers, HttpClient, HttpError, HttpResponse,
    KeySource, LedgerClient, LoopbackClient, LoopbackServer, Method, RefreshOutcome,
    TransactionStatus,
};
use ledgerlink_codec::Value;
use ledgerlink_protocol::{integer_key, IntegerKey, Signer, SigningIdentity, TransactionId};
use ledgerlink_validator::{LedgerValidator, Request, ValidatorConfig};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const STORE: &str = "IntegerKeyTransaction";

/// A server that forwards loopback requests to an in-memory validator.
struct InMemoryValidator {
    validator: Arc<LedgerValidator>,
    requests: Mutex<Vec<(Method, String)>>,
}

impl InMemoryValidator {
    fn new(validator: Arc<LedgerValidator>) -> Self {
        Self {
            validator,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<(Method, String)> {
        self.requests.lock().clone()
    }
}

fn header(headers: Headers<'_>, name: &str) -> Option<String> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.clone())
}

impl LoopbackServer for InMemoryValidator {
    fn handle(&self, method: Method, path: &str, headers: Headers<'_>, body: &[u8]) -> HttpResponse {
        self.requests.lock().push((method, path.to_string()));
        let mut request = match method {
            Method::Head => Request::head(path),
            Method::Get => Request::get(path),
            Method::Post => Request::post(
                path,
                header(headers, "content-type").unwrap_or_default(),
                body.to_vec(),
            ),
        };
        request.cookie = header(headers, "cookie");

        let response = self.validator.handle(&request);
        HttpResponse {
            status: response.status,
            content_type: response.content_type,
            set_cookie: response.set_cookie,
            body: response.body,
        }
    }
}

type TestClient = LedgerClient<LoopbackClient<InMemoryValidator>>;

fn validator() -> Arc<LedgerValidator> {
    Arc::new(LedgerValidator::new(ValidatorConfig::new("test-validator")).with_family(Arc::new(IntegerKey)))
}

fn config() -> ClientConfig {
    ClientConfig::new("http://validator.test:8800")
}

fn writer_with(validator: &Arc<LedgerValidator>, config: ClientConfig) -> TestClient {
    let http = LoopbackClient::new(InMemoryValidator::new(Arc::clone(validator)));
    LedgerClient::with_family(config, Arc::new(IntegerKey), http)
        .unwrap()
        .with_signer(SigningIdentity::generate())
}

fn writer(validator: &Arc<LedgerValidator>) -> TestClient {
    writer_with(validator, config())
}

fn reader(validator: &Arc<LedgerValidator>) -> TestClient {
    let http = LoopbackClient::new(InMemoryValidator::new(Arc::clone(validator)));
    LedgerClient::new(config().with_store_name(STORE), http).unwrap()
}

fn requests(client: &TestClient) -> Vec<(Method, String)> {
    client.channel().client().server().requests()
}

/// A validator that cannot be reached: every request fails to connect.
#[derive(Default)]
struct Unreachable {
    attempts: AtomicUsize,
}

impl Unreachable {
    fn fail(&self) -> Result<HttpResponse, HttpError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(HttpError::Failed("connection refused".into()))
    }

    fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl HttpClient for Unreachable {
    fn head(&self, _url: &str, _headers: Headers<'_>, _timeout: Duration) -> Result<HttpResponse, HttpError> {
        self.fail()
    }

    fn get(&self, _url: &str, _headers: Headers<'_>, _timeout: Duration) -> Result<HttpResponse, HttpError> {
        self.fail()
    }

    fn post(
        &self,
        _url: &str,
        _headers: Headers<'_>,
        _body: Vec<u8>,
        _timeout: Duration,
    ) -> Result<HttpResponse, HttpError> {
        self.fail()
    }
}

#[test]
fn first_refresh_is_full_then_incremental() {
    let validator = validator();
    let mut alice = writer(&validator);
    let mut bob = reader(&validator);

    alice.submit(vec![integer_key::set("a", 1)], vec![]).unwrap().unwrap();
    validator.produce_block();

    assert_eq!(bob.fetch_state().unwrap(), RefreshOutcome::Full);
    assert_eq!(bob.state().unwrap().get("a"), Some(&Value::Integer(1)));
    assert_eq!(bob.fetch_state().unwrap(), RefreshOutcome::Current);

    alice.submit(vec![integer_key::inc("a", 2)], vec![]).unwrap().unwrap();
    let b2 = validator.produce_block();
    alice.submit(vec![integer_key::set("b", 7)], vec![]).unwrap().unwrap();
    let b3 = validator.produce_block();

    assert_eq!(bob.fetch_state().unwrap(), RefreshOutcome::Incremental { applied: 2 });
    let state = bob.state().unwrap();
    assert_eq!(state.get("a"), Some(&Value::Integer(3)));
    assert_eq!(state.get("b"), Some(&Value::Integer(7)));
    assert_eq!(bob.synchronized_state().unwrap().block_id(), Some(&b3));

    // Deltas were fetched oldest first.
    let delta_paths: Vec<String> = requests(&bob)
        .into_iter()
        .filter(|(_, path)| path.contains("delta=1"))
        .map(|(_, path)| path)
        .collect();
    assert_eq!(delta_paths.len(), 2);
    assert!(delta_paths[0].contains(b2.as_str()));
    assert!(delta_paths[1].contains(b3.as_str()));
}

#[test]
fn falling_behind_the_lookback_window_refetches_everything() {
    let validator = validator();
    let mut alice = writer(&validator);
    let mut bob = reader(&validator);
    bob.fetch_state().unwrap();

    alice.submit(vec![integer_key::set("a", 1)], vec![]).unwrap().unwrap();
    for _ in 0..12 {
        validator.produce_block();
    }

    assert_eq!(bob.fetch_state().unwrap(), RefreshOutcome::Full);
    assert_eq!(bob.state().unwrap().get("a"), Some(&Value::Integer(1)));
    assert_eq!(
        bob.synchronized_state().unwrap().block_id(),
        Some(&validator.head())
    );
}

#[test]
fn submit_commit_and_wait() {
    let validator = validator();
    let mut client = writer(&validator);

    let id = client
        .submit(vec![integer_key::set("a", 5)], vec![])
        .unwrap()
        .expect("posted");
    assert_eq!(client.last_transaction_id(), Some(&id));
    assert_eq!(client.state().unwrap().get("a"), Some(&Value::Integer(5)));
    assert_eq!(client.get_transaction_status(&id).unwrap(), TransactionStatus::Pending);

    // Never committed: the first check plus two retries.
    let outcome = client
        .wait_for_commit_outcome(Some(&id), Duration::ZERO, 2)
        .unwrap();
    assert_eq!(outcome, CommitOutcome::PendingExhausted { checks: 3 });

    validator.produce_block();
    assert!(client.wait_for_commit(None, Duration::ZERO, 0).unwrap());
    assert_eq!(client.get_transaction_status(&id).unwrap(), TransactionStatus::Committed);
}

#[test]
fn waiting_without_a_target_succeeds_immediately() {
    let validator = validator();
    let client = writer(&validator);
    assert!(client.wait_for_commit(None, Duration::ZERO, 3).unwrap());
    assert!(requests(&client).is_empty());
}

#[test]
fn unknown_transaction_reports_not_found() {
    let validator = validator();
    let client = writer(&validator);
    let id = TransactionId::from("0123456789abcdef");
    let outcome = client
        .wait_for_commit_outcome(Some(&id), Duration::ZERO, 1)
        .unwrap();
    assert_eq!(outcome, CommitOutcome::NotFound { checks: 2 });
}

#[test]
fn dependent_transactions_build_on_speculative_state() {
    let validator = validator();
    let mut client = writer(&validator);

    let first = client
        .submit(vec![integer_key::set("a", 1)], vec![])
        .unwrap()
        .unwrap();
    client
        .submit(vec![integer_key::inc("a", 2)], vec![first])
        .unwrap()
        .unwrap();
    assert_eq!(client.state().unwrap().get("a"), Some(&Value::Integer(3)));

    validator.produce_block();
    client.fetch_state().unwrap();
    assert_eq!(client.state().unwrap().get("a"), Some(&Value::Integer(3)));
}

#[test]
fn updates_in_one_transaction_see_each_other() {
    let validator = validator();
    let mut client = writer(&validator);
    client
        .send_update(vec![integer_key::set("a", 1), integer_key::inc("a", 4)], &[])
        .unwrap()
        .unwrap();
    validator.produce_block();
    assert_eq!(
        client.get_store_object_for_key("a").unwrap(),
        Value::Integer(5)
    );
}

#[test]
fn batch_becomes_one_transaction() {
    let validator = validator();
    let mut client = writer(&validator);

    let id = client
        .with_batch(|batch| {
            batch.add(integer_key::set("x", 1), &[])?;
            batch.add(vec![integer_key::set("y", 2), integer_key::inc("x", 1)], &[])?;
            assert!(batch.client().pending_batch().is_some());
            Ok(())
        })
        .unwrap()
        .expect("posted");

    assert_eq!(validator.pending_count(), 1);
    validator.produce_block();

    let updates = client.get_transaction(&id, Some("Updates")).unwrap();
    assert_eq!(updates.as_array().map(<[Value]>::len), Some(3));
    let objects = client.get_all_store_objects().unwrap();
    assert_eq!(objects.get("x"), Some(&Value::Integer(2)));
    assert_eq!(objects.get("y"), Some(&Value::Integer(2)));
}

#[test]
fn failed_batch_scope_is_reset() {
    let validator = validator();
    let mut client = writer(&validator);

    let result = client.with_batch(|batch| {
        batch.add(integer_key::set("x", 1), &[])?;
        Err(ClientError::configuration("changed my mind"))
    });
    assert!(result.is_err());
    assert!(client.pending_batch().is_none());
    assert_eq!(validator.pending_count(), 0);

    // Nothing left open, so a new batch can start.
    client.start_batch().unwrap();
    assert!(client.send_batch().is_err());
}

#[test]
fn reset_batch_leaves_speculative_state_untouched() {
    let validator = validator();
    let mut seed = writer(&validator);
    seed.submit(vec![integer_key::set("x", 1)], vec![]).unwrap().unwrap();
    validator.produce_block();

    let mut client = writer(&validator);
    assert_eq!(client.fetch_state().unwrap(), RefreshOutcome::Full);
    let before = client.state().unwrap().clone();
    let pending_before = validator.pending_count();

    client.start_batch().unwrap();
    client.send_update(integer_key::inc("x", 1), &[]).unwrap();
    client.send_update(integer_key::set("y", 3), &[]).unwrap();
    client.reset_batch();

    let after = client.state().unwrap();
    assert_eq!(after, &before);
    assert!(after.shares_root_with(client.synchronized_state().unwrap().store()));
    assert_eq!(validator.pending_count(), pending_before);
    assert!(!requests(&client)
        .iter()
        .any(|(method, _)| *method == Method::Post));

    {
        let mut scope = client.batch().unwrap();
        scope.add(integer_key::inc("x", 5), &[]).unwrap();
        scope.abort();
    }
    let synchronized = client.synchronized_state().unwrap().store();
    assert!(client.state().unwrap().shares_root_with(synchronized));
}

#[test]
fn local_rejection_never_reaches_the_validator() {
    let validator = validator();
    let mut client = writer(&validator);

    let err = client
        .submit(vec![integer_key::inc("missing", 1)], vec![])
        .unwrap_err();
    assert!(matches!(err, ClientError::InvalidTransaction(_)));
    assert!(!requests(&client)
        .iter()
        .any(|(method, _)| *method == Method::Post));
    assert_eq!(validator.pending_count(), 0);
}

#[test]
fn remote_rejection_surfaces_as_invalid_transaction() {
    let validator = validator();
    let mut client = writer_with(&validator, config().with_client_validation_disabled());

    let err = client
        .submit(vec![integer_key::inc("missing", 1)], vec![])
        .unwrap_err();
    match err {
        ClientError::InvalidTransaction(detail) => assert!(detail.contains("missing")),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(client.last_transaction_id(), None);
}

#[test]
fn session_cookie_is_reused() {
    let validator = validator();
    let client = reader(&validator);
    assert_eq!(client.channel().session_cookie(), None);

    client.get_status().unwrap();
    let cookie = client.channel().session_cookie().map(str::to_string);
    assert!(cookie.is_some());

    client.get_block_list(None).unwrap();
    client.get_store_list().unwrap();
    assert_eq!(client.channel().session_cookie().map(str::to_string), cookie);
    assert_eq!(validator.session_count(), 1);
}

#[test]
fn read_api() {
    let validator = validator();
    let mut client = writer(&validator);
    let genesis = validator.head();

    let id = client
        .submit(vec![integer_key::set("a", 1), integer_key::set("b", 2)], vec![])
        .unwrap()
        .unwrap();
    let block = validator.produce_block();

    let status = client.get_status().unwrap();
    assert_eq!(status.get("Name").and_then(Value::as_text), Some("test-validator"));

    assert_eq!(client.get_store_list().unwrap(), vec![STORE.to_string()]);
    assert_eq!(client.get_store_keys().unwrap(), vec!["a".to_string(), "b".to_string()]);
    assert_eq!(client.get_all_store_objects().unwrap().len(), 2);
    assert_eq!(client.get_store_object_for_key("b").unwrap(), Value::Integer(2));
    assert!(client.get_store_object_for_key("zzz").unwrap_err().is_transport_failure());

    let delta = client.get_store_delta_for_block(&block).unwrap();
    assert_eq!(delta.updated.len(), 2);
    assert!(client.get_store_objects_through_block(&genesis).unwrap().is_empty());

    assert_eq!(client.get_block_list(Some(1)).unwrap(), vec![block.clone()]);
    assert_eq!(client.get_block_list(None).unwrap(), vec![block.clone(), genesis]);
    assert_eq!(
        client.get_block(&block, Some("BlockNum")).unwrap(),
        Value::Integer(1)
    );

    assert_eq!(client.get_transaction_list(Some(1)).unwrap(), vec![id.clone()]);
    assert_eq!(
        client.get_transaction(&id, Some("Status")).unwrap(),
        Value::from("committed")
    );
    assert_eq!(
        client.get_transaction(&id, Some("InBlock")).unwrap(),
        Value::from(block.as_str())
    );

    let message = Value::map([("Gossip", "hello")]);
    let reply = client.forward_message(&message).unwrap();
    assert!(reply.is_some());
    assert_eq!(validator.forwarded_messages(), vec![message]);
}

#[test]
fn store_paths_always_carry_a_query_separator() {
    let validator = validator();
    let mut client = reader(&validator);
    client.fetch_state().unwrap();
    client.get_store_keys().unwrap();

    for (_, path) in requests(&client)
        .into_iter()
        .filter(|(_, path)| path.starts_with("store/"))
    {
        assert!(path.contains('?'), "missing query separator in {path}");
    }
}

#[test]
fn json_validator_is_understood() {
    let validator = Arc::new(
        LedgerValidator::new(ValidatorConfig::default().with_json_responses())
            .with_family(Arc::new(IntegerKey)),
    );
    let mut client = writer(&validator);
    client.submit(vec![integer_key::set("a", 9)], vec![]).unwrap().unwrap();
    validator.produce_block();

    let mut reader = reader(&validator);
    assert_eq!(reader.fetch_state().unwrap(), RefreshOutcome::Full);
    assert_eq!(reader.state().unwrap().get("a"), Some(&Value::Integer(9)));
}

#[test]
fn signing_key_from_hex() {
    let validator = validator();
    let identity = SigningIdentity::generate();
    let hex = identity.secret_hex().to_string();
    let http = LoopbackClient::new(InMemoryValidator::new(Arc::clone(&validator)));
    let mut client = LedgerClient::with_family(
        config().with_signing_key(KeySource::Hex(hex)),
        Arc::new(IntegerKey),
        http,
    )
    .unwrap();

    let id = client
        .submit(vec![integer_key::set("k", 1)], vec![])
        .unwrap()
        .unwrap();
    validator.produce_block();

    let public_key = client.get_transaction(&id, Some("PublicKey")).unwrap();
    assert_eq!(public_key.as_text(), Some(identity.public_key().as_str()));
}

#[test]
fn read_only_client_cannot_submit() {
    let validator = validator();
    let http = LoopbackClient::new(InMemoryValidator::new(Arc::clone(&validator)));
    let mut client = LedgerClient::with_family(config(), Arc::new(IntegerKey), http).unwrap();
    let err = client
        .submit(vec![integer_key::set("a", 1)], vec![])
        .unwrap_err();
    assert!(matches!(err, ClientError::Configuration(_)));
    assert!(requests(&client).is_empty());
    assert_eq!(validator.pending_count(), 0);
}

#[test]
fn read_only_client_fails_fast_when_validator_is_down() {
    let http = Arc::new(Unreachable::default());
    let mut client =
        LedgerClient::with_family(config(), Arc::new(IntegerKey), Arc::clone(&http)).unwrap();
    let err = client
        .submit(vec![integer_key::set("a", 1)], vec![])
        .unwrap_err();
    assert!(matches!(err, ClientError::Configuration(_)));
    assert_eq!(http.attempts(), 0);
}

#[test]
fn unreachable_validator_yields_no_transaction() {
    let http = Arc::new(Unreachable::default());
    let mut client = LedgerClient::with_family(config(), Arc::new(IntegerKey), Arc::clone(&http))
        .unwrap()
        .with_signer(SigningIdentity::generate());

    // The first submit has to refresh state, and that refresh cannot connect.
    let result = client.submit(vec![integer_key::set("a", 1)], vec![]).unwrap();
    assert_eq!(result, None);
    assert!(http.attempts() > 0);
    assert_eq!(client.last_transaction_id(), None);
    assert!(client.state().unwrap().is_empty());

    client.start_batch().unwrap();
    client.send_update(integer_key::set("b", 2), &[]).unwrap();
    assert_eq!(client.send_batch().unwrap(), None);
    assert!(client.pending_batch().is_none());
}
