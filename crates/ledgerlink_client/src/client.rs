//! The ledger client facade.

use crate::batch::{BatchSlot, PendingBatch};
use crate::commit::{CommitOutcome, CommitPoller};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::http::{Channel, HttpClient};
use crate::paths::{item_path, list_path, store_path, ItemKind, ALL_OBJECTS};
use crate::pipeline::{SharedSigner, SubmissionPipeline};
use crate::status::TransactionStatus;
use crate::sync::{structured, text_list, LedgerSource, RefreshOutcome, StateSync};
use ledgerlink_codec::{Body, Value};
use ledgerlink_protocol::{Signer, TransactionFamily, TransactionId, Updates};
use ledgerlink_store::{BlockId, Delta, Snapshot, Store};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Client for one validator.
///
/// A client owns its synchronized and speculative state, the open batch
/// and the last submitted transaction id. It is meant to be driven from
/// one thread; wrap it in a mutex to share it.
pub struct LedgerClient<C: HttpClient> {
    config: ClientConfig,
    channel: Channel<C>,
    store_name: Option<String>,
    sync: Option<StateSync>,
    pipeline: SubmissionPipeline,
    batch: BatchSlot,
}

impl<C: HttpClient> LedgerClient<C> {
    /// Creates a client without a transaction family. It can read, and
    /// track state if the config names a store, but cannot submit.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid config or signing key.
    pub fn new(config: ClientConfig, http: C) -> ClientResult<Self> {
        Self::build(config, None, http)
    }

    /// Creates a client that submits transactions of `family`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid config or signing key.
    pub fn with_family(
        config: ClientConfig,
        family: Arc<dyn TransactionFamily>,
        http: C,
    ) -> ClientResult<Self> {
        Self::build(config, Some(family), http)
    }

    fn build(
        config: ClientConfig,
        family: Option<Arc<dyn TransactionFamily>>,
        http: C,
    ) -> ClientResult<Self> {
        config.validate()?;

        let store_name = config.resolve_store_name(family.as_deref().map(|f| f.store_name()));
        let sync = store_name
            .as_ref()
            .map(|name| StateSync::new(name.clone(), config.lookback));

        let signer = match &config.signing_key {
            Some(source) => {
                let identity = source.load()?;
                debug!(name = %config.name, identifier = %identity.identifier(), "signing key loaded");
                Some(Arc::new(identity) as SharedSigner)
            }
            None => None,
        };

        let channel = Channel::new(config.base_url.clone(), http).with_timeouts(
            config.head_timeout,
            config.get_timeout,
            config.post_timeout,
        );
        let pipeline = SubmissionPipeline::new(family, signer, !config.disable_client_validation);

        Ok(Self {
            config,
            channel,
            store_name,
            sync,
            pipeline,
            batch: BatchSlot::new(),
        })
    }

    /// Uses `signer` for all further submissions.
    #[must_use]
    pub fn with_signer(mut self, signer: impl Signer + Send + Sync + 'static) -> Self {
        self.pipeline.set_signer(Arc::new(signer));
        self
    }

    /// Validator base URL.
    pub fn base_url(&self) -> &str {
        self.channel.base_url()
    }

    /// The client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The transport channel.
    pub fn channel(&self) -> &Channel<C> {
        &self.channel
    }

    /// The store this client tracks, if any.
    pub fn store_name(&self) -> Option<&str> {
        self.store_name.as_deref()
    }

    /// Id of the last successfully submitted transaction.
    pub fn last_transaction_id(&self) -> Option<&TransactionId> {
        self.pipeline.last_transaction_id()
    }

    fn scoped_sync(&self) -> ClientResult<&StateSync> {
        self.sync.as_ref().ok_or_else(no_store_scope)
    }

    /// The speculative state: the last synchronized state plus every
    /// transaction submitted since. It may be stale; call
    /// [`fetch_state`](Self::fetch_state) first for a fresh view.
    ///
    /// # Errors
    ///
    /// Fails if the client has no store scope.
    pub fn state(&self) -> ClientResult<&Store> {
        Ok(self.scoped_sync()?.speculative())
    }

    /// The last synchronized snapshot.
    pub fn synchronized_state(&self) -> ClientResult<&Snapshot> {
        Ok(self.scoped_sync()?.synchronized())
    }

    /// Refreshes the state from the validator's head block.
    ///
    /// # Errors
    ///
    /// Fails if the client has no store scope, or a fetch fails.
    pub fn fetch_state(&mut self) -> ClientResult<RefreshOutcome> {
        let sync = self.sync.as_mut().ok_or_else(no_store_scope)?;
        sync.refresh(&self.channel)
    }

    /// Alias of [`fetch_state`](Self::fetch_state).
    pub fn refresh(&mut self) -> ClientResult<RefreshOutcome> {
        self.fetch_state()
    }

    // ---- batches ----

    /// Opens a batch. Until [`send_batch`](Self::send_batch), updates are
    /// buffered instead of sent.
    ///
    /// # Errors
    ///
    /// Fails if a batch is already open.
    pub fn start_batch(&mut self) -> ClientResult<()> {
        self.batch.start()
    }

    /// Discards the open batch.
    pub fn reset_batch(&mut self) {
        self.batch.reset();
    }

    /// The open batch, if any.
    pub fn pending_batch(&self) -> Option<&PendingBatch> {
        self.batch.pending()
    }

    /// Submits everything in the open batch as one transaction.
    ///
    /// The batch is closed before submitting.
    ///
    /// # Errors
    ///
    /// Fails if no batch is open or it holds no updates, and otherwise as
    /// [`submit`](Self::submit).
    pub fn send_batch(&mut self) -> ClientResult<Option<TransactionId>> {
        let (updates, dependencies) = self.batch.take()?.into_parts();
        self.submit(updates, dependencies)
    }

    /// Sends an update, or a sequence of updates, as one transaction; or
    /// adds them to the open batch and returns `None`.
    pub fn send_update(
        &mut self,
        updates: impl Into<Updates>,
        dependencies: &[TransactionId],
    ) -> ClientResult<Option<TransactionId>> {
        match self.batch.add(updates.into(), dependencies) {
            None => Ok(None),
            Some(updates) => self.submit(updates.into_vec(), dependencies.to_vec()),
        }
    }

    /// Opens a batch scoped to the returned guard.
    ///
    /// Committing the guard sends the batch; dropping it without committing
    /// resets it, so the batch never outlives the scope.
    ///
    /// # Errors
    ///
    /// Fails if a batch is already open.
    pub fn batch(&mut self) -> ClientResult<BatchScope<'_, C>> {
        self.start_batch()?;
        Ok(BatchScope {
            client: self,
            finished: false,
        })
    }

    /// Runs `f` inside a batch. The batch is sent if `f` succeeds and reset
    /// if it fails or panics.
    pub fn with_batch<F>(&mut self, f: F) -> ClientResult<Option<TransactionId>>
    where
        F: FnOnce(&mut BatchScope<'_, C>) -> ClientResult<()>,
    {
        let mut scope = self.batch()?;
        f(&mut scope)?;
        scope.commit()
    }

    // ---- submission ----

    /// Builds, signs, checks and submits one transaction.
    ///
    /// Returns `Ok(None)` if the validator could not be reached, either for
    /// the first state refresh or for the post itself.
    ///
    /// # Errors
    ///
    /// Configuration errors and transaction rejections. Configuration is
    /// checked before anything is sent.
    pub fn submit(
        &mut self,
        updates: Vec<Value>,
        dependencies: Vec<TransactionId>,
    ) -> ClientResult<Option<TransactionId>> {
        if !self.pipeline.can_sign() {
            return Err(ClientError::configuration(
                "can not send transactions as a read-only client",
            ));
        }
        if self.pipeline.family().is_none() {
            return Err(ClientError::configuration("no transaction family configured"));
        }

        let speculative = if self.pipeline.validates() {
            let sync = self.sync.as_mut().ok_or_else(no_store_scope)?;
            if !sync.is_synchronized() {
                match sync.refresh(&self.channel) {
                    Ok(_) => {}
                    Err(e) if e.is_transport_failure() => {
                        warn!(store = sync.store_name(), error = %e, "state refresh before submission failed");
                        return Ok(None);
                    }
                    Err(e) => return Err(e),
                }
            }
            Some(sync.speculative_mut())
        } else {
            None
        };
        self.pipeline
            .submit(&self.channel, speculative, updates, dependencies)
    }

    // ---- commit confirmation ----

    /// Waits for a transaction (the last submitted one by default) to
    /// commit, checking its status every `poll_interval`.
    ///
    /// The first check is followed by up to `max_polls` retries. Returns
    /// true if it committed, or if there was nothing to wait for.
    ///
    /// # Errors
    ///
    /// Only a status check that gets no response is an error.
    pub fn wait_for_commit(
        &self,
        transaction_id: Option<&TransactionId>,
        poll_interval: Duration,
        max_polls: u32,
    ) -> ClientResult<bool> {
        Ok(self
            .wait_for_commit_outcome(transaction_id, poll_interval, max_polls)?
            .is_success())
    }

    /// [`wait_for_commit`](Self::wait_for_commit) with the configured
    /// interval and poll budget.
    pub fn wait_for_commit_default(&self, transaction_id: Option<&TransactionId>) -> ClientResult<bool> {
        let wait = self.config.wait;
        self.wait_for_commit(transaction_id, wait.poll_interval, wait.max_polls)
    }

    /// Like [`wait_for_commit`](Self::wait_for_commit), returning how the
    /// wait ended.
    pub fn wait_for_commit_outcome(
        &self,
        transaction_id: Option<&TransactionId>,
        poll_interval: Duration,
        max_polls: u32,
    ) -> ClientResult<CommitOutcome> {
        let target = transaction_id.or(self.last_transaction_id());
        CommitPoller::new(poll_interval, max_polls).wait(target, |id| self.get_transaction_status(id))
    }

    // ---- reads ----

    fn get_value(&self, path: &str, what: &str) -> ClientResult<Value> {
        structured(self.channel.get(path)?, what)
    }

    /// Validator status.
    pub fn get_status(&self) -> ClientResult<Value> {
        let body = self
            .channel
            .get_with_timeout("status", self.config.head_timeout)?;
        structured(body, "status")
    }

    /// Names of the validator's stores.
    pub fn get_store_list(&self) -> ClientResult<Vec<String>> {
        text_list(&self.get_value("store", "store list")?, "store list")
    }

    /// Raw store query against any store.
    ///
    /// Without a key the validator lists keys; the key `*` returns every
    /// object. `delta` asks for the effect of `block_id` alone and is only
    /// sent with a key.
    pub fn get_store_by_name(
        &self,
        name: &str,
        key: Option<&str>,
        block_id: Option<&BlockId>,
        delta: bool,
    ) -> ClientResult<Body> {
        let path = store_path(Some(name), key, block_id.map(BlockId::as_str), delta);
        self.channel.get(&path)
    }

    /// Raw store query against this client's store.
    ///
    /// # Errors
    ///
    /// Fails if the client has no store scope.
    pub fn get_store(&self, key: Option<&str>, block_id: Option<&BlockId>, delta: bool) -> ClientResult<Body> {
        let name = self.store_name.as_deref().ok_or_else(no_store_scope)?;
        self.get_store_by_name(name, key, block_id, delta)
    }

    /// Keys of every object in this client's store.
    pub fn get_store_keys(&self) -> ClientResult<Vec<String>> {
        let value = structured(self.get_store(None, None, false)?, "store keys")?;
        text_list(&value, "store keys")
    }

    /// Every object in this client's store.
    pub fn get_all_store_objects(&self) -> ClientResult<BTreeMap<String, Value>> {
        let value = structured(self.get_store(Some(ALL_OBJECTS), None, false)?, "store")?;
        match value {
            Value::Map(objects) => Ok(objects),
            Value::Null => Ok(BTreeMap::new()),
            other => Err(ClientError::Protocol(format!(
                "expected map of objects, got {}",
                other.kind()
            ))),
        }
    }

    /// One object of this client's store.
    pub fn get_store_object_for_key(&self, key: &str) -> ClientResult<Value> {
        structured(self.get_store(Some(key), None, false)?, "store object")
    }

    /// The effect of one block on this client's store.
    pub fn get_store_delta_for_block(&self, block_id: &BlockId) -> ClientResult<Delta> {
        let name = self.store_name.as_deref().ok_or_else(no_store_scope)?;
        self.channel.store_delta(name, block_id)
    }

    /// This client's store as of `block_id`.
    pub fn get_store_objects_through_block(&self, block_id: &BlockId) -> ClientResult<Store> {
        let name = self.store_name.as_deref().ok_or_else(no_store_scope)?;
        self.channel.store_objects(name, block_id)
    }

    /// Most recent block ids, newest first.
    pub fn get_block_list(&self, count: Option<usize>) -> ClientResult<Vec<BlockId>> {
        let value = self.get_value(&list_path(ItemKind::Block, count), "block list")?;
        Ok(text_list(&value, "block list")?
            .into_iter()
            .map(BlockId::from)
            .collect())
    }

    /// A block, or one of its fields.
    pub fn get_block(&self, block_id: &BlockId, field: Option<&str>) -> ClientResult<Value> {
        self.get_value(&item_path(ItemKind::Block, block_id.as_str(), field), "block")
    }

    /// Ids of transactions in the most recent `block_count` blocks, newest
    /// first.
    pub fn get_transaction_list(&self, block_count: Option<usize>) -> ClientResult<Vec<TransactionId>> {
        let value = self.get_value(&list_path(ItemKind::Transaction, block_count), "transaction list")?;
        Ok(text_list(&value, "transaction list")?
            .into_iter()
            .map(TransactionId::from)
            .collect())
    }

    /// A transaction, or one of its fields.
    pub fn get_transaction(&self, transaction_id: &TransactionId, field: Option<&str>) -> ClientResult<Value> {
        self.get_value(
            &item_path(ItemKind::Transaction, transaction_id.as_str(), field),
            "transaction",
        )
    }

    /// Status of a transaction.
    pub fn get_transaction_status(&self, transaction_id: &TransactionId) -> ClientResult<TransactionStatus> {
        let code = self
            .channel
            .head(&item_path(ItemKind::Transaction, transaction_id.as_str(), None))?;
        Ok(TransactionStatus::from_code(code))
    }

    /// Posts a message for the validator to forward to its peers.
    pub fn forward_message(&self, message: &Value) -> ClientResult<Option<Value>> {
        info!("forwarding message");
        self.channel.post("forward", message)
    }
}

#[cfg(feature = "reqwest")]
impl LedgerClient<crate::reqwest_client::ReqwestClient> {
    /// Creates a client over HTTP, without a transaction family.
    pub fn connect(config: ClientConfig) -> ClientResult<Self> {
        let http = crate::reqwest_client::ReqwestClient::new()?;
        Self::new(config, http)
    }

    /// Creates a client over HTTP that submits transactions of `family`.
    pub fn connect_with_family(config: ClientConfig, family: Arc<dyn TransactionFamily>) -> ClientResult<Self> {
        let http = crate::reqwest_client::ReqwestClient::new()?;
        Self::with_family(config, family, http)
    }
}

fn no_store_scope() -> ClientError {
    ClientError::configuration("client must be configured with a store name or transaction family")
}

/// An open batch tied to a scope.
///
/// [`commit`](BatchScope::commit) sends the batch; dropping the scope any
/// other way resets it.
pub struct BatchScope<'a, C: HttpClient> {
    client: &'a mut LedgerClient<C>,
    finished: bool,
}

impl<C: HttpClient> BatchScope<'_, C> {
    /// Adds updates to the batch.
    pub fn add(&mut self, updates: impl Into<Updates>, dependencies: &[TransactionId]) -> ClientResult<()> {
        self.client.send_update(updates, dependencies).map(|_| ())
    }

    /// Read access to the client inside the scope.
    pub fn client(&self) -> &LedgerClient<C> {
        &*self.client
    }

    /// Sends the batch as one transaction.
    pub fn commit(mut self) -> ClientResult<Option<TransactionId>> {
        self.finished = true;
        self.client.send_batch()
    }

    /// Discards the batch.
    pub fn abort(mut self) {
        self.finished = true;
        self.client.reset_batch();
    }
}

impl<C: HttpClient> Drop for BatchScope<'_, C> {
    fn drop(&mut self) {
        if !self.finished {
            debug!("batch scope dropped without commit, resetting batch");
            self.client.reset_batch();
        }
    }
}
