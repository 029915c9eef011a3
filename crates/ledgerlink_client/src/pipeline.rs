//! Transaction submission pipeline.
//!
//! build -> sign -> speculative check -> wrap -> post -> speculative apply

use crate::error::{ClientError, ClientResult};
use crate::http::{Channel, HttpClient};
use ledgerlink_codec::{Encode, Value};
use ledgerlink_protocol::{MessageEnvelope, Signer, Transaction, TransactionFamily, TransactionId};
use ledgerlink_store::Store;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where sealed envelopes are posted.
pub trait MessageSink {
    /// Posts an encoded message to `endpoint`.
    fn post_message(&self, endpoint: &str, message: &Value) -> ClientResult<Option<Value>>;
}

impl<C: HttpClient> MessageSink for Channel<C> {
    fn post_message(&self, endpoint: &str, message: &Value) -> ClientResult<Option<Value>> {
        self.post(endpoint, message)
    }
}

/// A signer shareable across the client.
pub type SharedSigner = Arc<dyn Signer + Send + Sync>;

/// Signs, checks and submits transactions for one family.
pub struct SubmissionPipeline {
    family: Option<Arc<dyn TransactionFamily>>,
    signer: Option<SharedSigner>,
    validate: bool,
    last_transaction: Option<TransactionId>,
}

impl SubmissionPipeline {
    /// Creates a pipeline. Without a signer or family it can only refuse.
    pub fn new(
        family: Option<Arc<dyn TransactionFamily>>,
        signer: Option<SharedSigner>,
        validate: bool,
    ) -> Self {
        Self {
            family,
            signer,
            validate,
            last_transaction: None,
        }
    }

    /// The transaction family, if configured.
    pub fn family(&self) -> Option<&Arc<dyn TransactionFamily>> {
        self.family.as_ref()
    }

    /// Replaces the signer.
    pub fn set_signer(&mut self, signer: SharedSigner) {
        self.signer = Some(signer);
    }

    /// Returns true if a signer is configured.
    pub fn can_sign(&self) -> bool {
        self.signer.is_some()
    }

    /// Returns true if the local speculative check runs.
    pub fn validates(&self) -> bool {
        self.validate
    }

    /// Id of the last successfully submitted transaction.
    pub fn last_transaction_id(&self) -> Option<&TransactionId> {
        self.last_transaction.as_ref()
    }

    /// Submits one transaction built from `updates` and `dependencies`.
    ///
    /// Returns `Ok(None)` when the post failed at the transport level; the
    /// speculative store is untouched in that case and the caller may retry.
    ///
    /// # Errors
    ///
    /// Configuration errors (no signer, no family, no speculative store while
    /// validating) and transaction rejections, local or remote.
    pub fn submit<M: MessageSink + ?Sized>(
        &mut self,
        sink: &M,
        speculative: Option<&mut Store>,
        updates: Vec<Value>,
        dependencies: Vec<TransactionId>,
    ) -> ClientResult<Option<TransactionId>> {
        let signer = self
            .signer
            .as_deref()
            .ok_or_else(|| ClientError::configuration("can not send transactions as a read-only client"))?;
        let family = self
            .family
            .as_deref()
            .ok_or_else(|| ClientError::configuration("no transaction family configured"))?;

        let mut transaction = Transaction::new(family.type_name(), updates, dependencies);
        let transaction_id = transaction.sign(signer)?;

        let speculative = if self.validate {
            let store = speculative.ok_or_else(|| {
                ClientError::configuration(
                    "client must be configured with a store name to validate transactions",
                )
            })?;
            family.check_valid(store, &transaction)?;
            Some(store)
        } else {
            None
        };

        let envelope = MessageEnvelope::seal(family.message_type(), transaction, signer)?;
        debug!(transaction = %transaction_id, endpoint = envelope.endpoint(), "posting transaction");
        match sink.post_message(envelope.endpoint(), &envelope.to_value()) {
            Ok(Some(_)) => {}
            // A 2xx without a structured acknowledgement is not an acceptance.
            Ok(None) => {
                warn!(transaction = %transaction_id, "validator did not acknowledge transaction");
                return Ok(None);
            }
            Err(e) if e.is_transport_failure() => {
                warn!(transaction = %transaction_id, error = %e, "posting transaction failed");
                return Ok(None);
            }
            Err(e) => return Err(e),
        }

        self.last_transaction = Some(transaction_id.clone());
        if let Some(store) = speculative {
            family.apply(store, envelope.transaction())?;
        }
        Ok(Some(transaction_id))
    }
}
