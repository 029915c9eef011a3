//! Transaction submission command.

use super::CommandResult;
use clap::ValueEnum;
use ledgerlink_client::{ClientConfig, KeySource, LedgerClient};
use ledgerlink_codec::{from_json, Value};
use ledgerlink_protocol::{GenericRecordFamily, IntegerKey, TransactionFamily, TransactionId};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Transaction families the CLI can submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FamilyKind {
    /// `{Verb, Name, Value}` counters.
    IntegerKey,
    /// `{Key, Value}` / `{Key, Deleted}` records under caller-supplied names.
    Generic,
}

/// Resolves the family to submit with.
pub fn family(
    kind: FamilyKind,
    type_name: Option<String>,
    message_type: Option<String>,
) -> Result<Arc<dyn TransactionFamily>, Box<dyn std::error::Error>> {
    match kind {
        FamilyKind::IntegerKey => Ok(Arc::new(IntegerKey)),
        FamilyKind::Generic => {
            let type_name = type_name.ok_or("--type-name is required for the generic family")?;
            let message_type =
                message_type.ok_or("--message-type is required for the generic family")?;
            Ok(Arc::new(GenericRecordFamily::new(type_name, message_type)))
        }
    }
}

/// Options for [`run`].
#[derive(Debug)]
pub struct SubmitOptions {
    /// Signing key file.
    pub key_file: PathBuf,
    /// Update records as JSON.
    pub updates: Vec<String>,
    /// Dependency transaction ids.
    pub dependencies: Vec<String>,
    /// Run the local validity check.
    pub validate: bool,
    /// Wait for commit afterwards.
    pub wait: bool,
}

/// Parses JSON update records.
pub fn parse_updates(updates: &[String]) -> Result<Vec<Value>, Box<dyn std::error::Error>> {
    updates
        .iter()
        .map(|raw| {
            let value =
                from_json(raw.as_bytes()).map_err(|e| format!("invalid update '{raw}': {e}"))?;
            if value.as_map().is_none() {
                return Err(format!("update '{raw}' is not a JSON object").into());
            }
            Ok(value)
        })
        .collect()
}

/// Signs and submits one transaction.
pub fn run(
    config: ClientConfig,
    family: Arc<dyn TransactionFamily>,
    options: SubmitOptions,
) -> CommandResult {
    let updates = parse_updates(&options.updates)?;
    let dependencies = options
        .dependencies
        .into_iter()
        .map(TransactionId::from)
        .collect();

    let mut config = config.with_signing_key(KeySource::File(options.key_file));
    if !options.validate {
        config = config.with_client_validation_disabled();
    }
    let mut client = LedgerClient::connect_with_family(config, family)?;

    let id = client
        .submit(updates, dependencies)?
        .ok_or("transaction could not be delivered; it is safe to retry")?;
    info!(transaction = %id, "transaction submitted");
    println!("{id}");

    if options.wait {
        let wait = client.config().wait;
        let outcome = client.wait_for_commit_outcome(Some(&id), wait.poll_interval, wait.max_polls)?;
        return super::wait::report(&id, outcome);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn updates_must_be_json_objects() {
        let parsed = parse_updates(&[r#"{"Verb":"set","Name":"a","Value":1}"#.to_string()]).unwrap();
        assert_eq!(parsed[0].get("Name").and_then(Value::as_text), Some("a"));

        assert!(parse_updates(&["[1, 2]".to_string()]).is_err());
        assert!(parse_updates(&["not json".to_string()]).is_err());
    }

    #[test]
    fn generic_family_uses_given_names() {
        let family = family(
            FamilyKind::Generic,
            Some("/Records".into()),
            Some("/Records/Transaction".into()),
        )
        .unwrap();
        assert_eq!(family.store_name(), "Records");
        assert!(super::family(FamilyKind::Generic, None, None).is_err());
    }
}
