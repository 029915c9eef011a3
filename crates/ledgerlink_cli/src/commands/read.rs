//! Read-only commands.

use super::{print_value, CommandResult};
use ledgerlink_client::{ClientConfig, HttpLedgerClient, LedgerClient};
use ledgerlink_codec::{Body, Value};
use ledgerlink_protocol::TransactionId;
use ledgerlink_store::BlockId;

fn connect(config: ClientConfig) -> Result<HttpLedgerClient, Box<dyn std::error::Error>> {
    Ok(LedgerClient::connect(config)?)
}

fn print_ids<T: AsRef<str>>(ids: &[T]) -> CommandResult {
    print_value(&Value::Array(
        ids.iter().map(|id| Value::from(id.as_ref())).collect(),
    ))
}

/// Shows the validator status.
pub fn status(config: ClientConfig) -> CommandResult {
    print_value(&connect(config)?.get_status()?)
}

/// Lists stores.
pub fn stores(config: ClientConfig) -> CommandResult {
    print_ids(&connect(config)?.get_store_list()?)
}

/// Lists recent block ids.
pub fn blocks(config: ClientConfig, count: Option<usize>) -> CommandResult {
    print_ids(&connect(config)?.get_block_list(count)?)
}

/// Shows a block or one of its fields.
pub fn block(config: ClientConfig, id: &str, field: Option<&str>) -> CommandResult {
    print_value(&connect(config)?.get_block(&BlockId::from(id), field)?)
}

/// Lists transaction ids in recent blocks.
pub fn transactions(config: ClientConfig, count: Option<usize>) -> CommandResult {
    print_ids(&connect(config)?.get_transaction_list(count)?)
}

/// Shows a transaction or one of its fields.
pub fn transaction(config: ClientConfig, id: &str, field: Option<&str>) -> CommandResult {
    print_value(&connect(config)?.get_transaction(&TransactionId::from(id), field)?)
}

/// Shows the commit status of a transaction.
pub fn txn_status(config: ClientConfig, id: &str) -> CommandResult {
    let status = connect(config)?.get_transaction_status(&TransactionId::from(id))?;
    println!("{status}");
    Ok(())
}

/// Queries the configured store.
pub fn store(config: ClientConfig, key: Option<&str>, block: Option<&str>, delta: bool) -> CommandResult {
    if delta && key.is_none() {
        return Err("--delta requires --key".into());
    }
    let client = connect(config)?;
    let block = block.map(BlockId::from);
    match client.get_store(key, block.as_ref(), delta)? {
        Body::Structured(value) => print_value(&value),
        Body::Opaque(bytes) => {
            println!("{}", String::from_utf8_lossy(&bytes));
            Ok(())
        }
    }
}
