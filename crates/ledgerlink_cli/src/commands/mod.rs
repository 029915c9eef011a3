//! CLI command implementations.

pub mod keygen;
pub mod read;
pub mod submit;
pub mod wait;

use ledgerlink_codec::Value;

/// Result type for commands.
pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Prints a value as pretty JSON.
pub fn print_value(value: &Value) -> CommandResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
