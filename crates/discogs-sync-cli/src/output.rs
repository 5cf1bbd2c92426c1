use serde::Serialize;

use crate::error::CliError;

/// Prints `value` as one JSON document on stdout.
pub fn render<T>(value: &T, pretty: bool) -> Result<(), CliError>
where
    T: Serialize + ?Sized,
{
    let payload = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{payload}");
    Ok(())
}
