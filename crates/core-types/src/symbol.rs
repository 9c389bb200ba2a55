//! Helpers for `EXCHANGE.product` style symbols.

use crate::error::CoreError;

/// Splits `CZCE.SA601` into `("CZCE", "SA601")`.
pub fn split_symbol(symbol: &str) -> Result<(&str, &str), CoreError> {
    match symbol.split_once('.') {
        Some((exchange, product)) if !exchange.is_empty() && !product.is_empty() => {
            Ok((exchange, product))
        }
        _ => Err(CoreError::MalformedSymbol(symbol.to_string())),
    }
}

/// Option contracts carry a call/put marker, e.g. `CZCE.SA601-C-1400`.
pub fn is_option(symbol: &str) -> bool {
    symbol.contains("-C-") || symbol.contains("-P-")
}

/// Maps a concrete contract back to its base code by dropping the delivery month.
///
/// `SHFE.rb2510` -> `SHFE.rb`, `CZCE.SA601` -> `CZCE.SA`. A base code maps to itself.
pub fn base_code(symbol: &str) -> Result<String, CoreError> {
    let (exchange, product) = split_symbol(symbol)?;
    let letters: String = product
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() {
        return Err(CoreError::MalformedSymbol(symbol.to_string()));
    }
    Ok(format!("{exchange}.{letters}"))
}
