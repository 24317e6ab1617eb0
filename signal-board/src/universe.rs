//! The fixed, ordered set of tokens the dashboard always reports on.

/// Quote asset appended to a token to form the upstream symbol (eg/ `BTC` -> `BTCUSDT`).
pub const QUOTE_SUFFIX: &str = "USDT";

/// Entity Universe in reporting order. Immutable for the process lifetime.
pub const TOKENS: [&str; 30] = [
    "BTC", "ETH", "BNB", "ADA", "SOL", "XRP", "DOT", "LINK", "AVAX", "ATOM", "TRX", "LTC", "FIL",
    "DOGE", "MATIC", "SHIB", "PEPE", "GMT", "SAND", "AAVE", "NEAR", "FTM", "UNI", "OP", "ARB",
    "INJ", "RNDR", "SEI", "TIA", "WIF",
];

/// Upstream symbol for a token. Case-sensitive, no normalisation of the input.
pub fn upstream_symbol(token: &str) -> String {
    format!("{token}{QUOTE_SUFFIX}")
}
