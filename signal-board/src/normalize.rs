//! Signal Normalizer.
//!
//! Maps an arbitrarily shaped upstream payload onto the fixed [`TOKENS`] universe, producing
//! exactly one [`NormalizedSignal`] per token, sorted by `score` descending.

use crate::{
    error::NormalizeError,
    universe::{TOKENS, upstream_symbol},
    value::{field, field_str},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{cmp::Reverse, collections::HashMap};
use tracing::warn;

/// Keys the upstream has used over time for the signal list, in priority order.
pub const LIST_KEYS: [&str; 3] = ["signals", "opportunities", "data"];

/// Recommended action for a token.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    BuyLong,
    Short,
    DontBuyLong,
    DontShort,
    NoSignal,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::BuyLong => "buy_long",
            Action::Short => "short",
            Action::DontBuyLong => "dont_buy_long",
            Action::DontShort => "dont_short",
            Action::NoSignal => "no_signal",
        }
    }

    /// Map an upstream `side` (any case) to an [`Action`]; anything unrecognised is
    /// [`Action::NoSignal`].
    pub fn from_side(side: &str) -> Self {
        match side.to_lowercase().as_str() {
            "buy_long" => Action::BuyLong,
            "short" => Action::Short,
            "dont_buy_long" => Action::DontBuyLong,
            "dont_short" => Action::DontShort,
            _ => Action::NoSignal,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Schema-stable output record for one token.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NormalizedSignal {
    /// Bare token (eg/ "BTC"), no quote suffix
    pub symbol: String,
    pub action: Action,
    /// Signal strength on a 0-100 scale (not clamped)
    pub score: i64,
    /// Upstream timestamp, passed through verbatim
    pub timestamp: Option<Value>,
    /// Take profit, passed through verbatim
    pub tp: Option<Value>,
    /// Stop loss, passed through verbatim
    pub sl: Option<Value>,
}

impl NormalizedSignal {
    /// Default record for a token the upstream said nothing about.
    pub fn no_signal(token: &str) -> Self {
        Self {
            symbol: token.to_string(),
            action: Action::NoSignal,
            score: 0,
            timestamp: None,
            tp: None,
            sl: None,
        }
    }
}

/// Locate the list of raw signals inside an upstream payload.
///
/// A bare list is returned as-is. For an object the [`LIST_KEYS`] are tried in order, then the
/// first list-valued field in upstream key order. Anything else yields an empty slice.
pub fn extract_list(raw: &Value) -> &[Value] {
    match raw {
        Value::Array(items) => items.as_slice(),
        Value::Object(fields) => LIST_KEYS
            .iter()
            .find_map(|key| fields.get(*key).and_then(Value::as_array))
            .or_else(|| fields.values().find_map(Value::as_array))
            .map(Vec::as_slice)
            .unwrap_or_default(),
        _ => &[],
    }
}

/// Scale an upstream probability to a 0-100 score.
///
/// Values `<= 1` are fractions and are multiplied by 100, larger values are already on the
/// 0-100 scale. Rounds half to even. Out of range values are not clamped.
pub fn score_from_proba(proba: f64) -> i64 {
    let scaled = if proba <= 1.0 { proba * 100.0 } else { proba };
    scaled.round_ties_even() as i64
}

/// One `no_signal` record per token, in universe order.
pub fn default_signals() -> Vec<NormalizedSignal> {
    TOKENS.iter().map(|token| NormalizedSignal::no_signal(token)).collect()
}

/// Normalise a raw upstream payload. Never fails, see [`normalize_signals`].
pub fn normalize(raw: &Value) -> Vec<NormalizedSignal> {
    normalize_signals(extract_list(raw))
}

/// Normalise an already extracted raw signal list.
///
/// Payloads that cannot be normalised at all collapse to [`default_signals`].
pub fn normalize_signals(raw_signals: &[Value]) -> Vec<NormalizedSignal> {
    try_normalize_signals(raw_signals).unwrap_or_else(|error| {
        warn!(%error, "unusable signal payload, reporting no_signal for every token");
        default_signals()
    })
}

pub fn try_normalize_signals(raw_signals: &[Value]) -> Result<Vec<NormalizedSignal>, NormalizeError> {
    // Last record wins on duplicate symbols. Records without a string symbol are unreachable.
    let lookup = raw_signals
        .iter()
        .filter_map(|raw| field_str(raw, "symbol").map(|symbol| (symbol, raw)))
        .collect::<HashMap<_, _>>();

    let mut signals = TOKENS
        .iter()
        .map(|token| match lookup.get(upstream_symbol(token).as_str()) {
            Some(raw) => normalize_one(token, raw),
            None => Ok(NormalizedSignal::no_signal(token)),
        })
        .collect::<Result<Vec<_>, _>>()?;

    // Stable, so equal scores keep universe order
    signals.sort_by_key(|signal| Reverse(signal.score));
    Ok(signals)
}

fn normalize_one(token: &str, raw: &Value) -> Result<NormalizedSignal, NormalizeError> {
    let action = field_str(raw, "side")
        .map(Action::from_side)
        .unwrap_or(Action::NoSignal);

    let proba = match field(raw, "proba") {
        None => 0.0,
        Some(Value::Bool(flag)) => f64::from(u8::from(*flag)),
        Some(proba) => proba.as_f64().ok_or_else(|| NormalizeError::InvalidProba {
            symbol: upstream_symbol(token),
            value: proba.to_string(),
        })?,
    };

    Ok(NormalizedSignal {
        symbol: token.to_string(),
        action,
        score: score_from_proba(proba),
        timestamp: field(raw, "timestamp").cloned(),
        tp: field(raw, "tp").cloned(),
        sl: field(raw, "sl").cloned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn find<'a>(signals: &'a [NormalizedSignal], token: &str) -> &'a NormalizedSignal {
        signals.iter().find(|signal| signal.symbol == token).unwrap()
    }

    fn assert_sorted_and_complete(signals: &[NormalizedSignal]) {
        assert_eq!(signals.len(), TOKENS.len());
        assert!(signals.windows(2).all(|pair| pair[0].score >= pair[1].score));
        for token in TOKENS {
            assert_eq!(signals.iter().filter(|s| s.symbol == token).count(), 1);
        }
    }

    #[test]
    fn test_extract_list() {
        struct TestCase {
            input: Value,
            expected: Vec<Value>,
        }

        let tests = vec![
            TestCase {
                // TC0: bare list
                input: json!([{"symbol": "BTCUSDT"}]),
                expected: vec![json!({"symbol": "BTCUSDT"})],
            },
            TestCase {
                // TC1: current key
                input: json!({"signals": [1]}),
                expected: vec![json!(1)],
            },
            TestCase {
                // TC2: historical key
                input: json!({"opportunities": [2]}),
                expected: vec![json!(2)],
            },
            TestCase {
                // TC3: generic key
                input: json!({"data": [3]}),
                expected: vec![json!(3)],
            },
            TestCase {
                // TC4: first list-valued field in upstream key order
                input: json!({"count": 2, "items": [4], "rows": [5]}),
                expected: vec![json!(4)],
            },
            TestCase {
                // TC5: signals wins over opportunities regardless of key order
                input: json!({"opportunities": [2], "signals": [1]}),
                expected: vec![json!(1)],
            },
            TestCase {
                // TC6: priority key holding a non-list is skipped
                input: json!({"signals": "none", "opportunities": [2]}),
                expected: vec![json!(2)],
            },
            TestCase {
                // TC7: empty object
                input: json!({}),
                expected: vec![],
            },
            TestCase {
                // TC8: null
                input: Value::Null,
                expected: vec![],
            },
            TestCase {
                // TC9: scalar string
                input: json!("not json-like"),
                expected: vec![],
            },
            TestCase {
                // TC10: object without any list
                input: json!({"error": "Timeout", "status": 504}),
                expected: vec![],
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(extract_list(&test.input), test.expected.as_slice(), "TC{} failed", index);
        }
    }

    #[test]
    fn test_score_from_proba() {
        struct TestCase {
            input: f64,
            expected: i64,
        }

        let tests = vec![
            TestCase {
                // TC0: fraction
                input: 0.73,
                expected: 73,
            },
            TestCase {
                // TC1: already a percentage
                input: 85.0,
                expected: 85,
            },
            TestCase {
                // TC2: boundary is a fraction
                input: 1.0,
                expected: 100,
            },
            TestCase {
                // TC3: zero
                input: 0.0,
                expected: 0,
            },
            TestCase {
                // TC4: percentage with decimals
                input: 64.6,
                expected: 65,
            },
            TestCase {
                // TC5: ties round to even
                input: 0.125,
                expected: 12,
            },
            TestCase {
                // TC6: negative is not clamped
                input: -0.2,
                expected: -20,
            },
            TestCase {
                // TC7: above 100 is not clamped
                input: 140.0,
                expected: 140,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(score_from_proba(test.input), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_action_from_side() {
        assert_eq!(Action::from_side("buy_long"), Action::BuyLong);
        assert_eq!(Action::from_side("SHORT"), Action::Short);
        assert_eq!(Action::from_side("Dont_Buy_Long"), Action::DontBuyLong);
        assert_eq!(Action::from_side("dont_short"), Action::DontShort);
        assert_eq!(Action::from_side("hold"), Action::NoSignal);
        assert_eq!(Action::from_side(""), Action::NoSignal);
    }

    #[test]
    fn test_normalize_maps_and_sorts() {
        let raw = json!({
            "signals": [
                {"symbol": "ETHUSDT", "side": "BUY_LONG", "proba": 0.73, "timestamp": "2024-05-01T10:00:00Z", "tp": 3300.5, "sl": 3050},
                {"symbol": "SOLUSDT", "side": "short", "proba": 85},
                {"symbol": "DOGEUSDT", "side": "hold", "proba": 0.4},
                {"symbol": "XYZUSDT", "side": "short", "proba": 0.99}
            ]
        });

        let signals = normalize(&raw);
        assert_sorted_and_complete(&signals);

        assert_eq!(
            signals[0],
            NormalizedSignal {
                symbol: "SOL".to_string(),
                action: Action::Short,
                score: 85,
                timestamp: None,
                tp: None,
                sl: None,
            }
        );
        assert_eq!(
            signals[1],
            NormalizedSignal {
                symbol: "ETH".to_string(),
                action: Action::BuyLong,
                score: 73,
                timestamp: Some(json!("2024-05-01T10:00:00Z")),
                tp: Some(json!(3300.5)),
                sl: Some(json!(3050)),
            }
        );
        assert_eq!(signals[2].symbol, "DOGE");
        assert_eq!(signals[2].action, Action::NoSignal);
        assert_eq!(signals[2].score, 40);

        // Everything else keeps universe order, starting with BTC
        assert_eq!(signals[3], NormalizedSignal::no_signal("BTC"));
        assert_eq!(signals[4], NormalizedSignal::no_signal("BNB"));
        assert_eq!(signals.last().unwrap(), &NormalizedSignal::no_signal("WIF"));
    }

    #[test]
    fn test_normalize_ties_keep_universe_order() {
        let raw = json!([
            {"symbol": "WIFUSDT", "side": "buy_long", "proba": 0.5},
            {"symbol": "ADAUSDT", "side": "short", "proba": 50},
            {"symbol": "BTCUSDT", "side": "dont_short", "proba": 0.5}
        ]);

        let signals = normalize(&raw);
        assert_sorted_and_complete(&signals);
        let top = signals[..3].iter().map(|s| s.symbol.as_str()).collect::<Vec<_>>();
        assert_eq!(top, vec!["BTC", "ADA", "WIF"]);
    }

    #[test]
    fn test_normalize_duplicate_symbol_last_wins() {
        let raw = json!([
            {"symbol": "BTCUSDT", "side": "short", "proba": 0.9},
            {"symbol": "BTCUSDT", "side": "buy_long", "proba": 0.6}
        ]);

        let btc = find(&normalize(&raw), "BTC").clone();
        assert_eq!(btc.action, Action::BuyLong);
        assert_eq!(btc.score, 60);
    }

    #[test]
    fn test_normalize_skips_unreachable_records() {
        let raw = json!([
            {"side": "buy_long", "proba": 0.9},
            {"symbol": null, "proba": 0.9},
            {"symbol": 42, "proba": 0.9},
            "ETHUSDT",
            7,
            {"symbol": "btcusdt", "side": "short", "proba": 0.8},
            {"symbol": "SOLUSDT"}
        ]);

        let signals = normalize(&raw);
        assert_sorted_and_complete(&signals);
        // Symbols are case-sensitive
        assert_eq!(find(&signals, "BTC"), &NormalizedSignal::no_signal("BTC"));
        // Matched but without side or proba
        assert_eq!(find(&signals, "SOL"), &NormalizedSignal::no_signal("SOL"));
    }

    #[test]
    fn test_normalize_optional_fields() {
        let raw = json!([
            {"symbol": "LINKUSDT", "side": 1, "proba": null, "timestamp": null, "tp": "18.2"}
        ]);

        let link = find(&normalize(&raw), "LINK").clone();
        assert_eq!(link.action, Action::NoSignal);
        assert_eq!(link.score, 0);
        assert_eq!(link.timestamp, None);
        assert_eq!(link.tp, Some(json!("18.2")));
        assert_eq!(link.sl, None);
    }

    #[test]
    fn test_normalize_non_numeric_proba_collapses_to_defaults() {
        let raw = json!([
            {"symbol": "BTCUSDT", "side": "buy_long", "proba": 0.9},
            {"symbol": "ETHUSDT", "side": "short", "proba": "high"}
        ]);

        assert!(matches!(
            try_normalize_signals(extract_list(&raw)),
            Err(NormalizeError::InvalidProba { ref symbol, .. }) if symbol == "ETHUSDT"
        ));
        assert_eq!(normalize(&raw), default_signals());
    }

    #[test]
    fn test_normalize_bool_proba_is_numeric() {
        let raw = json!([
            {"symbol": "BTCUSDT", "side": "buy_long", "proba": 0.9},
            {"symbol": "ETHUSDT", "side": "short", "proba": true},
            {"symbol": "SOLUSDT", "side": "dont_short", "proba": false}
        ]);

        let signals = normalize(&raw);
        assert_eq!(signals[0].symbol, "ETH");
        assert_eq!(signals[0].score, 100);
        assert_eq!(signals[1].symbol, "BTC");
        assert_eq!(signals[1].score, 90);
        assert_eq!(find(&signals, "SOL").score, 0);
        assert_eq!(find(&signals, "SOL").action, Action::DontShort);
    }

    #[test]
    fn test_normalize_unusable_payloads() {
        let inputs = vec![
            Value::Null,
            json!({}),
            json!("not json-like"),
            json!({"error": "SSH fetch failed", "opportunities": []}),
            json!(12.5),
        ];

        for (index, input) in inputs.iter().enumerate() {
            assert_eq!(normalize(input), default_signals(), "TC{} failed", index);
        }
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let raw = json!({"data": [
            {"symbol": "ARBUSDT", "side": "dont_buy_long", "proba": 0.31},
            {"symbol": "OPUSDT", "side": "short", "proba": 0.31},
            {"symbol": "INJUSDT", "side": "buy_long", "proba": 77.4}
        ]});

        assert_eq!(normalize(&raw), normalize(&raw));
    }

    #[test]
    fn test_serialised_shape() {
        let signal = NormalizedSignal {
            symbol: "BTC".to_string(),
            action: Action::DontBuyLong,
            score: 42,
            timestamp: Some(json!("2024-05-01 10:00:00")),
            tp: None,
            sl: Some(json!(58000)),
        };

        assert_eq!(
            serde_json::to_value(&signal).unwrap(),
            json!({
                "symbol": "BTC",
                "action": "dont_buy_long",
                "score": 42,
                "timestamp": "2024-05-01 10:00:00",
                "tp": null,
                "sl": 58000
            })
        );
        assert_eq!(
            serde_json::to_value(NormalizedSignal::no_signal("WIF")).unwrap()["action"],
            "no_signal"
        );
    }
}
