//! Schema normalization for loosely-specified upstream payloads.
//!
//! The three upstream APIs disagree on field spelling (camelCase vs
//! snake_case), on encodings (native arrays vs JSON-encoded strings,
//! numbers vs numeric strings), and on shapes (book levels as 2-tuples or
//! objects). Everything here is a pure function over `serde_json::Value`
//! that converts those shapes to canonical records — and returns `None`
//! for anything it cannot confidently interpret. Nothing in this module
//! raises; the "what to do about missing data" decision belongs to the
//! caller.
//!
//! Normalization is idempotent: feeding a canonical record's own JSON back
//! through produces the same record.

use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value;

use crate::domain::{CanonicalMarket, HolderStake, OrderBookLevel, OrderBookState, PricePoint};

/// Outcome labels assumed when a market does not report any.
const DEFAULT_BINARY_OUTCOMES: [&str; 2] = ["YES", "NO"];

// =============================================================================
// Field-level helpers
// =============================================================================

/// First present, non-null value among `keys`.
pub fn alias<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let obj = raw.as_object()?;
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

/// Lenient string extraction: strings pass through, numbers are rendered.
pub fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Lenient numeric coercion: a number or a numeric string. Anything else
/// is absent, never an error.
pub fn coerce_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

/// Lenient boolean coercion: `true`, `"true"`, `"false"` and friends.
pub fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// A list of strings that may arrive as a native array or as a
/// JSON-encoded string (detected by a leading `[`). A string that fails
/// to parse is absent, never fatal.
pub fn coerce_string_list(value: &Value) -> Option<Vec<String>> {
    let items: Vec<Value> = match value {
        Value::Array(items) => items.clone(),
        Value::String(s) if s.trim_start().starts_with('[') => {
            serde_json::from_str(s).ok()?
        }
        _ => return None,
    };

    let list: Vec<String> = items.iter().filter_map(coerce_string).collect();
    if list.is_empty() { None } else { Some(list) }
}

// =============================================================================
// Order books
// =============================================================================

/// One book level from either observed shape: a `[price, size]` 2-tuple or
/// an object with `price`/`p`/`rate` and `size`/`s`/`amount` keys. Levels
/// whose price or size is exactly zero represent "not present" upstream
/// and are discarded.
pub fn normalize_level(value: &Value) -> Option<OrderBookLevel> {
    let (price, size) = match value {
        Value::Array(pair) if pair.len() == 2 => {
            (coerce_decimal(&pair[0])?, coerce_decimal(&pair[1])?)
        }
        Value::Object(_) => {
            let price = alias(value, &["price", "p", "rate"]).and_then(coerce_decimal)?;
            let size = alias(value, &["size", "s", "amount"]).and_then(coerce_decimal)?;
            (price, size)
        }
        _ => return None,
    };

    if price <= Decimal::ZERO || size <= Decimal::ZERO {
        return None;
    }
    Some(OrderBookLevel { price, size })
}

fn normalize_side(value: Option<&Value>) -> Vec<OrderBookLevel> {
    value
        .and_then(Value::as_array)
        .map(|levels| levels.iter().filter_map(normalize_level).collect())
        .unwrap_or_default()
}

/// A full order book payload. Returns `None` when both sides are missing
/// entirely (as opposed to present but empty).
pub fn normalize_book(raw: &Value) -> Option<OrderBookState> {
    let obj = raw.as_object()?;
    if !obj.contains_key("bids") && !obj.contains_key("asks") {
        return None;
    }

    let mut bids = normalize_side(obj.get("bids"));
    let mut asks = normalize_side(obj.get("asks"));
    bids.sort_by(|a, b| b.price.cmp(&a.price));
    asks.sort_by(|a, b| a.price.cmp(&b.price));

    Some(OrderBookState {
        bids,
        asks,
        min_order_size: alias(raw, &["min_order_size", "minOrderSize"]).and_then(coerce_decimal),
        tick_size: alias(raw, &["tick_size", "tickSize", "minimum_tick_size"])
            .and_then(coerce_decimal),
        neg_risk: alias(raw, &["neg_risk", "negRisk"])
            .and_then(coerce_bool)
            .unwrap_or(false),
    })
}

// =============================================================================
// Markets
// =============================================================================

/// A market record. Rejected (`None`) unless a condition identifier and at
/// least one outcome token id are present — a market without those is not
/// usable downstream and must not be fabricated. Every other field is
/// optional; missing outcomes default to a binary YES/NO pair, then the
/// label list is padded/truncated so it stays index-aligned with the token
/// ids.
pub fn normalize_market(raw: &Value) -> Option<CanonicalMarket> {
    let condition_id =
        alias(raw, &["conditionId", "condition_id"]).and_then(coerce_string)?;
    let token_ids = alias(
        raw,
        &["clobTokenIds", "clob_token_ids", "token_ids", "tokenIds", "tokens"],
    )
    .and_then(coerce_string_list)?;

    let mut outcomes = alias(raw, &["outcomes", "outcome_names", "outcomeNames"])
        .and_then(coerce_string_list)
        .unwrap_or_else(|| {
            DEFAULT_BINARY_OUTCOMES
                .iter()
                .map(ToString::to_string)
                .collect()
        });

    // Alignment invariant: outcomes.len() == token_ids.len() >= 1.
    while outcomes.len() < token_ids.len() {
        outcomes.push(format!("Outcome {}", outcomes.len() + 1));
    }
    outcomes.truncate(token_ids.len());

    Some(CanonicalMarket {
        condition_id,
        market_id: alias(raw, &["market_id", "marketId", "id"]).and_then(coerce_string),
        question: alias(raw, &["question", "title"]).and_then(coerce_string),
        outcomes,
        token_ids,
        slug: alias(raw, &["slug", "market_slug", "marketSlug"]).and_then(coerce_string),
        volume_24h: alias(raw, &["volume_24h", "volume24hr", "volume24h", "volume"])
            .and_then(coerce_decimal),
        price_change_24h: alias(
            raw,
            &["price_change_24h", "oneDayPriceChange", "priceChange24h"],
        )
        .and_then(coerce_decimal),
        best_bid: alias(raw, &["best_bid", "bestBid"]).and_then(coerce_decimal),
        best_ask: alias(raw, &["best_ask", "bestAsk"]).and_then(coerce_decimal),
    })
}

// =============================================================================
// History and holders
// =============================================================================

/// Price history points from `{"history": [{t, p}, ...]}` or a bare array.
/// Unusable points are skipped.
pub fn normalize_history(raw: &Value) -> Vec<PricePoint> {
    let items = match raw {
        Value::Array(items) => items.as_slice(),
        Value::Object(_) => alias(raw, &["history", "data", "points"])
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default(),
        _ => &[],
    };

    items
        .iter()
        .filter_map(|p| {
            let ts = alias(p, &["t", "ts", "timestamp"])
                .and_then(coerce_decimal)
                .and_then(|d| d.trunc().to_i64())?;
            let price = alias(p, &["p", "price"]).and_then(coerce_decimal)?;
            Some(PricePoint { ts, price })
        })
        .collect()
}

/// Holder rows. The holders API nests per-token holder arrays; a flat
/// array of rows is accepted too. Rows without an address or amount are
/// skipped.
pub fn normalize_holders(raw: &Value) -> Vec<HolderStake> {
    let rows: Vec<&Value> = match raw {
        Value::Array(groups) => groups
            .iter()
            .flat_map(|g| match alias(g, &["holders"]).and_then(Value::as_array) {
                Some(inner) => inner.iter().collect::<Vec<_>>(),
                None => vec![g],
            })
            .collect(),
        Value::Object(_) => alias(raw, &["holders", "data"])
            .and_then(Value::as_array)
            .map(|a| a.iter().collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    };

    rows.iter()
        .filter_map(|row| {
            let address =
                alias(row, &["proxyWallet", "proxy_wallet", "address", "wallet"])
                    .and_then(coerce_string)?;
            let amount = alias(row, &["amount", "balance", "shares"]).and_then(coerce_decimal)?;
            Some(HolderStake {
                address,
                name: alias(row, &["name", "pseudonym", "username"]).and_then(coerce_string),
                amount,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use test_case::test_case;

    #[test]
    fn alias_takes_first_present_non_null() {
        let raw = json!({"condition_id": null, "conditionId": "c1"});
        let got = alias(&raw, &["condition_id", "conditionId"]).unwrap();
        assert_eq!(got, "c1");
    }

    #[test_case(json!(0.42), Some(dec!(0.42)); "native number")]
    #[test_case(json!("0.42"), Some(dec!(0.42)); "numeric string")]
    #[test_case(json!(" 7 "), Some(dec!(7)); "padded numeric string")]
    #[test_case(json!("n/a"), None; "non numeric string")]
    #[test_case(json!({"v": 1}), None; "object")]
    #[test_case(json!(null), None; "null")]
    fn decimal_coercion(value: Value, expected: Option<Decimal>) {
        assert_eq!(coerce_decimal(&value), expected);
    }

    #[test]
    fn string_list_from_native_array() {
        let got = coerce_string_list(&json!(["A", "B"])).unwrap();
        assert_eq!(got, vec!["A", "B"]);
    }

    #[test]
    fn string_list_from_json_encoded_string() {
        let got = coerce_string_list(&json!(r#"["A","B"]"#)).unwrap();
        assert_eq!(got, vec!["A", "B"]);
    }

    #[test]
    fn unparseable_encoded_list_is_absent_not_fatal() {
        assert_eq!(coerce_string_list(&json!("[broken")), None);
        assert_eq!(coerce_string_list(&json!("plain text")), None);
    }

    #[test]
    fn level_from_tuple_and_object() {
        let tuple = normalize_level(&json!(["0.4", "100"])).unwrap();
        assert_eq!(tuple.price, dec!(0.4));
        assert_eq!(tuple.size, dec!(100));

        let obj = normalize_level(&json!({"p": 0.4, "amount": "100"})).unwrap();
        assert_eq!(obj, tuple);
    }

    #[test]
    fn zero_levels_are_filtered() {
        assert!(normalize_level(&json!(["0", "100"])).is_none());
        assert!(normalize_level(&json!(["0.4", "0"])).is_none());
        assert!(normalize_level(&json!({"price": "0.00", "size": "5"})).is_none());
    }

    #[test]
    fn book_filters_zeroes_and_sorts_sides() {
        let raw = json!({
            "bids": [["0.39", "50"], ["0.4", "100"], ["0", "10"]],
            "asks": [["0.65", "7"], ["0.6", "2"], ["0.61", "0"]],
            "tickSize": "0.01",
            "negRisk": "true"
        });
        let book = normalize_book(&raw).unwrap();

        assert_eq!(book.bids.len(), 2);
        assert_eq!(book.bids[0].price, dec!(0.4));
        assert_eq!(book.bids[0].size, dec!(100));
        assert_eq!(book.asks[0].price, dec!(0.6));
        assert_eq!(book.tick_size, Some(dec!(0.01)));
        assert!(book.neg_risk);
    }

    #[test]
    fn book_without_either_side_is_absent() {
        assert!(normalize_book(&json!({"hash": "abc"})).is_none());
        assert!(normalize_book(&json!("not a book")).is_none());
    }

    #[test]
    fn market_requires_condition_id_and_tokens() {
        assert!(normalize_market(&json!({"clobTokenIds": ["T1"]})).is_none());
        assert!(normalize_market(&json!({"conditionId": "c1"})).is_none());
        assert!(normalize_market(&json!({"conditionId": "c1", "clobTokenIds": []})).is_none());
    }

    #[test]
    fn market_with_json_string_outcomes() {
        let raw = json!({
            "conditionId": "COND2",
            "clobTokenIds": r#"["A","B"]"#,
            "outcomes": r#"["Yes","No"]"#
        });
        let market = normalize_market(&raw).unwrap();
        assert_eq!(market.token_ids, vec!["A", "B"]);
        assert_eq!(market.outcomes, vec!["Yes", "No"]);
    }

    #[test]
    fn missing_outcomes_default_to_binary_pair() {
        let raw = json!({
            "conditionId": "COND1",
            "clobTokenIds": ["T1", "T2"],
            "question": "Will it rain?"
        });
        let market = normalize_market(&raw).unwrap();
        assert_eq!(market.outcomes, vec!["YES", "NO"]);
        assert_eq!(market.question.as_deref(), Some("Will it rain?"));
    }

    #[test]
    fn outcomes_stay_aligned_with_tokens() {
        let raw = json!({
            "conditionId": "c1",
            "clobTokenIds": ["T1", "T2", "T3"],
            "outcomes": ["Only one"]
        });
        let market = normalize_market(&raw).unwrap();
        assert_eq!(market.outcomes.len(), market.token_ids.len());
        assert_eq!(market.outcomes[0], "Only one");
        assert_eq!(market.outcomes[2], "Outcome 3");
    }

    #[test]
    fn alignment_invariant_holds_for_any_successful_normalization() {
        let raw = json!({
            "conditionId": "c1",
            "clobTokenIds": ["T1", "T2"],
            "outcomes": ["A", "B", "C", "D"]
        });
        let market = normalize_market(&raw).unwrap();
        assert_eq!(market.outcomes.len(), market.token_ids.len());
        assert!(!market.token_ids.is_empty());
    }

    #[test]
    fn snake_case_spellings_are_accepted() {
        let raw = json!({
            "condition_id": "c9",
            "clob_token_ids": ["X", "Y"],
            "market_slug": "some-market",
            "volume24hr": "12345.5"
        });
        let market = normalize_market(&raw).unwrap();
        assert_eq!(market.condition_id, "c9");
        assert_eq!(market.slug.as_deref(), Some("some-market"));
        assert_eq!(market.volume_24h, Some(dec!(12345.5)));
    }

    #[test]
    fn normalization_is_idempotent() {
        let raw = json!({
            "conditionId": "c1",
            "clobTokenIds": r#"["T1","T2"]"#,
            "question": "Will it rain?",
            "bestBid": "0.41",
            "bestAsk": 0.43
        });
        let first = normalize_market(&raw).unwrap();
        let second = normalize_market(&serde_json::to_value(&first).unwrap()).unwrap();
        assert_eq!(first, second);

        // Pure: the same input always yields the same output.
        assert_eq!(normalize_market(&raw).unwrap(), first);
    }

    #[test]
    fn history_from_wrapped_and_bare_payloads() {
        let wrapped = json!({"history": [{"t": 100, "p": "0.5"}, {"t": 160, "p": 0.52}]});
        let points = normalize_history(&wrapped);
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].price, dec!(0.52));

        let bare = json!([{"t": 5, "p": 0.1}, {"t": "bad", "p": 0.2}]);
        assert_eq!(normalize_history(&bare).len(), 1);
    }

    #[test]
    fn holders_from_nested_groups() {
        let raw = json!([
            {
                "token": "T1",
                "holders": [
                    {"proxyWallet": "0xaa", "name": "alice", "amount": "120.5"},
                    {"proxyWallet": "0xbb", "amount": 80}
                ]
            }
        ]);
        let holders = normalize_holders(&raw);
        assert_eq!(holders.len(), 2);
        assert_eq!(holders[0].address, "0xaa");
        assert_eq!(holders[0].name.as_deref(), Some("alice"));
        assert_eq!(holders[1].amount, dec!(80));
    }

    #[test]
    fn holder_rows_without_address_are_skipped() {
        let raw = json!([{"amount": 10}, {"address": "0xcc", "balance": "3"}]);
        let holders = normalize_holders(&raw);
        assert_eq!(holders.len(), 1);
        assert_eq!(holders[0].address, "0xcc");
    }
}
