//! Minimal JSON-RPC `eth_call` encoding for the read-only contract calls the
//! chain upstream needs. Only zero-argument view functions are supported.

use num_bigint::{BigInt, Sign};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{TransientError, UpstreamError};

const WORD: usize = 32;

/// JSON-RPC error code some providers use for "request limit exceeded".
const LIMIT_EXCEEDED: i64 = -32005;

/// 4-byte function selector of a zero-argument view function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Selector {
    pub name: &'static str,
    pub bytes: [u8; 4],
}

pub(crate) const LATEST_ROUND_DATA: Selector = Selector {
    name: "latestRoundData",
    bytes: [0xfe, 0xaf, 0x96, 0x8c],
};
pub(crate) const DECIMALS: Selector = Selector {
    name: "decimals",
    bytes: [0x31, 0x3c, 0xe5, 0x67],
};
pub(crate) const TOTAL_SUPPLY: Selector = Selector {
    name: "totalSupply",
    bytes: [0x18, 0x16, 0x0d, 0xdd],
};

pub(crate) fn eth_call_body(request_id: u64, to: &str, selector: Selector) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": request_id,
        "method": "eth_call",
        "params": [
            { "to": to, "data": format!("0x{}", hex::encode(selector.bytes)) },
            "latest"
        ]
    })
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    #[serde(default)]
    message: String,
}

/// Decode an `eth_call` response body into the raw return bytes.
pub(crate) fn decode_call_result(upstream: &str, body: &str) -> Result<Vec<u8>, UpstreamError> {
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| UpstreamError::malformed(upstream, format!("invalid JSON-RPC payload: {e}")))?;

    if let Some(error) = envelope.error {
        return Err(if error.code == LIMIT_EXCEEDED {
            TransientError::rate_limited(format!("{upstream}: {}", error.message)).into()
        } else {
            UpstreamError::invalid_request(format!(
                "{upstream} rpc error {}: {}",
                error.code, error.message
            ))
        });
    }

    let result = envelope
        .result
        .ok_or_else(|| UpstreamError::malformed(upstream, "response has neither result nor error"))?;
    let digits = result.strip_prefix("0x").unwrap_or(&result);
    hex::decode(digits).map_err(|e| UpstreamError::malformed(upstream, format!("bad hex result: {e}")))
}

/// ABI words of a return value; fails unless at least `count` words are present.
pub(crate) fn words<'a>(
    upstream: &str,
    data: &'a [u8],
    count: usize,
) -> Result<Vec<&'a [u8]>, UpstreamError> {
    if data.len() < count * WORD {
        return Err(UpstreamError::malformed(
            upstream,
            format!(
                "expected {count} return word(s), got {} byte(s)",
                data.len()
            ),
        ));
    }
    Ok(data.chunks_exact(WORD).take(count).collect())
}

pub(crate) fn uint(word: &[u8]) -> BigInt {
    BigInt::from_bytes_be(Sign::Plus, word)
}

pub(crate) fn int(word: &[u8]) -> BigInt {
    BigInt::from_signed_bytes_be(word)
}

/// Unsigned word that must fit in 128 bits (uint80 round ids, timestamps).
pub(crate) fn small_uint(upstream: &str, word: &[u8]) -> Result<u128, UpstreamError> {
    let (high, low) = word.split_at(word.len().saturating_sub(16));
    if high.iter().any(|byte| *byte != 0) {
        return Err(UpstreamError::malformed(upstream, "return word overflows 128 bits"));
    }
    let mut buf = [0u8; 16];
    buf[16 - low.len()..].copy_from_slice(low);
    Ok(u128::from_be_bytes(buf))
}

pub(crate) fn decimals(upstream: &str, data: &[u8]) -> Result<u8, UpstreamError> {
    let word = words(upstream, data, 1)?[0];
    let value = small_uint(upstream, word)?;
    u8::try_from(value)
        .map_err(|_| UpstreamError::malformed(upstream, format!("decimals out of range: {value}")))
}

/// Decoded `latestRoundData()` return tuple; `answeredInRound` is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RoundData {
    pub round_id: u128,
    pub answer: BigInt,
    pub started_at: u128,
    pub updated_at: u128,
}

pub(crate) fn round_data(upstream: &str, data: &[u8]) -> Result<RoundData, UpstreamError> {
    let words = words(upstream, data, 5)?;
    Ok(RoundData {
        round_id: small_uint(upstream, words[0])?,
        answer: int(words[1]),
        started_at: small_uint(upstream, words[2])?,
        updated_at: small_uint(upstream, words[3])?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(value: i128) -> String {
        let fill = if value < 0 { "ff" } else { "00" };
        format!("{}{}", fill.repeat(16), hex::encode(value.to_be_bytes()))
    }

    #[test]
    fn call_body_carries_selector_and_block_tag() {
        let body = eth_call_body(7, "0xabc", DECIMALS);
        assert_eq!(body["id"], 7);
        assert_eq!(body["method"], "eth_call");
        assert_eq!(body["params"][0]["data"], "0x313ce567");
        assert_eq!(body["params"][1], "latest");
    }

    #[test]
    fn round_data_decodes_signed_answer() {
        let hex_result = format!(
            "0x{}{}{}{}{}",
            word(18_446_744_073_709_551_617),
            word(-250_000_000),
            word(1_700_000_000),
            word(1_700_000_060),
            word(18_446_744_073_709_551_617),
        );
        let body = json!({"jsonrpc": "2.0", "id": 1, "result": hex_result}).to_string();

        let data = decode_call_result("rpc", &body).expect("decodes");
        let round = round_data("rpc", &data).expect("five words");

        assert_eq!(round.round_id, 18_446_744_073_709_551_617);
        assert_eq!(round.answer, BigInt::from(-250_000_000));
        assert_eq!(round.started_at, 1_700_000_000);
        assert_eq!(round.updated_at, 1_700_000_060);
    }

    #[test]
    fn short_return_data_is_malformed() {
        let body = json!({"jsonrpc": "2.0", "id": 1, "result": "0x"}).to_string();
        let data = decode_call_result("rpc", &body).expect("empty is still hex");

        let error = decimals("rpc", &data).expect_err("no words");
        assert!(matches!(error, UpstreamError::MalformedResponse { .. }));
    }

    #[test]
    fn rpc_errors_are_classified_by_code() {
        let limited = json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32005, "message": "limit exceeded"}});
        let reverted = json!({"jsonrpc": "2.0", "id": 1, "error": {"code": 3, "message": "execution reverted"}});

        let limited = decode_call_result("rpc", &limited.to_string()).expect_err("error");
        let reverted = decode_call_result("rpc", &reverted.to_string()).expect_err("error");

        assert!(limited.transient_cause().is_some_and(TransientError::is_rate_limit));
        assert!(matches!(reverted, UpstreamError::InvalidRequest(_)));
    }

    #[test]
    fn decimals_above_u8_are_rejected() {
        let data = hex::decode(word(256)).expect("hex");
        assert!(decimals("rpc", &data).is_err());
        let data = hex::decode(word(18)).expect("hex");
        assert_eq!(decimals("rpc", &data).expect("fits"), 18);
    }
}
