//! Ethereum JSON-RPC client.
//!
//! A `Transport` moves raw JSON-RPC calls; `RpcClient` layers a middleware
//! stack over it and exposes the handful of typed calls the deployment
//! engine needs. Responses travel up the stack starting at layer 0, so a
//! middleware injected at layer 0 sees raw node output before anything else.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy::primitives::Address;
use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::RpcError;

/// Maximum `extraData` a mainnet-style header may carry.
pub const MAX_EXTRA_DATA_BYTES: usize = 32;

/// Moves one JSON-RPC call to a node and returns its `result`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError>;
}

/// JSON-RPC 2.0 over HTTP.
pub struct HttpTransport {
    url: String,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http: reqwest::Client::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Bound every individual HTTP call. The receipt wait has its own deadline.
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            http,
            next_id: AtomicU64::new(1),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let resp = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcError::Transport(format!("{method}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(RpcError::Transport(format!("{method}: HTTP {status}: {text}")));
        }

        let mut envelope: Value = resp
            .json()
            .await
            .map_err(|e| RpcError::Transport(format!("{method}: invalid JSON response: {e}")))?;

        if let Some(err) = envelope.get("error").filter(|e| !e.is_null()) {
            return Err(RpcError::Remote {
                code: err.get("code").and_then(Value::as_i64).unwrap_or_default(),
                message: err
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string(),
            });
        }

        match envelope.get_mut("result") {
            Some(result) => Ok(result.take()),
            None => Err(RpcError::Decode {
                method: method.to_string(),
                reason: "response has neither result nor error".into(),
            }),
        }
    }
}

/// Rewrites responses on their way from the transport to the caller.
pub trait Middleware: Send + Sync {
    fn name(&self) -> &'static str;
    fn on_response(&self, method: &str, result: Value) -> Result<Value, RpcError>;
}

/// Compatibility shim for proof-of-authority chains (many L2s and testnets).
///
/// Their block headers carry signer data in `extraData`, which overflows the
/// 32 bytes a mainnet client accepts. The full value is moved to
/// `proofOfAuthorityData` and `extraData` is cut back to 32 bytes.
pub struct ProofOfAuthority;

impl Middleware for ProofOfAuthority {
    fn name(&self) -> &'static str {
        "proof_of_authority"
    }

    fn on_response(&self, method: &str, mut result: Value) -> Result<Value, RpcError> {
        if !matches!(method, "eth_getBlockByNumber" | "eth_getBlockByHash") {
            return Ok(result);
        }
        let extra = match result.get("extraData").and_then(Value::as_str) {
            Some(extra) => extra.to_string(),
            None => return Ok(result),
        };
        let raw = extra.strip_prefix("0x").unwrap_or(&extra);
        // Non-hex text is left for the strict header decode to reject.
        let Some(head) = raw.get(..MAX_EXTRA_DATA_BYTES * 2).filter(|_| raw.is_ascii()) else {
            return Ok(result);
        };
        if head.len() == raw.len() {
            return Ok(result);
        }
        let truncated = format!("0x{head}");
        if let Some(block) = result.as_object_mut() {
            block.insert("proofOfAuthorityData".into(), Value::String(extra.clone()));
            block.insert("extraData".into(), Value::String(truncated));
        }
        Ok(result)
    }
}

/// The subset of a block header the engine checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub number: u64,
    pub hash: String,
    pub extra_data: Vec<u8>,
}

impl BlockHeader {
    /// Strict decode: rejects headers a mainnet client would reject.
    pub fn from_json(value: &Value) -> Result<Self, RpcError> {
        let obj = value
            .as_object()
            .ok_or_else(|| RpcError::InvalidHeader("block is not an object".into()))?;
        let number = obj
            .get("number")
            .ok_or_else(|| RpcError::InvalidHeader("missing number".into()))
            .and_then(|n| quantity_u64("eth_getBlockByNumber", n))?;
        let hash = obj
            .get("hash")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let extra_hex = obj.get("extraData").and_then(Value::as_str).unwrap_or("0x");
        let extra_data = decode_hex(extra_hex)
            .map_err(|e| RpcError::InvalidHeader(format!("extraData: {e}")))?;
        if extra_data.len() > MAX_EXTRA_DATA_BYTES {
            return Err(RpcError::InvalidHeader(format!(
                "extraData is {} bytes, expected at most {MAX_EXTRA_DATA_BYTES}; \
                 the chain looks like proof-of-authority",
                extra_data.len()
            )));
        }
        Ok(Self {
            number,
            hash,
            extra_data,
        })
    }
}

/// A mined transaction receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: String,
    pub contract_address: Option<String>,
    /// `Some(1)` success, `Some(0)` reverted, `None` for pre-Byzantium nodes.
    pub status: Option<u64>,
    pub block_number: Option<u64>,
}

/// JSON-RPC client with a middleware stack.
pub struct RpcClient {
    transport: Arc<dyn Transport>,
    layers: Vec<Arc<dyn Middleware>>,
}

impl RpcClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            layers: Vec::new(),
        }
    }

    /// Insert a middleware at `layer` (clamped to the stack size).
    pub fn inject(&mut self, middleware: Arc<dyn Middleware>, layer: usize) {
        let at = layer.min(self.layers.len());
        tracing::debug!(middleware = middleware.name(), layer = at, "Injecting RPC middleware");
        self.layers.insert(at, middleware);
    }

    pub fn middleware_names(&self) -> Vec<&'static str> {
        self.layers.iter().map(|m| m.name()).collect()
    }

    pub async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let mut result = self.transport.request(method, params).await?;
        for layer in &self.layers {
            result = layer.on_response(method, result)?;
        }
        Ok(result)
    }

    /// Fetch and strictly decode the latest block header.
    pub async fn latest_block(&self) -> Result<BlockHeader, RpcError> {
        let block = self
            .request("eth_getBlockByNumber", json!(["latest", false]))
            .await?;
        BlockHeader::from_json(&block)
    }

    pub async fn transaction_count(&self, address: &Address) -> Result<u64, RpcError> {
        let v = self
            .request("eth_getTransactionCount", json!([address.to_checksum(None), "pending"]))
            .await?;
        quantity_u64("eth_getTransactionCount", &v)
    }

    pub async fn gas_price(&self) -> Result<u128, RpcError> {
        let v = self.request("eth_gasPrice", json!([])).await?;
        quantity("eth_gasPrice", &v)
    }

    pub async fn chain_id(&self) -> Result<u64, RpcError> {
        let v = self.request("eth_chainId", json!([])).await?;
        quantity_u64("eth_chainId", &v)
    }

    pub async fn estimate_gas(&self, call: Value) -> Result<u64, RpcError> {
        let v = self.request("eth_estimateGas", json!([call])).await?;
        quantity_u64("eth_estimateGas", &v)
    }

    /// Returns the node's transaction hash.
    pub async fn send_raw_transaction(&self, raw_hex: &str) -> Result<String, RpcError> {
        let v = self
            .request("eth_sendRawTransaction", json!([raw_hex]))
            .await?;
        v.as_str().map(str::to_string).ok_or_else(|| RpcError::Decode {
            method: "eth_sendRawTransaction".into(),
            reason: format!("expected a hash string, got {v}"),
        })
    }

    /// `None` until the transaction is mined.
    pub async fn transaction_receipt(&self, tx_hash: &str) -> Result<Option<Receipt>, RpcError> {
        let v = self
            .request("eth_getTransactionReceipt", json!([tx_hash]))
            .await?;
        if v.is_null() {
            return Ok(None);
        }
        let method = "eth_getTransactionReceipt";
        let obj = v.as_object().ok_or_else(|| RpcError::Decode {
            method: method.into(),
            reason: "receipt is not an object".into(),
        })?;
        let optional_quantity = |key: &str| -> Result<Option<u64>, RpcError> {
            match obj.get(key) {
                None | Some(Value::Null) => Ok(None),
                Some(q) => quantity_u64(method, q).map(Some),
            }
        };
        Ok(Some(Receipt {
            transaction_hash: obj
                .get("transactionHash")
                .and_then(Value::as_str)
                .unwrap_or(tx_hash)
                .to_string(),
            contract_address: obj
                .get("contractAddress")
                .and_then(Value::as_str)
                .map(str::to_string),
            status: optional_quantity("status")?,
            block_number: optional_quantity("blockNumber")?,
        }))
    }
}

/// Parse a hex `QUANTITY` ("0x1a").
pub fn quantity(method: &str, value: &Value) -> Result<u128, RpcError> {
    let decode_err = |reason: String| RpcError::Decode {
        method: method.to_string(),
        reason,
    };
    let s = value
        .as_str()
        .ok_or_else(|| decode_err(format!("expected hex quantity, got {value}")))?;
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| decode_err(format!("quantity {s} lacks 0x prefix")))?;
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16).map_err(|e| decode_err(format!("quantity {s}: {e}")))
}

/// A `QUANTITY` that must fit in 64 bits (block numbers, nonces, gas, chain ids).
pub fn quantity_u64(method: &str, value: &Value) -> Result<u64, RpcError> {
    let wide = quantity(method, value)?;
    u64::try_from(wide).map_err(|_| RpcError::Decode {
        method: method.to_string(),
        reason: format!("quantity {wide:#x} does not fit in 64 bits"),
    })
}

/// Encode an integer as a hex `QUANTITY`.
pub fn to_quantity(value: u128) -> String {
    format!("{value:#x}")
}

fn decode_hex(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(s.strip_prefix("0x").unwrap_or(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Replies to every call with the same canned value.
    struct Canned(Value, Mutex<Vec<String>>);

    #[async_trait]
    impl Transport for Canned {
        async fn request(&self, method: &str, _params: Value) -> Result<Value, RpcError> {
            self.1.lock().unwrap().push(method.to_string());
            Ok(self.0.clone())
        }
    }

    fn poa_block() -> Value {
        json!({
            "number": "0x10",
            "hash": "0xabc",
            "extraData": format!("0x{}", "ab".repeat(97)),
        })
    }

    #[test]
    fn parses_quantities() {
        assert_eq!(quantity("m", &json!("0x0")).unwrap(), 0);
        assert_eq!(quantity("m", &json!("0x1a")).unwrap(), 26);
        assert!(quantity("m", &json!("26")).is_err());
        assert!(quantity("m", &json!(26)).is_err());
        assert_eq!(to_quantity(26), "0x1a");
    }

    #[test]
    fn oversized_quantities_are_rejected_not_truncated() {
        let huge = json!(format!("0x1{}", "0".repeat(16)));
        assert_eq!(quantity("m", &huge).unwrap(), 1u128 << 64);
        let err = quantity_u64("eth_chainId", &huge).unwrap_err();
        assert!(matches!(err, RpcError::Decode { ref method, .. } if method == "eth_chainId"));
        assert_eq!(quantity_u64("m", &json!("0xffffffffffffffff")).unwrap(), u64::MAX);
    }

    #[tokio::test]
    async fn oversized_nonce_fails_the_call() {
        let client = RpcClient::new(Arc::new(Canned(json!("0x10000000000000000"), Mutex::default())));
        let err = client.transaction_count(&Address::ZERO).await.unwrap_err();
        assert!(matches!(err, RpcError::Decode { .. }));
    }

    #[test]
    fn poa_middleware_leaves_multibyte_extra_data_alone() {
        let block = json!({"number": "0x1", "extraData": format!("0x{}", "é".repeat(40))});
        let out = ProofOfAuthority
            .on_response("eth_getBlockByNumber", block.clone())
            .unwrap();
        assert_eq!(out, block);
        assert!(BlockHeader::from_json(&out).is_err());
    }

    #[tokio::test]
    async fn strict_header_rejects_poa_extra_data() {
        let client = RpcClient::new(Arc::new(Canned(poa_block(), Mutex::default())));
        let err = client.latest_block().await.unwrap_err();
        assert!(matches!(err, RpcError::InvalidHeader(_)));
    }

    #[tokio::test]
    async fn poa_middleware_makes_header_decodable() {
        let mut client = RpcClient::new(Arc::new(Canned(poa_block(), Mutex::default())));
        client.inject(Arc::new(ProofOfAuthority), 0);
        let header = client.latest_block().await.unwrap();
        assert_eq!(header.number, 16);
        assert_eq!(header.extra_data.len(), MAX_EXTRA_DATA_BYTES);
        assert_eq!(client.middleware_names(), vec!["proof_of_authority"]);
    }

    #[test]
    fn poa_middleware_ignores_other_methods() {
        let original = json!({"extraData": format!("0x{}", "ab".repeat(97))});
        let out = ProofOfAuthority
            .on_response("eth_getTransactionReceipt", original.clone())
            .unwrap();
        assert_eq!(out, original);
    }

    #[test]
    fn poa_middleware_keeps_full_value() {
        let out = ProofOfAuthority
            .on_response("eth_getBlockByHash", poa_block())
            .unwrap();
        assert_eq!(out["proofOfAuthorityData"], poa_block()["extraData"]);
    }

    #[tokio::test]
    async fn http_transport_unwraps_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "eth_chainId"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": "0x14a34"})),
            )
            .mount(&server)
            .await;

        let client = RpcClient::new(Arc::new(HttpTransport::new(server.uri())));
        assert_eq!(client.chain_id().await.unwrap(), 84532);
    }

    #[tokio::test]
    async fn http_transport_surfaces_remote_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32000, "message": "insufficient funds"}
            })))
            .mount(&server)
            .await;

        let client = RpcClient::new(Arc::new(HttpTransport::new(server.uri())));
        let err = client.gas_price().await.unwrap_err();
        match err {
            RpcError::Remote { code, message } => {
                assert_eq!(code, -32000);
                assert_eq!(message, "insufficient funds");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn receipt_is_none_until_mined() {
        let client = RpcClient::new(Arc::new(Canned(Value::Null, Mutex::default())));
        assert!(client.transaction_receipt("0x01").await.unwrap().is_none());
    }
}
