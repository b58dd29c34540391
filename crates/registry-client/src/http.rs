//! JSON-RPC over HTTP implementation of [`LedgerRpc`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ledger_wire::address_to_bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{ClientError, Rejection};
use crate::rpc::{AccountData, Commitment, LatestBlockhash, LedgerRpc, SignatureStatus};

/// Node error code for a transaction that failed preflight simulation.
pub const PREFLIGHT_FAILURE_CODE: i64 = -32002;

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcAccount {
    data: (String, String),
    owner: String,
    lamports: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcBlockhash {
    blockhash: String,
    last_valid_block_height: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcSignatureStatus {
    #[serde(default)]
    err: Option<Value>,
    #[serde(default)]
    confirmation_status: Option<Commitment>,
}

/// Ledger node client speaking JSON-RPC 2.0 over HTTP.
pub struct HttpLedgerRpc {
    http_client: reqwest::Client,
    rpc_url: String,
    request_id: AtomicU64,
}

impl HttpLedgerRpc {
    pub fn new(rpc_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            rpc_url: rpc_url.into(),
            request_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.rpc_url
    }

    async fn call<R: DeserializeOwned>(&self, method: &str, params: Value) -> Result<R, ClientError> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        debug!(method, id, "rpc request");

        let response = self
            .http_client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let body: JsonRpcResponse<R> = response
            .json()
            .await
            .map_err(|e| ClientError::Malformed(format!("{method}: {e}")))?;

        if let Some(error) = body.error {
            return Err(map_rpc_error(error));
        }

        body.result
            .ok_or_else(|| ClientError::Malformed(format!("{method}: response missing result")))
    }
}

#[async_trait]
impl LedgerRpc for HttpLedgerRpc {
    async fn get_account(
        &self,
        address: &[u8; 32],
        commitment: Commitment,
    ) -> Result<Option<AccountData>, ClientError> {
        let params = json!([
            ledger_wire::bytes_to_address(address),
            { "encoding": "base64", "commitment": commitment.as_str() }
        ]);
        let result: WithContext<Option<RpcAccount>> = self.call("getAccountInfo", params).await?;

        result.value.map(decode_account).transpose()
    }

    async fn get_latest_blockhash(
        &self,
        commitment: Commitment,
    ) -> Result<LatestBlockhash, ClientError> {
        let params = json!([{ "commitment": commitment.as_str() }]);
        let result: WithContext<RpcBlockhash> = self.call("getLatestBlockhash", params).await?;

        let blockhash = address_to_bytes(&result.value.blockhash)
            .map_err(|e| ClientError::Malformed(format!("blockhash: {e}")))?;
        Ok(LatestBlockhash {
            blockhash,
            last_valid_block_height: result.value.last_valid_block_height,
        })
    }

    async fn send_transaction(
        &self,
        wire: &[u8],
        preflight: Commitment,
    ) -> Result<String, ClientError> {
        let params = json!([
            BASE64.encode(wire),
            {
                "encoding": "base64",
                "skipPreflight": false,
                "preflightCommitment": preflight.as_str(),
            }
        ]);
        self.call("sendTransaction", params).await
    }

    async fn get_signature_status(
        &self,
        signature: &str,
    ) -> Result<Option<SignatureStatus>, ClientError> {
        let params = json!([[signature], { "searchTransactionHistory": true }]);
        let result: WithContext<Vec<Option<RpcSignatureStatus>>> =
            self.call("getSignatureStatuses", params).await?;

        Ok(result
            .value
            .into_iter()
            .next()
            .flatten()
            .map(|status| SignatureStatus {
                confirmation: status.confirmation_status,
                err: status.err.as_ref().map(rejection_from_err),
            }))
    }

    async fn get_block_height(&self, commitment: Commitment) -> Result<u64, ClientError> {
        let params = json!([{ "commitment": commitment.as_str() }]);
        self.call("getBlockHeight", params).await
    }
}

fn decode_account(account: RpcAccount) -> Result<AccountData, ClientError> {
    let (encoded, encoding) = account.data;
    if encoding != "base64" {
        return Err(ClientError::Malformed(format!(
            "unexpected account encoding {encoding}"
        )));
    }
    let data = BASE64
        .decode(encoded)
        .map_err(|e| ClientError::Malformed(format!("account data: {e}")))?;
    let owner = address_to_bytes(&account.owner)
        .map_err(|e| ClientError::Malformed(format!("account owner: {e}")))?;

    Ok(AccountData {
        data,
        owner,
        lamports: account.lamports,
    })
}

fn map_rpc_error(error: JsonRpcError) -> ClientError {
    if error.code != PREFLIGHT_FAILURE_CODE {
        return ClientError::Rpc {
            code: error.code,
            message: error.message,
        };
    }

    let data = error.data.unwrap_or(Value::Null);
    let logs = data
        .get("logs")
        .and_then(Value::as_array)
        .map(|lines| {
            lines
                .iter()
                .filter_map(|l| l.as_str().map(str::to_owned))
                .collect()
        })
        .unwrap_or_default();

    let rejection = Rejection::new(error.message).with_logs(logs);
    ClientError::Rejected(match data.get("err") {
        Some(err) => classify(rejection, err),
        None => rejection,
    })
}

fn rejection_from_err(err: &Value) -> Rejection {
    classify(Rejection::new(err.to_string()), err)
}

/// Attach the shape of a node `TransactionError` value to `rejection`.
///
/// ```text
/// {"InstructionError": [0, {"Custom": 101}]}     program error
/// {"InstructionError": [0, "InvalidInstructionData"]}
/// "BlockhashNotFound"                            transaction level
/// {"InsufficientFundsForRent": {"account_index": 2}}
/// ```
fn classify(rejection: Rejection, err: &Value) -> Rejection {
    if let Some(pair) = err.get("InstructionError") {
        let index = pair
            .get(0)
            .and_then(Value::as_u64)
            .and_then(|i| u8::try_from(i).ok())
            .unwrap_or(0);
        return match custom_code(err) {
            Some(code) => Rejection {
                custom_code: Some(code),
                ..rejection.in_instruction(index, "Custom")
            },
            None => {
                let name = pair.get(1).and_then(variant_name).unwrap_or("Unknown");
                rejection.in_instruction(index, name)
            }
        };
    }
    match variant_name(err) {
        Some(name) => rejection.transaction_level(name),
        None => rejection,
    }
}

/// `"Name"` or `{"Name": ...}` to `Name`.
fn variant_name(value: &Value) -> Option<&str> {
    match value {
        Value::String(name) => Some(name.as_str()),
        Value::Object(map) if map.len() == 1 => map.keys().next().map(String::as_str),
        _ => None,
    }
}

/// Extract `n` from `{"InstructionError": [idx, {"Custom": n}]}`.
pub(crate) fn custom_code(err: &Value) -> Option<u32> {
    err.get("InstructionError")?
        .get(1)?
        .get("Custom")?
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
}
