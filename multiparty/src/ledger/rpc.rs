// Copyright (c) 2024 Botho Foundation

//! JSON-RPC 2.0 access to a [`Ledger`].
//!
//! Methods:
//! - `ledger_submitTransaction {transaction}` -> `{accepted, log}`
//! - `ledger_outputExists {commitment}` -> `bool`
//! - `ledger_issue {output}` -> `{accepted, log}`

use super::Ledger;
use async_trait::async_trait;
use bth_crypto_commitment::CompressedCommitment;
use bth_transaction_core::{Output, Transaction};
use bth_wallet::{LedgerClient, SubmitResult, WalletError};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{body::Incoming, server::conn::http1, service::service_fn, Request, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::{
    convert::Infallible,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

const PARSE_ERROR: i32 = -32700;
const INVALID_REQUEST: i32 = -32600;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;
const INTERNAL_ERROR: i32 = -32603;

const RPC_TIMEOUT: Duration = Duration::from_secs(30);

static REQUEST_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Serialize, Deserialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    #[serde(default)]
    params: Value,
    id: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
    id: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

impl JsonRpcResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    fn error(id: Value, code: i32, message: &str) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.to_string(),
            }),
            id,
        }
    }
}

#[derive(Deserialize)]
struct SubmitParams {
    transaction: Transaction,
}

#[derive(Deserialize)]
struct OutputExistsParams {
    commitment: CompressedCommitment,
}

#[derive(Deserialize)]
struct IssueParams {
    output: Output,
}

/// Serve `ledger` on `listener` until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    ledger: Arc<Ledger>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    info!("Ledger RPC listening on {}", listener.local_addr()?);

    loop {
        let (stream, _) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = shutdown.cancelled() => return Ok(()),
        };
        let io = TokioIo::new(stream);
        let ledger = ledger.clone();

        tokio::spawn(async move {
            let service = service_fn(|req| handle_request(req, ledger.clone()));
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                error!("Error serving connection: {:?}", err);
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    ledger: Arc<Ledger>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let response = match req.collect().await {
        Ok(collected) => match serde_json::from_slice::<JsonRpcRequest>(&collected.to_bytes()) {
            Ok(request) => dispatch(request, &ledger),
            Err(e) => JsonRpcResponse::error(Value::Null, PARSE_ERROR, &format!("Parse error: {e}")),
        },
        Err(e) => JsonRpcResponse::error(Value::Null, INTERNAL_ERROR, &e.to_string()),
    };
    let body = serde_json::to_vec(&response).unwrap_or_default();
    let mut http_response = Response::new(Full::new(Bytes::from(body)));
    http_response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    Ok(http_response)
}

fn params<T: DeserializeOwned>(request: &JsonRpcRequest) -> Result<T, JsonRpcResponse> {
    serde_json::from_value(request.params.clone()).map_err(|e| {
        JsonRpcResponse::error(
            request.id.clone(),
            INVALID_PARAMS,
            &format!("Invalid params: {e}"),
        )
    })
}

fn dispatch(request: JsonRpcRequest, ledger: &Ledger) -> JsonRpcResponse {
    if request.jsonrpc != "2.0" {
        return JsonRpcResponse::error(request.id, INVALID_REQUEST, "Only JSON-RPC 2.0 is served");
    }
    debug!("RPC request: {}", request.method);
    let id = request.id.clone();
    let result = match request.method.as_str() {
        "ledger_submitTransaction" => params::<SubmitParams>(&request)
            .map(|p| submit_result(ledger.apply(&p.transaction))),
        "ledger_outputExists" => params::<OutputExistsParams>(&request).and_then(|p| {
            ledger
                .contains(&p.commitment)
                .map(Value::Bool)
                .map_err(|e| JsonRpcResponse::error(id.clone(), INTERNAL_ERROR, &e.to_string()))
        }),
        "ledger_issue" => {
            params::<IssueParams>(&request).map(|p| submit_result(ledger.issue(&p.output)))
        }
        other => Err(JsonRpcResponse::error(
            id.clone(),
            METHOD_NOT_FOUND,
            &format!("Method not found: {other}"),
        )),
    };
    match result {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(response) => response,
    }
}

fn submit_result(result: Result<(), super::LedgerError>) -> Value {
    let verdict = match result {
        Ok(()) => SubmitResult {
            accepted: true,
            log: String::new(),
        },
        Err(e) => SubmitResult {
            accepted: false,
            log: e.to_string(),
        },
    };
    json!(verdict)
}

/// [`LedgerClient`] for a ledger served by [`serve`].
pub struct RpcLedgerClient {
    client: reqwest::Client,
    url: String,
}

impl RpcLedgerClient {
    pub fn new(url: &str) -> Result<Self, WalletError> {
        let client = reqwest::Client::builder()
            .timeout(RPC_TIMEOUT)
            .build()
            .map_err(|e| WalletError::Ledger(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, WalletError> {
        let id = REQUEST_ID.fetch_add(1, Ordering::SeqCst);
        let request = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| WalletError::Ledger(e.to_string()))?;
        if !response.status().is_success() {
            return Err(WalletError::Ledger(format!("HTTP error: {}", response.status())));
        }

        let response: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| WalletError::Ledger(e.to_string()))?;
        if let Some(error) = response.error {
            return Err(WalletError::Ledger(format!(
                "RPC error {}: {}",
                error.code, error.message
            )));
        }
        let result = response
            .result
            .ok_or_else(|| WalletError::Ledger("Missing result in RPC response".into()))?;
        serde_json::from_value(result).map_err(|e| WalletError::Ledger(e.to_string()))
    }
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    async fn submit(&self, tx: &Transaction) -> Result<SubmitResult, WalletError> {
        self.call("ledger_submitTransaction", json!({ "transaction": tx }))
            .await
    }

    async fn output_exists(&self, commitment: &CompressedCommitment) -> Result<bool, WalletError> {
        self.call("ledger_outputExists", json!({ "commitment": commitment }))
            .await
    }

    async fn issue(&self, output: &Output) -> Result<SubmitResult, WalletError> {
        self.call("ledger_issue", json!({ "output": output })).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: &str, params: Value) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: json!(7),
        }
    }

    #[test]
    fn unknown_methods_and_bad_params_are_reported() {
        let ledger = Ledger::new();
        let response = dispatch(request("ledger_mint", json!({})), &ledger);
        assert_eq!(response.error.map(|e| e.code), Some(METHOD_NOT_FOUND));

        let response = dispatch(
            request("ledger_outputExists", json!({ "commitment": "zz" })),
            &ledger,
        );
        assert_eq!(response.error.map(|e| e.code), Some(INVALID_PARAMS));
        assert_eq!(response.id, json!(7));
    }

    #[test]
    fn missing_outputs_do_not_exist() {
        let ledger = Ledger::new();
        let commitment = CompressedCommitment::from_bytes(&[0u8; 32]).unwrap();
        let response = dispatch(
            request("ledger_outputExists", json!({ "commitment": commitment })),
            &ledger,
        );
        assert_eq!(response.result, Some(Value::Bool(false)));
    }
}
