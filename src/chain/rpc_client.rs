use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use tokio::time::{sleep, Duration};

use super::{
    signer::BackendSigner,
    transaction::{MoveCall, PureArg, TxArg, UnsignedTx},
    ChainEvent, ChainRpc, DryRunResult, DynamicFieldEntry, ExecuteResult, ExecutionStatus,
    ObjectData, OwnedObjectRef, Page,
};
use crate::{
    config::Config,
    constants::SCAN_PAGE_LIMIT,
    error::{AppError, Result},
};

fn rpc_request(method: &str, params: Value) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": 1
    })
}

/// Why a JSON-RPC call produced no result.
#[derive(Debug)]
enum CallError {
    /// Request never got an answer.
    Transport(String),
    /// The node answered with a JSON-RPC error object.
    Node { code: i64, message: String },
}

impl From<CallError> for AppError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Transport(msg) => AppError::Transport(msg),
            CallError::Node { code, message } => {
                AppError::Transport(format!("node error {}: {}", code, message))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionBytes {
    tx_bytes: String,
}

#[derive(Debug, Default, Deserialize)]
struct StatusBody {
    status: String,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct EffectsBody {
    #[serde(default)]
    status: StatusBody,
}

#[derive(Debug, Deserialize)]
struct DryRunBody {
    #[serde(default)]
    effects: EffectsBody,
    #[serde(default)]
    events: Vec<ChainEvent>,
}

#[derive(Debug, Deserialize)]
struct ExecuteBody {
    digest: String,
    #[serde(default)]
    effects: Option<EffectsBody>,
    #[serde(default)]
    events: Vec<ChainEvent>,
}

#[derive(Debug, Deserialize)]
struct TransactionBlockBody {
    #[serde(default)]
    checkpoint: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectResponse {
    data: Option<ObjectBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectBody {
    object_id: String,
    #[serde(rename = "type", default)]
    object_type: Option<String>,
    #[serde(default)]
    content: Option<ContentBody>,
}

#[derive(Debug, Deserialize)]
struct ContentBody {
    #[serde(default)]
    fields: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageBody<T> {
    data: Vec<T>,
    #[serde(default)]
    next_cursor: Option<String>,
    #[serde(default)]
    has_next_page: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DynamicFieldBody {
    name: Value,
    object_id: String,
}

#[derive(Debug, Deserialize)]
struct OwnedObjectBody {
    data: Option<ObjectBody>,
}

fn status_of(body: &StatusBody) -> ExecutionStatus {
    if body.status.eq_ignore_ascii_case("success") {
        ExecutionStatus::Success
    } else {
        ExecutionStatus::Failure(
            body.error
                .clone()
                .unwrap_or_else(|| format!("status {}", body.status)),
        )
    }
}

fn move_call_arg(arg: &TxArg) -> Result<Value> {
    Ok(match arg {
        TxArg::Object { id } => Value::String(id.clone()),
        TxArg::Pure { value } => match value {
            PureArg::Id(v) | PureArg::Address(v) | PureArg::String(v) => Value::String(v.clone()),
            PureArg::U8(v) => Value::from(*v),
            PureArg::U64(v) => Value::String(v.to_string()),
        },
        TxArg::Stake { payment } => match &payment.coin {
            Some(coin) => Value::String(coin.clone()),
            None => {
                return Err(AppError::BadRequest(
                    "Backend-executed stakes need a concrete coin object".to_string(),
                ))
            }
        },
        TxArg::Result { .. } => {
            return Err(AppError::BadRequest(
                "Chained commands must be signed by the player wallet".to_string(),
            ))
        }
    })
}

fn move_call_params(sender: &str, call: &MoveCall, gas_budget: u64) -> Result<Value> {
    let arguments = call
        .arguments
        .iter()
        .map(move_call_arg)
        .collect::<Result<Vec<_>>>()?;
    Ok(serde_json::json!([
        sender,
        call.package,
        call.module,
        call.function,
        call.type_arguments,
        arguments,
        Value::Null,
        gas_budget.to_string(),
        Value::Null
    ]))
}

/// JSON-RPC client for a Sui fullnode, signing with the backend credential.
pub struct JsonRpcChainClient {
    rpc_url: String,
    client: reqwest::Client,
    signer: BackendSigner,
    poll_attempts: usize,
    poll_interval: Duration,
}

impl JsonRpcChainClient {
    pub fn new(rpc_url: String, signer: BackendSigner) -> Self {
        Self {
            rpc_url,
            client: reqwest::Client::new(),
            signer,
            poll_attempts: crate::constants::DEFAULT_FINALITY_POLL_ATTEMPTS,
            poll_interval: Duration::from_millis(
                crate::constants::DEFAULT_FINALITY_POLL_INTERVAL_MS,
            ),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let signer = BackendSigner::from_config(config)?;
        let mut client = Self::new(config.rpc_url.clone(), signer);
        client.poll_attempts = config.finality_poll_attempts.max(1);
        client.poll_interval = Duration::from_millis(config.finality_poll_interval_ms);
        Ok(client)
    }

    pub fn sender_address(&self) -> &str {
        self.signer.address()
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> std::result::Result<T, CallError> {
        let request = rpc_request(method, params);
        tracing::debug!("RPC {} -> {}", method, self.rpc_url);

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| CallError::Transport(e.to_string()))?;

        let body: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| CallError::Transport(e.to_string()))?;

        if let Some(error) = body.error {
            return Err(CallError::Node {
                code: error.code,
                message: error.message,
            });
        }
        body.result
            .ok_or_else(|| CallError::Transport(format!("{} returned no result", method)))
    }

    async fn build_tx_bytes(&self, tx: &UnsignedTx) -> Result<std::result::Result<String, CallError>> {
        let sender = tx
            .sender
            .as_deref()
            .ok_or_else(|| AppError::Internal("Transaction has no sender".to_string()))?;
        let call = tx.single_move_call().ok_or_else(|| {
            AppError::BadRequest(
                "Only single-call transactions can be executed by the backend".to_string(),
            )
        })?;
        let params = move_call_params(sender, call, tx.gas_budget)?;
        Ok(self
            .call::<TransactionBytes>("unsafe_moveCall", params)
            .await
            .map(|bytes| bytes.tx_bytes))
    }
}

#[async_trait::async_trait]
impl ChainRpc for JsonRpcChainClient {
    async fn dry_run(&self, tx: &UnsignedTx) -> Result<DryRunResult> {
        // A node refusing to even build the transaction is a failed simulation.
        let tx_bytes = match self.build_tx_bytes(tx).await? {
            Ok(bytes) => bytes,
            Err(CallError::Node { message, .. }) => {
                return Ok(DryRunResult {
                    status: ExecutionStatus::Failure(message),
                    events: Vec::new(),
                })
            }
            Err(err) => return Err(err.into()),
        };

        let body: DryRunBody = self
            .call("sui_dryRunTransactionBlock", serde_json::json!([tx_bytes]))
            .await?;
        Ok(DryRunResult {
            status: status_of(&body.effects.status),
            events: body.events,
        })
    }

    async fn execute(&self, tx: &UnsignedTx) -> Result<ExecuteResult> {
        // The node answered but refused: usually an object moved on since
        // the dry-run. Nothing was executed, so there is no digest.
        let refused = |message: String| {
            tracing::warn!("Node refused transaction: {}", message);
            ExecuteResult {
                digest: String::new(),
                status: ExecutionStatus::Failure(message),
                events: Vec::new(),
            }
        };

        let tx_bytes = match self.build_tx_bytes(tx).await? {
            Ok(bytes) => bytes,
            Err(CallError::Node { message, .. }) => return Ok(refused(message)),
            Err(err) => return Err(err.into()),
        };
        let raw = BASE64
            .decode(&tx_bytes)
            .map_err(|e| AppError::Decode(format!("tx bytes are not base64: {}", e)))?;
        let signature = self.signer.sign_transaction(&raw);

        let executed = self
            .call::<ExecuteBody>(
                "sui_executeTransactionBlock",
                serde_json::json!([
                    tx_bytes,
                    [signature],
                    { "showEffects": true, "showEvents": true },
                    "WaitForLocalExecution"
                ]),
            )
            .await;
        let body = match executed {
            Ok(body) => body,
            Err(CallError::Node { message, .. }) => return Ok(refused(message)),
            Err(err) => return Err(err.into()),
        };

        let status = body
            .effects
            .as_ref()
            .map(|effects| status_of(&effects.status))
            .unwrap_or_else(|| ExecutionStatus::Failure("no effects returned".to_string()));
        tracing::info!("Executed transaction {} ({:?})", body.digest, status);

        Ok(ExecuteResult {
            digest: body.digest,
            status,
            events: body.events,
        })
    }

    async fn wait_for_finality(&self, digest: &str) -> Result<()> {
        let mut last_error = String::new();

        for attempt in 0..self.poll_attempts {
            match self
                .call::<TransactionBlockBody>(
                    "sui_getTransactionBlock",
                    serde_json::json!([digest, { "showEffects": true }]),
                )
                .await
            {
                Ok(block) if block.checkpoint.is_some() => return Ok(()),
                Ok(_) => last_error = "transaction not yet checkpointed".to_string(),
                Err(CallError::Transport(msg)) => last_error = msg,
                Err(CallError::Node { message, .. }) => last_error = message,
            }
            if attempt + 1 < self.poll_attempts {
                sleep(self.poll_interval).await;
            }
        }

        Err(AppError::Transport(format!(
            "Transaction {} not final after {} polls: {}",
            digest, self.poll_attempts, last_error
        )))
    }

    async fn get_object(&self, id: &str) -> Result<Option<ObjectData>> {
        let response: ObjectResponse = self
            .call(
                "sui_getObject",
                serde_json::json!([id, { "showContent": true, "showType": true }]),
            )
            .await?;
        Ok(response.data.map(|body| ObjectData {
            object_id: body.object_id,
            object_type: body.object_type,
            fields: body.content.map(|c| c.fields).unwrap_or(Value::Null),
        }))
    }

    async fn get_dynamic_fields(
        &self,
        parent_id: &str,
        cursor: Option<String>,
    ) -> Result<Page<DynamicFieldEntry>> {
        let page: PageBody<DynamicFieldBody> = self
            .call(
                "suix_getDynamicFields",
                serde_json::json!([parent_id, cursor, SCAN_PAGE_LIMIT]),
            )
            .await?;
        Ok(Page {
            data: page
                .data
                .into_iter()
                .map(|field| DynamicFieldEntry {
                    name: field.name,
                    object_id: field.object_id,
                })
                .collect(),
            next_cursor: page.next_cursor,
            has_next_page: page.has_next_page,
        })
    }

    async fn get_owned_objects(
        &self,
        owner: &str,
        struct_type: &str,
        cursor: Option<String>,
    ) -> Result<Page<OwnedObjectRef>> {
        let page: PageBody<OwnedObjectBody> = self
            .call(
                "suix_getOwnedObjects",
                serde_json::json!([
                    owner,
                    {
                        "filter": { "StructType": struct_type },
                        "options": { "showType": true }
                    },
                    cursor,
                    SCAN_PAGE_LIMIT
                ]),
            )
            .await?;
        Ok(Page {
            data: page
                .data
                .into_iter()
                .filter_map(|item| item.data)
                .map(|body| OwnedObjectRef {
                    object_id: body.object_id,
                    object_type: body.object_type,
                })
                .collect(),
            next_cursor: page.next_cursor,
            has_next_page: page.has_next_page,
        })
    }
}
