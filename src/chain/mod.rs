pub mod decode;
#[cfg(test)]
pub mod fake;
pub mod rpc_client;
pub mod signer;
pub mod transaction;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use transaction::UnsignedTx;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Failure(String),
}

impl ExecutionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionStatus::Success)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainEvent {
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(rename = "parsedJson", default)]
    pub parsed_json: Value,
}

#[derive(Debug, Clone)]
pub struct DryRunResult {
    pub status: ExecutionStatus,
    pub events: Vec<ChainEvent>,
}

#[derive(Debug, Clone)]
pub struct ExecuteResult {
    /// Empty when the node refused the transaction before executing it.
    pub digest: String,
    pub status: ExecutionStatus,
    pub events: Vec<ChainEvent>,
}

#[derive(Debug, Clone)]
pub struct ObjectData {
    pub object_id: String,
    pub object_type: Option<String>,
    /// `content.fields` of a Move object.
    pub fields: Value,
}

#[derive(Debug, Clone)]
pub struct DynamicFieldEntry {
    pub name: Value,
    pub object_id: String,
}

#[derive(Debug, Clone)]
pub struct OwnedObjectRef {
    pub object_id: String,
    pub object_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub next_cursor: Option<String>,
    pub has_next_page: bool,
}

/// Request/response surface of the chain node the game core relies on.
///
/// Implementations return `AppError::Transport` whenever no answer was
/// obtained; a failed simulation or execution is a normal result.
#[async_trait::async_trait]
pub trait ChainRpc: Send + Sync {
    async fn dry_run(&self, tx: &UnsignedTx) -> Result<DryRunResult>;

    async fn execute(&self, tx: &UnsignedTx) -> Result<ExecuteResult>;

    async fn wait_for_finality(&self, digest: &str) -> Result<()>;

    async fn get_object(&self, id: &str) -> Result<Option<ObjectData>>;

    async fn get_dynamic_fields(
        &self,
        parent_id: &str,
        cursor: Option<String>,
    ) -> Result<Page<DynamicFieldEntry>>;

    async fn get_owned_objects(
        &self,
        owner: &str,
        struct_type: &str,
        cursor: Option<String>,
    ) -> Result<Page<OwnedObjectRef>>;
}
