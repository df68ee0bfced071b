use serde::{Deserialize, Serialize};

/// Pure (non-object) Move call argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PureArg {
    Id(String),
    Address(String),
    String(String),
    U8(u8),
    U64(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakePayment {
    pub amount: u64,
    pub coin_type: String,
    /// Concrete coin object to pay from. Wallets can merge/split on their
    /// own, so prepared transactions may leave this empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coin: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TxArg {
    Object { id: String },
    Pure { value: PureArg },
    /// Output of an earlier command in the same transaction.
    Result { index: u16 },
    Stake { payment: StakePayment },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveCall {
    pub package: String,
    pub module: String,
    pub function: String,
    #[serde(default)]
    pub type_arguments: Vec<String>,
    pub arguments: Vec<TxArg>,
}

impl MoveCall {
    pub fn target(&self) -> String {
        format!("{}::{}::{}", self.package, self.module, self.function)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum TxCommand {
    MoveCall(MoveCall),
    TransferObjects { objects: Vec<TxArg>, recipient: String },
}

/// Unsigned transaction description. Either executed by the backend signer
/// or handed to the player's wallet as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedTx {
    pub sender: Option<String>,
    pub gas_budget: u64,
    pub commands: Vec<TxCommand>,
}

impl UnsignedTx {
    pub fn new(sender: &str, gas_budget: u64) -> Self {
        Self {
            sender: Some(sender.to_string()),
            gas_budget,
            commands: Vec::new(),
        }
    }

    pub fn push(&mut self, command: TxCommand) -> u16 {
        self.commands.push(command);
        (self.commands.len() - 1) as u16
    }

    /// The call when the transaction is a single Move call.
    pub fn single_move_call(&self) -> Option<&MoveCall> {
        match self.commands.as_slice() {
            [TxCommand::MoveCall(call)] => Some(call),
            _ => None,
        }
    }

    pub fn move_calls(&self) -> impl Iterator<Item = &MoveCall> {
        self.commands.iter().filter_map(|c| match c {
            TxCommand::MoveCall(call) => Some(call),
            _ => None,
        })
    }
}
