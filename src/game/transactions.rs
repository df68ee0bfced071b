//! Builders for the jumping contract calls. All of them are pure.

use crate::{
    chain::transaction::{MoveCall, PureArg, StakePayment, TxArg, TxCommand, UnsignedTx},
    config::ChainObjects,
    constants::{
        FN_BUY_STEPS, FN_CLEAR_USER_INFO, FN_ENDLESS_NEXT_STEP, FN_MINT, FN_NEW_GAME,
        FN_NEW_GAME_WITH_NFT, FN_NEXT_STEP, MODULE_DATA, MODULE_NFT,
    },
    error::{AppError, Result},
};

use super::session::SessionKey;

fn object(id: &str) -> TxArg {
    TxArg::Object { id: id.to_string() }
}

fn pure(value: PureArg) -> TxArg {
    TxArg::Pure { value }
}

fn data_call(objects: &ChainObjects, function: &str, arguments: Vec<TxArg>) -> TxCommand {
    TxCommand::MoveCall(MoveCall {
        package: objects.package_id.clone(),
        module: MODULE_DATA.to_string(),
        function: function.to_string(),
        type_arguments: vec![],
        arguments,
    })
}

fn require(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{} is required", what)));
    }
    Ok(())
}

/// Starts a keyed session. Without an identity token the token is minted,
/// bound to the new game and transferred to the sender atomically.
pub fn build_start_tx(
    objects: &ChainObjects,
    identity: Option<&str>,
    session_key: &str,
    stake: StakePayment,
    sender: &str,
    gas_budget: u64,
) -> Result<UnsignedTx> {
    require(sender, "sender")?;
    if SessionKey::parse(session_key)?.is_endless() {
        return Err(AppError::BadRequest(
            "Session key is too short for a keyed game".to_string(),
        ));
    }
    if stake.amount == 0 {
        return Err(AppError::BadRequest("Stake must be positive".to_string()));
    }

    let mut tx = UnsignedTx::new(sender, gas_budget);
    match identity.map(str::trim).filter(|id| !id.is_empty()) {
        Some(identity) => {
            tx.push(data_call(
                objects,
                FN_NEW_GAME,
                vec![
                    object(&objects.data_pool_id),
                    pure(PureArg::Id(identity.to_string())),
                    pure(PureArg::String(session_key.to_string())),
                    TxArg::Stake { payment: stake },
                ],
            ));
        }
        None => {
            let minted = tx.push(TxCommand::MoveCall(MoveCall {
                package: objects.package_id.clone(),
                module: MODULE_NFT.to_string(),
                function: FN_MINT.to_string(),
                type_arguments: vec![],
                arguments: vec![],
            }));
            tx.push(data_call(
                objects,
                FN_NEW_GAME_WITH_NFT,
                vec![
                    object(&objects.data_pool_id),
                    TxArg::Result { index: minted },
                    pure(PureArg::String(session_key.to_string())),
                    TxArg::Stake { payment: stake },
                ],
            ));
            tx.push(TxCommand::TransferObjects {
                objects: vec![TxArg::Result { index: minted }],
                recipient: sender.to_string(),
            });
        }
    }
    Ok(tx)
}

#[derive(Debug, Clone)]
pub struct StepTxParams<'a> {
    pub identity: &'a str,
    pub session_key: &'a SessionKey,
    pub chosen_index: u8,
    pub lane_count: u8,
    pub payout_recipient: &'a str,
    pub sender: &'a str,
    pub gas_budget: u64,
}

/// Takes one step. The randomness object is always passed through.
pub fn build_step_tx(objects: &ChainObjects, params: StepTxParams<'_>) -> Result<UnsignedTx> {
    require(params.sender, "sender")?;
    require(params.identity, "identity")?;
    require(params.payout_recipient, "payout recipient")?;
    if params.chosen_index >= params.lane_count {
        return Err(AppError::BadRequest(format!(
            "Lane {} is out of range (lanes: {})",
            params.chosen_index, params.lane_count
        )));
    }

    let mut arguments = vec![
        object(&objects.publisher_id),
        object(&objects.data_pool_id),
        pure(PureArg::Id(params.identity.to_string())),
    ];
    let function = match params.session_key {
        SessionKey::Keyed(key) => {
            arguments.push(pure(PureArg::String(key.clone())));
            FN_NEXT_STEP
        }
        SessionKey::Endless { row } => {
            arguments.push(object(&objects.endless_game_id));
            arguments.push(pure(PureArg::U8(*row)));
            FN_ENDLESS_NEXT_STEP
        }
    };
    arguments.push(pure(PureArg::U8(params.chosen_index)));
    arguments.push(object(&objects.random_id));
    arguments.push(pure(PureArg::Address(params.payout_recipient.to_string())));

    let mut tx = UnsignedTx::new(params.sender, params.gas_budget);
    tx.push(data_call(objects, function, arguments));
    Ok(tx)
}

/// Clears the identity's finished sessions.
pub fn build_settle_tx(
    objects: &ChainObjects,
    identity: &str,
    sender: &str,
    gas_budget: u64,
) -> Result<UnsignedTx> {
    require(sender, "sender")?;
    require(identity, "identity")?;
    let mut tx = UnsignedTx::new(sender, gas_budget);
    tx.push(data_call(
        objects,
        FN_CLEAR_USER_INFO,
        vec![object(&objects.data_pool_id), object(identity)],
    ));
    Ok(tx)
}

pub fn build_buy_steps_tx(
    objects: &ChainObjects,
    identity: &str,
    stake: StakePayment,
    sender: &str,
    gas_budget: u64,
) -> Result<UnsignedTx> {
    require(sender, "sender")?;
    require(identity, "identity")?;
    if stake.amount == 0 {
        return Err(AppError::BadRequest("Amount must be positive".to_string()));
    }
    let mut tx = UnsignedTx::new(sender, gas_budget);
    tx.push(data_call(
        objects,
        FN_BUY_STEPS,
        vec![
            object(&objects.data_pool_id),
            pure(PureArg::Id(identity.to_string())),
            TxArg::Stake { payment: stake },
        ],
    ));
    Ok(tx)
}
