use log::trace;
use primitive_types::U256;

use super::{AccountState, GenerationError};
use crate::{
    config::{EVM_INPUT_GAS, X2C_RATE},
    context::ChainContext,
    crypto::{Hash, PrivateKey},
    fee::calculate_dynamic_fee,
    transaction::EvmInput,
};

pub type SpendableInputs = (Vec<EvmInput>, Vec<Vec<PrivateKey>>);

fn saturating_u64(value: U256) -> u64 {
    if value > U256::from(u64::MAX) {
        u64::MAX
    } else {
        value.low_u64()
    }
}

// Balance usable by an export, in native base units for the native asset
fn spendable_balance<S: AccountState>(
    ctx: &ChainContext,
    state: &S,
    key: &PrivateKey,
    asset: &Hash,
) -> Result<u64, GenerationError<S::Error>> {
    let address = key.public_key().eth_address();
    let balance = if *asset == ctx.native_asset_id {
        state.get_balance(&address).map(|b| b / U256::from(X2C_RATE))
    } else {
        state.get_balance_multi_coin(&address, asset)
    }
    .map_err(GenerationError::State)?;
    Ok(saturating_u64(balance))
}

/// Greedily take `amount` of `asset` from the keys, in order.
/// Keys are expected to be unique so no nonce is used twice.
pub fn get_spendable_funds<S: AccountState>(
    ctx: &ChainContext,
    state: &S,
    keys: &[PrivateKey],
    asset: &Hash,
    mut amount: u64,
) -> Result<SpendableInputs, GenerationError<S::Error>> {
    let mut inputs = Vec::new();
    let mut signers = Vec::new();

    for key in keys {
        if amount == 0 {
            break;
        }

        let balance = spendable_balance(ctx, state, key, asset)?;
        if balance == 0 {
            continue;
        }

        let spent = balance.min(amount);
        let address = key.public_key().eth_address();
        let nonce = state.get_nonce(&address).map_err(GenerationError::State)?;
        inputs.push(EvmInput::new(address, spent, asset.clone(), nonce));
        signers.push(vec![key.clone()]);
        amount -= spent;
    }

    if amount > 0 {
        return Err(GenerationError::InsufficientFunds {
            asset: asset.clone(),
            missing: amount,
        });
    }
    Ok((inputs, signers))
}

/// Greedily take `amount` of the native asset plus the dynamic fee of the
/// transaction. Every selected input grows the transaction, so its gas is
/// added to `cost` and the marginal fee to the amount still needed. A key
/// whose balance cannot even pay its own marginal fee is skipped.
pub fn get_spendable_native_with_fee<S: AccountState>(
    ctx: &ChainContext,
    state: &S,
    keys: &[PrivateKey],
    amount: u64,
    mut cost: u64,
    base_fee: Option<U256>,
) -> Result<SpendableInputs, GenerationError<S::Error>> {
    let initial_fee = calculate_dynamic_fee(cost, base_fee)?;
    let mut amount = amount
        .checked_add(initial_fee)
        .ok_or(GenerationError::Overflow)?;

    let mut inputs = Vec::new();
    let mut signers = Vec::new();
    for key in keys {
        if amount == 0 {
            break;
        }

        let previous_fee = calculate_dynamic_fee(cost, base_fee)?;
        let new_cost = cost.checked_add(EVM_INPUT_GAS).ok_or(GenerationError::Overflow)?;
        let new_fee = calculate_dynamic_fee(new_cost, base_fee)?;
        let additional_fee = new_fee - previous_fee;

        let balance = spendable_balance(ctx, state, key, &ctx.native_asset_id)?;
        if balance <= additional_fee {
            trace!("skipping key with balance {} below input fee {}", balance, additional_fee);
            continue;
        }

        cost = new_cost;
        amount = amount
            .checked_add(additional_fee)
            .ok_or(GenerationError::Overflow)?;

        let spent = balance.min(amount);
        let address = key.public_key().eth_address();
        let nonce = state.get_nonce(&address).map_err(GenerationError::State)?;
        inputs.push(EvmInput::new(address, spent, ctx.native_asset_id.clone(), nonce));
        signers.push(vec![key.clone()]);
        amount -= spent;
    }

    if amount > 0 {
        return Err(GenerationError::InsufficientFunds {
            asset: ctx.native_asset_id.clone(),
            missing: amount,
        });
    }
    Ok((inputs, signers))
}
