//! Call builders for the transactions and static reads the workflows need

use super::bindings::erc20::{AllowanceCall, ApproveCall, BalanceOfCall, TransferCall};
use super::bindings::flock::{ClaimRewardsCall, DelegateCall, ExchangeFlockCall};
use super::bindings::uniswap::{
    ExactInputSingleCall, ExactInputSingleParams, QuoteExactInputSingleCall,
    QuoteExactInputSingleParams,
};
use super::bindings::weth::WithdrawCall;
use super::ContractConfig;
use crate::error::{HarvesterError, HarvesterResult};

use ethers::abi::{self, AbiEncode, ParamType};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, Eip1559TransactionRequest, U256};

/// An encoded contract call waiting for a nonce
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedCall {
    pub to: Address,
    pub data: Bytes,
    pub value: Option<U256>,
}

impl PreparedCall {
    pub fn new(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to,
            data: data.into(),
            value: None,
        }
    }

    /// Build the transaction that is estimated or broadcast.
    pub fn stamp(&self, from: Address, nonce: u64) -> TypedTransaction {
        let mut request = Eip1559TransactionRequest::new()
            .from(from)
            .to(self.to)
            .data(self.data.clone())
            .nonce(nonce);
        if let Some(value) = self.value {
            request = request.value(value);
        }
        TypedTransaction::Eip1559(request)
    }

    /// Transaction for a read-only `eth_call`
    pub fn as_static_call(&self) -> TypedTransaction {
        TypedTransaction::Eip1559(
            Eip1559TransactionRequest::new()
                .to(self.to)
                .data(self.data.clone()),
        )
    }
}

// Mutating calls

pub fn approve(token: &ContractConfig, spender: Address, amount: U256) -> PreparedCall {
    PreparedCall::new(token.address, ApproveCall { spender, amount }.encode())
}

pub fn transfer(token: &ContractConfig, to: Address, amount: U256) -> PreparedCall {
    PreparedCall::new(token.address, TransferCall { to, amount }.encode())
}

pub fn claim_rewards(delegate: &ContractConfig) -> PreparedCall {
    PreparedCall::new(delegate.address, ClaimRewardsCall.encode())
}

pub fn delegate(delegate: &ContractConfig, amount: U256) -> PreparedCall {
    PreparedCall::new(delegate.address, DelegateCall { amount }.encode())
}

pub fn exchange_flock(
    exchange: &ContractConfig,
    amount: U256,
    lock_period_secs: u64,
    beneficiary: Address,
) -> PreparedCall {
    let call = ExchangeFlockCall {
        flock_amount: amount,
        lock_period: U256::from(lock_period_secs),
        beneficiary,
    };
    PreparedCall::new(exchange.address, call.encode())
}

/// Single-pool exact-input swap on a V3 router
pub struct SwapParams {
    pub token_in: Address,
    pub token_out: Address,
    pub fee_tier: u32,
    pub recipient: Address,
    pub amount_in: U256,
    pub amount_out_minimum: U256,
}

pub fn exact_input_single(router: &ContractConfig, swap: &SwapParams) -> PreparedCall {
    let call = ExactInputSingleCall {
        params: ExactInputSingleParams {
            token_in: swap.token_in,
            token_out: swap.token_out,
            fee: swap.fee_tier,
            recipient: swap.recipient,
            amount_in: swap.amount_in,
            amount_out_minimum: swap.amount_out_minimum,
            sqrt_price_limit_x96: U256::zero(),
        },
    };
    PreparedCall::new(router.address, call.encode())
}

/// Unwrap WETH into native ETH
pub fn withdraw(weth: &ContractConfig, amount: U256) -> PreparedCall {
    PreparedCall::new(weth.address, WithdrawCall { wad: amount }.encode())
}

// Static reads

pub fn balance_of_call(token: &ContractConfig, account: Address) -> PreparedCall {
    PreparedCall::new(token.address, BalanceOfCall { account }.encode())
}

pub fn allowance_call(token: &ContractConfig, owner: Address, spender: Address) -> PreparedCall {
    PreparedCall::new(token.address, AllowanceCall { owner, spender }.encode())
}

pub fn quote_call(
    quoter: &ContractConfig,
    token_in: &ContractConfig,
    token_out: &ContractConfig,
    amount_in: U256,
    fee_tier: u32,
) -> PreparedCall {
    let call = QuoteExactInputSingleCall {
        params: QuoteExactInputSingleParams {
            token_in: token_in.address,
            token_out: token_out.address,
            amount_in,
            fee: fee_tier,
            sqrt_price_limit_x96: U256::zero(),
        },
    };
    PreparedCall::new(quoter.address, call.encode())
}

/// Decode a single `uint256` return value
pub fn decode_uint(data: &Bytes) -> HarvesterResult<U256> {
    abi::decode(&[ParamType::Uint(256)], data)
        .map_err(|e| HarvesterError::Contract(format!("Failed to decode uint256: {}", e)))?
        .into_iter()
        .next()
        .and_then(|token| token.into_uint())
        .ok_or_else(|| HarvesterError::Contract("Empty uint256 return data".to_string()))
}

/// Decode `amountOut` from a `quoteExactInputSingle` return
pub fn decode_quote_amount(data: &Bytes) -> HarvesterResult<U256> {
    let outputs = [
        ParamType::Uint(256),
        ParamType::Uint(160),
        ParamType::Uint(32),
        ParamType::Uint(256),
    ];
    abi::decode(&outputs, data)
        .map_err(|e| HarvesterError::Contract(format!("Failed to decode quote: {}", e)))?
        .into_iter()
        .next()
        .and_then(|token| token.into_uint())
        .ok_or_else(|| HarvesterError::Contract("Empty quote return data".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::abi::{AbiDecode, Token};

    fn token(byte: u8, decimals: u8) -> ContractConfig {
        ContractConfig {
            address: Address::repeat_byte(byte),
            decimals,
        }
    }

    #[test]
    fn approve_targets_token_with_selector() {
        let flock = token(0x01, 18);
        let spender = Address::repeat_byte(0x02);
        let call = approve(&flock, spender, U256::from(5u64));

        assert_eq!(call.to, flock.address);
        // approve(address,uint256)
        assert_eq!(&call.data[..4], &[0x09, 0x5e, 0xa7, 0xb3]);
        let decoded = ApproveCall::decode(&call.data).unwrap();
        assert_eq!(decoded.spender, spender);
        assert_eq!(decoded.amount, U256::from(5u64));
    }

    #[test]
    fn stamp_carries_nonce_and_sender() {
        let call = transfer(&token(0x01, 18), Address::repeat_byte(0x03), U256::one());
        let from = Address::repeat_byte(0x04);
        let tx = call.stamp(from, 42);

        assert_eq!(tx.nonce(), Some(&U256::from(42u64)));
        assert_eq!(tx.from(), Some(&from));
        assert_eq!(tx.data(), Some(&call.data));
        assert!(call.as_static_call().nonce().is_none());
    }

    #[test]
    fn exchange_encodes_lock_period() {
        let call = exchange_flock(&token(0x05, 18), U256::from(7u64), 31_536_000, Address::repeat_byte(0x06));
        let decoded = ExchangeFlockCall::decode(&call.data).unwrap();
        assert_eq!(decoded.flock_amount, U256::from(7u64));
        assert_eq!(decoded.lock_period, U256::from(31_536_000u64));
        assert_eq!(decoded.beneficiary, Address::repeat_byte(0x06));
    }

    #[test]
    fn quote_call_carries_fee_tier() {
        let call = quote_call(&token(0x07, 18), &token(0x01, 18), &token(0x02, 6), U256::exp10(18), 3000);
        let decoded = QuoteExactInputSingleCall::decode(&call.data).unwrap();
        assert_eq!(decoded.params.fee, 3000);
        assert_eq!(decoded.params.amount_in, U256::exp10(18));
        assert_eq!(decoded.params.token_out, Address::repeat_byte(0x02));
    }

    #[test]
    fn decodes_quote_return() {
        let data: Bytes = abi::encode(&[
            Token::Uint(U256::from(1_500_000u64)),
            Token::Uint(U256::from(123u64)),
            Token::Uint(U256::from(2u64)),
            Token::Uint(U256::from(80_000u64)),
        ])
        .into();
        assert_eq!(decode_quote_amount(&data).unwrap(), U256::from(1_500_000u64));
        assert_eq!(decode_uint(&data).unwrap(), U256::from(1_500_000u64));
    }

    #[test]
    fn short_return_data_is_an_error() {
        let data = Bytes::from(vec![0u8; 4]);
        assert!(matches!(decode_uint(&data), Err(HarvesterError::Contract(_))));
    }
}
