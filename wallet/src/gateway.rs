//! Blockchain gateway collaborator.
//!
//! The gateway owns transaction construction semantics (gas, nonces, fees);
//! the coordinator only consumes this abstract surface. Amounts crossing
//! the boundary are decimals, never binary floats.

use async_trait::async_trait;
use driverpay_common::CurrencyDescriptor;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::WalletResult;

/// A transfer to be placed on chain. `value` is in base units (integral).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub to: String,
    pub value: Decimal,
}

/// An unsigned transaction produced by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedTransaction {
    pub sender: String,
    pub to: String,
    pub value: Decimal,
    /// Network-specific encoding, opaque to the coordinator.
    pub payload: Vec<u8>,
}

impl UnsignedTransaction {
    /// The bytes a key store signs over.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(self.sender.as_bytes());
        bytes.extend_from_slice(self.to.as_bytes());
        bytes.extend_from_slice(self.value.to_string().as_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes
    }
}

/// A signed transaction ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

/// Abstract blockchain node access.
#[async_trait]
pub trait BlockchainGateway: Send + Sync {
    /// Identifier of the network this gateway talks to.
    fn network_id(&self) -> &str;

    /// On-chain balance of an address, in base units.
    async fn get_base_unit_balance(
        &self,
        address: &str,
        currency: &CurrencyDescriptor,
    ) -> WalletResult<Decimal>;

    /// Whether the address's balance covers the transaction value plus its
    /// fee estimate.
    async fn has_sufficient_balance(
        &self,
        request: &TransactionRequest,
        address: &str,
    ) -> WalletResult<bool>;

    /// Build an unsigned transaction for the request.
    async fn create_transaction(
        &self,
        request: &TransactionRequest,
        sender: &str,
    ) -> WalletResult<UnsignedTransaction>;

    /// Broadcast a signed transaction.
    async fn send_signed(&self, transaction: SignedTransaction) -> WalletResult<()>;

    /// Normalize an address to its checksummed form; fails on malformed
    /// input with [`crate::WalletError::InvalidAddress`].
    fn checksummed_address(&self, address: &str) -> WalletResult<String>;
}

/// Mock gateway for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockGateway {
    network_id: String,
    balances: dashmap::DashMap<String, Decimal>,
    fee: Decimal,
    sent: parking_lot::Mutex<Vec<SignedTransaction>>,
    balance_checks: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockGateway {
    /// Create a new mock gateway with zero fee.
    pub fn new(network_id: impl Into<String>) -> Self {
        Self {
            network_id: network_id.into(),
            balances: dashmap::DashMap::new(),
            fee: Decimal::ZERO,
            sent: parking_lot::Mutex::new(Vec::new()),
            balance_checks: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Set the flat fee estimate applied to every transaction.
    pub fn with_fee(mut self, fee: Decimal) -> Self {
        self.fee = fee;
        self
    }

    /// Set the base-unit balance of an address.
    pub fn set_balance(&self, address: &str, balance: Decimal) {
        self.balances.insert(address.to_lowercase(), balance);
    }

    /// Transactions broadcast so far.
    pub fn sent(&self) -> Vec<SignedTransaction> {
        self.sent.lock().clone()
    }

    /// Number of balance-sufficiency checks issued.
    pub fn balance_checks(&self) -> usize {
        self.balance_checks.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl BlockchainGateway for MockGateway {
    fn network_id(&self) -> &str {
        &self.network_id
    }

    async fn get_base_unit_balance(
        &self,
        address: &str,
        _currency: &CurrencyDescriptor,
    ) -> WalletResult<Decimal> {
        Ok(self
            .balances
            .get(&address.to_lowercase())
            .map(|b| *b)
            .unwrap_or(Decimal::ZERO))
    }

    async fn has_sufficient_balance(
        &self,
        request: &TransactionRequest,
        address: &str,
    ) -> WalletResult<bool> {
        self.balance_checks
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        let balance = self
            .balances
            .get(&address.to_lowercase())
            .map(|b| *b)
            .unwrap_or(Decimal::ZERO);

        Ok(balance >= request.value + self.fee)
    }

    async fn create_transaction(
        &self,
        request: &TransactionRequest,
        sender: &str,
    ) -> WalletResult<UnsignedTransaction> {
        Ok(UnsignedTransaction {
            sender: sender.to_string(),
            to: request.to.clone(),
            value: request.value,
            payload: Vec::new(),
        })
    }

    async fn send_signed(&self, transaction: SignedTransaction) -> WalletResult<()> {
        self.sent.lock().push(transaction);
        Ok(())
    }

    fn checksummed_address(&self, address: &str) -> WalletResult<String> {
        let hex_part = address
            .strip_prefix("0x")
            .ok_or_else(|| crate::WalletError::InvalidAddress(address.to_string()))?;

        if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(crate::WalletError::InvalidAddress(address.to_string()));
        }

        Ok(format!("0x{}", hex_part.to_lowercase()))
    }
}
