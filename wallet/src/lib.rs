//! DriverPay Wallet Coordinator
//!
//! Wallet creation/linking and fund transfer over abstract blockchain and
//! storage collaborators, plus the top-level engine composition.

pub mod coordinator;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod keystore;
pub mod store;
pub mod types;

pub use coordinator::{TransferReceipt, WalletBalance, WalletCoordinator};
pub use engine::{EngineConfig, PayoutEngine};
pub use error::{WalletError, WalletResult};
pub use gateway::{BlockchainGateway, SignedTransaction, TransactionRequest, UnsignedTransaction};
pub use keystore::{KeyStoreError, ManagedKey, ManagedKeyStore, SoftwareKeyStore};
pub use store::{DriverStore, WalletStore};
pub use types::{
    CreateOrUpdateWalletRequest, Driver, DriverId, TransferRequest, Wallet, WalletId, WalletUpsert,
};

#[cfg(any(test, feature = "test-utils"))]
pub use gateway::MockGateway;
#[cfg(any(test, feature = "test-utils"))]
pub use store::{InMemoryDriverStore, InMemoryWalletStore};
