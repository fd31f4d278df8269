//! Wallet and driver persistence traits.

use async_trait::async_trait;

use crate::error::WalletResult;
use crate::types::{Driver, DriverId, Wallet, WalletId};

/// Wallet row persistence.
#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Fetch a wallet by ID.
    async fn get(&self, id: WalletId) -> WalletResult<Option<Wallet>>;

    /// Insert or replace a wallet row.
    async fn save(&self, wallet: &Wallet) -> WalletResult<()>;

    /// Delete a wallet row. Deleting an absent row is a no-op.
    async fn delete(&self, id: WalletId) -> WalletResult<()>;

    /// Find a wallet claiming the given address in either mode, excluding
    /// at most one wallet ID (the caller's own row on updates).
    async fn find_by_address(
        &self,
        address: &str,
        excluding: Option<WalletId>,
    ) -> WalletResult<Option<Wallet>>;
}

/// Driver record persistence.
#[async_trait]
pub trait DriverStore: Send + Sync {
    /// Fetch a driver by ID.
    async fn get(&self, id: DriverId) -> WalletResult<Option<Driver>>;

    /// Insert or replace a driver record.
    async fn save(&self, driver: &Driver) -> WalletResult<()>;
}

/// Thread-safe in-memory wallet store for testing.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Default)]
pub struct InMemoryWalletStore {
    wallets: dashmap::DashMap<WalletId, Wallet>,
}

#[cfg(any(test, feature = "test-utils"))]
impl InMemoryWalletStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored wallets.
    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl WalletStore for InMemoryWalletStore {
    async fn get(&self, id: WalletId) -> WalletResult<Option<Wallet>> {
        Ok(self.wallets.get(&id).map(|entry| entry.clone()))
    }

    async fn save(&self, wallet: &Wallet) -> WalletResult<()> {
        self.wallets.insert(wallet.id, wallet.clone());
        Ok(())
    }

    async fn delete(&self, id: WalletId) -> WalletResult<()> {
        self.wallets.remove(&id);
        Ok(())
    }

    async fn find_by_address(
        &self,
        address: &str,
        excluding: Option<WalletId>,
    ) -> WalletResult<Option<Wallet>> {
        Ok(self
            .wallets
            .iter()
            .filter(|entry| Some(entry.id) != excluding)
            .find(|entry| {
                entry.external_address.as_deref() == Some(address)
                    || entry.managed_address.as_deref() == Some(address)
            })
            .map(|entry| entry.clone()))
    }
}

/// Thread-safe in-memory driver store for testing.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Default)]
pub struct InMemoryDriverStore {
    drivers: dashmap::DashMap<DriverId, Driver>,
}

#[cfg(any(test, feature = "test-utils"))]
impl InMemoryDriverStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl DriverStore for InMemoryDriverStore {
    async fn get(&self, id: DriverId) -> WalletResult<Option<Driver>> {
        Ok(self.drivers.get(&id).map(|entry| entry.clone()))
    }

    async fn save(&self, driver: &Driver) -> WalletResult<()> {
        self.drivers.insert(driver.id, driver.clone());
        Ok(())
    }
}
