//! Top-level payout engine composition.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use driverpay_common::{CurrencyCatalog, CurrencyCode, ExchangeRate, PairCodes};
use driverpay_fx::{
    ExchangeRateDaemon, ExchangeRateDaemonConfig, FxResult, RateFetchService, RateHistoryStore,
};
use tracing::info;

use crate::coordinator::{TransferReceipt, WalletBalance, WalletCoordinator};
use crate::error::{WalletError, WalletResult};
use crate::gateway::BlockchainGateway;
use crate::keystore::ManagedKeyStore;
use crate::store::{DriverStore, WalletStore};
use crate::types::{CreateOrUpdateWalletRequest, Driver, TransferRequest, Wallet, WalletUpsert};

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Interval between rate refresh cycles.
    pub refresh_interval: Duration,
    /// Currency every wallet holds on chain.
    pub base_currency: CurrencyCode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(60),
            base_currency: CurrencyCode::new("ETH"),
        }
    }
}

/// The assembled payout engine: the currency catalog, the rate daemon, and
/// the wallet coordinator wired over one set of collaborators.
///
/// The daemon doubles as the coordinator's rate source, so transfers and
/// valuations use the live cached rates of the tracked pairs.
pub struct PayoutEngine {
    catalog: Arc<CurrencyCatalog>,
    daemon: ExchangeRateDaemon,
    coordinator: WalletCoordinator,
}

impl PayoutEngine {
    /// Assemble an engine from its collaborators, with the standard
    /// currency catalog.
    pub fn new(
        config: EngineConfig,
        fetcher: Arc<dyn RateFetchService>,
        history: Arc<dyn RateHistoryStore>,
        wallets: Arc<dyn WalletStore>,
        drivers: Arc<dyn DriverStore>,
        gateway: Arc<dyn BlockchainGateway>,
        keys: Arc<dyn ManagedKeyStore>,
    ) -> Self {
        let catalog = Arc::new(CurrencyCatalog::standard());

        let daemon = ExchangeRateDaemon::new(
            ExchangeRateDaemonConfig {
                refresh_interval: config.refresh_interval,
            },
            fetcher,
            history,
        );

        let coordinator = WalletCoordinator::new(
            wallets,
            drivers,
            gateway,
            keys,
            catalog.clone(),
            config.base_currency,
        );

        Self {
            catalog,
            daemon,
            coordinator,
        }
    }

    /// The engine's currency catalog.
    pub fn catalog(&self) -> &CurrencyCatalog {
        &self.catalog
    }

    /// Start background rate refresh.
    pub fn start(&self) {
        self.daemon.start();
        info!("Payout engine started");
    }

    /// Stop background rate refresh.
    pub fn stop(&self) {
        self.daemon.stop();
        info!("Payout engine stopped");
    }

    /// Whether background refresh is running.
    pub fn is_running(&self) -> bool {
        self.daemon.is_running()
    }

    /// Subscribe a currency pair for rate tracking. The pair is refreshed
    /// immediately. Fails when either code is unknown to the catalog.
    pub async fn track_pair(&self, base: &CurrencyCode, quote: &CurrencyCode) -> WalletResult<()> {
        let pair = self
            .catalog
            .pair(base, quote)
            .ok_or_else(|| WalletError::UnknownCurrency(unknown_of(&self.catalog, base, quote)))?;

        self.daemon.add_pair(pair.codes()).await;
        Ok(())
    }

    /// Unsubscribe a currency pair.
    pub fn untrack_pair(&self, base: &CurrencyCode, quote: &CurrencyCode) {
        self.daemon
            .remove_pair(&PairCodes::new(base.clone(), quote.clone()));
    }

    /// Resolve a rate: the live cached rate when `on` is absent or names
    /// today, the persisted (backfilled on demand) history otherwise.
    pub async fn exchange_rate(
        &self,
        pair: &PairCodes,
        on: Option<NaiveDate>,
    ) -> FxResult<Option<ExchangeRate>> {
        self.daemon.get_exchange_rate(pair, on).await
    }

    /// Create or update a driver's wallet.
    pub async fn create_or_update_wallet(
        &self,
        request: &CreateOrUpdateWalletRequest,
        driver: &mut Driver,
    ) -> WalletResult<WalletUpsert> {
        self.coordinator.create_or_update_wallet(request, driver).await
    }

    /// Delete a driver's wallet.
    pub async fn delete_wallet(&self, driver: &mut Driver) -> WalletResult<()> {
        self.coordinator.delete_wallet(driver).await
    }

    /// The wallet's balance valued at the daemon's current rate.
    pub async fn balance(&self, wallet: &Wallet) -> WalletResult<WalletBalance> {
        self.coordinator.balance(wallet, &self.daemon).await
    }

    /// Transfer funds at the daemon's current rate.
    pub async fn transfer_funds(
        &self,
        wallet: &Wallet,
        request: &TransferRequest,
    ) -> WalletResult<TransferReceipt> {
        self.coordinator
            .transfer_funds(wallet, request, &self.daemon)
            .await
    }
}

fn unknown_of(
    catalog: &CurrencyCatalog,
    base: &CurrencyCode,
    quote: &CurrencyCode,
) -> CurrencyCode {
    if catalog.lookup(base).is_none() {
        base.clone()
    } else {
        quote.clone()
    }
}
