//! Wallet lifecycle and fund transfer coordination.

use std::sync::Arc;

use driverpay_common::{CurrencyCatalog, CurrencyCode, CurrencyDescriptor, CurrencyPair, ExchangeRate};
use driverpay_fx::{convert_base_to_quote, convert_quote_to_base, to_base_units, to_standard_units, RateSource};
use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use crate::error::{WalletError, WalletResult};
use crate::gateway::{BlockchainGateway, TransactionRequest};
use crate::keystore::{KeyStoreError, ManagedKeyStore};
use crate::store::{DriverStore, WalletStore};
use crate::types::{CreateOrUpdateWalletRequest, Driver, TransferRequest, Wallet, WalletUpsert};

/// A wallet's on-chain holdings in both currencies of its pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletBalance {
    /// Standard-unit amount in the wallet's base currency.
    pub base_amount: Decimal,
    /// Standard-unit amount in the wallet's quote currency.
    pub quote_amount: Decimal,
    /// The rate used for the quote-side valuation.
    pub rate: ExchangeRate,
}

/// Outcome of a completed transfer.
#[derive(Debug, Clone)]
pub struct TransferReceipt {
    /// The request as placed on chain. `value` is base units.
    pub request: TransactionRequest,
    /// The rate applied, when the requested currency needed conversion.
    pub rate: Option<ExchangeRate>,
}

/// Coordinates wallet creation, linking, deletion, valuation, and
/// transfers over the storage, key-custody, and blockchain collaborators.
///
/// Transfers are not serialized per wallet: two concurrent transfers can
/// both pass the balance check before either is broadcast. Callers needing
/// stronger guarantees must serialize at a higher layer.
pub struct WalletCoordinator {
    wallets: Arc<dyn WalletStore>,
    drivers: Arc<dyn DriverStore>,
    gateway: Arc<dyn BlockchainGateway>,
    keys: Arc<dyn ManagedKeyStore>,
    catalog: Arc<CurrencyCatalog>,
    base_currency: CurrencyCode,
}

impl WalletCoordinator {
    /// Create a new coordinator. Every wallet it creates holds
    /// `base_currency` on the gateway's network.
    pub fn new(
        wallets: Arc<dyn WalletStore>,
        drivers: Arc<dyn DriverStore>,
        gateway: Arc<dyn BlockchainGateway>,
        keys: Arc<dyn ManagedKeyStore>,
        catalog: Arc<CurrencyCatalog>,
        base_currency: CurrencyCode,
    ) -> Self {
        Self {
            wallets,
            drivers,
            gateway,
            keys,
            catalog,
            base_currency,
        }
    }

    /// Create a driver's wallet, or update the existing one.
    ///
    /// A request carrying an address links an external wallet; a request
    /// without one selects the managed mode, generating a key on first use
    /// (password required) and reusing the stored key on later switches.
    /// `created` in the result reports whether a new row was written, not
    /// whether the mode changed.
    #[instrument(skip(self, request), fields(driver = %driver.id))]
    pub async fn create_or_update_wallet(
        &self,
        request: &CreateOrUpdateWalletRequest,
        driver: &mut Driver,
    ) -> WalletResult<WalletUpsert> {
        self.descriptor(&request.quote_currency)?;

        match driver.wallet_id {
            None => {
                let mut wallet = Wallet::new(
                    self.base_currency.clone(),
                    request.quote_currency.clone(),
                    self.gateway.network_id(),
                );
                self.apply_mode(&mut wallet, request).await?;

                // The wallet row must exist before the driver references it.
                self.wallets.save(&wallet).await?;
                driver.wallet_id = Some(wallet.id);
                self.drivers.save(driver).await?;

                debug!(wallet = %wallet.id, managed = wallet.is_managed, "wallet created");
                Ok(WalletUpsert {
                    created: true,
                    wallet,
                })
            }
            Some(wallet_id) => {
                let mut wallet = self
                    .wallets
                    .get(wallet_id)
                    .await?
                    .ok_or(WalletError::WalletNotFound)?;

                wallet.quote_currency = request.quote_currency.clone();
                self.apply_mode(&mut wallet, request).await?;
                self.wallets.save(&wallet).await?;

                debug!(wallet = %wallet.id, managed = wallet.is_managed, "wallet updated");
                Ok(WalletUpsert {
                    created: false,
                    wallet,
                })
            }
        }
    }

    /// Delete a driver's wallet and unlink the driver.
    #[instrument(skip(self), fields(driver = %driver.id))]
    pub async fn delete_wallet(&self, driver: &mut Driver) -> WalletResult<()> {
        let wallet_id = driver.wallet_id.ok_or(WalletError::WalletNotFound)?;

        self.wallets.delete(wallet_id).await?;
        driver.wallet_id = None;
        self.drivers.save(driver).await?;

        Ok(())
    }

    /// The wallet's on-chain balance, valued in both of its currencies at
    /// the current rate.
    pub async fn balance(
        &self,
        wallet: &Wallet,
        rates: &dyn RateSource,
    ) -> WalletResult<WalletBalance> {
        let address = wallet.address().ok_or(WalletError::MissingAddress)?;
        let pair = self.pair(wallet)?;

        let base_units = self.gateway.get_base_unit_balance(address, &pair.base).await?;
        let base_amount = to_standard_units(base_units, &pair.base);
        let conversion = convert_base_to_quote(base_amount, &pair, rates, None).await?;

        Ok(WalletBalance {
            base_amount,
            quote_amount: conversion.amount,
            rate: conversion.rate,
        })
    }

    /// Transfer funds from a managed wallet to a receiver address.
    ///
    /// The amount may be denominated in the wallet's base or quote
    /// currency; quote amounts are converted at the current rate before
    /// being placed on chain in base units.
    #[instrument(skip(self, request, rates), fields(wallet = %wallet.id))]
    pub async fn transfer_funds(
        &self,
        wallet: &Wallet,
        request: &TransferRequest,
        rates: &dyn RateSource,
    ) -> WalletResult<TransferReceipt> {
        if !wallet.is_managed {
            return Err(WalletError::ExternalWalletTransfer);
        }
        let sender = wallet
            .address()
            .map(str::to_string)
            .ok_or(WalletError::MissingAddress)?;

        let receiver = self.gateway.checksummed_address(&request.receiver_address)?;
        if receiver == self.gateway.checksummed_address(&sender)? {
            return Err(WalletError::TransferToSelf);
        }
        if request.amount <= Decimal::ZERO {
            return Err(WalletError::NonPositiveAmount);
        }

        let pair = self.pair(wallet)?;
        let (base_amount, rate) = if request.currency == wallet.base_currency {
            (request.amount, None)
        } else if request.currency == wallet.quote_currency {
            let conversion = convert_quote_to_base(request.amount, &pair, rates, None).await?;
            (conversion.amount, Some(conversion.rate))
        } else {
            return Err(WalletError::UnsupportedTransferCurrency(
                request.currency.clone(),
            ));
        };

        let onchain = TransactionRequest {
            to: receiver,
            value: to_base_units(base_amount, &pair.base),
        };

        if !self.gateway.has_sufficient_balance(&onchain, &sender).await? {
            return Err(WalletError::InsufficientBalance);
        }

        let encrypted = wallet
            .managed_encrypted_key
            .as_deref()
            .ok_or(WalletError::MissingKeyMaterial)?;
        let key = self
            .keys
            .decrypt(encrypted, &request.password)
            .map_err(|e| self.normalize_key_error(wallet, e))?;

        let unsigned = self.gateway.create_transaction(&onchain, &sender).await?;
        let signed = self
            .keys
            .sign(&key, &unsigned)
            .map_err(|e| self.normalize_key_error(wallet, e))?;
        self.gateway.send_signed(signed).await?;

        info!(
            wallet = %wallet.id,
            to = %onchain.to,
            value = %onchain.value,
            "transfer broadcast"
        );

        Ok(TransferReceipt {
            request: onchain,
            rate,
        })
    }

    /// Set the wallet's mode (external or managed) from the request.
    async fn apply_mode(
        &self,
        wallet: &mut Wallet,
        request: &CreateOrUpdateWalletRequest,
    ) -> WalletResult<()> {
        match &request.address {
            Some(address) => {
                let address = self.gateway.checksummed_address(address)?;
                if self
                    .wallets
                    .find_by_address(&address, Some(wallet.id))
                    .await?
                    .is_some()
                {
                    return Err(WalletError::AddressOccupied);
                }

                wallet.external_address = Some(address);
                wallet.is_managed = false;
            }
            None if wallet.has_created_managed_wallet() => {
                // The generated key survives mode switches; reverting to
                // managed needs no password.
                wallet.is_managed = true;
            }
            None => {
                let password = request
                    .password
                    .as_deref()
                    .ok_or(WalletError::PasswordRequired)?;

                let key = self
                    .keys
                    .generate_key()
                    .map_err(|e| WalletError::KeyStore(e.to_string()))?;
                let encrypted = self
                    .keys
                    .encrypt(&key, password)
                    .map_err(|e| WalletError::KeyStore(e.to_string()))?;

                wallet.managed_address = Some(key.address().to_string());
                wallet.managed_encrypted_key = Some(encrypted);
                wallet.is_managed = true;
            }
        }

        Ok(())
    }

    fn pair(&self, wallet: &Wallet) -> WalletResult<CurrencyPair> {
        let base = self.descriptor(&wallet.base_currency)?.clone();
        let quote = self.descriptor(&wallet.quote_currency)?.clone();
        Ok(CurrencyPair::new(base, quote))
    }

    fn descriptor(&self, code: &CurrencyCode) -> WalletResult<&CurrencyDescriptor> {
        self.catalog
            .lookup(code)
            .ok_or_else(|| WalletError::UnknownCurrency(code.clone()))
    }

    /// Raw key failures are logged here and never surfaced.
    fn normalize_key_error(&self, wallet: &Wallet, error: KeyStoreError) -> WalletError {
        match error {
            KeyStoreError::Decryption => {
                warn!(wallet = %wallet.id, "wallet key decryption failed");
                WalletError::WalletDecryptionFailed
            }
            KeyStoreError::Other(message) => WalletError::KeyStore(message),
        }
    }
}
