use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::account::{AccountError, AccountLedger};

/// Periodically credits one distinguished account.
///
/// This is the only writer that bypasses `Transaction`: it calls
/// [`AccountLedger::credit`] directly.
#[derive(Debug)]
pub struct CreditPrinter {
    ledger: Arc<AccountLedger>,
    account: String,
    amount: u64,
    period: Duration,
}

impl CreditPrinter {
    /// Creates a printer crediting `amount` to `account` every `period`
    pub fn new(
        ledger: Arc<AccountLedger>,
        account: impl Into<String>,
        amount: u64,
        period: Duration,
    ) -> Self {
        CreditPrinter {
            ledger,
            account: account.into(),
            amount,
            period,
        }
    }

    /// Gets the identifier of the credited account
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Registers the printer account if needed and grants it a one-off `bonus`
    ///
    /// # Returns
    ///
    /// The account balance afterwards
    pub fn provision(&self, bonus: u64) -> Result<u64, AccountError> {
        match self.ledger.register(&self.account) {
            Ok(_) | Err(AccountError::DuplicateAccount(_)) => {}
            Err(err) => return Err(err),
        }

        if bonus == 0 {
            return self
                .ledger
                .balance(&self.account)
                .ok_or_else(|| AccountError::UnknownAccount(self.account.clone()));
        }
        self.ledger.credit(&self.account, bonus)
    }

    /// Credits the account once and returns the new balance
    pub fn tick(&self) -> Result<u64, AccountError> {
        let balance = self.ledger.credit(&self.account, self.amount)?;
        info!(
            "Added {} coins to {}. Current balance: {}",
            self.amount, self.account, balance
        );
        Ok(balance)
    }

    /// Credits the account every period until `token` is cancelled.
    ///
    /// The first credit happens one full period after start. A failed tick is
    /// logged and the loop keeps going.
    pub async fn run(self, token: CancellationToken) {
        let mut interval = time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Credit printer started for {} ({} every {:?})",
            self.account, self.amount, self.period
        );

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("Credit printer for {} stopped", self.account);
                    break;
                }
                _ = interval.tick() => {
                    if let Err(err) = self.tick() {
                        warn!("Credit printer failed to credit {}: {}", self.account, err);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn printer(ledger: &Arc<AccountLedger>) -> CreditPrinter {
        CreditPrinter::new(Arc::clone(ledger), "SecretPrinter", 50, Duration::from_secs(30))
    }

    #[test]
    fn test_provision_and_tick() {
        let ledger = Arc::new(AccountLedger::new());
        let printer = printer(&ledger);

        assert_eq!(printer.provision(100).unwrap(), 1100);
        assert_eq!(printer.tick().unwrap(), 1150);
        assert_eq!(ledger.balance("SecretPrinter"), Some(1150));

        // Provisioning again keeps the existing account
        assert_eq!(printer.provision(0).unwrap(), 1150);
    }

    #[test]
    fn test_tick_on_missing_account() {
        let ledger = Arc::new(AccountLedger::new());

        assert_eq!(
            printer(&ledger).tick(),
            Err(AccountError::UnknownAccount("SecretPrinter".to_string()))
        );
    }

    #[test]
    fn test_ticks_race_transfers_without_lost_updates() {
        use crate::blockchain::chain::Blockchain;
        use std::sync::atomic::{AtomicU64, Ordering};
        use std::thread;

        let ledger = Arc::new(AccountLedger::new());
        let blockchain = Blockchain::with_ledger(Arc::clone(&ledger));
        blockchain.register_account("A").unwrap();
        blockchain.register_account("B").unwrap();
        let printer = CreditPrinter::new(Arc::clone(&ledger), "A", 5, Duration::from_secs(30));
        let accepted = AtomicU64::new(0);

        thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..100 {
                        printer.tick().unwrap();
                    }
                });
                scope.spawn(|| {
                    for _ in 0..100 {
                        if blockchain.submit_transaction("A", "B", 10).is_ok() {
                            accepted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                });
            }
        });

        let printed = 4 * 100 * 5;
        let accepted = accepted.load(Ordering::SeqCst);
        let a = ledger.balance("A").unwrap();
        let b = ledger.balance("B").unwrap();

        assert_eq!(a + b, 2000 + printed);
        assert_eq!(b, 1000 + 10 * accepted);
        assert_eq!(a, 1000 + printed - 10 * accepted);
        assert_eq!(blockchain.pending_transactions().len() as u64, accepted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_credits_every_period_until_cancelled() {
        let ledger = Arc::new(AccountLedger::new());
        let printer = printer(&ledger);
        printer.provision(100).unwrap();

        let token = CancellationToken::new();
        let handle = tokio::spawn(printer.run(token.clone()));

        time::sleep(Duration::from_secs(95)).await;
        assert_eq!(ledger.balance("SecretPrinter"), Some(1100 + 3 * 50));

        token.cancel();
        handle.await.unwrap();

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(ledger.balance("SecretPrinter"), Some(1250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_survives_failed_ticks() {
        let ledger = Arc::new(AccountLedger::new());
        let token = CancellationToken::new();
        let handle = tokio::spawn(printer(&ledger).run(token.clone()));

        time::sleep(Duration::from_secs(31)).await;
        ledger.register("SecretPrinter").unwrap();
        time::sleep(Duration::from_secs(30)).await;

        assert_eq!(ledger.balance("SecretPrinter"), Some(1050));
        token.cancel();
        handle.await.unwrap();
    }
}
