use anyhow::{bail, Context, Result};
use chrono::Utc;
use log::info;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::ledger::SessionLedger;

// Set to true to log every poll outcome
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

/// Foreground backup for OS callbacks that may never fire.
pub struct ExpiryPoller {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl ExpiryPoller {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn start(&mut self, ledger: SessionLedger, interval: Duration) -> Result<()> {
        if self.handle.is_some() {
            bail!("expiry poller already running");
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(poll_loop(ledger, interval, cancel_token.clone()));

        info!("Expiry poller started ({}ms)", interval.as_millis());
        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("expiry poller task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Default for ExpiryPoller {
    fn default() -> Self {
        Self::new()
    }
}

async fn poll_loop(ledger: SessionLedger, interval: Duration, cancel_token: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match ledger.reconcile(Utc::now()).await {
                    Ok(outcome) if !outcome.expired.is_empty() => {
                        log_info!("poll expired {} exemption(s)", outcome.expired.len());
                    }
                    Ok(_) => {}
                    Err(err) => log_error!("expiry poll failed: {err:#}"),
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("expiry poller shutting down");
                break;
            }
        }
    }
}
