// Periodic background work: reminder delivery, recurring top-up, waitlist expiry

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::app::AppState;
use crate::config::JobSettings;
use crate::error::DomainResult;

/// Run `job` every `period` until `shutdown` flips to true
fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut job: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = DomainResult<()>> + Send,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(job = name, period_secs = period.as_secs(), "background job started");

        while !*shutdown.borrow() {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = job().await {
                        tracing::error!(job = name, error = %e, "background job run failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!(job = name, "background job stopped");
    })
}

/// Start every background loop; send `true` on the paired sender to stop them
pub fn spawn_jobs(state: &AppState, settings: JobSettings, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
    let reminders = state.reminders.clone();
    let recurring = state.recurring.clone();
    let matcher = state.matcher.clone();

    vec![
        spawn_periodic("reminders", settings.reminder_poll, shutdown.clone(), move || {
            let reminders = reminders.clone();
            async move {
                reminders.dispatch_due().await?;
                reminders.retry_failed().await?;
                Ok(())
            }
        }),
        spawn_periodic("recurring", settings.recurring_poll, shutdown.clone(), move || {
            let recurring = recurring.clone();
            async move {
                let report = recurring.generate_upcoming().await?;
                tracing::debug!(?report, "recurring generation pass finished");
                Ok(())
            }
        }),
        spawn_periodic("waitlist_expiry", settings.waitlist_sweep, shutdown, move || {
            let matcher = matcher.clone();
            async move {
                matcher.expire_offers().await?;
                Ok(())
            }
        }),
    ]
}
