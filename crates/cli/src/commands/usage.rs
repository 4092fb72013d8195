use eyre::{Result, eyre};
use sift_core::{Backend, Dashboard, UsageReport};
use tracing::info;

pub async fn snapshot<B>(dashboard: &Dashboard<B>) -> Result<UsageReport>
where
    B: Backend + 'static,
{
    dashboard
        .monitor()
        .poll_once()
        .await
        .ok_or_else(|| eyre!("token usage is unavailable"))
}

/// Polls in the background and hands every new report to `on_report` until
/// interrupted.
pub async fn watch<B, F>(dashboard: &Dashboard<B>, mut on_report: F) -> Result<()>
where
    B: Backend + 'static,
    F: FnMut(&UsageReport) -> Result<()>,
{
    let mut reports = dashboard.monitor().subscribe();
    dashboard.start_monitor();

    loop {
        tokio::select! {
            changed = reports.changed() => {
                if changed.is_err() {
                    break;
                }
                let latest = reports.borrow_and_update().clone();
                if let Some(report) = latest {
                    on_report(&report)?;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping token usage watch");
                break;
            }
        }
    }

    dashboard.dispose();
    Ok(())
}
