use crate::config::schema::BrowserConfig;
use crate::error::{KioskError, Result};
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

const STOP_GRACE: Duration = Duration::from_secs(2);

/// The landing page as seen from the kiosk itself.
pub fn local_url(port: u16) -> String {
    format!("http://localhost:{port}/")
}

/// Start the kiosk browser pointed at `url`. The URL goes last, after the
/// configured arguments.
///
/// # Errors
/// Returns `KioskError::Launch` if the command cannot be spawned.
pub fn spawn_browser(browser: &BrowserConfig, url: &str) -> Result<Child> {
    let child = Command::new(&browser.command)
        .args(&browser.args)
        .arg(url)
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| KioskError::Launch {
            command: browser.command.clone(),
            message: e.to_string(),
        })?;

    info!(
        "launched {} (pid {}) at {url}",
        browser.command,
        child.id().unwrap_or_default()
    );
    Ok(child)
}

/// Kill the browser if it is still running and reap it.
pub async fn stop_browser(child: &mut Child) {
    match child.try_wait() {
        Ok(Some(status)) => {
            debug!("browser already exited ({status})");
            return;
        }
        Ok(None) => {}
        Err(e) => warn!("browser status unavailable: {e}"),
    }

    if let Err(e) = child.start_kill() {
        warn!("failed to stop browser: {e}");
        return;
    }
    match tokio::time::timeout(STOP_GRACE, child.wait()).await {
        Ok(Ok(status)) => debug!("browser stopped ({status})"),
        Ok(Err(e)) => warn!("waiting for browser failed: {e}"),
        Err(_) => warn!("browser did not exit within {STOP_GRACE:?}"),
    }
}
