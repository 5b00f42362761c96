//! Reachability probe for the application under test
//!
//! The front-end is a separately running dev server. It is never spawned
//! here; the probe only tells the operator up front why every check is about
//! to fail.

use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::VerifyResult;

const PROBE_INTERVAL: Duration = Duration::from_millis(100);

pub struct AppProbe {
    url: String,
    client: reqwest::Client,
}

impl AppProbe {
    pub fn new(url: &str) -> VerifyResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        Ok(Self {
            url: url.to_string(),
            client,
        })
    }

    /// Poll until the app answers any HTTP response or `timeout` elapses
    pub async fn wait_until_reachable(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.client.get(&self.url).send().await {
                Ok(resp) => {
                    if !resp.status().is_success() {
                        warn!("{} answered with {}", self.url, resp.status());
                    }
                    return true;
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for {} to answer...", self.url);
                    }
                    // Connection refused is expected while the dev server starts
                    if !e.is_connect() {
                        warn!("Probe error: {}", e);
                    }
                }
            }

            if start.elapsed() >= timeout {
                warn!(
                    "{} did not answer after {} attempt(s); continuing anyway",
                    self.url, attempts
                );
                return false;
            }

            sleep(PROBE_INTERVAL).await;
        }
    }
}
