//! Delivery of aggregated job results to caller-provided callback URLs.

use crate::models::JobDetails;

/// POSTs finished job records to their callback URLs. Fire-and-forget:
/// failures are logged and never retried.
pub struct CallbackPoster {
    client: reqwest::Client,
}

impl CallbackPoster {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Deliver each record to its own callback URL. No ordering guarantee
    /// between records.
    pub async fn post_results(&self, records: Vec<JobDetails>) {
        for record in records {
            match self
                .client
                .post(&record.callback)
                .json(&record)
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => {
                    tracing::info!("delivered job results to {}", record.callback);
                }
                Ok(response) => {
                    tracing::warn!(
                        "callback {} answered {}",
                        record.callback,
                        response.status()
                    );
                }
                Err(e) => {
                    tracing::error!("failed to deliver results to {}: {}", record.callback, e);
                }
            }
        }
    }
}

impl Default for CallbackPoster {
    fn default() -> Self {
        Self::new()
    }
}
