use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info_span, warn, Instrument};

use super::{Cycle, Snapshot};
use crate::aggregate;
use crate::badge;
use crate::platform::Platform;

/// The real cycle: read credentials from the platform, aggregate, derive the badge.
pub struct BadgeCycle {
    platform: Arc<dyn Platform>,
}

impl BadgeCycle {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl Cycle for BadgeCycle {
    async fn run(&self) -> Snapshot {
        let config = match self.platform.get_config().await {
            Ok(config) => config.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "could not read config, treating as unconfigured");
                Default::default()
            }
        };

        let aggregation = aggregate::aggregate(&config, self.platform.settings())
            .instrument(info_span!("cycle", platform = self.platform.name()))
            .await;
        let badge = badge::from_aggregation(&aggregation);

        Snapshot { badge, aggregation }
    }
}
