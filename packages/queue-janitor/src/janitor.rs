use aws_lambda_events::event::cloudwatch_events::CloudWatchEvent;
use lambda_runtime::Error;
use shared::services::matchmaking_service::MatchmakingService;
use tracing::{debug, error, info};

/// Scheduled sweep of abandoned matchmaking rows.
#[derive(Clone)]
pub struct QueueJanitor {
    matchmaking_service: MatchmakingService,
}

impl QueueJanitor {
    pub fn new(matchmaking_service: MatchmakingService) -> Self {
        Self {
            matchmaking_service,
        }
    }

    pub async fn process_event(&self, event: CloudWatchEvent) -> Result<(), Error> {
        debug!(
            "Queue janitor triggered by {:?} at {:?}",
            event.source, event.time
        );
        self.sweep().await?;
        Ok(())
    }

    /// Runs one bounded purge. Rows beyond the batch limit wait for the next schedule.
    pub async fn sweep(&self) -> Result<usize, Error> {
        match self.matchmaking_service.purge_stale_entries().await {
            Ok(deleted) => {
                info!("Queue janitor removed {} stale entries", deleted);
                Ok(deleted)
            }
            Err(e) => {
                error!("Queue janitor failed: {}", e);
                Err(e.into())
            }
        }
    }
}
