use aws_lambda_events::event::cloudwatch_events::CloudWatchEvent;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use std::sync::Arc;

mod janitor;
use janitor::QueueJanitor;
use shared::{
    config::{GameConfig, StoreConfig},
    repositories::dynamodb_store::DynamoDbSessionStore,
    services::{clock::SystemClock, matchmaking_service::MatchmakingService},
};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    let store_config = StoreConfig::from_env()?;
    let game_config = GameConfig::from_env()?;

    let config = aws_config::load_from_env().await;
    let client = aws_sdk_dynamodb::Client::new(&config);
    let store = Arc::new(DynamoDbSessionStore::new(client, store_config));

    let matchmaking_service = MatchmakingService::new(store, Arc::new(SystemClock), game_config);
    let janitor = QueueJanitor::new(matchmaking_service);

    run(service_fn(move |event: LambdaEvent<CloudWatchEvent>| {
        let janitor = janitor.clone();
        async move { janitor.process_event(event.payload).await }
    }))
    .await
}
