use lambda_http::{run, tracing, Error};
use std::env::set_var;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

use shared::config::{ConfigError, GameConfig, StoreConfig};
use shared::repositories::dynamodb_store::DynamoDbSessionStore;
use shared::repositories::memory_store::InMemorySessionStore;
use shared::repositories::session_store::SessionStore;
use shared::services::clock::SystemClock;

async fn session_store() -> Result<Arc<dyn SessionStore>, ConfigError> {
    match std::env::var("STORE_BACKEND").as_deref() {
        Ok("memory") => {
            ::tracing::warn!("Using the in-memory store; state is lost on restart");
            Ok(Arc::new(InMemorySessionStore::new()))
        }
        Ok("dynamodb") | Err(_) => {
            let store_config = StoreConfig::from_env()?;
            let config = aws_config::load_from_env().await;
            let client = aws_sdk_dynamodb::Client::new(&config);
            Ok(Arc::new(DynamoDbSessionStore::new(client, store_config)))
        }
        Ok(other) => Err(ConfigError::Invalid {
            name: "STORE_BACKEND".to_string(),
            value: other.to_string(),
        }),
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    set_var("AWS_LAMBDA_HTTP_IGNORE_STAGE_IN_PATH", "true");

    // required to enable CloudWatch error logging by the runtime
    tracing::init_default_subscriber();

    let config = GameConfig::from_env()?;
    let jwt_secret =
        std::env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET".to_string()))?;
    let store = session_store().await?;

    let app_state = state::AppState::new(store, Arc::new(SystemClock), config, jwt_secret);

    // ToDo: restrict origins to the web client domain
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::router(app_state).layer(cors);

    run(app).await
}
