pub mod auth_service;
pub mod chess_service;
pub mod clock;
pub mod errors;
pub mod game_action_service;
pub mod game_session_service;
pub mod matchmaking_service;
pub mod rating_service;
