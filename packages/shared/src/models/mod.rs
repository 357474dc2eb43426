pub mod auth;
pub mod game_session;
pub mod queue;
pub mod requests;
pub mod responses;
pub mod user;
