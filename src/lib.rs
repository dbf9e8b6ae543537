pub mod auth;
pub mod background;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod mailer;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod validator;

#[cfg(test)]
pub mod testing;
