// Aggregates all former standalone integration tests as modules.
mod auth;
mod process_runner;
