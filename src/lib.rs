pub mod billing;
pub mod config;
pub mod handlers;
pub mod models;
pub mod notify;
pub mod payments;
pub mod routes;
pub mod state;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_utils;
