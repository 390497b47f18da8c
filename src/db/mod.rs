pub mod agents;
pub mod invitations;
pub mod pool;
pub mod production;
pub mod schema;

#[cfg(test)]
pub mod memory;

pub use pool::{create_pool, health_check, run_migrations};
