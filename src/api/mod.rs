pub mod auth;
pub mod health;
pub mod hierarchy;
pub mod invitations;
pub mod routes;
pub mod team;

pub use routes::create_router;
