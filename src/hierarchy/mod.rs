pub mod graph;
pub mod invitations;
pub mod service;
