pub mod overrides;
pub mod pace;
pub mod team;
