pub mod agent;
pub mod order;
pub mod ping;
