pub mod chains;
pub mod contracts;
pub mod export;
pub mod gateway;
pub mod provider;
pub mod types;
