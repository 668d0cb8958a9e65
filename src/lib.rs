pub mod bench;
pub mod config;
pub mod directory;
pub mod error;
pub mod node;
pub mod portal;
pub mod rating;
pub mod scheduler;
pub mod shutdown;
pub mod store;
