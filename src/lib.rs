pub mod drive;
pub mod error;
pub mod listing;
pub mod middleware;
pub mod protocol;
pub mod server;
pub mod storage;
pub mod trash;
pub mod utils;

pub use drive::Drive;
pub use server::{Server, ServerConfig};
