pub mod connection;
pub mod connection_pool;

pub use connection::Connection;
pub use connection_pool::ConnectionPool;
