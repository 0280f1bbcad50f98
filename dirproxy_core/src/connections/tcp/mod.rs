pub mod tcp_connection;

pub use tcp_connection::*;
