pub mod broadcast;
pub mod packet;
pub mod protocol;
pub mod server;
pub mod transport;
