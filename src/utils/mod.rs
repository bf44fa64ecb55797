pub mod socket_tracker;

pub use socket_tracker::{SocketId, SocketInfo, SocketTracker};
