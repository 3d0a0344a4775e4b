pub mod command;
pub mod movement;
pub mod transport;

pub use command::CommandError;
pub use movement::MovementError;
pub use transport::TransportError;
