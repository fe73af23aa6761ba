pub mod communicator;
pub mod uid;

pub use communicator::{CommandStatus, Communicator, RemoteCmd, TransportError};
pub use uid::time_ordered_id;
