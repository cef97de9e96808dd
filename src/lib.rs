pub mod config;
pub mod protocol;
pub mod server;
pub mod supervisor;

pub use config::Config;
pub use protocol::{ProtocolError, Request, Response, Status};
pub use server::Server;
pub use supervisor::{CaptureProcess, CaptureSpawner, SoxSpawner, Supervisor};
