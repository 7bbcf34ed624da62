pub mod port;
pub mod registry;
pub mod session;

#[cfg(test)]
pub mod testutil;

pub use port::{FinishedCallback, PlaybackPort, SongbirdPort};
pub use registry::SessionRegistry;
pub use session::{QueueSnapshot, Session};
