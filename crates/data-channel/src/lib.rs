//! Data connection used by uploads.
//!
//! The control connection carries commands and replies; file bytes travel
//! over a separately established TCP connection. This crate models that
//! connection as a [`DataChannel`]: something that becomes ready (or times
//! out), hands out a paused [`Transport`], and can be ended gracefully or
//! destroyed.

pub mod channel;
pub mod error;
pub mod pausable;
pub mod tcp;

pub use channel::{ChannelState, DataChannel, Transport};
pub use error::DataChannelError;
pub use pausable::Pausable;
pub use tcp::TcpDataChannel;

use std::time::Duration;

/// Default time allowed for the client to open the data connection.
pub const DATA_READY_TIMEOUT: Duration = Duration::from_secs(5);
