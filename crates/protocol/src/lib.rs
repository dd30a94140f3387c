//! Control-channel vocabulary shared by the upload crates.
//!
//! Reply codes and their wire formatting live in [`reply`]; the STOR/APPE
//! directives and the per-request [`UploadRequest`] live in [`types`].

pub mod reply;
pub mod types;

pub use reply::{Reply, ReplyCode, UnknownReplyCode};
pub use types::{TransferMode, UploadRequest};

use std::future::Future;
use std::pin::Pin;

/// A boxed, sendable future used at the async trait seams of the workspace.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
