//! # Background Work
//!
//! Frame work runs on the shared rayon pool and must finish within its
//! phase. Work that spans many frames (baking, streaming) runs on its own
//! thread instead, as a [`BackgroundTask`]:
//!
//! ```text
//! owner                         task thread
//!   spawn ───────────────────►  body(token)
//!   request_cancel ──token──►   token.is_canceled() → return early
//!   join / drop  ◄───────────   result
//! ```
//!
//! A task is always joined before its owner lets go of it.

mod task;

pub use task::{BackgroundTask, CancellationToken, TaskError};
