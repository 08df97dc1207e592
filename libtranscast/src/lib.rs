//! Transcast - translate and republish posts between accounts
//!
//! This library provides the pieces of a polling daemon that watches a
//! source account on X/Twitter, translates each new post and republishes
//! it on a target account with a link back to the original.

pub mod clock;
pub mod compose;
pub mod config;
pub mod cursor;
pub mod error;
pub mod forwarder;
pub mod logging;
pub mod platforms;
pub mod translate;
pub mod types;

// Re-export commonly used types
pub use clock::{Sleeper, TokioSleeper};
pub use compose::MessageComposer;
pub use config::{BacklogPolicy, Config};
pub use cursor::{CursorStore, FileCursorStore};
pub use error::{Result, TranscastError};
pub use forwarder::{ForwardSettings, Forwarder, Services};
pub use platforms::twitter::{SourceTimeline, TwitterClient};
pub use translate::google::GoogleTranslator;
pub use types::{Post, PostId, SourceAccount, TickReport};
