//! murmur-reply — composes and posts replies to crawled records.
//!
//! A [`ReplyComposer`] drafts the text, a [`ReplyPoster`] publishes it, and
//! the [`ReplyProcessor`] drives both with retry, pacing, and an on-disk
//! ledger so no record is ever replied to twice.

pub mod openai;
pub mod poster;
pub mod processor;
pub mod stub;
pub mod traits;

pub use openai::OpenAiComposer;
pub use poster::XPoster;
pub use processor::{ReplyProcessor, ReplyStatus};
pub use stub::{TestComposer, TestPoster};
pub use traits::{ReplyComposer, ReplyPoster};
