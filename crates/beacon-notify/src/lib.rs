//! Notification delivery: provider adapters, the resolver that builds them
//! from stored channels, and the [`Dispatcher`] that applies dedup and rate
//! limiting before delivering a firing to every channel of its rule.
//!
//! Built-in providers are Telegram (chat-bot), Pushover (push to a user
//! key) and ntfy (topic push).

pub mod channels;
pub mod dispatcher;
pub mod error;
pub mod resolver;


pub use channels::ChannelAdapter;
pub use dispatcher::{DispatchOutcome, DispatchPolicy, Dispatcher, TEST_MESSAGE, TEST_TITLE};
pub use error::{NotifyError, Result};
pub use resolver::{ChannelResolver, ProviderSettings};
