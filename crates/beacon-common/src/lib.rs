//! Domain types shared by every beacon crate: rules, channels, log
//! entries and known values, plus id generation and text formatting.

pub mod format;
pub mod id;
pub mod types;

pub use types::{
    ChannelType, Firing, KnownValue, NotificationChannel, NotificationLogEntry, NotificationLogView,
    NotificationRule, RuleType, ValueType,
};
