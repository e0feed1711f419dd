//! # Price Notifier
//!
//! Price-below notifications: when new prices are published, every active
//! subscriber of the region whose threshold is reached by at least one of
//! tomorrow's hours gets a notification naming the cheapest hour.
//!
//! The matcher is pure; subscribers come from a [`TokenStore`] and
//! notifications leave through a [`NotificationSender`].

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod matcher;
pub mod message;
pub mod sender;
pub mod token_store;

pub use config::{MessageConfig, NotifierConfig};
pub use dispatcher::{DispatchReport, NotificationDispatcher};
pub use error::{NotifierError, Result};
pub use matcher::{match_subscribers, tomorrow_window, Match};
pub use message::PriceBelowNotification;
pub use sender::{LoggingSender, NotificationSender};
pub use token_store::{InMemoryTokenStore, SqliteTokenStore, TokenStore};
