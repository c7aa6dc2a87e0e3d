//! Message bus (spec §4.1).

pub mod bus;

pub use bus::{BusStats, MessageBus, MessageHandler};
