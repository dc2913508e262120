//! Concrete [`Provider`](crate::provider::Provider) implementations. The
//! Core never depends on this module directly — it only ever sees the
//! trait, registered into a [`ProviderRegistry`](crate::provider::ProviderRegistry)
//! by the composition root.

pub mod http_chat;

pub use http_chat::HttpChatProvider;
