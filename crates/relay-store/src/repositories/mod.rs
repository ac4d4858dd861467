//! Stateless repositories. Every method takes a `&Connection` (or
//! `&mut Connection` when it opens its own transaction); domain-scoped
//! repositories are parameterized by a [`relay_core::ChatDomain`].

pub mod account;
pub mod conversation;
pub mod message;
pub mod notification;

pub use account::AccountRepo;
pub use conversation::ConversationRepo;
pub use message::MessageRepo;
pub use notification::ChatNotificationRepo;
