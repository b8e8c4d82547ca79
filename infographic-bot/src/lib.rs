pub mod capabilities;
pub mod config;
pub mod deps;
pub mod dispatcher;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod service;
pub mod tasks;
pub mod texts;
pub mod workflow;

pub use config::{FlowVariant, Settings};
pub use deps::Deps;
pub use dispatcher::Dispatcher;
pub use models::{ChatId, ConversationState, InboundEvent, Stage};
pub use service::{AppState, build_router, create_app};
