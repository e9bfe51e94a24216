//! Debounced, session-gated autocomplete over the icebrg `/search` endpoint.

mod client;
mod controller;
mod error;
pub mod model;

pub use client::SearchBackend;
pub use client::SearchClient;
pub use controller::DEFAULT_PLACEHOLDER;
pub use controller::PanelView;
pub use controller::PointerTarget;
pub use controller::QueryController;
pub use controller::QueryState;
pub use controller::QueryView;
pub use error::Result;
pub use error::SearchError;
pub use model::Category;
pub use model::SearchResponse;
pub use model::SuggestionItem;
pub use model::flatten_suggestions;
