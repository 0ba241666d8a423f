// Re-export main components
pub mod api;
pub mod catalog;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod highlight;
pub mod index;
pub mod query;
pub mod ranking;
pub mod session;
pub mod store;
pub mod tokenizer;
pub mod trace;

// Re-export commonly used types
pub use catalog::{Catalog, TextEntry};
pub use document::{DocumentCollection, DocumentRecord, Field};
pub use engine::{execute, merge_results, search_texts, SearchResult};
pub use error::{QueryError, StoreError, SubmitError};
pub use highlight::{excerpts_for, highlight, leading_excerpt, Excerpt};
pub use index::{Match, SearchIndex};
pub use session::{SearchSession, SearchStatus};
pub use store::{DirSource, HttpSource, IndexSource, IndexStore};
pub use tokenizer::Tokenizer;
pub use trace::DebugLog;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
