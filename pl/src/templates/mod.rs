//! Template store
//!
//! Named, immutable prompt texts with placeholder tokens, loaded once at
//! startup and looked up by exact name.

mod store;

pub use store::TemplateStore;
