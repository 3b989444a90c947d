pub mod error;
pub mod models;
pub mod store;
pub mod trace;

pub use error::StoreError;
pub use models::Album;
pub use store::CatalogStore;
pub use trace::{SpanScope, start_span};
