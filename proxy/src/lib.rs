pub mod auth;
pub mod catalog;
pub mod http;
pub mod router;
pub mod state;

pub use catalog::{Catalog, CatalogError, SqliteCatalog};
pub use router::FileRouter;
pub use state::AppState;
