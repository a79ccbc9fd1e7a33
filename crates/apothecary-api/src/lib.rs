//! Apothecary API crate - axum HTTP server over the recommendation
//! orchestrator.
//!
//! Endpoints: `POST /recommend`, `POST /rag_recommend`,
//! `GET /products/{id}/description`, `GET /health` and `POST /index/reload`.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
