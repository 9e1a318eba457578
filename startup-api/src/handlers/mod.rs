mod app;
mod queries;

pub use app::{add_routes, AppState};
