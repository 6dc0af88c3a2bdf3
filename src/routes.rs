pub mod app;
pub mod webhooks;

pub use app::AppState;
