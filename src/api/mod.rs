mod health;
mod routes;

pub use health::{health, stats};
pub use routes::api_routes;
