pub mod handlers;
pub mod inventory;
pub mod middleware;
pub mod orchestrator;
pub mod routes;

pub use routes::create_router;
