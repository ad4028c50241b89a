pub mod caller;
pub mod handlers;
pub mod routes;

pub use caller::CallerContext;
pub use handlers::{AppContext, AppState};
pub use routes::create_router;
