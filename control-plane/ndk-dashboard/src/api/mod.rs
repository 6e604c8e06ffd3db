pub mod handlers;
pub mod middleware;
pub mod views;

pub use middleware::*;
pub use views::*;
