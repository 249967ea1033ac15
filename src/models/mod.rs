pub mod api_response;
pub mod order_types;

pub use api_response::ApiResponse;
pub use order_types::*;
