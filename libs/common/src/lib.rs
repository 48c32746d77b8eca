pub mod id;
pub mod response;
pub mod time;

pub use response::ApiResponse;
