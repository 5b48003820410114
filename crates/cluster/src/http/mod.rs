pub mod request;
pub mod response;

pub use request::{Body, PerformRequestOptions};
pub use response::{check_response, ErrorDetails, Response};
