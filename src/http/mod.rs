//! HTTP protocol layer module
//!
//! Response builders, caching, MIME detection and Range parsing shared by
//! the static resolver, the data API and the custom routes.

pub mod cache;
pub mod mime;
pub mod range;
pub mod request;
pub mod response;

// Re-export commonly used types
pub use range::parse_range_header;
pub use request::AppRequest;
pub use response::{
    build_304_response, build_404_response, build_413_response, build_416_response,
    build_500_response, build_direct_response, build_error_response, build_json_response,
    build_options_response, build_redirect_response_with_code, HttpResponse,
};
