//! HTTP protocol layer module
//!
//! Response builders shared by all handlers.

pub mod response;

pub use response::{
    build_404_response, build_405_response, build_500_response, build_options_response,
    json_response, strip_body,
};
