//! The hub's XML wire format.

pub mod request;
pub mod response;

pub use request::encode;
pub use response::decode;
