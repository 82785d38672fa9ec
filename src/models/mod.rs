pub mod media_type;
pub mod request;
pub mod response;

pub use request::*;
pub use response::*;
