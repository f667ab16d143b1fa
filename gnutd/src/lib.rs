pub mod proto;
pub mod responder;
pub mod services;

pub use gnut_api as api;
