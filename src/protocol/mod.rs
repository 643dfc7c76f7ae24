//! RESP2 codec for the client side of a Redis connection

mod parser;
mod types;

pub use parser::Parser;
pub use types::{RespValue, encode_command};
