pub mod cid;
pub mod config;
pub mod error;
pub mod schema;

pub use cid::Cid;
pub use error::{Error, Result};
