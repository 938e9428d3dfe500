#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod corpus;
pub mod error;
pub mod guard;
pub mod text;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
