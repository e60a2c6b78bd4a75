#![allow(clippy::pedantic)]
#![allow(clippy::nursery)]
#![deny(clippy::unwrap_used)]
#![allow(clippy::missing_errors_doc)]

pub mod error;
pub mod fs;
pub mod models;
pub mod redact;

pub use crate::error::*;
pub use crate::models::*;
pub use crate::redact::*;
