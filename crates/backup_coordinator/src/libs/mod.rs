//! External library integrations

pub mod openapi;
pub mod scalar;
