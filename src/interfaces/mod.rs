//! Adapters between the outside world and the [`crate::application`] layer.

pub mod csv;
pub mod http;
