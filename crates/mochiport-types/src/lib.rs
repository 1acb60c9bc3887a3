//! Types shared by every mochiport crate: domain models, HTTP DTOs,
//! realtime events and the validation rules applied to incoming requests.

pub mod api;
pub mod events;
pub mod models;
pub mod text;
pub mod validation;
