//! Gravenhold - Entity Templating and Spatial Signaling Core

pub mod core;
pub mod entity;
pub mod map;
pub mod sim;
pub mod templates;
pub mod triggers;
