//! Contrato base dos native drivers

pub mod driver;

pub use driver::{ControlCode, NativeDriver, Query, Request, StatusCode};
