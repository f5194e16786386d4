#![allow(
    clippy::module_name_repetitions,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::ignored_unit_patterns
)]

pub mod config;
pub mod control;
pub mod daemon;
pub mod display;
pub mod error;
pub mod hub;
pub mod input;
pub mod launch;
pub mod media;
pub mod render;
pub mod server;
