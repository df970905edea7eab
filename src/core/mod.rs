//! Core business logic
//!
//! The migration pipeline from the inside out: curve decoding, family
//! normalization, the fork-join engine with its checkpoint state, and the
//! supervisor that runs one engine per family.

pub mod decode;
pub mod engine;
pub mod family;
pub mod state;
pub mod supervisor;

pub use supervisor::Supervisor;
