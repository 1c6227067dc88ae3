//! Byte windows shared by the encoder and decoder.
//!
//! The encoder reads ahead through an [`InputWindow`] that keeps enough history
//! behind its cursor for back-references; the decoder writes into a circular
//! [`OutputWindow`] that serves back-reference copies.

pub mod input;
pub mod output;

pub use input::InputWindow;
pub use output::OutputWindow;
