//! GreenSub Job Model
//!
//! Defines the data contracts for a render or preview request:
//! - **Color:** normalized RGBA values parsed from user input
//! - **Style:** subtitle typography, outline, shadow, and margin
//! - **Layout:** canvas size, orientation, safe-area guides, and background
//! - **Encoding:** encoder identifier, quality preset, and container
//! - **Spec:** the immutable `JobSpec` tying everything together
//!
//! A `JobSpec` only ever holds normalized values. Raw strings coming from a
//! front end pass through the parsers in this crate before a spec exists.

pub mod color;
pub mod encoding;
pub mod layout;
pub mod spec;
pub mod style;

pub use color::*;
pub use encoding::*;
pub use layout::*;
pub use spec::*;
pub use style::*;
