//! Stream utilities for the host side of the serial uplink

pub mod deframe;

pub use deframe::{DeframeExt, Deframed};
