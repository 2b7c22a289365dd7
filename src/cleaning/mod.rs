//! Map post-processing: unit rescaling and gap filling.
//!
//! Both stages mutate the map in place and are optional. When both run,
//! rescaling goes first so that filled LEDs land in physical units too.

mod interpolate;
mod rescale;

pub use interpolate::fill_gaps;
pub use rescale::{rescale, rescale_to_reference, scale_factor};
