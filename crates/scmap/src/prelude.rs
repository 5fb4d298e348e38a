//! Convenient re-exports of commonly used data types, designed to make crate usage painless.
//!
//! The contents of this module can be used by including the following in any module:
//! ```
//! use scmaptool_scmap::prelude::*;
//! ```

#[doc(inline)]
pub use crate::scmap::Scmap;

pub mod scmap {
    #[doc(inline)]
    pub use crate::scmap::Error;
}

#[doc(inline)]
pub use crate::dds::{DdsSlice, DdsSliceMut, PixelFormat};

pub mod dds {
    #[doc(inline)]
    pub use crate::dds::Error;
}

#[doc(inline)]
pub use crate::raster::{OverlayMode, ResampleMode};
