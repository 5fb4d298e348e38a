//! Convenient re-exports of commonly used data types, designed to make crate usage painless.
//!
//! The contents of this module can be used by including the following in any module:
//! ```
//! use scmaptool_core::prelude::*;
//! ```

#[doc(inline)]
pub use crate::data::{DataCursor, DataSink, Endian};

/// Contains [`data::Error`], which is used in Results returned by [`DataCursor`]
pub mod data {
    pub use crate::data::Error;
}
