//! Fast single-image reflection removal.
//!
//! Photographs taken through glass carry a faint reflection on top of the
//! scene. This crate suppresses it by discarding weak image gradients (assumed
//! to belong to the reflection) and reconstructing the transmission layer from
//! the remaining strong edges. The reconstruction is the solution of a
//! regularized Poisson equation, which is solved in closed form in the
//! cosine-transform domain instead of iteratively.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//!
//! use fast_reflection_removal::{codec, ReflectionRemover};
//!
//! let remover = ReflectionRemover::with_h(0.03).expect("h must be in [0, 1]");
//! let image = codec::load_image(Path::new("window.jpg")).unwrap();
//! let transmission = remover.remove_reflection(&image).unwrap();
//! codec::save_image(transmission.view(), Path::new("window_clean.jpg")).unwrap();
//! ```
//!
//! # Building blocks
//!
//! The operators behind the pipeline are public:
//!
//! ```
//! use fast_reflection_removal::operators::laplacian;
//! use ndarray::array;
//!
//! let field = array![[1.0, 2.0], [4.0, 8.0]];
//! assert_eq!(laplacian(field.view(), None), array![[4.0, 5.0], [1.0, -10.0]]);
//! ```

#![deny(missing_docs)]

pub mod codec;
pub mod debug;
mod engine;
pub mod error;
pub mod operators;
pub mod poisson;

pub use debug::{DebugWriter, FileWriter};
pub use engine::{
    default_output_path, is_supported_image, ProcessResult, ReflectionParams, ReflectionRemover,
};
pub use error::{Error, Result};
