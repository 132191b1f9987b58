//! Optional dumping of intermediate arrays for visual inspection.
//!
//! A [`DebugWriter`] can be injected into [`crate::ReflectionRemover`]. It is
//! called at fixed checkpoints of the pipeline and never affects the result:
//! write failures are logged and ignored by the caller.

use std::path::{Path, PathBuf};

use ndarray::{ArrayViewD, Axis, Ix2, Ix3};

use crate::codec;
use crate::error::{Error, Result};

/// Capability for persisting intermediate arrays.
pub trait DebugWriter: Send + Sync {
    /// Persist `array` under the given `name` and `category`.
    ///
    /// # Errors
    ///
    /// Implementations return an error if the array cannot be stored.
    fn save_array(&self, array: ArrayViewD<'_, f64>, name: &str, category: &str) -> Result<()>;
}

/// Writes each array as a min/max-normalized PNG into a directory.
///
/// Files are named `<category>_<name>.png`, or `<category>.png` when `name`
/// is empty.
#[derive(Debug, Clone)]
pub struct FileWriter {
    dir: PathBuf,
}

impl FileWriter {
    /// Create a writer, creating `dir` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Output directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Destination file for an array.
    #[must_use]
    pub fn destination(&self, name: &str, category: &str) -> PathBuf {
        if name.is_empty() {
            self.dir.join(format!("{category}.png"))
        } else {
            self.dir.join(format!("{category}_{name}.png"))
        }
    }
}

impl DebugWriter for FileWriter {
    fn save_array(&self, array: ArrayViewD<'_, f64>, name: &str, category: &str) -> Result<()> {
        let display = match array.ndim() {
            2 => array
                .into_dimensionality::<Ix2>()
                .map_err(|e| Error::ImageShape(e.to_string()))?
                .insert_axis(Axis(2)),
            3 => array
                .into_dimensionality::<Ix3>()
                .map_err(|e| Error::ImageShape(e.to_string()))?,
            n => {
                return Err(Error::ImageShape(format!(
                    "cannot render a {n}-dimensional array"
                )))
            }
        };

        let (min, max) = display
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let range = max - min;
        let normalized = if range > 0.0 && range.is_finite() {
            display.mapv(|v| (v - min) / range)
        } else {
            display.mapv(|_| 0.0)
        };

        codec::save_image(normalized.view(), &self.destination(name, category))
    }
}
