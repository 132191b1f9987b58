//! Reflection removal engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use ndarray::{Array2, Array3, ArrayBase, ArrayView2, ArrayViewD, Axis, Data, Dimension, Ix3};

use crate::codec;
use crate::debug::DebugWriter;
use crate::error::{Error, Result};
use crate::operators::laplacian;
use crate::poisson;

/// Tuning parameters of the reflection removal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReflectionParams {
    /// Edge threshold in `[0, 1]`. Gradients weaker than `h` are treated as
    /// reflection. Higher values remove reflections more aggressively;
    /// values up to about 0.13 work well.
    pub h: f64,
    /// Weight of the first-order term, in `[0, 1]`. Recommended: 0.
    pub lmbd: f64,
    /// Weight of the second-order term, in `[0, 1]`. Recommended: 1.
    pub mu: f64,
    /// Small positive regularizer keeping the spectral denominator nonzero.
    pub epsilon: f64,
}

impl Default for ReflectionParams {
    fn default() -> Self {
        Self {
            h: 0.03,
            lmbd: 0.0,
            mu: 1.0,
            epsilon: 1e-8,
        }
    }
}

/// Result of processing a single image file.
#[derive(Debug)]
pub struct ProcessResult {
    /// Path of the processed file.
    pub path: PathBuf,
    /// Whether processing succeeded.
    pub success: bool,
    /// Human-readable status message.
    pub message: String,
}

impl ProcessResult {
    fn failure(path: &Path, message: String) -> Self {
        Self {
            path: path.to_path_buf(),
            success: false,
            message,
        }
    }
}

/// Intermediate and final arrays of one channel's solve.
struct ChannelSolution {
    laplacian: Array2<f64>,
    rhs: Array2<f64>,
    layer: Array2<f64>,
}

fn stack_channels<'a>(layers: impl Iterator<Item = ArrayView2<'a, f64>>) -> Result<Array3<f64>> {
    let views: Vec<_> = layers.collect();
    ndarray::stack(Axis(2), &views).map_err(|e| Error::ImageShape(e.to_string()))
}

/// Removes reflections from images by solving a Poisson equation per channel.
///
/// Create once and reuse: the remover holds only its validated parameters and
/// an optional debug writer, and is safe to share between threads.
#[derive(Clone)]
pub struct ReflectionRemover {
    params: ReflectionParams,
    debug_writer: Option<Arc<dyn DebugWriter>>,
}

impl ReflectionRemover {
    /// Create a remover with validated parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ParameterRange`] if `h`, `lmbd` or `mu` lies outside
    /// `[0, 1]`. `epsilon` is not range-checked.
    pub fn new(params: ReflectionParams) -> Result<Self> {
        for (name, value) in [("h", params.h), ("lmbd", params.lmbd), ("mu", params.mu)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::ParameterRange { name, value });
            }
        }

        Ok(Self {
            params,
            debug_writer: None,
        })
    }

    /// Create a remover with edge threshold `h` and default values otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ParameterRange`] if `h` lies outside `[0, 1]`.
    pub fn with_h(h: f64) -> Result<Self> {
        Self::new(ReflectionParams {
            h,
            ..ReflectionParams::default()
        })
    }

    /// Attach a writer receiving intermediate arrays.
    #[must_use]
    pub fn with_debug_writer(mut self, writer: Arc<dyn DebugWriter>) -> Self {
        self.debug_writer = Some(writer);
        self
    }

    /// The validated parameters.
    #[must_use]
    pub fn params(&self) -> &ReflectionParams {
        &self.params
    }

    /// Remove reflection from an image.
    ///
    /// `image` must have exactly three axes `(row, column, channel)` and all
    /// values in `[0, 1]`; a single-channel image still needs its channel axis.
    /// Returns the transmission layer with the same shape, rescaled to
    /// `[0, 1]` with one global minimum and maximum across all channels.
    ///
    /// # Errors
    ///
    /// - [`Error::ImageRange`] if a value lies outside `[0, 1]` (or is NaN).
    /// - [`Error::ImageShape`] if the image is not 3-dimensional or empty.
    /// - [`Error::NumericDegeneracy`] if the spectral denominator has a zero
    ///   or the result is flat.
    pub fn remove_reflection<S, D>(&self, image: &ArrayBase<S, D>) -> Result<Array3<f64>>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        let dyn_view = image.view().into_dyn();
        if let Some((index, &value)) = dyn_view
            .indexed_iter()
            .find(|(_, v)| !(0.0..=1.0).contains(*v))
        {
            return Err(Error::ImageRange {
                value,
                index: index.slice().to_vec(),
            });
        }

        if image.ndim() != 3 {
            return Err(Error::ImageShape(format!(
                "expected 3 axes (row, column, channel), got {}",
                image.ndim()
            )));
        }
        let image = dyn_view
            .into_dimensionality::<Ix3>()
            .map_err(|e| Error::ImageShape(e.to_string()))?;

        let (rows, cols, channels) = image.dim();
        if rows == 0 || cols == 0 || channels == 0 {
            return Err(Error::ImageShape(format!(
                "image must not be empty, got {rows}x{cols}x{channels}"
            )));
        }
        debug!(
            "remove_reflection: {rows}x{cols}x{channels}, h={}, lmbd={}, mu={}, epsilon={}",
            self.params.h, self.params.lmbd, self.params.mu, self.params.epsilon
        );

        let solve_channel = |c: usize| self.solve_channel(c, image.index_axis(Axis(2), c));

        #[cfg(feature = "parallel")]
        let solutions: Vec<ChannelSolution> = {
            use rayon::prelude::*;
            (0..channels)
                .into_par_iter()
                .map(solve_channel)
                .collect::<Result<_>>()?
        };

        #[cfg(not(feature = "parallel"))]
        let solutions: Vec<ChannelSolution> =
            (0..channels).map(solve_channel).collect::<Result<_>>()?;

        if self.debug_writer.is_some() {
            let lapl = stack_channels(solutions.iter().map(|s| s.laplacian.view()))?;
            self.checkpoint(lapl.view().into_dyn(), "all", "laplacian");
            let rhs = stack_channels(solutions.iter().map(|s| s.rhs.view()))?;
            self.checkpoint(rhs.view().into_dyn(), "all", "rhs");
        }

        let mut transmission = stack_channels(solutions.iter().map(|s| s.layer.view()))?;
        self.checkpoint(transmission.view().into_dyn(), "all", "T");

        let (min, max) = transmission
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let range = max - min;
        if range <= 0.0 || !range.is_finite() {
            return Err(Error::NumericDegeneracy(format!(
                "cannot rescale flat or non-finite result (min={min}, max={max})"
            )));
        }
        transmission.mapv_inplace(|v| (v - min) / range);
        self.checkpoint(transmission.view().into_dyn(), "", "out");

        Ok(transmission)
    }

    /// Solve `(mu L^2 - lmbd L + epsilon) T = L(div(delta_h(grad Y))) + epsilon Y`
    /// for one channel.
    fn solve_channel(&self, c: usize, channel: ArrayView2<'_, f64>) -> Result<ChannelSolution> {
        let ReflectionParams {
            h,
            lmbd,
            mu,
            epsilon,
        } = self.params;
        let name = c.to_string();

        let lapl = laplacian(laplacian(channel, Some(h)).view(), None);
        self.checkpoint(lapl.view().into_dyn(), &name, "laplacian");

        let mut rhs = lapl.clone();
        rhs.scaled_add(epsilon, &channel);
        self.checkpoint(rhs.view().into_dyn(), &name, "rhs");

        let (rows, cols) = rhs.dim();
        let kappa = poisson::eigenvalues(rows, cols);
        self.checkpoint(kappa.view().into_dyn(), &name, "kappa");

        let denom = poisson::denominator(kappa.view(), mu, lmbd, epsilon);
        self.checkpoint(denom.view().into_dyn(), &name, "denominator");

        let layer = poisson::solve_with_denominator(rhs.view(), denom.view())?;
        self.checkpoint(layer.view().into_dyn(), &name, "T");

        debug!("channel {c}: solved {rows}x{cols} Poisson system");
        Ok(ChannelSolution {
            laplacian: lapl,
            rhs,
            layer,
        })
    }

    fn checkpoint(&self, array: ArrayViewD<'_, f64>, name: &str, category: &str) {
        if let Some(writer) = &self.debug_writer {
            if let Err(e) = writer.save_array(array, name, category) {
                warn!("debug output {category}/{name} not written: {e}");
            }
        }
    }

    /// Process a single image file: load, remove reflection, save.
    ///
    /// Nothing is written to `output` if loading or processing fails.
    #[must_use]
    pub fn process_file(&self, input: &Path, output: &Path) -> ProcessResult {
        match self.run_file(input, output) {
            Ok(()) => ProcessResult {
                path: input.to_path_buf(),
                success: true,
                message: "Reflection removed".to_string(),
            },
            Err(e) => ProcessResult::failure(input, e.to_string()),
        }
    }

    fn run_file(&self, input: &Path, output: &Path) -> Result<()> {
        let image = codec::load_image(input)?;
        let transmission = self.remove_reflection(&image)?;
        codec::save_image(transmission.view(), output)?;
        info!("{} -> {}", input.display(), output.display());
        Ok(())
    }

    /// Process all supported images in a directory.
    ///
    /// Each file is written to `output_dir` under its own name. Uses parallel
    /// iteration when the `parallel` feature is enabled (via rayon).
    #[must_use]
    pub fn process_directory(&self, input_dir: &Path, output_dir: &Path) -> Vec<ProcessResult> {
        let mut entries: Vec<PathBuf> = match std::fs::read_dir(input_dir) {
            Ok(rd) => rd
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
                .map(|e| e.path())
                .filter(|p| is_supported_image(p))
                .collect(),
            Err(e) => {
                return vec![ProcessResult::failure(
                    input_dir,
                    format!("Failed to read directory: {e}"),
                )];
            }
        };
        entries.sort();

        if !output_dir.exists() {
            if let Err(e) = std::fs::create_dir_all(output_dir) {
                return vec![ProcessResult::failure(
                    output_dir,
                    format!("Failed to create output directory: {e}"),
                )];
            }
        }

        let process_entry = |input_path: &PathBuf| match input_path.file_name() {
            Some(filename) => self.process_file(input_path, &output_dir.join(filename)),
            None => ProcessResult::failure(input_path, "Path has no file name".to_string()),
        };

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            entries.par_iter().map(process_entry).collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            entries.iter().map(process_entry).collect()
        }
    }
}

/// Extensions picked up by [`ReflectionRemover::process_directory`].
const SUPPORTED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "bmp"];

/// Whether `path` names a file the codec can decode and encode again.
///
/// The extension is matched case-insensitively.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|s| ext.eq_ignore_ascii_case(s))
        })
}

/// Where the CLI writes the transmission layer when no output is given.
///
/// The file lands next to the input with `_transmission` appended to its
/// stem: `photo.jpg` becomes `photo_transmission.jpg`. The extension, and
/// with it the output format, is kept.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let ext = input.extension().unwrap_or_default().to_string_lossy();
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(format!("{stem}_transmission.{ext}"))
}
