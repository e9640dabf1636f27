//! Recurrent sequence model used for demand regression
//!
//! The network is stored as a JSON document of Keras-layout weights and run
//! with a plain ndarray forward pass. Anything implementing
//! [`SequenceRegressor`] can stand in for it.

use ndarray::{Array1, Array2, Array3, Axis, s};
use serde::Deserialize;

use crate::error::{ArtifactError, PipelineError};

/// A regressor over `(batch = 1, timesteps, features)` input tensors.
pub trait SequenceRegressor: Send + Sync + std::fmt::Debug {
    /// Number of feature columns per timestep.
    fn input_width(&self) -> usize;

    /// Fixed number of timesteps, if the model was built for one.
    fn sequence_length(&self) -> Option<usize>;

    /// Run the forward pass and return the raw (scaled) prediction.
    fn predict(&self, input: &Array3<f64>) -> Result<f64, PipelineError>;

    /// Short human-readable description.
    fn describe(&self) -> String;
}

/// Repeat one feature row across `steps` timesteps, shape `(1, steps, F)`.
pub fn broadcast_sequence(row: &[f64], steps: usize) -> Array3<f64> {
    Array3::from_shape_fn((1, steps, row.len()), |(_, _, f)| row[f])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Linear,
    Relu,
    Tanh,
    Sigmoid,
}

impl Activation {
    fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Linear => x,
            Activation::Relu => x.max(0.0),
            Activation::Tanh => x.tanh(),
            Activation::Sigmoid => sigmoid(x),
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn tanh_default() -> Activation {
    Activation::Tanh
}

fn linear_default() -> Activation {
    Activation::Linear
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum LayerSpec {
    SimpleRnn {
        kernel: Vec<Vec<f64>>,
        recurrent_kernel: Vec<Vec<f64>>,
        bias: Vec<f64>,
        #[serde(default = "tanh_default")]
        activation: Activation,
        #[serde(default)]
        return_sequences: bool,
    },
    Lstm {
        kernel: Vec<Vec<f64>>,
        recurrent_kernel: Vec<Vec<f64>>,
        bias: Vec<f64>,
        #[serde(default)]
        return_sequences: bool,
    },
    Gru {
        kernel: Vec<Vec<f64>>,
        recurrent_kernel: Vec<Vec<f64>>,
        /// Input bias row and recurrent bias row (reset-after layout).
        bias: Vec<Vec<f64>>,
        #[serde(default)]
        return_sequences: bool,
    },
    Dense {
        kernel: Vec<Vec<f64>>,
        bias: Vec<f64>,
        #[serde(default = "linear_default")]
        activation: Activation,
    },
    Dropout {},
}

#[derive(Debug, Deserialize)]
struct ModelDocument {
    /// `[timesteps, features]`
    input_shape: [usize; 2],
    layers: Vec<LayerSpec>,
}

#[derive(Debug, Clone)]
struct Recurrent {
    kernel: Array2<f64>,
    recurrent_kernel: Array2<f64>,
    bias: Array1<f64>,
    /// Recurrent-side bias; only GRU (reset-after) carries one.
    recurrent_bias: Option<Array1<f64>>,
    units: usize,
    return_sequences: bool,
}

#[derive(Debug, Clone)]
enum Layer {
    SimpleRnn(Recurrent, Activation),
    Lstm(Recurrent),
    Gru(Recurrent),
    Dense {
        kernel: Array2<f64>,
        bias: Array1<f64>,
        activation: Activation,
    },
}

impl Layer {
    fn name(&self) -> &'static str {
        match self {
            Layer::SimpleRnn(..) => "simple_rnn",
            Layer::Lstm(_) => "lstm",
            Layer::Gru(_) => "gru",
            Layer::Dense { .. } => "dense",
        }
    }

    fn units(&self) -> usize {
        match self {
            Layer::SimpleRnn(r, _) | Layer::Lstm(r) | Layer::Gru(r) => r.units,
            Layer::Dense { kernel, .. } => kernel.ncols(),
        }
    }

    /// Input rows are timesteps; output is either every step or the last.
    fn forward(&self, x: &Array2<f64>) -> Array2<f64> {
        match self {
            Layer::Dense {
                kernel,
                bias,
                activation,
            } => {
                let mut out = x.dot(kernel) + bias;
                out.mapv_inplace(|v| activation.apply(v));
                out
            }
            Layer::SimpleRnn(r, activation) => r.scan(x, |r, xt, h, _| {
                let z = xt.dot(&r.kernel) + h.dot(&r.recurrent_kernel) + &r.bias;
                (z.mapv(|v| activation.apply(v)), None)
            }),
            Layer::Lstm(r) => r.scan(x, |r, xt, h, c| {
                let u = r.units;
                let z = xt.dot(&r.kernel) + h.dot(&r.recurrent_kernel) + &r.bias;
                let i = z.slice(s![0..u]).mapv(sigmoid);
                let f = z.slice(s![u..2 * u]).mapv(sigmoid);
                let g = z.slice(s![2 * u..3 * u]).mapv(f64::tanh);
                let o = z.slice(s![3 * u..4 * u]).mapv(sigmoid);
                let c = f * c + i * g;
                let h = o * c.mapv(f64::tanh);
                (h, Some(c))
            }),
            Layer::Gru(r) => r.scan(x, |r, xt, h, _| {
                let u = r.units;
                let mx = xt.dot(&r.kernel) + &r.bias;
                let mut mh = h.dot(&r.recurrent_kernel);
                if let Some(rb) = &r.recurrent_bias {
                    mh += rb;
                }
                let z = (&mx.slice(s![0..u]) + &mh.slice(s![0..u])).mapv(sigmoid);
                let reset = (&mx.slice(s![u..2 * u]) + &mh.slice(s![u..2 * u])).mapv(sigmoid);
                let candidate =
                    (&mx.slice(s![2 * u..]) + &(reset * &mh.slice(s![2 * u..]))).mapv(f64::tanh);
                let h = &z * h + (1.0 - &z) * candidate;
                (h, None)
            }),
        }
    }
}

impl Recurrent {
    /// Run `step` over every timestep, threading hidden and cell state.
    fn scan<F>(&self, x: &Array2<f64>, step: F) -> Array2<f64>
    where
        F: Fn(
            &Self,
            &Array1<f64>,
            &Array1<f64>,
            &Array1<f64>,
        ) -> (Array1<f64>, Option<Array1<f64>>),
    {
        let steps = x.nrows();
        let mut h = Array1::<f64>::zeros(self.units);
        let mut c = Array1::<f64>::zeros(self.units);
        let mut outputs = Array2::<f64>::zeros((steps, self.units));

        for (t, xt) in x.axis_iter(Axis(0)).enumerate() {
            let (next_h, next_c) = step(self, &xt.to_owned(), &h, &c);
            h = next_h;
            if let Some(next_c) = next_c {
                c = next_c;
            }
            outputs.row_mut(t).assign(&h);
        }

        if self.return_sequences {
            outputs
        } else {
            h.insert_axis(Axis(0))
        }
    }
}

/// Trained recurrent network loaded from a JSON weight document.
#[derive(Debug, Clone)]
pub struct RecurrentModel {
    timesteps: usize,
    input_width: usize,
    layers: Vec<Layer>,
}

impl RecurrentModel {
    /// Parse and validate a model document.
    ///
    /// Layer widths are chained from the declared input width; the network
    /// must end in a single value per sequence.
    pub fn from_json(json: &str) -> Result<Self, ArtifactError> {
        let doc: ModelDocument =
            serde_json::from_str(json).map_err(|e| ArtifactError::invalid("model", e.to_string()))?;

        let [timesteps, input_width] = doc.input_shape;
        if timesteps == 0 || input_width == 0 {
            return Err(ArtifactError::invalid(
                "model",
                format!("input_shape {:?} has an empty dimension", doc.input_shape),
            ));
        }

        let mut width = input_width;
        let mut is_sequence = true;
        let mut layers = Vec::with_capacity(doc.layers.len());

        for (index, spec) in doc.layers.into_iter().enumerate() {
            let layer = match spec {
                LayerSpec::Dropout {} => continue,
                LayerSpec::SimpleRnn {
                    kernel,
                    recurrent_kernel,
                    bias,
                    activation,
                    return_sequences,
                } => Layer::SimpleRnn(
                    Recurrent::build(
                        index,
                        width,
                        1,
                        kernel,
                        recurrent_kernel,
                        bias,
                        None,
                        return_sequences,
                    )?,
                    activation,
                ),
                LayerSpec::Lstm {
                    kernel,
                    recurrent_kernel,
                    bias,
                    return_sequences,
                } => Layer::Lstm(Recurrent::build(
                    index,
                    width,
                    4,
                    kernel,
                    recurrent_kernel,
                    bias,
                    None,
                    return_sequences,
                )?),
                LayerSpec::Gru {
                    kernel,
                    recurrent_kernel,
                    mut bias,
                    return_sequences,
                } => {
                    if bias.len() != 2 {
                        return Err(ArtifactError::invalid(
                            format!("layer {} (gru)", index),
                            format!("expected 2 bias rows, found {}", bias.len()),
                        ));
                    }
                    let recurrent_bias = bias.pop();
                    let input_bias = bias.pop().unwrap_or_default();
                    Layer::Gru(Recurrent::build(
                        index,
                        width,
                        3,
                        kernel,
                        recurrent_kernel,
                        input_bias,
                        recurrent_bias,
                        return_sequences,
                    )?)
                }
                LayerSpec::Dense {
                    kernel,
                    bias,
                    activation,
                } => {
                    let label = format!("layer {} (dense)", index);
                    let kernel = matrix(&label, "kernel", kernel)?;
                    check_dim(&label, "kernel rows", width, kernel.nrows())?;
                    check_dim(&label, "bias", kernel.ncols(), bias.len())?;
                    Layer::Dense {
                        kernel,
                        bias: Array1::from(bias),
                        activation,
                    }
                }
            };

            if matches!(layer, Layer::SimpleRnn(..) | Layer::Lstm(_) | Layer::Gru(_)) {
                if !is_sequence {
                    return Err(ArtifactError::invalid(
                        format!("layer {} ({})", index, layer.name()),
                        "recurrent layer needs sequence input",
                    ));
                }
                is_sequence = match &layer {
                    Layer::SimpleRnn(r, _) | Layer::Lstm(r) | Layer::Gru(r) => r.return_sequences,
                    Layer::Dense { .. } => is_sequence,
                };
            }
            width = layer.units();
            layers.push(layer);
        }

        if layers.is_empty() {
            return Err(ArtifactError::invalid("model", "no layers"));
        }
        if is_sequence || width != 1 {
            return Err(PipelineError::shape(
                "model output of one value per sequence",
                format!(
                    "{} value(s) per {}",
                    width,
                    if is_sequence { "timestep" } else { "sequence" }
                ),
            )
            .into());
        }

        Ok(Self {
            timesteps,
            input_width,
            layers,
        })
    }
}

impl SequenceRegressor for RecurrentModel {
    fn input_width(&self) -> usize {
        self.input_width
    }

    fn sequence_length(&self) -> Option<usize> {
        Some(self.timesteps)
    }

    fn predict(&self, input: &Array3<f64>) -> Result<f64, PipelineError> {
        let (batch, steps, width) = input.dim();
        if batch != 1 || steps != self.timesteps || width != self.input_width {
            return Err(PipelineError::shape(
                format!("(1, {}, {})", self.timesteps, self.input_width),
                format!("({}, {}, {})", batch, steps, width),
            ));
        }

        let mut x = input.index_axis(Axis(0), 0).to_owned();
        for layer in &self.layers {
            x = layer.forward(&x);
        }

        let value = x[[0, 0]];
        if value.is_finite() {
            Ok(value)
        } else {
            Err(PipelineError::Inference(format!(
                "model produced non-finite output {}",
                value
            )))
        }
    }

    fn describe(&self) -> String {
        let layers: Vec<String> = self
            .layers
            .iter()
            .map(|l| format!("{}({})", l.name(), l.units()))
            .collect();
        format!(
            "input({}x{}) -> {}",
            self.timesteps,
            self.input_width,
            layers.join(" -> ")
        )
    }
}

impl Recurrent {
    #[allow(clippy::too_many_arguments)]
    fn build(
        index: usize,
        input_width: usize,
        gates: usize,
        kernel: Vec<Vec<f64>>,
        recurrent_kernel: Vec<Vec<f64>>,
        bias: Vec<f64>,
        recurrent_bias: Option<Vec<f64>>,
        return_sequences: bool,
    ) -> Result<Self, ArtifactError> {
        let label = format!("layer {}", index);
        let kernel = matrix(&label, "kernel", kernel)?;
        let recurrent_kernel = matrix(&label, "recurrent_kernel", recurrent_kernel)?;

        let units = recurrent_kernel.nrows();
        check_dim(&label, "kernel rows", input_width, kernel.nrows())?;
        check_dim(&label, "kernel columns", gates * units, kernel.ncols())?;
        check_dim(&label, "recurrent_kernel columns", gates * units, recurrent_kernel.ncols())?;
        check_dim(&label, "bias", gates * units, bias.len())?;
        if let Some(rb) = &recurrent_bias {
            check_dim(&label, "recurrent bias", gates * units, rb.len())?;
        }

        Ok(Self {
            kernel,
            recurrent_kernel,
            bias: Array1::from(bias),
            recurrent_bias: recurrent_bias.map(Array1::from),
            units,
            return_sequences,
        })
    }
}

fn matrix(label: &str, name: &str, rows: Vec<Vec<f64>>) -> Result<Array2<f64>, ArtifactError> {
    let nrows = rows.len();
    let ncols = rows.first().map(Vec::len).unwrap_or(0);
    if nrows == 0 || ncols == 0 {
        return Err(ArtifactError::invalid(label, format!("{} is empty", name)));
    }
    if rows.iter().any(|r| r.len() != ncols) {
        return Err(ArtifactError::invalid(label, format!("{} is not rectangular", name)));
    }
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((nrows, ncols), flat)
        .map_err(|e| ArtifactError::invalid(label, format!("{}: {}", name, e)))
}

fn check_dim(label: &str, what: &str, expected: usize, found: usize) -> Result<(), ArtifactError> {
    if expected == found {
        Ok(())
    } else {
        Err(PipelineError::shape(
            format!("{} {} = {}", label, what, expected),
            found,
        )
        .into())
    }
}
