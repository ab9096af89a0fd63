//! Neural Network (Multi-Layer Perceptron) implementation
//!
//! Fully connected feedforward network trained with mini-batch Adam,
//! L2 weight decay and optional early stopping on a held-out fraction.
//! The classifier uses a softmax output with cross-entropy loss; the
//! regressor uses an identity output with squared loss.

use super::decision_tree::{argmax, unique_sorted};
use crate::error::{DecisionError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Hidden-layer activation function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Activation {
    /// Rectified Linear Unit
    #[default]
    ReLU,
    /// Logistic sigmoid
    Logistic,
    /// Hyperbolic tangent
    Tanh,
    /// Identity
    Identity,
}

impl Activation {
    fn apply(self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::ReLU => z.mapv(|v| v.max(0.0)),
            Activation::Logistic => z.mapv(|v| 1.0 / (1.0 + (-v).exp())),
            Activation::Tanh => z.mapv(f64::tanh),
            Activation::Identity => z.clone(),
        }
    }

    /// Derivative expressed through the activated value `a`
    fn derivative(self, a: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::ReLU => a.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            Activation::Logistic => a.mapv(|v| v * (1.0 - v)),
            Activation::Tanh => a.mapv(|v| 1.0 - v * v),
            Activation::Identity => Array2::ones(a.raw_dim()),
        }
    }
}

/// Neural Network configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MLPConfig {
    /// Hidden layer sizes
    pub hidden_layers: Vec<usize>,
    /// Activation function for hidden layers
    pub activation: Activation,
    /// Adam step size
    pub learning_rate: f64,
    /// Maximum number of epochs
    pub max_epochs: usize,
    /// Mini-batch size
    pub batch_size: usize,
    /// L2 penalty
    pub alpha: f64,
    /// Seed for weight init, shuffling and the validation holdout
    pub random_state: u64,
    /// Hold out `validation_fraction` and stop when its loss stalls
    pub early_stopping: bool,
    pub validation_fraction: f64,
    /// Epochs without `tol` improvement before stopping
    pub n_iter_no_change: usize,
    pub tol: f64,
    pub beta_1: f64,
    pub beta_2: f64,
    pub epsilon: f64,
}

impl Default for MLPConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![100, 50],
            activation: Activation::ReLU,
            learning_rate: 0.001,
            max_epochs: 200,
            batch_size: 32,
            alpha: 0.0001,
            random_state: 42,
            early_stopping: true,
            validation_fraction: 0.1,
            n_iter_no_change: 10,
            tol: 1e-4,
            beta_1: 0.9,
            beta_2: 0.999,
            epsilon: 1e-8,
        }
    }
}

impl MLPConfig {
    pub fn with_hidden_layers(mut self, layers: Vec<usize>) -> Self {
        self.hidden_layers = layers;
        self
    }

    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_max_epochs(mut self, epochs: usize) -> Self {
        self.max_epochs = epochs;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_early_stopping(mut self, enabled: bool) -> Self {
        self.early_stopping = enabled;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.hidden_layers.iter().any(|&h| h == 0) {
            return Err(DecisionError::InvalidParameter {
                name: "hidden_layers".to_string(),
                value: format!("{:?}", self.hidden_layers),
                reason: "layer sizes must be positive".to_string(),
            });
        }
        if self.learning_rate <= 0.0 || !self.learning_rate.is_finite() {
            return Err(DecisionError::InvalidParameter {
                name: "learning_rate".to_string(),
                value: self.learning_rate.to_string(),
                reason: "must be a positive finite number".to_string(),
            });
        }
        if !(0.0..1.0).contains(&self.validation_fraction) {
            return Err(DecisionError::InvalidParameter {
                name: "validation_fraction".to_string(),
                value: self.validation_fraction.to_string(),
                reason: "must lie in [0, 1)".to_string(),
            });
        }
        Ok(())
    }
}

/// Output layer kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum OutputKind {
    Softmax,
    Identity,
}

/// Weights and biases of a fitted network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Network {
    weights: Vec<Array2<f64>>,
    biases: Vec<Array1<f64>>,
    activation: Activation,
    output: OutputKind,
}

impl Network {
    fn initialize(
        layer_sizes: &[usize],
        activation: Activation,
        output: OutputKind,
        rng: &mut Xoshiro256PlusPlus,
    ) -> Self {
        let mut weights = Vec::with_capacity(layer_sizes.len() - 1);
        let mut biases = Vec::with_capacity(layer_sizes.len() - 1);

        let factor = if activation == Activation::Logistic { 2.0 } else { 6.0 };
        for pair in layer_sizes.windows(2) {
            let (n_in, n_out) = (pair[0], pair[1]);
            // Glorot uniform
            let bound = (factor / (n_in + n_out) as f64).sqrt();
            weights.push(Array2::from_shape_fn((n_in, n_out), |_| rng.gen_range(-bound..bound)));
            biases.push(Array1::from_shape_fn(n_out, |_| rng.gen_range(-bound..bound)));
        }

        Self {
            weights,
            biases,
            activation,
            output,
        }
    }

    /// Activations of every layer, input first, output last
    fn forward(&self, x: &Array2<f64>) -> Vec<Array2<f64>> {
        let mut activations = Vec::with_capacity(self.weights.len() + 1);
        activations.push(x.clone());

        let last = self.weights.len() - 1;
        for (i, (w, b)) in self.weights.iter().zip(&self.biases).enumerate() {
            let z = activations[i].dot(w) + b;
            let a = if i < last {
                self.activation.apply(&z)
            } else {
                match self.output {
                    OutputKind::Softmax => softmax(z),
                    OutputKind::Identity => z,
                }
            };
            activations.push(a);
        }

        activations
    }

    fn predict(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut activations = self.forward(x);
        activations.pop().unwrap_or_else(|| Array2::zeros((x.nrows(), 0)))
    }

    /// Mean loss of `targets` against the network output, without the penalty
    fn loss(&self, x: &Array2<f64>, targets: &Array2<f64>) -> f64 {
        let out = self.predict(x);
        let n = x.nrows().max(1) as f64;
        match self.output {
            OutputKind::Softmax => {
                -(targets * &out.mapv(|p| p.clamp(1e-12, 1.0).ln())).sum() / n
            }
            OutputKind::Identity => (&out - targets).mapv(|d| d * d).sum() / (2.0 * n),
        }
    }

    /// Gradients of the penalised loss for one mini-batch
    fn backward(
        &self,
        activations: &[Array2<f64>],
        targets: &Array2<f64>,
        alpha: f64,
    ) -> (Vec<Array2<f64>>, Vec<Array1<f64>>) {
        let n = targets.nrows().max(1) as f64;
        let n_layers = self.weights.len();
        let mut grad_w = vec![Array2::zeros((0, 0)); n_layers];
        let mut grad_b = vec![Array1::zeros(0); n_layers];

        // softmax + cross-entropy and identity + squared loss share this delta
        let mut delta = (&activations[n_layers] - targets) / n;

        for i in (0..n_layers).rev() {
            grad_w[i] = activations[i].t().dot(&delta) + &self.weights[i] * (alpha / n);
            grad_b[i] = delta.sum_axis(Axis(0));

            if i > 0 {
                delta = delta.dot(&self.weights[i].t()) * self.activation.derivative(&activations[i]);
            }
        }

        (grad_w, grad_b)
    }

    fn n_params(&self) -> usize {
        self.weights.iter().map(|w| w.len()).sum::<usize>()
            + self.biases.iter().map(|b| b.len()).sum::<usize>()
    }
}

fn softmax(mut z: Array2<f64>) -> Array2<f64> {
    for mut row in z.rows_mut() {
        let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        if sum > 0.0 {
            row /= sum;
        }
    }
    z
}

/// First and second moment estimates for Adam
struct AdamState {
    m_w: Vec<Array2<f64>>,
    v_w: Vec<Array2<f64>>,
    m_b: Vec<Array1<f64>>,
    v_b: Vec<Array1<f64>>,
    t: i32,
}

impl AdamState {
    fn new(network: &Network) -> Self {
        Self {
            m_w: network.weights.iter().map(|w| Array2::zeros(w.raw_dim())).collect(),
            v_w: network.weights.iter().map(|w| Array2::zeros(w.raw_dim())).collect(),
            m_b: network.biases.iter().map(|b| Array1::zeros(b.len())).collect(),
            v_b: network.biases.iter().map(|b| Array1::zeros(b.len())).collect(),
            t: 0,
        }
    }

    fn step(
        &mut self,
        network: &mut Network,
        grad_w: Vec<Array2<f64>>,
        grad_b: Vec<Array1<f64>>,
        config: &MLPConfig,
    ) {
        self.t += 1;
        let (b1, b2) = (config.beta_1, config.beta_2);
        let lr_t = config.learning_rate * (1.0 - b2.powi(self.t)).sqrt() / (1.0 - b1.powi(self.t));

        for (i, (gw, gb)) in grad_w.into_iter().zip(grad_b).enumerate() {
            self.m_w[i] = &self.m_w[i] * b1 + &gw * (1.0 - b1);
            self.v_w[i] = &self.v_w[i] * b2 + &gw.mapv(|g| g * g) * (1.0 - b2);
            self.m_b[i] = &self.m_b[i] * b1 + &gb * (1.0 - b1);
            self.v_b[i] = &self.v_b[i] * b2 + &gb.mapv(|g| g * g) * (1.0 - b2);

            let eps = config.epsilon;
            network.weights[i] -= &(&self.m_w[i] / &self.v_w[i].mapv(|v| v.sqrt() + eps) * lr_t);
            network.biases[i] -= &(&self.m_b[i] / &self.v_b[i].mapv(|v| v.sqrt() + eps) * lr_t);
        }
    }
}

/// What happened during a fit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    /// Epochs actually run
    pub n_iter: usize,
    /// Training loss per epoch
    pub loss_curve: Vec<f64>,
    /// Best monitored loss (validation loss when early stopping)
    pub best_loss: f64,
    pub stopped_early: bool,
}

/// Architecture summary of a fitted network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub layer_sizes: Vec<usize>,
    pub activation: Activation,
    pub n_parameters: usize,
    pub n_iter: usize,
    pub best_loss: f64,
    pub stopped_early: bool,
}

fn fit_network(
    config: &MLPConfig,
    x: &Array2<f64>,
    targets: &Array2<f64>,
    output: OutputKind,
) -> Result<(Network, TrainingHistory)> {
    config.validate()?;
    let n_samples = x.nrows();
    if n_samples == 0 {
        return Err(DecisionError::ValidationError(
            "Cannot fit a network on zero samples".to_string(),
        ));
    }
    if n_samples != targets.nrows() {
        return Err(DecisionError::ShapeError {
            expected: format!("{} target rows", n_samples),
            actual: format!("{} target rows", targets.nrows()),
        });
    }

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.random_state);

    let mut layer_sizes = vec![x.ncols()];
    layer_sizes.extend(&config.hidden_layers);
    layer_sizes.push(targets.ncols());
    let mut network = Network::initialize(&layer_sizes, config.activation, output, &mut rng);

    let mut order: Vec<usize> = (0..n_samples).collect();
    order.shuffle(&mut rng);
    let n_val = if config.early_stopping {
        (n_samples as f64 * config.validation_fraction) as usize
    } else {
        0
    };
    // keep at least two training rows
    let n_val = if n_samples - n_val < 2 { 0 } else { n_val };
    let (val_idx, train_idx) = order.split_at(n_val);

    let x_train = x.select(Axis(0), train_idx);
    let y_train = targets.select(Axis(0), train_idx);
    let validation = (n_val > 0).then(|| (x.select(Axis(0), val_idx), targets.select(Axis(0), val_idx)));

    let mut adam = AdamState::new(&network);
    let mut history = TrainingHistory {
        best_loss: f64::INFINITY,
        ..TrainingHistory::default()
    };
    let mut best_network = network.clone();
    let mut no_improvement = 0;
    let batch_size = config.batch_size.clamp(1, x_train.nrows());

    let mut indices: Vec<usize> = (0..x_train.nrows()).collect();
    for _epoch in 0..config.max_epochs {
        indices.shuffle(&mut rng);

        for batch in indices.chunks(batch_size) {
            let x_batch = x_train.select(Axis(0), batch);
            let y_batch = y_train.select(Axis(0), batch);

            let activations = network.forward(&x_batch);
            let (grad_w, grad_b) = network.backward(&activations, &y_batch, config.alpha);
            adam.step(&mut network, grad_w, grad_b, config);
        }

        let train_loss = network.loss(&x_train, &y_train);
        if !train_loss.is_finite() {
            return Err(DecisionError::TrainingError(
                "network loss diverged to a non-finite value".to_string(),
            ));
        }
        history.loss_curve.push(train_loss);
        history.n_iter += 1;

        let monitored = match &validation {
            Some((x_val, y_val)) => network.loss(x_val, y_val),
            None => train_loss,
        };

        if monitored < history.best_loss - config.tol {
            no_improvement = 0;
        } else {
            no_improvement += 1;
        }
        if monitored < history.best_loss {
            history.best_loss = monitored;
            best_network = network.clone();
        }
        if no_improvement >= config.n_iter_no_change {
            history.stopped_early = true;
            break;
        }
    }

    // with a holdout the best validation weights win; otherwise keep the last epoch
    if validation.is_some() {
        network = best_network;
    }

    Ok((network, history))
}

/// Normalised mean absolute input-layer weight per input feature
fn input_weight_importance(network: &Network) -> Option<Array1<f64>> {
    let w0 = network.weights.first()?;
    let mean_abs = w0.mapv(f64::abs).mean_axis(Axis(1))?;
    let total = mean_abs.sum();
    if total > 0.0 && total.is_finite() {
        Some(mean_abs / total)
    } else {
        Some(Array1::from_elem(w0.nrows(), 1.0 / w0.nrows().max(1) as f64))
    }
}

fn info(network: &Network, history: &TrainingHistory) -> NetworkInfo {
    let mut layer_sizes: Vec<usize> = network.weights.iter().map(|w| w.nrows()).collect();
    if let Some(last) = network.weights.last() {
        layer_sizes.push(last.ncols());
    }
    NetworkInfo {
        layer_sizes,
        activation: network.activation,
        n_parameters: network.n_params(),
        n_iter: history.n_iter,
        best_loss: history.best_loss,
        stopped_early: history.stopped_early,
    }
}

fn check_width(network: &Network, x: &Array2<f64>) -> Result<()> {
    let expected = network.weights.first().map_or(0, |w| w.nrows());
    if x.ncols() != expected {
        return Err(DecisionError::ShapeError {
            expected: format!("{} features", expected),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

/// Multi-Layer Perceptron Regressor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MLPRegressor {
    config: MLPConfig,
    network: Option<Network>,
    history: TrainingHistory,
}

impl MLPRegressor {
    pub fn new(config: MLPConfig) -> Self {
        Self {
            config,
            network: None,
            history: TrainingHistory::default(),
        }
    }

    /// Fit the model
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let targets = y.clone().insert_axis(Axis(1));
        let (network, history) = fit_network(&self.config, x, &targets, OutputKind::Identity)?;
        self.network = Some(network);
        self.history = history;
        Ok(self)
    }

    /// Predicted values
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let network = self.network.as_ref().ok_or(DecisionError::NotTrained)?;
        check_width(network, x)?;
        Ok(network.predict(x).column(0).to_owned())
    }

    pub fn is_fitted(&self) -> bool {
        self.network.is_some()
    }

    pub fn config(&self) -> &MLPConfig {
        &self.config
    }

    pub fn history(&self) -> &TrainingHistory {
        &self.history
    }

    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        self.network.as_ref().and_then(input_weight_importance)
    }

    pub fn network_info(&self) -> Option<NetworkInfo> {
        self.network.as_ref().map(|n| info(n, &self.history))
    }

    /// `(weights, intercept)` when the fitted net has no hidden layer, so
    /// its output is an affine function of the input
    pub fn linear_coefficients(&self) -> Option<(Array1<f64>, f64)> {
        let network = self.network.as_ref()?;
        match (network.weights.as_slice(), network.biases.as_slice()) {
            ([w], [b]) if w.ncols() == 1 && network.output == OutputKind::Identity => {
                Some((w.column(0).to_owned(), b[0]))
            }
            _ => None,
        }
    }
}

/// Multi-Layer Perceptron Classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MLPClassifier {
    config: MLPConfig,
    network: Option<Network>,
    classes: Vec<f64>,
    history: TrainingHistory,
}

impl MLPClassifier {
    pub fn new(config: MLPConfig) -> Self {
        Self {
            config,
            network: None,
            classes: Vec::new(),
            history: TrainingHistory::default(),
        }
    }

    /// Fit the model
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let classes = unique_sorted(y);
        let mut targets = Array2::zeros((y.len(), classes.len()));
        for (i, label) in y.iter().enumerate() {
            if let Some(c) = classes.iter().position(|c| c == label) {
                targets[[i, c]] = 1.0;
            }
        }

        let (network, history) = fit_network(&self.config, x, &targets, OutputKind::Softmax)?;
        self.network = Some(network);
        self.classes = classes;
        self.history = history;
        Ok(self)
    }

    /// Class probabilities, one column per entry of [`Self::classes`]
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let network = self.network.as_ref().ok_or(DecisionError::NotTrained)?;
        check_width(network, x)?;
        Ok(network.predict(x))
    }

    /// Predict class labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| {
                let values = row.to_vec();
                argmax(&values).map(|c| self.classes[c]).unwrap_or(0.0)
            })
            .collect())
    }

    pub fn is_fitted(&self) -> bool {
        self.network.is_some()
    }

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    pub fn config(&self) -> &MLPConfig {
        &self.config
    }

    pub fn history(&self) -> &TrainingHistory {
        &self.history
    }

    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        self.network.as_ref().and_then(input_weight_importance)
    }

    pub fn network_info(&self) -> Option<NetworkInfo> {
        self.network.as_ref().map(|n| info(n, &self.history))
    }
}
