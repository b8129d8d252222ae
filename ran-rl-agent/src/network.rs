//! Feed-forward Q-network and its optimizer
//!
//! A pure-ndarray MLP: the state vector goes in, one Q-value per action comes
//! out, with ReLU between layers. Backpropagation and Adam are implemented
//! directly on the layer arrays; no external NN backend.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

use ran_rl_core::{Result, RlError};

/// Network shape configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QNetworkConfig {
    /// Input dimension (the masked learning-state dimension)
    pub input_dim: usize,
    /// Hidden layer sizes
    pub hidden_dims: Vec<usize>,
    /// Output dimension (the action count)
    pub output_dim: usize,
}

impl QNetworkConfig {
    /// Default two-hidden-layer shape for a given state/action geometry
    #[must_use]
    pub fn new(input_dim: usize, output_dim: usize) -> Self {
        Self {
            input_dim,
            hidden_dims: vec![12, 6],
            output_dim,
        }
    }

    /// Validate layer sizes
    pub fn validate(&self) -> Result<()> {
        if self.input_dim == 0 || self.output_dim == 0 {
            return Err(RlError::Config(
                "network input and output dimensions must be positive".into(),
            ));
        }
        if self.hidden_dims.iter().any(|&d| d == 0) {
            return Err(RlError::Config("hidden layer sizes must be positive".into()));
        }
        Ok(())
    }

    /// Layer dimensions including input and output
    fn layer_dims(&self) -> Vec<usize> {
        let mut dims = Vec::with_capacity(self.hidden_dims.len() + 2);
        dims.push(self.input_dim);
        dims.extend_from_slice(&self.hidden_dims);
        dims.push(self.output_dim);
        dims
    }
}

/// Per-layer parameter gradients, accumulated over a mini-batch
#[derive(Debug, Clone)]
pub struct Gradients {
    /// Weight gradients, one per layer
    pub weights: Vec<Array2<f32>>,
    /// Bias gradients, one per layer
    pub biases: Vec<Array1<f32>>,
}

/// State-to-Q-values network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QNetwork {
    config: QNetworkConfig,
    /// Weights for each layer, `(in_dim, out_dim)`
    weights: Vec<Array2<f32>>,
    /// Biases for each layer
    biases: Vec<Array1<f32>>,
}

impl QNetwork {
    /// Create a freshly initialized network
    ///
    /// He-uniform init for the ReLU layers, Xavier for the linear head,
    /// biases at zero.
    pub fn new<R: Rng + ?Sized>(config: QNetworkConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;
        let dims = config.layer_dims();
        let last = dims.len() - 2;
        let mut weights = Vec::with_capacity(dims.len() - 1);
        let mut biases = Vec::with_capacity(dims.len() - 1);
        for (layer, pair) in dims.windows(2).enumerate() {
            let (fan_in, fan_out) = (pair[0], pair[1]);
            let limit = if layer == last {
                (6.0 / (fan_in + fan_out) as f32).sqrt()
            } else {
                (6.0 / fan_in as f32).sqrt()
            };
            weights.push(Array2::from_shape_fn((fan_in, fan_out), |_| {
                rng.gen_range(-limit..limit)
            }));
            biases.push(Array1::zeros(fan_out));
        }
        Ok(Self {
            config,
            weights,
            biases,
        })
    }

    /// Network shape
    #[must_use]
    pub fn config(&self) -> &QNetworkConfig {
        &self.config
    }

    /// Compute the Q-values of one state
    #[must_use]
    pub fn forward(&self, input: &ArrayView1<f32>) -> Array1<f32> {
        let mut hidden = input.to_owned();
        for layer in 0..self.weights.len() {
            hidden = hidden.dot(&self.weights[layer]) + &self.biases[layer];
            if layer + 1 < self.weights.len() {
                hidden.mapv_inplace(|v| v.max(0.0));
            }
        }
        hidden
    }

    /// Forward pass keeping every layer activation, for backpropagation
    ///
    /// Returns `hidden_dims.len() + 2` arrays: the input, each post-ReLU
    /// hidden activation, and the linear output.
    fn forward_trace(&self, input: &ArrayView1<f32>) -> Vec<Array1<f32>> {
        let mut activations = Vec::with_capacity(self.weights.len() + 1);
        activations.push(input.to_owned());
        for layer in 0..self.weights.len() {
            let mut out =
                activations[layer].dot(&self.weights[layer]) + &self.biases[layer];
            if layer + 1 < self.weights.len() {
                out.mapv_inplace(|v| v.max(0.0));
            }
            activations.push(out);
        }
        activations
    }

    /// Zeroed gradient accumulator matching this network's shape
    #[must_use]
    pub fn zero_gradients(&self) -> Gradients {
        Gradients {
            weights: self
                .weights
                .iter()
                .map(|w| Array2::zeros(w.raw_dim()))
                .collect(),
            biases: self
                .biases
                .iter()
                .map(|b| Array1::zeros(b.raw_dim()))
                .collect(),
        }
    }

    /// Backpropagate `output_grad` for one input, accumulating into `grads`
    ///
    /// `output_grad` is the loss gradient at the linear output. Returns the
    /// Q-values computed on the way, so callers get the prediction for free.
    pub fn accumulate_gradient(
        &self,
        input: &ArrayView1<f32>,
        output_grad: &Array1<f32>,
        grads: &mut Gradients,
    ) -> Result<Array1<f32>> {
        if input.len() != self.config.input_dim {
            return Err(RlError::DimensionMismatch {
                expected: self.config.input_dim,
                actual: input.len(),
            });
        }
        if output_grad.len() != self.config.output_dim {
            return Err(RlError::DimensionMismatch {
                expected: self.config.output_dim,
                actual: output_grad.len(),
            });
        }

        let activations = self.forward_trace(input);
        let output = activations.last().expect("trace is never empty").clone();

        let mut delta = output_grad.clone();
        for layer in (0..self.weights.len()).rev() {
            let prev = &activations[layer];
            grads.weights[layer] += &prev
                .view()
                .insert_axis(Axis(1))
                .dot(&delta.view().insert_axis(Axis(0)));
            grads.biases[layer] += &delta;
            if layer > 0 {
                // ReLU gate: a_{l-1} > 0 iff z_{l-1} > 0
                delta = self.weights[layer].dot(&delta)
                    * prev.mapv(|a| if a > 0.0 { 1.0 } else { 0.0 });
            }
        }
        Ok(output)
    }

    /// Flattened copy of every parameter, layer by layer
    #[must_use]
    pub fn parameters(&self) -> Vec<f32> {
        let mut params = Vec::with_capacity(self.num_parameters());
        for (w, b) in self.weights.iter().zip(&self.biases) {
            params.extend(w.iter().copied());
            params.extend(b.iter().copied());
        }
        params
    }

    /// Overwrite every parameter from a flattened copy
    pub fn set_parameters(&mut self, params: &[f32]) -> Result<()> {
        if params.len() != self.num_parameters() {
            return Err(RlError::DimensionMismatch {
                expected: self.num_parameters(),
                actual: params.len(),
            });
        }
        let mut offset = 0;
        for (w, b) in self.weights.iter_mut().zip(&mut self.biases) {
            for value in w.iter_mut() {
                *value = params[offset];
                offset += 1;
            }
            for value in b.iter_mut() {
                *value = params[offset];
                offset += 1;
            }
        }
        Ok(())
    }

    /// Total parameter count
    #[must_use]
    pub fn num_parameters(&self) -> usize {
        self.weights
            .iter()
            .zip(&self.biases)
            .map(|(w, b)| w.len() + b.len())
            .sum()
    }

    /// Hard-copy every parameter from another network of the same shape
    pub fn sync_from(&mut self, other: &QNetwork) -> Result<()> {
        if self.config != other.config {
            return Err(RlError::Precondition(
                "cannot sync networks of different shapes".into(),
            ));
        }
        self.weights.clone_from(&other.weights);
        self.biases.clone_from(&other.biases);
        Ok(())
    }
}

/// Adam optimizer with L2 weight decay
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    eps: f32,
    weight_decay: f32,
    step: u64,
    moments: Option<Moments>,
}

#[derive(Debug, Clone)]
struct Moments {
    m_weights: Vec<Array2<f32>>,
    v_weights: Vec<Array2<f32>>,
    m_biases: Vec<Array1<f32>>,
    v_biases: Vec<Array1<f32>>,
}

impl Adam {
    /// Create an optimizer with the given hyperparameters
    #[must_use]
    pub fn new(learning_rate: f64, eps: f64, weight_decay: f64) -> Self {
        Self {
            learning_rate: learning_rate as f32,
            beta1: 0.9,
            beta2: 0.999,
            eps: eps as f32,
            weight_decay: weight_decay as f32,
            step: 0,
            moments: None,
        }
    }

    /// Apply one update to the network from accumulated gradients
    pub fn step(&mut self, network: &mut QNetwork, grads: &Gradients) -> Result<()> {
        if grads.weights.len() != network.weights.len()
            || grads
                .weights
                .iter()
                .zip(&network.weights)
                .any(|(g, w)| g.raw_dim() != w.raw_dim())
        {
            return Err(RlError::Precondition(
                "gradient shapes do not match the network".into(),
            ));
        }

        let moments = self.moments.get_or_insert_with(|| Moments {
            m_weights: grads.weights.iter().map(|g| Array2::zeros(g.raw_dim())).collect(),
            v_weights: grads.weights.iter().map(|g| Array2::zeros(g.raw_dim())).collect(),
            m_biases: grads.biases.iter().map(|g| Array1::zeros(g.raw_dim())).collect(),
            v_biases: grads.biases.iter().map(|g| Array1::zeros(g.raw_dim())).collect(),
        });

        self.step += 1;
        let t = self.step as i32;
        let bias1 = 1.0 - self.beta1.powi(t);
        let bias2 = 1.0 - self.beta2.powi(t);

        for layer in 0..network.weights.len() {
            Self::update_param(
                &mut network.weights[layer],
                &grads.weights[layer],
                &mut moments.m_weights[layer],
                &mut moments.v_weights[layer],
                self.learning_rate,
                self.beta1,
                self.beta2,
                self.eps,
                self.weight_decay,
                bias1,
                bias2,
            );
            Self::update_param(
                &mut network.biases[layer],
                &grads.biases[layer],
                &mut moments.m_biases[layer],
                &mut moments.v_biases[layer],
                self.learning_rate,
                self.beta1,
                self.beta2,
                self.eps,
                self.weight_decay,
                bias1,
                bias2,
            );
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn update_param<D: ndarray::Dimension>(
        param: &mut ndarray::Array<f32, D>,
        grad: &ndarray::Array<f32, D>,
        m: &mut ndarray::Array<f32, D>,
        v: &mut ndarray::Array<f32, D>,
        lr: f32,
        beta1: f32,
        beta2: f32,
        eps: f32,
        weight_decay: f32,
        bias1: f32,
        bias2: f32,
    ) {
        ndarray::Zip::from(param)
            .and(grad)
            .and(m)
            .and(v)
            .for_each(|p, &g, m, v| {
                let g = g + weight_decay * *p;
                *m = beta1 * *m + (1.0 - beta1) * g;
                *v = beta2 * *v + (1.0 - beta2) * g * g;
                let m_hat = *m / bias1;
                let v_hat = *v / bias2;
                *p -= lr * m_hat / (v_hat.sqrt() + eps);
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr1;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn small_network(rng: &mut StdRng) -> QNetwork {
        let config = QNetworkConfig {
            input_dim: 3,
            hidden_dims: vec![4, 3],
            output_dim: 2,
        };
        QNetwork::new(config, rng).unwrap()
    }

    #[test]
    fn forward_produces_one_q_value_per_action() {
        let mut rng = StdRng::seed_from_u64(3);
        let network = small_network(&mut rng);
        let q = network.forward(&arr1(&[0.1, 0.5, 0.9]).view());
        assert_eq!(q.len(), 2);
        assert!(q.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn degenerate_shapes_rejected() {
        let mut rng = StdRng::seed_from_u64(3);
        let config = QNetworkConfig {
            input_dim: 0,
            hidden_dims: vec![4],
            output_dim: 2,
        };
        assert!(QNetwork::new(config, &mut rng).is_err());
        let config = QNetworkConfig {
            input_dim: 3,
            hidden_dims: vec![0],
            output_dim: 2,
        };
        assert!(QNetwork::new(config, &mut rng).is_err());
    }

    #[test]
    fn parameters_round_trip() {
        let mut rng = StdRng::seed_from_u64(5);
        let network = small_network(&mut rng);
        let mut other = small_network(&mut rng);
        let params = network.parameters();
        assert_eq!(params.len(), network.num_parameters());
        other.set_parameters(&params).unwrap();
        assert_eq!(other.parameters(), params);

        assert!(other.set_parameters(&params[1..]).is_err());
    }

    #[test]
    fn sync_makes_outputs_equal_and_then_freezes() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut primary = small_network(&mut rng);
        let mut target = small_network(&mut rng);
        let input = arr1(&[0.2, 0.4, 0.6]);

        target.sync_from(&primary).unwrap();
        assert_eq!(primary.forward(&input.view()), target.forward(&input.view()));

        // Changing the primary afterwards must not move the target
        let frozen = target.forward(&input.view());
        let mut params = primary.parameters();
        for p in &mut params {
            *p += 0.5;
        }
        primary.set_parameters(&params).unwrap();
        assert_eq!(target.forward(&input.view()), frozen);
        assert_ne!(primary.forward(&input.view()), frozen);
    }

    #[test]
    fn analytic_gradient_matches_finite_differences() {
        let mut rng = StdRng::seed_from_u64(13);
        let mut network = small_network(&mut rng);
        // Positive parameters and inputs keep every pre-activation well away
        // from the ReLU kink, so central differences stay valid
        let positive: Vec<f32> = network
            .parameters()
            .iter()
            .map(|p| p.abs() + 0.05)
            .collect();
        network.set_parameters(&positive).unwrap();
        let input = arr1(&[0.3, 0.2, 0.8]);

        // Loss = q[0]: the output gradient is a one-hot
        let mut grads = network.zero_gradients();
        let output_grad = arr1(&[1.0, 0.0]);
        network
            .accumulate_gradient(&input.view(), &output_grad, &mut grads)
            .unwrap();

        let mut flat_grads = Vec::new();
        for (w, b) in grads.weights.iter().zip(&grads.biases) {
            flat_grads.extend(w.iter().copied());
            flat_grads.extend(b.iter().copied());
        }

        let params = network.parameters();
        let h = 1e-3_f32;
        for (idx, &analytic) in flat_grads.iter().enumerate() {
            let mut perturbed = network.clone();
            let mut plus = params.clone();
            plus[idx] += h;
            perturbed.set_parameters(&plus).unwrap();
            let q_plus = perturbed.forward(&input.view())[0];

            let mut minus = params.clone();
            minus[idx] -= h;
            perturbed.set_parameters(&minus).unwrap();
            let q_minus = perturbed.forward(&input.view())[0];

            let numeric = (q_plus - q_minus) / (2.0 * h);
            assert_relative_eq!(analytic, numeric, epsilon = 2e-2, max_relative = 2e-2);
        }
    }

    #[test]
    fn adam_descends_a_simple_objective() {
        let mut rng = StdRng::seed_from_u64(21);
        let mut network = small_network(&mut rng);
        let mut optimizer = Adam::new(1e-2, 1e-8, 0.0);
        let input = arr1(&[0.5, 0.5, 0.5]);
        let target = 1.0_f32;

        let mut first_loss = None;
        let mut last_loss = 0.0;
        for _ in 0..200 {
            let q = network.forward(&input.view());
            let err = q[0] - target;
            last_loss = err * err;
            first_loss.get_or_insert(last_loss);

            let mut grads = network.zero_gradients();
            let output_grad = arr1(&[2.0 * err, 0.0]);
            network
                .accumulate_gradient(&input.view(), &output_grad, &mut grads)
                .unwrap();
            optimizer.step(&mut network, &grads).unwrap();
        }
        // The head bias alone can fit a scalar target, so this must converge
        assert!(last_loss < 0.05);
        assert!(last_loss < first_loss.unwrap());
    }

    #[test]
    fn gradient_shape_mismatch_is_a_precondition_error() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut network = small_network(&mut rng);
        let config = QNetworkConfig {
            input_dim: 2,
            hidden_dims: vec![3],
            output_dim: 2,
        };
        let other = QNetwork::new(config, &mut rng).unwrap();
        let grads = other.zero_gradients();
        let mut optimizer = Adam::new(1e-3, 1e-8, 0.0);
        assert!(optimizer.step(&mut network, &grads).is_err());
        assert!(network.sync_from(&other).is_err());
    }
}
