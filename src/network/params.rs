use ndarray::{Array1, Array2, ArrayViewD, ArrayViewMutD};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{NetError, Result};
use crate::types::Scalar;

/// Which tensor of a layer a parameter name refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ParamKind {
    Weight,
    Bias,
    Gamma,
    Beta,
}

impl ParamKind {
    fn prefix(self) -> &'static str {
        match self {
            ParamKind::Weight => "W",
            ParamKind::Bias => "b",
            ParamKind::Gamma => "gamma",
            ParamKind::Beta => "beta",
        }
    }
}

/// Name of a single parameter tensor, e.g. `W3` or `gamma2`.
///
/// Layers are numbered from 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParamName {
    pub layer: usize,
    pub kind: ParamKind,
}

impl ParamName {
    pub fn new(kind: ParamKind, layer: usize) -> Self {
        ParamName { layer, kind }
    }

    pub fn weight(layer: usize) -> Self {
        ParamName::new(ParamKind::Weight, layer)
    }

    pub fn bias(layer: usize) -> Self {
        ParamName::new(ParamKind::Bias, layer)
    }

    pub fn gamma(layer: usize) -> Self {
        ParamName::new(ParamKind::Gamma, layer)
    }

    pub fn beta(layer: usize) -> Self {
        ParamName::new(ParamKind::Beta, layer)
    }
}

impl fmt::Display for ParamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.layer)
    }
}

impl FromStr for ParamName {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self> {
        // Longer prefixes first so "beta" is not read as "b" + "eta"
        let kinds = [ParamKind::Gamma, ParamKind::Beta, ParamKind::Weight, ParamKind::Bias];
        kinds
            .iter()
            .find_map(|&kind| {
                let index = s.strip_prefix(kind.prefix())?;
                if !index.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                match index.parse::<usize>() {
                    Ok(layer) if layer > 0 => Some(ParamName::new(kind, layer)),
                    _ => None,
                }
            })
            .ok_or_else(|| NetError::UnknownParameter(s.to_string()))
    }
}

/// Batch normalization scale and shift of a hidden layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormParams<F> {
    pub gamma: Array1<F>,
    pub beta: Array1<F>,
}

/// Learnable tensors of one affine layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerParams<F> {
    /// `[in_dim, out_dim]`
    pub weights: Array2<F>,
    /// `[out_dim]`
    pub biases: Array1<F>,
    pub norm: Option<NormParams<F>>,
}

impl<F: Scalar> LayerParams<F> {
    pub fn input_dim(&self) -> usize {
        self.weights.nrows()
    }

    pub fn output_dim(&self) -> usize {
        self.weights.ncols()
    }

    fn views(&self, layer: usize) -> Vec<(ParamName, ArrayViewD<'_, F>)> {
        let mut views = vec![
            (ParamName::weight(layer), self.weights.view().into_dyn()),
            (ParamName::bias(layer), self.biases.view().into_dyn()),
        ];
        if let Some(norm) = &self.norm {
            views.push((ParamName::gamma(layer), norm.gamma.view().into_dyn()));
            views.push((ParamName::beta(layer), norm.beta.view().into_dyn()));
        }
        views
    }

    fn views_mut(&mut self, layer: usize) -> Vec<(ParamName, ArrayViewMutD<'_, F>)> {
        let LayerParams { weights, biases, norm } = self;
        let mut views = vec![
            (ParamName::weight(layer), weights.view_mut().into_dyn()),
            (ParamName::bias(layer), biases.view_mut().into_dyn()),
        ];
        if let Some(NormParams { gamma, beta }) = norm {
            views.push((ParamName::gamma(layer), gamma.view_mut().into_dyn()));
            views.push((ParamName::beta(layer), beta.view_mut().into_dyn()));
        }
        views
    }
}

/// Ordered per-layer parameter storage with a name-keyed view for optimizers.
///
/// Gradients share this type, so a gradient map always carries the same keys
/// and shapes as the parameters it was computed for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParamStore<F> {
    layers: Vec<LayerParams<F>>,
}

/// Gradient of the loss with respect to every entry of a [`ParamStore`].
pub type Gradients<F> = ParamStore<F>;

impl<F: Scalar> ParamStore<F> {
    pub fn new(layers: Vec<LayerParams<F>>) -> Self {
        ParamStore { layers }
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn layers(&self) -> &[LayerParams<F>] {
        &self.layers
    }

    /// Layer by 1-based index.
    pub fn layer(&self, layer: usize) -> Option<&LayerParams<F>> {
        layer.checked_sub(1).and_then(|i| self.layers.get(i))
    }

    pub fn layer_mut(&mut self, layer: usize) -> Option<&mut LayerParams<F>> {
        layer.checked_sub(1).and_then(move |i| self.layers.get_mut(i))
    }

    /// Parameter names in canonical order: `W, b, gamma, beta` per layer.
    pub fn names(&self) -> Vec<ParamName> {
        self.iter().map(|(name, _)| name).collect()
    }

    pub fn get(&self, name: &ParamName) -> Option<ArrayViewD<'_, F>> {
        let layer = self.layer(name.layer)?;
        match name.kind {
            ParamKind::Weight => Some(layer.weights.view().into_dyn()),
            ParamKind::Bias => Some(layer.biases.view().into_dyn()),
            ParamKind::Gamma => layer.norm.as_ref().map(|n| n.gamma.view().into_dyn()),
            ParamKind::Beta => layer.norm.as_ref().map(|n| n.beta.view().into_dyn()),
        }
    }

    pub fn get_mut(&mut self, name: &ParamName) -> Option<ArrayViewMutD<'_, F>> {
        let layer = self.layer_mut(name.layer)?;
        match name.kind {
            ParamKind::Weight => Some(layer.weights.view_mut().into_dyn()),
            ParamKind::Bias => Some(layer.biases.view_mut().into_dyn()),
            ParamKind::Gamma => layer.norm.as_mut().map(|n| n.gamma.view_mut().into_dyn()),
            ParamKind::Beta => layer.norm.as_mut().map(|n| n.beta.view_mut().into_dyn()),
        }
    }

    /// String-keyed lookup, e.g. `store.by_name("gamma2")`.
    pub fn by_name(&self, name: &str) -> Result<ArrayViewD<'_, F>> {
        let parsed: ParamName = name.parse()?;
        self.get(&parsed).ok_or_else(|| NetError::UnknownParameter(name.to_string()))
    }

    pub fn by_name_mut(&mut self, name: &str) -> Result<ArrayViewMutD<'_, F>> {
        let parsed: ParamName = name.parse()?;
        self.get_mut(&parsed).ok_or_else(|| NetError::UnknownParameter(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (ParamName, ArrayViewD<'_, F>)> {
        self.layers
            .iter()
            .enumerate()
            .flat_map(|(i, layer)| layer.views(i + 1))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ParamName, ArrayViewMutD<'_, F>)> {
        self.layers
            .iter_mut()
            .enumerate()
            .flat_map(|(i, layer)| layer.views_mut(i + 1))
    }

    /// Total number of scalar entries across all tensors.
    pub fn num_parameters(&self) -> usize {
        self.iter().map(|(_, view)| view.len()).sum()
    }

    /// `sum_i ||W_i||_F^2` over the weight matrices only.
    pub fn squared_weight_norm(&self) -> F {
        self.layers
            .iter()
            .map(|layer| layer.weights.iter().map(|&w| w * w).sum::<F>())
            .sum()
    }

    /// True when both stores hold the same names with the same shapes.
    pub fn same_structure(&self, other: &ParamStore<F>) -> bool {
        self.num_layers() == other.num_layers()
            && self
                .iter()
                .zip(other.iter())
                .all(|((a, va), (b, vb))| a == b && va.shape() == vb.shape())
    }

    /// Check that consecutive layers chain from `input_dim` to `num_classes`
    /// and that every bias, gamma and beta matches its layer's output width.
    ///
    /// Optimizers may rewrite the store between calls, so the models run this
    /// before every forward pass.
    pub fn check_chain(&self, input_dim: usize, num_classes: usize) -> Result<()> {
        let mut width = input_dim;
        for (i, layer) in self.layers.iter().enumerate() {
            let layer_index = i + 1;
            if layer.input_dim() != width {
                return Err(NetError::dimension_mismatch(
                    format!("{} with {} rows", ParamName::weight(layer_index), width),
                    format!("{} rows", layer.input_dim()),
                ));
            }

            width = layer.output_dim();
            let mut vectors = vec![(ParamName::bias(layer_index), layer.biases.len())];
            if let Some(norm) = &layer.norm {
                vectors.push((ParamName::gamma(layer_index), norm.gamma.len()));
                vectors.push((ParamName::beta(layer_index), norm.beta.len()));
            }
            if let Some((name, len)) = vectors.into_iter().find(|&(_, len)| len != width) {
                return Err(NetError::dimension_mismatch(
                    format!("{} of length {}", name, width),
                    format!("length {}", len),
                ));
            }
        }

        if width != num_classes {
            return Err(NetError::dimension_mismatch(
                format!("{} output classes", num_classes),
                format!("{} outputs", width),
            ));
        }
        Ok(())
    }

    /// Update every entry in place from the matching entry of `other`.
    ///
    /// This is the hook an external optimizer uses, e.g.
    /// `params.zip_mut_with(&grads, |p, &g| *p -= lr * g)`.
    pub fn zip_mut_with<G>(&mut self, other: &ParamStore<F>, mut f: G) -> Result<()>
    where
        G: FnMut(&mut F, &F),
    {
        if !self.same_structure(other) {
            return Err(NetError::dimension_mismatch(
                format!("{:?}", self.names()),
                format!("{:?}", other.names()),
            ));
        }
        for ((_, mut target), (_, source)) in self.iter_mut().zip(other.iter()) {
            target.zip_mut_with(&source, |t, s| f(t, s));
        }
        Ok(())
    }
}
