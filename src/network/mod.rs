//! Network models and the parameter store they expose to optimizers.
//!
//! - [`TwoLayerNet`]: `affine -> relu -> affine -> softmax`
//! - [`FullyConnectedNet`]: `{affine -> [batchnorm] -> relu -> [dropout]} x (L - 1) -> affine -> softmax`

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::{NetError, Result};

pub mod blocks;
pub mod fully_connected;
pub mod params;
pub mod traits;
pub mod two_layer;

pub use blocks::{BlockCache, HiddenBlock};
pub use fully_connected::{FullyConnectedConfig, FullyConnectedNet};
pub use params::{Gradients, LayerParams, NormParams, ParamKind, ParamName, ParamStore};
pub use traits::{Classifier, LossOutput};
pub use two_layer::TwoLayerNet;

pub(crate) fn check_dim(name: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(NetError::invalid_parameter(name, "must be positive"));
    }
    Ok(())
}

pub(crate) fn check_non_negative(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(NetError::invalid_parameter(
            name.to_string(),
            format!("must be finite and non-negative, got {}", value),
        ));
    }
    Ok(())
}

/// Serialize `value` with bincode and write it to `path`.
pub(crate) fn save_to<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<()> {
    let serialized = bincode::serialize(value)?;
    let mut file = fs::File::create(path)?;
    file.write_all(&serialized)?;
    Ok(())
}

pub(crate) fn load_from<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let mut file = fs::File::open(path)?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;
    Ok(bincode::deserialize(&buffer)?)
}
