pub mod gradient_check;
pub mod numerical_check;

pub use gradient_check::{check_model_gradients, eval_numerical_gradient, gradient_norms, rel_error};
pub use numerical_check::{check_gradients, check_params, NumericalIssue};
