pub mod quantile_mask;
pub mod types;
pub mod update_rules;

pub mod nmf;
pub mod qmu;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-exports for convenience
pub use nmf::{nmf, Nmf};
pub use qmu::{qmu, Qmu};
pub use quantile_mask::quantile_mask;
pub use types::{
    FactorizationError, Factorizer, NmfConfig, NmfOutput, QmuConfig, QmuOutput, Trajectory,
};
pub use update_rules::relative_error;
