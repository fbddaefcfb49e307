use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    /// Invalid parameters, detected before any draw is made.
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    /// A density or integrand produced a value outside its allowed range.
    #[error("{what} evaluated to {value} at {at}")]
    NumericDomain {
        what: &'static str,
        value: f64,
        at: String,
    },
    #[error("Could not construct proposal distribution")]
    Proposal(#[from] rand_distr::NormalError),
}

impl SimError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        SimError::Configuration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, SimError>;
