use thiserror::Error;

/// Configuration errors raised while building a container.
///
/// Container operations themselves never fail: absence is reported through
/// `Option`, and a broken balance invariant panics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("order {order} is too small, multiway trees need at least {min}")]
    InvalidOrder { order: usize, min: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
