pub mod models;
pub mod sizer;
pub mod volatility;
#[cfg(test)]
mod tests;

pub use models::*;
pub use sizer::RiskSizer;
pub use volatility::estimate_volatility;
