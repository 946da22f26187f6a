pub mod models;
pub mod money;
pub mod pii;

pub use money::{from_minor_units, to_minor_units, MoneyError};
pub use pii::Masked;
