pub mod cart;
pub mod items;
pub mod session;

pub use cart::{Cart, CartLine};
pub use items::{CartItem, ResolvedCart};
pub use session::{CartSession, CART_SESSION_KEY};

use examshop_catalog::CatalogError;
use examshop_core::SessionError;

#[derive(Debug, thiserror::Error)]
pub enum CartError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Failed to encode cart: {0}")]
    Encode(String),
}
