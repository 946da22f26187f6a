use examshop_catalog::{Paper, PaperId};
use examshop_core::{Quantity, SessionError, SessionId, SessionStore};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::cart::{Cart, CartLine};
use crate::CartError;

/// Session key under which the serialized cart lives.
pub const CART_SESSION_KEY: &str = "cart";

/// A cart bound to the session that owns it. Mutations go through here so
/// the session copy is rewritten whenever the cart changes.
pub struct CartSession {
    store: Arc<dyn SessionStore>,
    session: SessionId,
    cart: Cart,
}

impl CartSession {
    /// Loads the session's cart, or starts an empty one. A cart that cannot
    /// be decoded is discarded rather than failing the request.
    pub async fn load(store: Arc<dyn SessionStore>, session: SessionId) -> Result<Self, CartError> {
        let cart = match store.get(&session, CART_SESSION_KEY).await? {
            None => Cart::new(),
            Some(raw) => match decode(&raw) {
                Ok(cart) => cart,
                Err(e) => {
                    tracing::warn!("Discarding unreadable cart for session {}: {}", session, e);
                    Cart::new()
                }
            },
        };

        Ok(Self { store, session, cart })
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session
    }

    pub async fn add(&mut self, paper: &Paper, quantity: Quantity, override_quantity: bool) -> Result<(), CartError> {
        self.cart.add(paper, quantity, override_quantity);
        self.save().await
    }

    pub async fn remove(&mut self, paper_id: PaperId) -> Result<(), CartError> {
        self.cart.remove(paper_id);
        self.save().await
    }

    /// Writes the cart back if it changed since it was loaded or last saved.
    pub async fn save(&mut self) -> Result<(), CartError> {
        if !self.cart.is_dirty() {
            return Ok(());
        }

        let encoded = serde_json::to_string(self.cart.raw_lines()).map_err(|e| CartError::Encode(e.to_string()))?;
        self.store.set(&self.session, CART_SESSION_KEY, &encoded).await?;
        self.cart.mark_clean();
        Ok(())
    }

    /// Empties the cart and deletes its session entry.
    pub async fn clear(&mut self) -> Result<(), CartError> {
        self.cart.clear();
        self.store.remove(&self.session, CART_SESSION_KEY).await?;
        self.cart.mark_clean();
        Ok(())
    }
}

fn decode(raw: &str) -> Result<Cart, SessionError> {
    serde_json::from_str::<BTreeMap<PaperId, CartLine>>(raw)
        .map(Cart::from_lines)
        .map_err(|e| SessionError::Corrupt {
            key: CART_SESSION_KEY.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::tests::paper;
    use examshop_core::InMemorySessionStore;
    use rust_decimal::Decimal;

    fn store() -> Arc<dyn SessionStore> {
        Arc::new(InMemorySessionStore::new())
    }

    #[tokio::test]
    async fn test_cart_survives_reload() {
        let store = store();
        let session = SessionId::generate();

        let mut cart = CartSession::load(store.clone(), session.clone()).await.unwrap();
        cart.add(&paper(1, 1000), Quantity::new(2).unwrap(), false).await.unwrap();
        cart.add(&paper(2, 500), Quantity::ONE, false).await.unwrap();

        let reloaded = CartSession::load(store.clone(), session).await.unwrap();
        assert_eq!(reloaded.cart().total_item_count(), 3);
        assert_eq!(reloaded.cart().total_price(), Decimal::new(2500, 2));
        assert!(!reloaded.cart().is_dirty());
    }

    #[tokio::test]
    async fn test_serialized_shape() {
        let store = store();
        let session = SessionId::generate();

        let mut cart = CartSession::load(store.clone(), session.clone()).await.unwrap();
        cart.add(&paper(7, 1050), Quantity::new(2).unwrap(), false).await.unwrap();

        let raw = store.get(&session, CART_SESSION_KEY).await.unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["7"]["quantity"], 2);
        assert_eq!(json["7"]["price"], "10.50");
    }

    #[tokio::test]
    async fn test_clear_removes_session_entry() {
        let store = store();
        let session = SessionId::generate();

        let mut cart = CartSession::load(store.clone(), session.clone()).await.unwrap();
        cart.add(&paper(1, 1000), Quantity::ONE, false).await.unwrap();
        cart.clear().await.unwrap();

        assert!(cart.cart().is_empty());
        assert_eq!(cart.cart().total_item_count(), 0);
        assert_eq!(store.get(&session, CART_SESSION_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sessions_do_not_share_carts() {
        let store = store();
        let mut first = CartSession::load(store.clone(), SessionId::generate()).await.unwrap();
        first.add(&paper(1, 1000), Quantity::ONE, false).await.unwrap();

        let second = CartSession::load(store.clone(), SessionId::generate()).await.unwrap();
        assert!(second.cart().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_cart_is_discarded() {
        let store = store();
        let session = SessionId::generate();
        store.set(&session, CART_SESSION_KEY, "not json").await.unwrap();

        let cart = CartSession::load(store.clone(), session).await.unwrap();
        assert!(cart.cart().is_empty());
    }
}
