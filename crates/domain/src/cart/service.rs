use common::{ProductId, SessionId};
use store::{CartContents, CartSessionStore, CatalogStore, Product};

use super::{CartError, CartLine, CartSettings, CartSnapshotLine, CartSummary};

/// Entry point for cart operations.
///
/// Carts are stored per session in a [`CartSessionStore`]; prices and stock
/// are always read from the catalog at the time of the call, never cached.
#[derive(Clone)]
pub struct CartService<S> {
    store: S,
    settings: CartSettings,
}

impl<S> CartService<S>
where
    S: CatalogStore + CartSessionStore,
{
    pub fn new(store: S, settings: CartSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &CartSettings {
        &self.settings
    }

    /// Returns a handle on one session's cart.
    pub fn for_session(&self, session: SessionId) -> Cart<'_, S> {
        Cart {
            service: self,
            session,
        }
    }
}

/// One session's cart. Every mutation is a read-modify-write of that
/// session's contents only.
pub struct Cart<'a, S> {
    service: &'a CartService<S>,
    session: SessionId,
}

impl<S> Cart<'_, S>
where
    S: CatalogStore + CartSessionStore,
{
    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// Adds units of a product, merging with any quantity already held.
    #[tracing::instrument(skip(self), fields(session = %self.session))]
    pub async fn add(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Vec<CartLine>, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity { quantity });
        }

        let product = self.sellable_product(product_id).await?;
        let mut contents = self.contents().await?;
        let requested = contents
            .get(&product_id)
            .copied()
            .unwrap_or(0)
            .saturating_add(quantity);
        ensure_stock(&product, requested)?;

        contents.insert(product_id, requested);
        self.save(contents, "add").await?;
        self.items().await
    }

    /// Sets the quantity of a product. Zero removes it.
    #[tracing::instrument(skip(self), fields(session = %self.session))]
    pub async fn update(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Vec<CartLine>, CartError> {
        if quantity == 0 {
            return self.remove(product_id).await;
        }

        let product = self.sellable_product(product_id).await?;
        ensure_stock(&product, quantity)?;

        let mut contents = self.contents().await?;
        contents.insert(product_id, quantity);
        self.save(contents, "update").await?;
        self.items().await
    }

    /// Removes a product. Removing a product that isn't in the cart is not an error.
    #[tracing::instrument(skip(self), fields(session = %self.session))]
    pub async fn remove(&self, product_id: ProductId) -> Result<Vec<CartLine>, CartError> {
        let mut contents = self.contents().await?;
        if contents.remove(&product_id).is_some() {
            self.save(contents, "remove").await?;
        }
        self.items().await
    }

    #[tracing::instrument(skip(self), fields(session = %self.session))]
    pub async fn clear(&self) -> Result<(), CartError> {
        self.service.store.clear_cart(&self.session).await?;
        metrics::counter!("cart_mutations_total", "operation" => "clear").increment(1);
        Ok(())
    }

    /// Prices every entry against the live catalog.
    ///
    /// Entries whose product was deleted or deactivated are skipped without
    /// error.
    pub async fn items(&self) -> Result<Vec<CartLine>, CartError> {
        let contents = self.contents().await?;
        if contents.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<ProductId> = contents.keys().copied().collect();
        let products = self.service.store.find_products(&ids).await?;

        let lines = contents
            .iter()
            .filter_map(|(product_id, &quantity)| {
                let product = products
                    .iter()
                    .find(|p| p.id == *product_id && p.is_active)?;
                let unit_price = product.final_price();
                Some(CartLine {
                    product_id: *product_id,
                    name: product.name.clone(),
                    sku: product.sku.clone(),
                    quantity,
                    unit_price,
                    subtotal: unit_price.multiply(quantity),
                    available_stock: product.stock_quantity,
                    in_stock: product.has_stock_for(quantity),
                })
            })
            .collect();
        Ok(lines)
    }

    pub async fn summary(&self) -> Result<CartSummary, CartError> {
        let items = self.items().await?;
        Ok(CartSummary::from_lines(items, &self.service.settings))
    }

    /// The lines to hand to checkout.
    pub async fn snapshot(&self) -> Result<Vec<CartSnapshotLine>, CartError> {
        Ok(self.items().await?.iter().map(CartSnapshotLine::from).collect())
    }

    async fn contents(&self) -> Result<CartContents, CartError> {
        Ok(self.service.store.load_cart(&self.session).await?)
    }

    async fn save(&self, contents: CartContents, operation: &'static str) -> Result<(), CartError> {
        self.service.store.save_cart(&self.session, contents).await?;
        metrics::counter!("cart_mutations_total", "operation" => operation).increment(1);
        Ok(())
    }

    async fn sellable_product(&self, product_id: ProductId) -> Result<Product, CartError> {
        match self.service.store.find_product(product_id).await? {
            Some(product) if product.is_active => Ok(product),
            _ => Err(CartError::ProductNotFound(product_id)),
        }
    }
}

fn ensure_stock(product: &Product, requested: u32) -> Result<(), CartError> {
    if product.has_stock_for(requested) {
        Ok(())
    } else {
        Err(CartError::InsufficientStock {
            product_id: product.id,
            product_name: product.name.clone(),
            requested,
            available: product.stock_quantity,
        })
    }
}
