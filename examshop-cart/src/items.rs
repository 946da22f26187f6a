use examshop_catalog::{CatalogError, CatalogStore, Paper, PaperId};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

use crate::cart::Cart;

/// A cart line joined with its catalog entry.
#[derive(Debug, Clone, Serialize)]
pub struct CartItem {
    pub paper: Paper,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

/// Snapshot of a cart resolved against the catalog. Iterating it is
/// repeatable; lines whose paper has left the catalog are listed in
/// `missing` instead of `items`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolvedCart {
    items: Vec<CartItem>,
    missing: Vec<PaperId>,
}

impl ResolvedCart {
    pub fn iter(&self) -> std::slice::Iter<'_, CartItem> {
        self.items.iter()
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn missing(&self) -> &[PaperId] {
        &self.missing
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Sum over the resolved items only.
    pub fn total_price(&self) -> Decimal {
        self.items.iter().map(|item| item.total_price).sum()
    }
}

impl<'a> IntoIterator for &'a ResolvedCart {
    type Item = &'a CartItem;
    type IntoIter = std::slice::Iter<'a, CartItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl Cart {
    /// Joins every line with its paper using a single batched lookup.
    pub async fn resolve(&self, catalog: &dyn CatalogStore) -> Result<ResolvedCart, CatalogError> {
        if self.is_empty() {
            return Ok(ResolvedCart::default());
        }

        let papers: HashMap<PaperId, Paper> = catalog
            .papers_by_ids(&self.paper_ids())
            .await?
            .into_iter()
            .map(|paper| (paper.id, paper))
            .collect();

        let mut resolved = ResolvedCart::default();
        for (paper_id, line) in self.raw_lines() {
            match papers.get(paper_id) {
                Some(paper) => resolved.items.push(CartItem {
                    paper: paper.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    total_price: line.total_price(),
                }),
                None => {
                    tracing::warn!("Cart references paper {} which is no longer in the catalog", paper_id);
                    resolved.missing.push(*paper_id);
                }
            }
        }

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::tests::paper;
    use counting::CountingCatalog;
    use examshop_catalog::{create_paper, CatalogSettings, ExamType, InMemoryCatalog, NewPaper};
    use examshop_core::Quantity;
    use std::sync::atomic::AtomicUsize;

    mod counting {
        use examshop_catalog::{
            CatalogError, CatalogStore, ClassLevel, InMemoryCatalog, Paper, PaperDraft, PaperId, SlugPath,
            Subject, SubjectListing, Term, TermListing,
        };
        use std::sync::atomic::{AtomicUsize, Ordering};

        /// Wraps the in-memory catalog and counts batched lookups.
        pub struct CountingCatalog {
            pub inner: InMemoryCatalog,
            pub batch_calls: AtomicUsize,
            pub single_calls: AtomicUsize,
        }

        impl CountingCatalog {
            pub fn batches(&self) -> usize {
                self.batch_calls.load(Ordering::SeqCst)
            }

            pub fn singles(&self) -> usize {
                self.single_calls.load(Ordering::SeqCst)
            }
        }

        #[async_trait::async_trait]
        impl CatalogStore for CountingCatalog {
            async fn paper(&self, id: PaperId) -> Result<Option<Paper>, CatalogError> {
                self.single_calls.fetch_add(1, Ordering::SeqCst);
                self.inner.paper(id).await
            }
            async fn papers_by_ids(&self, ids: &[PaperId]) -> Result<Vec<Paper>, CatalogError> {
                self.batch_calls.fetch_add(1, Ordering::SeqCst);
                self.inner.papers_by_ids(ids).await
            }
            async fn paper_by_path(&self, path: &SlugPath) -> Result<Option<Paper>, CatalogError> {
                self.inner.paper_by_path(path).await
            }
            async fn paper_by_slug(&self, slug: &str) -> Result<Option<Paper>, CatalogError> {
                self.inner.paper_by_slug(slug).await
            }
            async fn slug_exists(&self, slug: &str) -> Result<bool, CatalogError> {
                self.inner.slug_exists(slug).await
            }
            async fn class_level(&self, id: i64) -> Result<Option<ClassLevel>, CatalogError> {
                self.inner.class_level(id).await
            }
            async fn term(&self, id: i64) -> Result<Option<Term>, CatalogError> {
                self.inner.term(id).await
            }
            async fn subject(&self, id: i64) -> Result<Option<Subject>, CatalogError> {
                self.inner.subject(id).await
            }
            async fn list_classes(&self) -> Result<Vec<ClassLevel>, CatalogError> {
                self.inner.list_classes().await
            }
            async fn class_by_slug(&self, slug: &str) -> Result<Option<ClassLevel>, CatalogError> {
                self.inner.class_by_slug(slug).await
            }
            async fn term_by_slug(&self, class_id: i64, slug: &str) -> Result<Option<Term>, CatalogError> {
                self.inner.term_by_slug(class_id, slug).await
            }
            async fn terms_for_class(&self, class_id: i64) -> Result<Vec<TermListing>, CatalogError> {
                self.inner.terms_for_class(class_id).await
            }
            async fn subjects_for_term(&self, term_id: i64) -> Result<Vec<SubjectListing>, CatalogError> {
                self.inner.subjects_for_term(term_id).await
            }
            async fn papers_for_term(&self, term_id: i64) -> Result<Vec<Paper>, CatalogError> {
                self.inner.papers_for_term(term_id).await
            }
            async fn count_available_papers(&self) -> Result<i64, CatalogError> {
                self.inner.count_available_papers().await
            }
            async fn increment_views(&self, id: PaperId) -> Result<(), CatalogError> {
                self.inner.increment_views(id).await
            }
            async fn insert_paper(&self, draft: PaperDraft) -> Result<Paper, CatalogError> {
                self.inner.insert_paper(draft).await
            }
        }
    }

    async fn catalog_with(prices: &[i64]) -> (CountingCatalog, Vec<Paper>) {
        let inner = InMemoryCatalog::new();
        let class_level = inner.add_class("JHS 3", "jhs-3").await;
        let term = inner.add_term(class_level.id, "Term 1", "term-1").await;
        let subject = inner.add_subject("English", "english").await;

        let mut papers = Vec::new();
        for (i, price) in prices.iter().enumerate() {
            let created = create_paper(
                &inner,
                NewPaper {
                    title: format!("Paper {}", i),
                    description: String::new(),
                    class_id: class_level.id,
                    term_id: term.id,
                    subject_id: subject.id,
                    year: 2024,
                    exam_type: ExamType::Mock,
                    price: Decimal::new(*price, 2),
                    pdf_url: "https://cdn.example.com/x.pdf".to_string(),
                    password: None,
                    is_paid: true,
                    is_available: true,
                    pages: 1,
                },
                &CatalogSettings::default(),
            )
            .await
            .unwrap();
            papers.push(created);
        }

        let catalog = CountingCatalog {
            inner,
            batch_calls: AtomicUsize::new(0),
            single_calls: AtomicUsize::new(0),
        };
        (catalog, papers)
    }

    #[tokio::test]
    async fn test_resolve_uses_one_batched_lookup() {
        let (catalog, papers) = catalog_with(&[1000, 500, 250]).await;
        let mut cart = Cart::new();
        for p in &papers {
            cart.add(p, Quantity::new(2).unwrap(), false);
        }

        let resolved = cart.resolve(&catalog).await.unwrap();

        assert_eq!(catalog.batches(), 1);
        assert_eq!(catalog.singles(), 0);
        assert_eq!(resolved.items().len(), 3);
        assert_eq!(resolved.total_price(), Decimal::new(3500, 2));
    }

    #[tokio::test]
    async fn test_resolve_is_restartable() {
        let (catalog, papers) = catalog_with(&[1000, 500]).await;
        let mut cart = Cart::new();
        cart.add(&papers[0], Quantity::new(2).unwrap(), false);
        cart.add(&papers[1], Quantity::ONE, false);

        let resolved = cart.resolve(&catalog).await.unwrap();
        let first: Vec<Decimal> = resolved.iter().map(|i| i.total_price).collect();
        let second: Vec<Decimal> = (&resolved).into_iter().map(|i| i.total_price).collect();

        assert_eq!(first, second);
        assert_eq!(first, vec![Decimal::new(2000, 2), Decimal::new(500, 2)]);
    }

    #[tokio::test]
    async fn test_missing_papers_are_skipped_and_reported() {
        let (catalog, papers) = catalog_with(&[1000, 500]).await;
        let mut cart = Cart::new();
        cart.add(&papers[0], Quantity::ONE, false);
        cart.add(&papers[1], Quantity::ONE, false);
        cart.add(&paper(9_999, 300), Quantity::ONE, false);

        catalog.inner.remove_paper(papers[1].id).await;
        let resolved = cart.resolve(&catalog).await.unwrap();

        assert_eq!(resolved.items().len(), 1);
        assert_eq!(resolved.items()[0].paper.id, papers[0].id);
        assert_eq!(resolved.missing(), &[papers[1].id, PaperId(9_999)]);
    }

    #[tokio::test]
    async fn test_empty_cart_skips_catalog() {
        let (catalog, _) = catalog_with(&[]).await;
        let resolved = Cart::new().resolve(&catalog).await.unwrap();

        assert!(resolved.is_empty());
        assert_eq!(catalog.batches(), 0);
    }
}
