use async_trait::async_trait;

use crate::paper::{ClassLevel, Paper, PaperDraft, PaperId, SlugPath, Subject, SubjectListing, Term, TermListing};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Slug already taken: {0}")]
    DuplicateSlug(String),

    #[error("Could not allocate a unique slug for '{base}' after {attempts} attempts")]
    SlugExhausted { base: String, attempts: u32 },

    #[error("Catalog backend failure: {0}")]
    Backend(String),
}

/// Read access to the Class → Term → Subject → Paper hierarchy, plus the
/// narrow write surface needed to create papers.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn paper(&self, id: PaperId) -> Result<Option<Paper>, CatalogError>;

    /// One round trip for a set of ids. Unknown ids are simply absent from
    /// the result; order is unspecified.
    async fn papers_by_ids(&self, ids: &[PaperId]) -> Result<Vec<Paper>, CatalogError>;

    /// Resolves a navigation path. Only available papers match.
    async fn paper_by_path(&self, path: &SlugPath) -> Result<Option<Paper>, CatalogError>;

    async fn paper_by_slug(&self, slug: &str) -> Result<Option<Paper>, CatalogError>;

    async fn slug_exists(&self, slug: &str) -> Result<bool, CatalogError>;

    async fn class_level(&self, id: i64) -> Result<Option<ClassLevel>, CatalogError>;

    async fn term(&self, id: i64) -> Result<Option<Term>, CatalogError>;

    async fn subject(&self, id: i64) -> Result<Option<Subject>, CatalogError>;

    async fn list_classes(&self) -> Result<Vec<ClassLevel>, CatalogError>;

    async fn class_by_slug(&self, slug: &str) -> Result<Option<ClassLevel>, CatalogError>;

    async fn term_by_slug(&self, class_id: i64, slug: &str) -> Result<Option<Term>, CatalogError>;

    /// Every term of the class by name, including terms with no papers.
    async fn terms_for_class(&self, class_id: i64) -> Result<Vec<TermListing>, CatalogError>;

    /// Subjects that have available papers in the term, by name.
    async fn subjects_for_term(&self, term_id: i64) -> Result<Vec<SubjectListing>, CatalogError>;

    /// Available papers in the term, by subject name then title.
    async fn papers_for_term(&self, term_id: i64) -> Result<Vec<Paper>, CatalogError>;

    async fn count_available_papers(&self) -> Result<i64, CatalogError>;

    async fn increment_views(&self, id: PaperId) -> Result<(), CatalogError>;

    /// Fails with `DuplicateSlug` if the slug was taken concurrently.
    async fn insert_paper(&self, draft: PaperDraft) -> Result<Paper, CatalogError>;
}
