use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::paper::{ClassLevel, Paper, PaperDraft, PaperId, SlugPath, Subject, SubjectListing, Term, TermListing};
use crate::store::{CatalogError, CatalogStore};

#[derive(Default)]
struct CatalogData {
    classes: BTreeMap<i64, ClassLevel>,
    terms: BTreeMap<i64, Term>,
    subjects: BTreeMap<i64, Subject>,
    papers: BTreeMap<PaperId, Paper>,
    next_id: i64,
}

impl CatalogData {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn available(&self) -> impl Iterator<Item = &Paper> {
        self.papers.values().filter(|p| p.is_available)
    }

    fn subject_name(&self, id: i64) -> &str {
        self.subjects.get(&id).map(|s| s.name.as_str()).unwrap_or_default()
    }
}

fn count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Catalog held in process memory, for tests and local seeding.
#[derive(Default)]
pub struct InMemoryCatalog {
    data: RwLock<CatalogData>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_class(&self, name: &str, slug: &str) -> ClassLevel {
        let mut data = self.data.write().await;
        let class_level = ClassLevel {
            id: data.next_id(),
            name: name.to_string(),
            slug: slug.to_string(),
            description: String::new(),
        };
        data.classes.insert(class_level.id, class_level.clone());
        class_level
    }

    pub async fn add_term(&self, class_id: i64, name: &str, slug: &str) -> Term {
        let mut data = self.data.write().await;
        let term = Term {
            id: data.next_id(),
            class_id,
            name: name.to_string(),
            slug: slug.to_string(),
        };
        data.terms.insert(term.id, term.clone());
        term
    }

    pub async fn add_subject(&self, name: &str, slug: &str) -> Subject {
        let mut data = self.data.write().await;
        let subject = Subject {
            id: data.next_id(),
            name: name.to_string(),
            slug: slug.to_string(),
        };
        data.subjects.insert(subject.id, subject.clone());
        subject
    }

    /// Changes a paper's catalog price in place.
    pub async fn set_price(&self, id: PaperId, price: Decimal) -> Result<(), CatalogError> {
        let mut data = self.data.write().await;
        let paper = data
            .papers
            .get_mut(&id)
            .ok_or_else(|| CatalogError::NotFound(format!("paper {}", id)))?;
        paper.price = price;
        Ok(())
    }

    pub async fn set_available(&self, id: PaperId, available: bool) -> Result<(), CatalogError> {
        let mut data = self.data.write().await;
        let paper = data
            .papers
            .get_mut(&id)
            .ok_or_else(|| CatalogError::NotFound(format!("paper {}", id)))?;
        paper.is_available = available;
        Ok(())
    }

    pub async fn remove_paper(&self, id: PaperId) -> Option<Paper> {
        self.data.write().await.papers.remove(&id)
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn paper(&self, id: PaperId) -> Result<Option<Paper>, CatalogError> {
        Ok(self.data.read().await.papers.get(&id).cloned())
    }

    async fn papers_by_ids(&self, ids: &[PaperId]) -> Result<Vec<Paper>, CatalogError> {
        let data = self.data.read().await;
        Ok(ids.iter().filter_map(|id| data.papers.get(id).cloned()).collect())
    }

    async fn paper_by_path(&self, path: &SlugPath) -> Result<Option<Paper>, CatalogError> {
        let data = self.data.read().await;
        let found = data.papers.values().find(|paper| {
            let class_ok = data
                .classes
                .get(&paper.class_id)
                .is_some_and(|c| c.slug == path.class);
            let term_ok = data
                .terms
                .get(&paper.term_id)
                .is_some_and(|t| t.slug == path.term && t.class_id == paper.class_id);
            let subject_ok = data
                .subjects
                .get(&paper.subject_id)
                .is_some_and(|s| s.slug == path.subject);
            paper.is_available && paper.slug == path.paper && class_ok && term_ok && subject_ok
        });
        Ok(found.cloned())
    }

    async fn paper_by_slug(&self, slug: &str) -> Result<Option<Paper>, CatalogError> {
        let data = self.data.read().await;
        Ok(data.papers.values().find(|p| p.slug == slug).cloned())
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool, CatalogError> {
        Ok(self.data.read().await.papers.values().any(|p| p.slug == slug))
    }

    async fn class_level(&self, id: i64) -> Result<Option<ClassLevel>, CatalogError> {
        Ok(self.data.read().await.classes.get(&id).cloned())
    }

    async fn term(&self, id: i64) -> Result<Option<Term>, CatalogError> {
        Ok(self.data.read().await.terms.get(&id).cloned())
    }

    async fn subject(&self, id: i64) -> Result<Option<Subject>, CatalogError> {
        Ok(self.data.read().await.subjects.get(&id).cloned())
    }

    async fn list_classes(&self) -> Result<Vec<ClassLevel>, CatalogError> {
        let mut classes: Vec<ClassLevel> = self.data.read().await.classes.values().cloned().collect();
        classes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(classes)
    }

    async fn class_by_slug(&self, slug: &str) -> Result<Option<ClassLevel>, CatalogError> {
        let data = self.data.read().await;
        Ok(data.classes.values().find(|c| c.slug == slug).cloned())
    }

    async fn term_by_slug(&self, class_id: i64, slug: &str) -> Result<Option<Term>, CatalogError> {
        let data = self.data.read().await;
        Ok(data
            .terms
            .values()
            .find(|t| t.class_id == class_id && t.slug == slug)
            .cloned())
    }

    async fn terms_for_class(&self, class_id: i64) -> Result<Vec<TermListing>, CatalogError> {
        let data = self.data.read().await;
        let mut terms: Vec<TermListing> = data
            .terms
            .values()
            .filter(|t| t.class_id == class_id)
            .map(|t| TermListing {
                term: t.clone(),
                paper_count: count(data.available().filter(|p| p.term_id == t.id).count()),
            })
            .collect();
        terms.sort_by(|a, b| a.term.name.cmp(&b.term.name));
        Ok(terms)
    }

    async fn subjects_for_term(&self, term_id: i64) -> Result<Vec<SubjectListing>, CatalogError> {
        let data = self.data.read().await;
        let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
        for paper in data.available().filter(|p| p.term_id == term_id) {
            *counts.entry(paper.subject_id).or_default() += 1;
        }
        let mut subjects: Vec<SubjectListing> = counts
            .into_iter()
            .filter_map(|(id, n)| {
                data.subjects.get(&id).map(|subject| SubjectListing {
                    subject: subject.clone(),
                    paper_count: count(n),
                })
            })
            .collect();
        subjects.sort_by(|a, b| a.subject.name.cmp(&b.subject.name));
        Ok(subjects)
    }

    async fn papers_for_term(&self, term_id: i64) -> Result<Vec<Paper>, CatalogError> {
        let data = self.data.read().await;
        let mut papers: Vec<Paper> = data.available().filter(|p| p.term_id == term_id).cloned().collect();
        papers.sort_by(|a, b| {
            data.subject_name(a.subject_id)
                .cmp(data.subject_name(b.subject_id))
                .then_with(|| a.title.cmp(&b.title))
        });
        Ok(papers)
    }

    async fn count_available_papers(&self) -> Result<i64, CatalogError> {
        let data = self.data.read().await;
        Ok(count(data.available().count()))
    }

    async fn increment_views(&self, id: PaperId) -> Result<(), CatalogError> {
        if let Some(paper) = self.data.write().await.papers.get_mut(&id) {
            paper.views += 1;
        }
        Ok(())
    }

    async fn insert_paper(&self, draft: PaperDraft) -> Result<Paper, CatalogError> {
        let mut data = self.data.write().await;
        if data.papers.values().any(|p| p.slug == draft.slug) {
            return Err(CatalogError::DuplicateSlug(draft.slug));
        }

        let PaperDraft { paper, slug, password } = draft;
        let created = Paper {
            id: PaperId(data.next_id()),
            title: paper.title,
            description: paper.description,
            class_id: paper.class_id,
            term_id: paper.term_id,
            subject_id: paper.subject_id,
            slug,
            year: paper.year,
            exam_type: paper.exam_type,
            price: paper.price,
            pdf_url: paper.pdf_url,
            password,
            is_paid: paper.is_paid,
            is_available: paper.is_available,
            pages: paper.pages,
            views: 0,
            created_at: Utc::now(),
        };
        data.papers.insert(created.id, created.clone());
        Ok(created)
    }
}
