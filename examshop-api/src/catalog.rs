use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use examshop_catalog::{ClassLevel, Paper, SlugPath, Subject, SubjectListing, Term, TermListing};
use serde::Serialize;
use std::collections::HashMap;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/catalog", get(catalog_index))
        .route("/catalog/{class}", get(term_list))
        .route("/catalog/{class}/{term}", get(subject_list))
        .route("/catalog/{class}/{term}/{subject}/{paper}", get(paper_detail))
}

#[derive(Debug, Serialize)]
pub struct CatalogStats {
    pub total_papers: i64,
    pub total_downloads: i64,
}

#[derive(Debug, Serialize)]
pub struct CatalogIndex {
    pub classes: Vec<ClassLevel>,
    pub stats: CatalogStats,
}

/// GET /catalog
async fn catalog_index(State(state): State<AppState>) -> Result<Json<CatalogIndex>, AppError> {
    let classes = state.catalog.list_classes().await?;
    let total_papers = state.catalog.count_available_papers().await?;
    let total_downloads = state.downloads.count_downloads().await?;

    Ok(Json(CatalogIndex {
        classes,
        stats: CatalogStats {
            total_papers,
            total_downloads,
        },
    }))
}

#[derive(Debug, Serialize)]
pub struct TermList {
    pub class_level: ClassLevel,
    pub terms: Vec<TermListing>,
}

async fn find_class(state: &AppState, slug: &str) -> Result<ClassLevel, AppError> {
    state
        .catalog
        .class_by_slug(slug)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("Class {} not found", slug)))
}

/// GET /catalog/{class}
async fn term_list(State(state): State<AppState>, Path(class): Path<String>) -> Result<Json<TermList>, AppError> {
    let class_level = find_class(&state, &class).await?;
    let terms = state.catalog.terms_for_class(class_level.id).await?;
    Ok(Json(TermList { class_level, terms }))
}

#[derive(Debug, Serialize)]
pub struct SubjectPapers {
    #[serde(flatten)]
    pub subject: SubjectListing,
    pub papers: Vec<Paper>,
}

#[derive(Debug, Serialize)]
pub struct SubjectList {
    pub class_level: ClassLevel,
    pub term: Term,
    pub subjects: Vec<SubjectPapers>,
}

/// GET /catalog/{class}/{term}
/// Available papers of the term grouped under their subject.
async fn subject_list(
    State(state): State<AppState>,
    Path((class, term)): Path<(String, String)>,
) -> Result<Json<SubjectList>, AppError> {
    let class_level = find_class(&state, &class).await?;
    let term = state
        .catalog
        .term_by_slug(class_level.id, &term)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("Term {} not found", term)))?;

    let mut by_subject: HashMap<i64, Vec<Paper>> = HashMap::new();
    for paper in state.catalog.papers_for_term(term.id).await? {
        by_subject.entry(paper.subject_id).or_default().push(paper);
    }
    let subjects = state
        .catalog
        .subjects_for_term(term.id)
        .await?
        .into_iter()
        .map(|subject| SubjectPapers {
            papers: by_subject.remove(&subject.subject.id).unwrap_or_default(),
            subject,
        })
        .collect();

    Ok(Json(SubjectList {
        class_level,
        term,
        subjects,
    }))
}

#[derive(Debug, Serialize)]
pub struct PaperDetail {
    #[serde(flatten)]
    pub paper: Paper,
    pub exam_type_label: &'static str,
    pub class_level: Option<ClassLevel>,
    pub term: Option<Term>,
    pub subject: Option<Subject>,
}

/// GET /catalog/{class}/{term}/{subject}/{paper}
/// Counts a view on every successful lookup.
async fn paper_detail(
    State(state): State<AppState>,
    Path(path): Path<SlugPath>,
) -> Result<Json<PaperDetail>, AppError> {
    let mut paper = state
        .catalog
        .paper_by_path(&path)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("Paper {} not found", path.paper)))?;

    state.catalog.increment_views(paper.id).await?;
    paper.views += 1;

    let class_level = state.catalog.class_level(paper.class_id).await?;
    let term = state.catalog.term(paper.term_id).await?;
    let subject = state.catalog.subject(paper.subject_id).await?;

    Ok(Json(PaperDetail {
        exam_type_label: paper.exam_type.label(),
        paper,
        class_level,
        term,
        subject,
    }))
}
