use async_trait::async_trait;
use chrono::{DateTime, Utc};
use examshop_catalog::{
    CatalogError, CatalogStore, ClassLevel, ExamType, Paper, PaperDraft, PaperId, SlugPath, Subject, SubjectListing,
    Term, TermListing,
};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::database::is_unique_violation;

pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const PAPER_COLUMNS: &str = "p.id, p.title, p.description, p.class_id, p.term_id, p.subject_id, p.slug, \
     p.year, p.exam_type, p.price, p.pdf_url, p.password, p.is_paid, p.is_available, p.pages, p.views, p.created_at";

#[derive(sqlx::FromRow)]
struct PaperRow {
    id: i64,
    title: String,
    description: String,
    class_id: i64,
    term_id: i64,
    subject_id: i64,
    slug: String,
    year: i32,
    exam_type: String,
    price: Decimal,
    pdf_url: String,
    password: Option<String>,
    is_paid: bool,
    is_available: bool,
    pages: i32,
    views: i64,
    created_at: DateTime<Utc>,
}

impl From<PaperRow> for Paper {
    fn from(row: PaperRow) -> Self {
        Paper {
            id: PaperId(row.id),
            title: row.title,
            description: row.description,
            class_id: row.class_id,
            term_id: row.term_id,
            subject_id: row.subject_id,
            slug: row.slug,
            year: row.year,
            exam_type: ExamType::parse(&row.exam_type).unwrap_or(ExamType::Others),
            price: row.price,
            pdf_url: row.pdf_url,
            password: row.password,
            is_paid: row.is_paid,
            is_available: row.is_available,
            pages: row.pages,
            views: row.views,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ClassRow {
    id: i64,
    name: String,
    slug: String,
    description: String,
}

impl From<ClassRow> for ClassLevel {
    fn from(r: ClassRow) -> Self {
        ClassLevel {
            id: r.id,
            name: r.name,
            slug: r.slug,
            description: r.description,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TermRow {
    id: i64,
    class_id: i64,
    name: String,
    slug: String,
}

impl From<TermRow> for Term {
    fn from(r: TermRow) -> Self {
        Term {
            id: r.id,
            class_id: r.class_id,
            name: r.name,
            slug: r.slug,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SubjectRow {
    id: i64,
    name: String,
    slug: String,
}

impl From<SubjectRow> for Subject {
    fn from(r: SubjectRow) -> Self {
        Subject {
            id: r.id,
            name: r.name,
            slug: r.slug,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TermCountRow {
    #[sqlx(flatten)]
    term: TermRow,
    paper_count: i64,
}

#[derive(sqlx::FromRow)]
struct SubjectCountRow {
    #[sqlx(flatten)]
    subject: SubjectRow,
    paper_count: i64,
}

fn backend(e: sqlx::Error) -> CatalogError {
    CatalogError::Backend(e.to_string())
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn paper(&self, id: PaperId) -> Result<Option<Paper>, CatalogError> {
        let row = sqlx::query_as::<_, PaperRow>(&format!("SELECT {} FROM papers p WHERE p.id = $1", PAPER_COLUMNS))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        Ok(row.map(Paper::from))
    }

    async fn papers_by_ids(&self, ids: &[PaperId]) -> Result<Vec<Paper>, CatalogError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.0).collect();
        let rows = sqlx::query_as::<_, PaperRow>(&format!(
            "SELECT {} FROM papers p WHERE p.id = ANY($1)",
            PAPER_COLUMNS
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows.into_iter().map(Paper::from).collect())
    }

    async fn paper_by_path(&self, path: &SlugPath) -> Result<Option<Paper>, CatalogError> {
        let row = sqlx::query_as::<_, PaperRow>(&format!(
            r#"
            SELECT {}
            FROM papers p
            JOIN class_levels c ON c.id = p.class_id
            JOIN terms t ON t.id = p.term_id AND t.class_id = p.class_id
            JOIN subjects s ON s.id = p.subject_id
            WHERE c.slug = $1 AND t.slug = $2 AND s.slug = $3 AND p.slug = $4 AND p.is_available
            "#,
            PAPER_COLUMNS
        ))
        .bind(&path.class)
        .bind(&path.term)
        .bind(&path.subject)
        .bind(&path.paper)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(row.map(Paper::from))
    }

    async fn paper_by_slug(&self, slug: &str) -> Result<Option<Paper>, CatalogError> {
        let row = sqlx::query_as::<_, PaperRow>(&format!("SELECT {} FROM papers p WHERE p.slug = $1", PAPER_COLUMNS))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        Ok(row.map(Paper::from))
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool, CatalogError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM papers WHERE slug = $1)")
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .map_err(backend)
    }

    async fn class_level(&self, id: i64) -> Result<Option<ClassLevel>, CatalogError> {
        let row = sqlx::query_as::<_, ClassRow>("SELECT id, name, slug, description FROM class_levels WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        Ok(row.map(ClassLevel::from))
    }

    async fn term(&self, id: i64) -> Result<Option<Term>, CatalogError> {
        let row = sqlx::query_as::<_, TermRow>("SELECT id, class_id, name, slug FROM terms WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        Ok(row.map(Term::from))
    }

    async fn subject(&self, id: i64) -> Result<Option<Subject>, CatalogError> {
        let row = sqlx::query_as::<_, SubjectRow>("SELECT id, name, slug FROM subjects WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        Ok(row.map(Subject::from))
    }

    async fn list_classes(&self) -> Result<Vec<ClassLevel>, CatalogError> {
        let rows = sqlx::query_as::<_, ClassRow>("SELECT id, name, slug, description FROM class_levels ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        Ok(rows.into_iter().map(ClassLevel::from).collect())
    }

    async fn class_by_slug(&self, slug: &str) -> Result<Option<ClassLevel>, CatalogError> {
        let row = sqlx::query_as::<_, ClassRow>("SELECT id, name, slug, description FROM class_levels WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        Ok(row.map(ClassLevel::from))
    }

    async fn term_by_slug(&self, class_id: i64, slug: &str) -> Result<Option<Term>, CatalogError> {
        let row = sqlx::query_as::<_, TermRow>(
            "SELECT id, class_id, name, slug FROM terms WHERE class_id = $1 AND slug = $2",
        )
        .bind(class_id)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(row.map(Term::from))
    }

    async fn terms_for_class(&self, class_id: i64) -> Result<Vec<TermListing>, CatalogError> {
        let rows = sqlx::query_as::<_, TermCountRow>(
            r#"
            SELECT t.id, t.class_id, t.name, t.slug,
                   COUNT(p.id) FILTER (WHERE p.is_available) AS paper_count
            FROM terms t
            LEFT JOIN papers p ON p.term_id = t.id
            WHERE t.class_id = $1
            GROUP BY t.id
            ORDER BY t.name
            "#,
        )
        .bind(class_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows
            .into_iter()
            .map(|r| TermListing {
                term: r.term.into(),
                paper_count: r.paper_count,
            })
            .collect())
    }

    async fn subjects_for_term(&self, term_id: i64) -> Result<Vec<SubjectListing>, CatalogError> {
        let rows = sqlx::query_as::<_, SubjectCountRow>(
            r#"
            SELECT s.id, s.name, s.slug, COUNT(p.id) AS paper_count
            FROM subjects s
            JOIN papers p ON p.subject_id = s.id
            WHERE p.term_id = $1 AND p.is_available
            GROUP BY s.id
            ORDER BY s.name
            "#,
        )
        .bind(term_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows
            .into_iter()
            .map(|r| SubjectListing {
                subject: r.subject.into(),
                paper_count: r.paper_count,
            })
            .collect())
    }

    async fn papers_for_term(&self, term_id: i64) -> Result<Vec<Paper>, CatalogError> {
        let rows = sqlx::query_as::<_, PaperRow>(&format!(
            r#"
            SELECT {}
            FROM papers p
            JOIN subjects s ON s.id = p.subject_id
            WHERE p.term_id = $1 AND p.is_available
            ORDER BY s.name, p.title
            "#,
            PAPER_COLUMNS
        ))
        .bind(term_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows.into_iter().map(Paper::from).collect())
    }

    async fn count_available_papers(&self) -> Result<i64, CatalogError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM papers WHERE is_available")
            .fetch_one(&self.pool)
            .await
            .map_err(backend)
    }

    async fn increment_views(&self, id: PaperId) -> Result<(), CatalogError> {
        sqlx::query("UPDATE papers SET views = views + 1 WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn insert_paper(&self, draft: PaperDraft) -> Result<Paper, CatalogError> {
        let PaperDraft { paper, slug, password } = draft;
        let result = sqlx::query_as::<_, PaperRow>(&format!(
            r#"
            INSERT INTO papers AS p (title, description, class_id, term_id, subject_id, slug, year, exam_type,
                                     price, pdf_url, password, is_paid, is_available, pages)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {}
            "#,
            PAPER_COLUMNS
        ))
        .bind(&paper.title)
        .bind(&paper.description)
        .bind(paper.class_id)
        .bind(paper.term_id)
        .bind(paper.subject_id)
        .bind(&slug)
        .bind(paper.year)
        .bind(paper.exam_type.as_str())
        .bind(paper.price)
        .bind(&paper.pdf_url)
        .bind(&password)
        .bind(paper.is_paid)
        .bind(paper.is_available)
        .bind(paper.pages)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Ok(Paper::from(row)),
            Err(e) if is_unique_violation(&e) => Err(CatalogError::DuplicateSlug(slug)),
            Err(e) => Err(backend(e)),
        }
    }
}
