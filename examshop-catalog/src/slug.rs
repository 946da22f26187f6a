use uuid::Uuid;

use crate::paper::{NewPaper, Paper, PaperDraft};
use crate::store::{CatalogError, CatalogStore};

#[derive(Debug, Clone)]
pub struct CatalogSettings {
    /// Prefix of generated access passwords, e.g. `EXAM_1A2B3C4D`.
    pub password_prefix: String,
    pub max_slug_attempts: u32,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            password_prefix: "EXAM".to_string(),
            max_slug_attempts: 50,
        }
    }
}

/// ASCII-only slug: lowercase alphanumerics and underscores, with runs of
/// whitespace or hyphens collapsed into a single `-`. Other characters are
/// dropped.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else if c.is_whitespace() || c == '-' {
            pending_dash = true;
        }
    }

    slug.trim_matches('_').to_string()
}

pub fn generate_access_password(prefix: &str) -> String {
    let token = Uuid::new_v4().simple().to_string();
    format!("{}_{}", prefix, token[..8].to_uppercase())
}

fn slug_candidate(base: &str, attempt: u32) -> String {
    if attempt == 0 {
        base.to_string()
    } else {
        format!("{}-{}", base, attempt)
    }
}

/// Allocates a unique slug, fills in a password for paid papers and inserts
/// the paper. Collisions, whether seen up front or raised by the insert,
/// move on to the next `-N` suffix until the attempt budget is spent.
pub async fn create_paper(
    store: &dyn CatalogStore,
    paper: NewPaper,
    settings: &CatalogSettings,
) -> Result<Paper, CatalogError> {
    let class_level = store
        .class_level(paper.class_id)
        .await?
        .ok_or_else(|| CatalogError::NotFound(format!("class {}", paper.class_id)))?;
    let term = store
        .term(paper.term_id)
        .await?
        .ok_or_else(|| CatalogError::NotFound(format!("term {}", paper.term_id)))?;
    let subject = store
        .subject(paper.subject_id)
        .await?
        .ok_or_else(|| CatalogError::NotFound(format!("subject {}", paper.subject_id)))?;

    let mut base = slugify(&format!(
        "{} {} {} {}",
        class_level.name, term.name, subject.name, paper.title
    ));
    if base.is_empty() {
        base = Uuid::new_v4().to_string()[..12].to_string();
    }

    let password = match paper.password.as_deref().map(str::trim) {
        Some(existing) if !existing.is_empty() => Some(existing.to_string()),
        _ if paper.is_paid => Some(generate_access_password(&settings.password_prefix)),
        _ => None,
    };

    for attempt in 0..settings.max_slug_attempts {
        let candidate = slug_candidate(&base, attempt);
        if store.slug_exists(&candidate).await? {
            continue;
        }

        let draft = PaperDraft {
            paper: paper.clone(),
            slug: candidate,
            password: password.clone(),
        };
        match store.insert_paper(draft).await {
            Ok(created) => {
                tracing::info!("Created paper {} with slug {}", created.id, created.slug);
                return Ok(created);
            }
            Err(CatalogError::DuplicateSlug(slug)) => {
                tracing::debug!("Slug {} taken concurrently, retrying", slug);
            }
            Err(e) => return Err(e),
        }
    }

    Err(CatalogError::SlugExhausted {
        base,
        attempts: settings.max_slug_attempts,
    })
}
