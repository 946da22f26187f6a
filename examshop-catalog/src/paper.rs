use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Catalog identifier of a question paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaperId(pub i64);

impl fmt::Display for PaperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PaperId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(PaperId)
    }
}

/// A class (grade), e.g. "JHS 1".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassLevel {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
}

/// A term within a class. Slugs are unique per class only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Term {
    pub id: i64,
    pub class_id: i64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subject {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// A term with the number of available papers filed under it.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TermListing {
    #[serde(flatten)]
    pub term: Term,
    pub paper_count: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SubjectListing {
    #[serde(flatten)]
    pub subject: Subject,
    pub paper_count: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExamType {
    Midterm,
    #[default]
    Endterm,
    Cat,
    Assignment,
    Final,
    Mock,
    Others,
}

impl ExamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExamType::Midterm => "midterm",
            ExamType::Endterm => "endterm",
            ExamType::Cat => "cat",
            ExamType::Assignment => "assignment",
            ExamType::Final => "final",
            ExamType::Mock => "mock",
            ExamType::Others => "others",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "midterm" => Some(ExamType::Midterm),
            "endterm" => Some(ExamType::Endterm),
            "cat" => Some(ExamType::Cat),
            "assignment" => Some(ExamType::Assignment),
            "final" => Some(ExamType::Final),
            "mock" => Some(ExamType::Mock),
            "others" => Some(ExamType::Others),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExamType::Midterm => "Mid-Term Exam",
            ExamType::Endterm => "End-Term Exam",
            ExamType::Cat => "CAT",
            ExamType::Assignment => "Assignment",
            ExamType::Final => "Final Exam",
            ExamType::Mock => "Mock Exam",
            ExamType::Others => "Others",
        }
    }
}

/// A purchasable PDF. The access password is what fulfillment sends out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paper {
    pub id: PaperId,
    pub title: String,
    pub description: String,
    pub class_id: i64,
    pub term_id: i64,
    pub subject_id: i64,
    pub slug: String,
    pub year: i32,
    pub exam_type: ExamType,
    pub price: Decimal,
    pub pdf_url: String,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub is_paid: bool,
    pub is_available: bool,
    pub pages: i32,
    pub views: i64,
    pub created_at: DateTime<Utc>,
}

impl Paper {
    pub fn is_free(&self) -> bool {
        self.price.is_zero() || !self.is_paid
    }

    /// Last path segment of the PDF location, used as the download name.
    pub fn file_name(&self) -> &str {
        self.pdf_url
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("question_paper.pdf")
    }
}

/// Input for creating a paper; slug and password are allocated on insert.
#[derive(Debug, Clone)]
pub struct NewPaper {
    pub title: String,
    pub description: String,
    pub class_id: i64,
    pub term_id: i64,
    pub subject_id: i64,
    pub year: i32,
    pub exam_type: ExamType,
    pub price: Decimal,
    pub pdf_url: String,
    pub password: Option<String>,
    pub is_paid: bool,
    pub is_available: bool,
    pub pages: i32,
}

/// A `NewPaper` whose slug and password have been resolved.
#[derive(Debug, Clone)]
pub struct PaperDraft {
    pub paper: NewPaper,
    pub slug: String,
    pub password: Option<String>,
}

/// `/{class}/{term}/{subject}/{paper}` navigation path.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SlugPath {
    pub class: String,
    pub term: String,
    pub subject: String,
    pub paper: String,
}
