pub mod memory;
pub mod paper;
pub mod slug;
pub mod store;

pub use memory::InMemoryCatalog;
pub use paper::{
    ClassLevel, ExamType, NewPaper, Paper, PaperDraft, PaperId, SlugPath, Subject, SubjectListing, Term, TermListing,
};
pub use slug::{create_paper, generate_access_password, slugify, CatalogSettings};
pub use store::{CatalogError, CatalogStore};
