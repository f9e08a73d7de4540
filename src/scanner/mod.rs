pub mod walk;

pub use walk::{collect_candidates, FileRecord};
