pub mod postgrest;
pub mod sequence;

pub use postgrest::{merge_duplicates, return_representation, ApiFailure, PostgrestClient};
pub use sequence::{SequenceAllocator, SequenceKind};
