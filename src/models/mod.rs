pub mod candidate_match;
pub mod common;
pub mod interview_kit;
pub mod job;
pub mod note;
pub mod resume;
