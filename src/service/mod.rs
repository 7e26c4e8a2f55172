//service/mod.rs
pub mod coordinator;


pub use coordinator::{FetchedFile, FileCoordinator};
