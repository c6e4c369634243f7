#![doc = include_str!("../README.md")]

pub mod analyze;
pub mod analyzer;
pub mod classifier;
pub mod defaults;
pub mod models;
pub mod operation;
pub mod result;

pub use operation::{OperationHandle, OperationStatus, PollOptions};
pub use result::ResultDocument;
