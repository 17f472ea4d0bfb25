pub mod catalog;
pub mod error;
pub mod gallery;
pub mod live;
