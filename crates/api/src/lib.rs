//! REST client for the job endpoints of the server.
//!
//! [`repository::JobRepository`] is the narrow contract the job tracker
//! depends on; [`client::JobApi`] implements it over HTTP with
//! [`reqwest`].

pub mod client;
pub mod repository;

pub use client::{ApiError, JobApi, JobListQuery};
pub use repository::JobRepository;
