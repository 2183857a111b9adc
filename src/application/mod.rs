//! Application layer wiring DTOs and services for Tanya.

pub mod dtos;
pub mod services;

pub use dtos::{
    EmbeddingBackendListResponse, EmbeddingBackendOption, EmptyArgs, HealthStatusResponse,
    SearchRequest, SearchResponse, SearchResultDto,
};
pub use services::{RelevanceRanker, SearchService};
