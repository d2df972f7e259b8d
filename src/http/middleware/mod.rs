//! Request middleware.

pub mod ip_mapper;

pub use ip_mapper::ip_mapper_middleware;
