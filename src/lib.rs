//! License activation and credit ledger service.
//!
//! Client tools activate a license key on a hardware id; an activation may
//! cost credits, debited from the license owner's ledger in the same
//! database transaction that records the activation.

pub mod activation;
pub mod audit;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod ledger;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod util;
pub mod validator;
