//! Request handlers

pub mod accounts;
pub mod admin;
pub mod battles;
pub mod betting;
pub mod health;
pub mod matchmaking;

use crate::error::{ApiError, ApiResult};

/// Parse a path segment into a typed id
pub(crate) fn parse_path<T, E>(name: &str, raw: &str, parse: impl FnOnce(&str) -> Result<T, E>) -> ApiResult<T>
where
    E: std::fmt::Display,
{
    parse(raw).map_err(|err| ApiError::invalid_parameter(name, err))
}
