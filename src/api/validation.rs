use std::collections::HashSet;

use validator::Validate;

use crate::api::errors::ApiError;

pub(crate) fn validate_payload<T: Validate>(payload: &T) -> Result<(), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// Trims every id and rejects blanks and duplicates.
pub(crate) fn unique_ids(field: &str, ids: &[String]) -> Result<Vec<String>, ApiError> {
    let mut seen = HashSet::with_capacity(ids.len());
    let mut result = Vec::with_capacity(ids.len());

    for id in ids {
        let id = id.trim();
        if id.is_empty() {
            return Err(ApiError::BadRequest(format!("{field} must not contain blank ids")));
        }
        if !seen.insert(id) {
            return Err(ApiError::BadRequest(format!("{field} contains duplicate id {id}")));
        }
        result.push(id.to_string());
    }

    Ok(result)
}
