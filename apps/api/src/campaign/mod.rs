// Campaign-wide state: budget, launch status and weekly performance metrics.

pub mod budget;
pub mod handlers;
pub mod metrics;
pub mod status;

use crate::errors::AppError;
use crate::models::campaign::SINGLETON_ID;
use crate::normalize::{as_number, Fields, Record, Row};
use crate::store::Store;

/// Reads a singleton record, falling back to its default before the first write.
pub(crate) async fn load_singleton<T: Record + Default>(store: &Store) -> Result<T, AppError> {
    Ok(store.get::<T>(SINGLETON_ID).await?.unwrap_or_default())
}

/// Largest amount or counter accepted from a client: the largest integer an
/// f64 holds exactly.
pub const MAX_AMOUNT: f64 = 9_007_199_254_740_991.0;

/// Checks that every listed field present in `patch` (under any of its
/// names) is a finite number in `0..=MAX_AMOUNT`.
pub(crate) fn require_non_negative<T: Record>(patch: &Row, columns: &[&str]) -> Result<(), AppError> {
    let fields = Fields::new(patch, T::FIELDS);
    for column in columns {
        let Some(value) = fields.value(column) else {
            continue;
        };
        match as_number(value) {
            Some(n) if n.is_finite() && n >= 0.0 => {
                if n > MAX_AMOUNT {
                    return Err(AppError::Validation(format!(
                        "{column} must not exceed {MAX_AMOUNT}"
                    )));
                }
            }
            _ => {
                return Err(AppError::Validation(format!(
                    "{column} must be a non-negative number"
                )))
            }
        }
    }
    Ok(())
}
