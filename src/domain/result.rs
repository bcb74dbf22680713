//! Result type alias for batchport

use super::errors::BatchportError;

/// Result type alias for batchport operations
///
/// # Examples
///
/// ```
/// use batchport::domain::result::Result;
/// use batchport::domain::errors::BatchportError;
///
/// fn failing_function() -> Result<()> {
///     Err(BatchportError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, BatchportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_alias() {
        fn ok() -> Result<u32> {
            Ok(7)
        }
        assert_eq!(ok().unwrap(), 7);
    }
}
