//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::state::scenario::Decision;

/// Validates that a decision is one of `buy`, `sell` or `hold` (lowercase).
///
/// # Examples
///
/// ```ignore
/// validate_decision("buy")  // Ok
/// validate_decision("Buy")  // Err - case matters
/// validate_decision("long") // Err - unknown action
/// ```
pub fn validate_decision(decision: &str) -> Result<(), ValidationError> {
    decision.parse::<Decision>().map(|_| ()).map_err(|err| {
        let mut validation = ValidationError::new("decision_value");
        validation.message = Some(err.to_string().into());
        validation
    })
}

/// Validates that an elapsed time is a finite, non-negative number of seconds.
///
/// The upper bound depends on the configured decision window and is checked by the service.
pub fn validate_time_elapsed(time_elapsed: f64) -> Result<(), ValidationError> {
    if !time_elapsed.is_finite() || time_elapsed < 0.0 {
        let mut err = ValidationError::new("time_elapsed_range");
        err.message = Some(format!("time_elapsed must be >= 0 (got {time_elapsed})").into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_decision_valid() {
        assert!(validate_decision("buy").is_ok());
        assert!(validate_decision("sell").is_ok());
        assert!(validate_decision("hold").is_ok());
    }

    #[test]
    fn test_validate_decision_invalid() {
        assert!(validate_decision("Buy").is_err()); // uppercase
        assert!(validate_decision("short").is_err()); // unknown
        assert!(validate_decision("").is_err()); // empty
    }

    #[test]
    fn test_validate_time_elapsed() {
        assert!(validate_time_elapsed(0.0).is_ok());
        assert!(validate_time_elapsed(14.5).is_ok());
        assert!(validate_time_elapsed(-0.1).is_err());
        assert!(validate_time_elapsed(f64::INFINITY).is_err());
        assert!(validate_time_elapsed(f64::NAN).is_err());
    }

    #[test]
    fn submit_request_rejects_negative_elapsed_time() {
        use validator::Validate;

        use crate::dto::pvp::SubmitDecisionRequest;

        let request = |time_elapsed: f64| SubmitDecisionRequest {
            match_id: uuid::Uuid::new_v4(),
            round_number: 1,
            decision: "buy".into(),
            time_elapsed,
        };
        assert!(request(3.5).validate().is_ok());
        let errors = request(-1.0).validate().unwrap_err();
        assert!(errors.field_errors().contains_key("time_elapsed"));
    }
}
