//! Per-input outcome records produced by `all_settled`.

use serde::{Deserialize, Serialize};

/// How one input of [`all_settled`](crate::combinator::all_settled) ended.
///
/// Serializes as `{"status": "fulfilled", "value": ..}` or
/// `{"status": "rejected", "reason": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Settlement<T, E> {
    /// The input fulfilled.
    Fulfilled { value: T },
    /// The input rejected.
    Rejected { reason: E },
}

impl<T, E> Settlement<T, E> {
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Settlement::Fulfilled { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Settlement::Rejected { .. })
    }

    /// Convert into a `Result`.
    pub fn into_result(self) -> Result<T, E> {
        match self {
            Settlement::Fulfilled { value } => Ok(value),
            Settlement::Rejected { reason } => Err(reason),
        }
    }
}

impl<T, E> From<Result<T, E>> for Settlement<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Settlement::Fulfilled { value },
            Err(reason) => Settlement::Rejected { reason },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_status_tag() {
        let records: Vec<Settlement<i32, String>> = vec![
            Settlement::Fulfilled { value: 1 },
            Settlement::Rejected {
                reason: "x".to_string(),
            },
        ];

        let json = serde_json::to_value(&records).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"status": "fulfilled", "value": 1},
                {"status": "rejected", "reason": "x"}
            ])
        );
    }

    #[test]
    fn deserializes_from_status_tag() {
        let record: Settlement<i32, String> =
            serde_json::from_str(r#"{"status": "rejected", "reason": "late"}"#).unwrap();
        assert!(record.is_rejected());
        assert_eq!(record.into_result(), Err("late".to_string()));
    }

    #[test]
    fn converts_from_result() {
        let record: Settlement<i32, String> = Ok(4).into();
        assert!(record.is_fulfilled());
        assert!(!record.is_rejected());
    }
}
