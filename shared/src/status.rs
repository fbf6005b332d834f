use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Lifecycle of a bookable slot. Stored as an integer in the field
/// service's database; rendered as a string everywhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleStatus {
    Available,
    Booked,
}

impl ScheduleStatus {
    pub const AVAILABLE_CODE: i32 = 100;
    pub const BOOKED_CODE: i32 = 200;

    pub fn code(&self) -> i32 {
        match self {
            Self::Available => Self::AVAILABLE_CODE,
            Self::Booked => Self::BOOKED_CODE,
        }
    }

    pub fn from_code(code: i32) -> Result<Self, ServiceError> {
        match code {
            Self::AVAILABLE_CODE => Ok(Self::Available),
            Self::BOOKED_CODE => Ok(Self::Booked),
            other => Err(ServiceError::Persistence(format!(
                "unknown schedule status code {other}"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::Booked => "Booked",
        }
    }
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for status in [ScheduleStatus::Available, ScheduleStatus::Booked] {
            assert_eq!(ScheduleStatus::from_code(status.code()).unwrap(), status);
        }
    }

    #[test]
    fn unknown_code_is_a_persistence_error() {
        assert!(ScheduleStatus::from_code(42).is_err());
    }
}
