use serde::{Deserialize, Serialize};
use std::fmt;

/// Order lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Initial state when the order is accepted
    Pending,
    /// A venue/route is being selected
    Routing,
    /// The execution transaction is being built
    Building,
    /// The transaction has been submitted to the venue
    Submitted,
    /// Execution confirmed; terminal success state
    Confirmed,
    /// Execution failed after exhausting retries; terminal failure state
    Failed,
}

impl OrderStatus {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }

    /// Check if this is an active state (the order is being processed)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Routing | Self::Building | Self::Submitted)
    }

    /// Check if this is the terminal success state
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Confirmed)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Routing => write!(f, "ROUTING"),
            Self::Building => write!(f, "BUILDING"),
            Self::Submitted => write!(f, "SUBMITTED"),
            Self::Confirmed => write!(f, "CONFIRMED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "ROUTING" => Ok(Self::Routing),
            "BUILDING" => Ok(Self::Building),
            "SUBMITTED" => Ok(Self::Submitted),
            "CONFIRMED" => Ok(Self::Confirmed),
            "FAILED" => Ok(Self::Failed),
            _ => Err(format!("Invalid order status: {s}")),
        }
    }
}

/// Default state for new orders
impl Default for OrderStatus {
    fn default() -> Self {
        Self::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_check() {
        assert!(OrderStatus::Confirmed.is_terminal());
        assert!(OrderStatus::Failed.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Routing.is_terminal());
        assert!(!OrderStatus::Building.is_terminal());
        assert!(!OrderStatus::Submitted.is_terminal());
    }

    #[test]
    fn test_active_check() {
        assert!(OrderStatus::Routing.is_active());
        assert!(OrderStatus::Submitted.is_active());
        assert!(!OrderStatus::Pending.is_active());
        assert!(!OrderStatus::Confirmed.is_active());
    }

    #[test]
    fn test_string_conversion() {
        assert_eq!(OrderStatus::Routing.to_string(), "ROUTING");
        assert_eq!(
            "CONFIRMED".parse::<OrderStatus>().unwrap(),
            OrderStatus::Confirmed
        );
        assert!("confirmed".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_serde() {
        let status = OrderStatus::Building;
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, "\"BUILDING\"");

        let parsed: OrderStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, status);
    }
}
