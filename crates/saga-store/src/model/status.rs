//! Enumerations shared by the saga data model.
//!
//! Every enum is persisted as text, so each variant carries the exact string
//! used in the database and on the wire.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Declares a text-backed enum with `as_str`, `Display` and `FromStr`.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
        }

        impl $name {
            /// All variants in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Returns the persisted string form.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = StoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $text => Ok($name::$variant), )+
                    other => Err(StoreError::Corrupt(format!(
                        "unknown {} value '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

text_enum!(
    /// The business workflow a saga implements.
    SagaType {
        BettingFlow => "betting_flow",
        DepositFlow => "deposit_flow",
        WithdrawalFlow => "withdrawal_flow",
        RefundFlow => "refund_flow",
        PromotionFlow => "promotion_flow",
        CashoutFlow => "cashout_flow",
        CashoutRollbackFlow => "cashout_rollback_flow",
        CashoutCompensationFlow => "cashout_compensation_flow",
    }
);

text_enum!(
    /// Lifecycle status of a saga transaction.
    ///
    /// ```text
    /// Pending ──► InProgress ──┬──► Completed
    ///    │            │        └──► Compensating ──┬──► Compensated
    ///    │            │                            ├──► PartiallyCompensated
    ///    └────────────┴──► Timeout                 └──► Failed
    /// ```
    SagaStatus {
        Pending => "pending",
        InProgress => "in_progress",
        Completed => "completed",
        Failed => "failed",
        Compensating => "compensating",
        Compensated => "compensated",
        /// Compensation finished but at least one compensating call failed.
        PartiallyCompensated => "partially_compensated",
        /// Manually reversed through the cash-out rollback entry point.
        RolledBack => "rolled_back",
        Timeout => "timeout",
    }
);

impl SagaStatus {
    /// Returns true if no further automatic transition happens from this status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaStatus::Completed
                | SagaStatus::Failed
                | SagaStatus::Compensated
                | SagaStatus::PartiallyCompensated
                | SagaStatus::RolledBack
                | SagaStatus::Timeout
        )
    }

    /// Returns true if the saga may be reopened by an explicit retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SagaStatus::Failed | SagaStatus::Timeout)
    }

    /// Returns true if the timeout sweep may expire a saga in this status.
    pub fn can_time_out(&self) -> bool {
        matches!(self, SagaStatus::Pending | SagaStatus::InProgress)
    }
}

text_enum!(
    /// Status of a single saga step.
    StepStatus {
        Pending => "pending",
        InProgress => "in_progress",
        Completed => "completed",
        Failed => "failed",
        Compensating => "compensating",
        Compensated => "compensated",
        RollbackFailed => "rollback_failed",
        Skipped => "skipped",
    }
);

impl StepStatus {
    /// Returns true once compensation has touched the step.
    pub fn is_unwinding(&self) -> bool {
        matches!(
            self,
            StepStatus::Compensating | StepStatus::Compensated | StepStatus::RollbackFailed
        )
    }
}

text_enum!(
    /// Classification of a step, carried for reporting.
    StepType {
        ServiceCall => "service_call",
        Compensation => "compensation",
        Validation => "validation",
        Notification => "notification",
        RiskManagementCall => "risk_management_call",
        WalletOperation => "wallet_operation",
        BettingServiceCall => "betting_service_call",
        CashoutValidation => "cashout_validation",
        LiabilityUpdate => "liability_update",
    }
);

impl Default for StepType {
    fn default() -> Self {
        StepType::ServiceCall
    }
}

text_enum!(
    /// HTTP verb used for an outbound service call.
    HttpMethod {
        Get => "GET",
        Post => "POST",
        Put => "PUT",
        Patch => "PATCH",
        Delete => "DELETE",
    }
);

impl Default for HttpMethod {
    fn default() -> Self {
        HttpMethod::Post
    }
}

text_enum!(
    /// Kind of entry in the saga audit log.
    EventType {
        SagaStarted => "saga_started",
        SagaCompleted => "saga_completed",
        SagaFailed => "saga_failed",
        SagaTimeout => "saga_timeout",
        SagaRetried => "saga_retried",
        StepStarted => "step_started",
        StepCompleted => "step_completed",
        StepFailed => "step_failed",
        StepCompensated => "step_compensated",
        CompensationStarted => "compensation_started",
        CompensationCompleted => "compensation_completed",
        CompensationFailed => "compensation_failed",
        RetryAttempted => "retry_attempted",
        CashoutRequested => "cashout_requested",
        CashoutValidationPassed => "cashout_validation_passed",
        CashoutLiveOddsFetched => "cashout_live_odds_fetched",
        CashoutQuoteReceived => "cashout_quote_received",
        CashoutFundsCredited => "cashout_funds_credited",
        CashoutLiabilityUpdated => "cashout_liability_updated",
        CashoutCompleted => "cashout_completed",
        CashoutRollbackInitiated => "cashout_rollback_initiated",
        CashoutRollbackCompleted => "cashout_rollback_completed",
    }
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!SagaStatus::Pending.is_terminal());
        assert!(!SagaStatus::InProgress.is_terminal());
        assert!(!SagaStatus::Compensating.is_terminal());
        assert!(SagaStatus::Completed.is_terminal());
        assert!(SagaStatus::Compensated.is_terminal());
        assert!(SagaStatus::PartiallyCompensated.is_terminal());
        assert!(SagaStatus::RolledBack.is_terminal());
        assert!(SagaStatus::Failed.is_terminal());
        assert!(SagaStatus::Timeout.is_terminal());
    }

    #[test]
    fn test_retryable_states() {
        let retryable: Vec<_> = SagaStatus::ALL
            .iter()
            .filter(|s| s.is_retryable())
            .collect();
        assert_eq!(retryable, vec![&SagaStatus::Failed, &SagaStatus::Timeout]);
    }

    #[test]
    fn test_can_time_out() {
        assert!(SagaStatus::Pending.can_time_out());
        assert!(SagaStatus::InProgress.can_time_out());
        assert!(!SagaStatus::Compensating.can_time_out());
        assert!(!SagaStatus::Completed.can_time_out());
    }

    #[test]
    fn test_unwinding_step_states() {
        let unwinding: Vec<_> = StepStatus::ALL
            .iter()
            .filter(|s| s.is_unwinding())
            .collect();
        assert_eq!(
            unwinding,
            vec![
                &StepStatus::Compensating,
                &StepStatus::Compensated,
                &StepStatus::RollbackFailed
            ]
        );
    }

    #[test]
    fn test_text_round_trip_for_every_variant() {
        for status in SagaStatus::ALL {
            assert_eq!(status.as_str().parse::<SagaStatus>().unwrap(), *status);
        }
        for event in EventType::ALL {
            assert_eq!(event.as_str().parse::<EventType>().unwrap(), *event);
        }
    }

    #[test]
    fn test_unknown_value_is_corrupt() {
        let err = "paused".parse::<SagaStatus>().unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }

    #[test]
    fn test_serde_uses_persisted_names() {
        let json = serde_json::to_string(&SagaType::CashoutFlow).unwrap();
        assert_eq!(json, "\"cashout_flow\"");
        let method: HttpMethod = serde_json::from_str("\"PATCH\"").unwrap();
        assert_eq!(method, HttpMethod::Patch);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(StepType::default(), StepType::ServiceCall);
        assert_eq!(HttpMethod::default(), HttpMethod::Post);
    }
}
