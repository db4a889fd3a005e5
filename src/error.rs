/// Errors raised by the decision pipeline and its collaborators.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("insufficient history: have {have} bars, need {need}")]
    InsufficientHistory { have: usize, need: usize },

    #[error("market data unavailable: {0}")]
    DataUnavailable(String),

    #[error("invalid instrument parameters: {0}")]
    InvalidInstrumentParameters(String),

    #[error("invalid volatility: {0}")]
    InvalidVolatility(String),

    #[error("dispatch failure (code {code}): {message}")]
    DispatchFailure { code: u32, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Recoverable errors skip the current cycle's trade action; the rest
    /// mean the loop cannot work with the current inputs and must stop.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::DataUnavailable(_) | Error::InvalidVolatility(_) | Error::DispatchFailure { .. }
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovery_policy() {
        assert!(Error::DataUnavailable("timeout".into()).is_recoverable());
        assert!(Error::InvalidVolatility("nan".into()).is_recoverable());
        assert!(Error::DispatchFailure { code: 10006, message: "rejected".into() }.is_recoverable());

        assert!(!Error::InsufficientHistory { have: 3, need: 28 }.is_recoverable());
        assert!(!Error::InvalidInstrumentParameters("lot step 0".into()).is_recoverable());
        assert!(!Error::Config("fast >= slow".into()).is_recoverable());
    }

    #[test]
    fn messages_carry_reason() {
        let err = Error::DispatchFailure { code: 10019, message: "no money".into() };
        assert_eq!(err.to_string(), "dispatch failure (code 10019): no money");

        let err = Error::InsufficientHistory { have: 10, need: 28 };
        assert_eq!(err.to_string(), "insufficient history: have 10 bars, need 28");
    }
}
