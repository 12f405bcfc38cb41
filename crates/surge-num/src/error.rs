//! Numeric domain errors

use surge_sdk::fatal;

/// Result type for numeric operations
pub type NumResult<T> = Result<T, NumError>;

/// Numeric domain error kinds
///
/// Each kind maps to a fixed fatal-panic code; the language has no catch
/// mechanism at this layer, so the ops boundary converts these into process
/// termination via [`NumError::raise`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NumError {
    /// A result would exceed the limb-count ceiling
    #[error("number size limit exceeded")]
    SizeLimitExceeded,

    /// Division or modulo by zero
    #[error("division by zero")]
    DivideByZero,

    /// Unsigned subtraction going negative, or negative-to-unsigned conversion
    #[error("arithmetic underflow")]
    Underflow,

    /// Negative or non-representable shift count
    #[error("invalid shift amount")]
    NegativeShift,
}

impl NumError {
    /// Fixed fatal-panic code for this error class.
    pub fn fatal_code(self) -> u32 {
        match self {
            NumError::SizeLimitExceeded => fatal::CODE_SIZE_LIMIT,
            NumError::DivideByZero => fatal::CODE_DIVIDE_BY_ZERO,
            NumError::Underflow => fatal::CODE_NUMERIC,
            NumError::NegativeShift => fatal::CODE_OVERFLOW,
        }
    }

    /// Terminate the process through the fatal-panic protocol.
    pub fn raise(self) -> ! {
        fatal::raise(self.fatal_code(), &self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_codes() {
        assert_eq!(NumError::SizeLimitExceeded.fatal_code(), 3201);
        assert_eq!(NumError::DivideByZero.fatal_code(), 3203);
        assert_eq!(NumError::Underflow.fatal_code(), 3202);
        assert_eq!(NumError::NegativeShift.fatal_code(), 1101);
    }
}
