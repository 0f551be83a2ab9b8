//! Error types for the record codec

/// Errors raised while normalizing a raw row into a [`crate::BillingRecord`]
///
/// Missing or malformed dates are never an error: they fall back to "now".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Row carries no usable `id`
    #[error("record has no id")]
    MissingId,

    /// `id` is present but not a string or integer
    #[error("invalid record id: {0}")]
    InvalidId(String),

    /// Amount is not a finite number
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Amount is below zero
    #[error("negative amount: {0}")]
    NegativeAmount(String),

    /// Status is not one of `pending` / `paid`
    #[error("invalid status: '{0}'")]
    InvalidStatus(String),

    /// Payment method is not one of `cash` / `transfer`
    #[error("invalid payment method: '{0}'")]
    InvalidPaymentMethod(String),

    /// Raw value is not a JSON object
    #[error("expected a JSON object, got {0}")]
    NotAnObject(String),
}

impl CodecError {
    /// Wire key of the field that failed to decode, if any
    #[inline]
    #[must_use]
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::MissingId | Self::InvalidId(_) => Some(crate::raw::keys::ID),
            Self::InvalidAmount(_) | Self::NegativeAmount(_) => Some(crate::raw::keys::AMOUNT),
            Self::InvalidStatus(_) => Some(crate::raw::keys::STATUS),
            Self::InvalidPaymentMethod(_) => Some(crate::raw::keys::PAYMENT_METHOD),
            Self::NotAnObject(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_error_display() {
        let err = CodecError::InvalidStatus("lunas".to_string());
        assert_eq!(err.to_string(), "invalid status: 'lunas'");
    }

    #[test]
    fn codec_error_field() {
        assert_eq!(CodecError::MissingId.field(), Some("id"));
        assert_eq!(CodecError::NegativeAmount("-1".into()).field(), Some("amount"));
        assert_eq!(CodecError::NotAnObject("[]".into()).field(), None);
    }
}
