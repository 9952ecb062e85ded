//! Request validation error types

use thiserror::Error;

/// Errors found while turning raw request parameters into a `RequestSpec`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// Invalid input parameter
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter { parameter: String, reason: String },

    /// Missing required field
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    /// The content range descriptor did not resolve to any content
    #[error("No such content range: {descriptor}")]
    UnresolvedContent { descriptor: String },

    /// Unrecognised hash variant
    #[error("Unknown hash type: {value}")]
    UnknownVariant { value: String },

    /// Unrecognised result encoding
    #[error("Unknown result encoding: {value}")]
    UnknownEncoding { value: String },

    /// Unrecognised result delivery
    #[error("Unknown result type: {value}")]
    UnknownDelivery { value: String },

    /// A nonce field was not valid base64
    #[error("{field}: Illegal Base64 string: {value}")]
    InvalidBase64 { field: String, value: String },

    /// Background jobs cannot deliver their result inline
    #[error("Cannot select both Background and Inline result")]
    InlineBackground,
}

impl ValidationError {
    /// Create an invalid configuration error
    pub fn invalid_configuration(message: &str) -> Self {
        Self::InvalidConfiguration {
            message: message.to_string(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: &str, reason: &str) -> Self {
        Self::InvalidParameter {
            parameter: parameter.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: &str) -> Self {
        Self::MissingField {
            field: field.to_string(),
        }
    }

    pub fn unresolved_content(descriptor: impl ToString) -> Self {
        Self::UnresolvedContent {
            descriptor: descriptor.to_string(),
        }
    }

    pub fn unknown_variant(value: &str) -> Self {
        Self::UnknownVariant {
            value: value.to_string(),
        }
    }

    pub fn unknown_encoding(value: &str) -> Self {
        Self::UnknownEncoding {
            value: value.to_string(),
        }
    }

    pub fn unknown_delivery(value: &str) -> Self {
        Self::UnknownDelivery {
            value: value.to_string(),
        }
    }

    /// Create an invalid base64 error naming the offending field
    pub fn invalid_base64(field: &str, value: &str) -> Self {
        Self::InvalidBase64 {
            field: field.to_string(),
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_configuration_error() {
        let error = ValidationError::invalid_configuration("step_size must be positive");
        assert!(error.to_string().contains("Invalid configuration"));
        assert!(error.to_string().contains("step_size"));
    }

    #[test]
    fn test_invalid_parameter_error() {
        let error = ValidationError::invalid_parameter("lb", "bound without url");
        assert!(error.to_string().contains("Invalid parameter"));
        assert!(error.to_string().contains("lb"));
    }

    #[test]
    fn test_missing_field_error() {
        let error = ValidationError::missing_field("auid");
        assert!(error.to_string().contains("Missing required field"));
        assert!(error.to_string().contains("auid"));
    }

    #[test]
    fn test_invalid_base64_names_field() {
        let error = ValidationError::invalid_base64("Verifier", "@@@");
        assert_eq!(error.to_string(), "Verifier: Illegal Base64 string: @@@");
    }

    #[test]
    fn test_inline_background_message() {
        assert!(
            ValidationError::InlineBackground
                .to_string()
                .contains("Background and Inline")
        );
    }
}
