//! Canonical identity keys for candidate records.
//!
//! Two records with the same key are treated as the same real-world entity.
//! Keys are case-insensitive and ignore surrounding whitespace.

use crate::utils::truncate_chars;

/// Characters of the description used for records with no stronger identity.
pub const DESCRIPTION_KEY_CHARS: usize = 100;

/// The identity-bearing fields of a record, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSignature<'a> {
    /// A diagnostic error code with its message.
    ErrorCode { code: &'a str, message: &'a str },
    /// A named item, optionally typed.
    Named {
        name: &'a str,
        component_type: &'a str,
    },
    /// Anything else, identified by its description.
    Other { description: &'a str },
}

impl RecordSignature<'_> {
    /// Prefix of the generated key.
    pub fn tag(&self) -> &'static str {
        match self {
            RecordSignature::ErrorCode { .. } => "error_code",
            RecordSignature::Named { .. } => "component",
            RecordSignature::Other { .. } => "other",
        }
    }
}

/// Build the content key for a signature.
pub fn content_key(signature: &RecordSignature<'_>) -> String {
    let raw = match signature {
        RecordSignature::ErrorCode { code, message } => {
            format!("error_code:{}:{}", code.trim(), message.trim())
        }
        RecordSignature::Named {
            name,
            component_type,
        } => format!("component:{}:{}", name.trim(), component_type.trim()),
        RecordSignature::Other { description } => format!(
            "other:{}",
            truncate_chars(description.trim(), DESCRIPTION_KEY_CHARS)
        ),
    };
    raw.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_key() {
        let key = content_key(&RecordSignature::ErrorCode {
            code: " 7002 ",
            message: "MOVEMENT ",
        });
        assert_eq!(key, "error_code:7002:movement");
    }

    #[test]
    fn test_named_key() {
        let key = content_key(&RecordSignature::Named {
            name: "Leaf Drive Motor",
            component_type: "Motor",
        });
        assert_eq!(key, "component:leaf drive motor:motor");

        let untyped = content_key(&RecordSignature::Named {
            name: "MLC",
            component_type: "",
        });
        assert_eq!(untyped, "component:mlc:");
    }

    #[test]
    fn test_other_key_truncates_by_char() {
        let description = "é".repeat(150);
        let key = content_key(&RecordSignature::Other {
            description: &description,
        });
        assert_eq!(key, format!("other:{}", "é".repeat(100)));
    }

    #[test]
    fn test_other_key_short_and_empty() {
        assert_eq!(
            content_key(&RecordSignature::Other {
                description: "  Check Coolant Flow  "
            }),
            "other:check coolant flow"
        );
        assert_eq!(
            content_key(&RecordSignature::Other { description: "" }),
            "other:"
        );
    }

    #[test]
    fn test_case_and_whitespace_insensitive() {
        let a = content_key(&RecordSignature::ErrorCode {
            code: "7002",
            message: "Movement",
        });
        let b = content_key(&RecordSignature::ErrorCode {
            code: "7002 ",
            message: " MOVEMENT",
        });
        assert_eq!(a, b);
    }

    #[test]
    fn test_signature_tags() {
        assert_eq!(
            RecordSignature::Other { description: "x" }.tag(),
            "other"
        );
        assert_eq!(
            RecordSignature::ErrorCode {
                code: "1",
                message: ""
            }
            .tag(),
            "error_code"
        );
    }
}
