//! Macro for implementing Display and FromStr for status enums
//!
//! Statuses are persisted as text columns; this keeps the column value and
//! the enum in one table per type.
//!
//! # Example
//!
//! ```rust
//! use storesync_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum LeaseState {
//!     Held,
//!     Released,
//! }
//!
//! impl_domain_status_conversions!(LeaseState {
//!     Held => "held",
//!     Released => "released",
//! });
//!
//! assert_eq!(LeaseState::Held.to_string(), "held");
//! assert_eq!("RELEASED".parse::<LeaseState>().unwrap(), LeaseState::Released);
//! ```

/// Implements Display, FromStr and `as_str` for status enums
///
/// Parsing is case-insensitive; output is always the mapped lowercase text.
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:literal),+ $(,)? }) => {
        impl $enum_name {
            /// Persisted text form
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Phase {
        Waiting,
        HalfOpen,
    }

    impl_domain_status_conversions!(Phase {
        Waiting => "waiting",
        HalfOpen => "half-open",
    });

    #[test]
    fn display_uses_mapped_text() {
        assert_eq!(Phase::Waiting.to_string(), "waiting");
        assert_eq!(Phase::HalfOpen.as_str(), "half-open");
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Phase::from_str("WAITING").unwrap(), Phase::Waiting);
        assert_eq!(Phase::from_str("Half-Open").unwrap(), Phase::HalfOpen);
    }

    #[test]
    fn parse_rejects_unknown() {
        let err = Phase::from_str("done").unwrap_err();
        assert!(err.contains("Invalid Phase: done"));
    }

    mod with_crate_result_in_scope {
        use std::str::FromStr;

        #[allow(unused_imports)]
        use crate::errors::Result;

        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        enum Lane {
            Fast,
        }

        impl_domain_status_conversions!(Lane { Fast => "fast" });

        #[test]
        fn expands_next_to_single_parameter_result_alias() {
            assert_eq!(Lane::from_str("fast"), Ok(Lane::Fast));
            assert!(Lane::from_str("slow").is_err());
        }
    }
}
