//! Macro for implementing Display and FromStr for status enums
//!
//! Eliminates boilerplate for status enum conversions by providing a single
//! implementation for both Display and FromStr traits. Parsing is
//! case-insensitive; output is the lowercase representation.
//!
//! # Example
//!
//! ```rust
//! use coopsync_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum JobStatus {
//!     Pending,
//!     Active,
//!     Finished,
//!     Failed,
//! }
//!
//! impl_domain_status_conversions!(JobStatus {
//!     Pending => "pending",
//!     Active => "active",
//!     Finished => "finished",
//!     Failed => "failed",
//! });
//! ```

/// Implements Display and FromStr traits for status enums
///
/// # Arguments
///
/// * `$enum_name` - The name of the enum type
/// * `$variant => $str` - Mapping of enum variants to their string
///   representations
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
