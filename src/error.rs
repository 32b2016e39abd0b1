//! Central error types of the EXI 1.0 core.
//!
//! All failures are fatal to the current stream and propagate to the caller;
//! a codec instance is not usable again until `init_for_each_run`. Non-fatal
//! conditions (schema deviations in non-strict mode, skipped header
//! extensions) are reported through the pluggable [`ErrorHandler`].

use core::fmt;
use std::borrow::Cow;

/// Error kinds raised by the core.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The underlying byte source was exhausted in the middle of a quantity
    /// (Spec 7.1).
    UnexpectedEndOfStream,
    /// The stream contradicts the wire format: wrong distinguishing bits,
    /// truncated cookie, an event code outside the grammar's production
    /// count, or inconsistent header content (Spec 5, 6.2).
    MalformedBitstream(Cow<'static, str>),
    /// The header requests a feature this implementation does not provide,
    /// for example an unknown datatype representation or an invalid option
    /// combination (Spec 5.4, 7.4).
    UnsupportedOption(String),
    /// A schemaId was provided but no resolver is configured, or the
    /// resolver produced no grammar set, or an xsi:type names an unknown
    /// type in strict mode (Spec 5.4, 8.5.4.4).
    SchemaMismatch(String),
    /// A datatype-specific failure: surrogate code point, out-of-range
    /// date-time component, float exponent overflow, oversized length
    /// (Spec 7.1).
    InvalidValue(Cow<'static, str>),
    /// Internal inconsistency: the grammar state does not admit the event
    /// being coded. Indicates caller misuse or a bug, never valid input.
    InvariantViolation(Cow<'static, str>),
}

impl Error {
    /// Erstellt einen `MalformedBitstream` mit Kontext.
    pub fn malformed(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::MalformedBitstream(msg.into())
    }

    /// Erstellt einen `InvalidValue` mit Kontext.
    pub fn invalid_value(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidValue(msg.into())
    }

    /// Erstellt einen `InvariantViolation` mit Kontext.
    pub fn invariant(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::InvariantViolation(msg.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEndOfStream => {
                write!(f, "unexpected end of EXI stream (Spec 7.1)")
            }
            Self::MalformedBitstream(msg) => {
                if msg.is_empty() {
                    write!(f, "malformed EXI bitstream (Spec 5, 6.2)")
                } else {
                    write!(f, "malformed EXI bitstream: {msg} (Spec 5, 6.2)")
                }
            }
            Self::UnsupportedOption(msg) => {
                write!(f, "unsupported EXI option: {msg} (Spec 5.4)")
            }
            Self::SchemaMismatch(msg) => write!(f, "schema mismatch: {msg}"),
            Self::InvalidValue(msg) => {
                write!(f, "invalid typed value: {msg} (Spec 7.1)")
            }
            Self::InvariantViolation(msg) => {
                write!(f, "coder invariant violated: {msg}")
            }
        }
    }
}

impl std::error::Error for Error {}

/// A convenience `Result` type alias using [`Error`].
pub type Result<T> = core::result::Result<T, Error>;

/// Receiver for non-fatal conditions.
///
/// Der Coder meldet Abweichungen (deviation events bei strict=false,
/// ignorierte Header-Erweiterungen) als Warnung und faehrt fort. Der
/// Default-Handler leitet an `log::warn!` weiter.
pub trait ErrorHandler {
    /// Called for every non-fatal condition. The stream continues.
    fn warning(&mut self, error: &Error);
}

/// Default [`ErrorHandler`]: forwards warnings to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogErrorHandler;

impl ErrorHandler for LogErrorHandler {
    fn warning(&mut self, error: &Error) {
        log::warn!("exi warning: {error}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every variant must render a non-empty message with its spec anchor.

    #[test]
    fn end_of_stream_display() {
        let msg = Error::UnexpectedEndOfStream.to_string();
        assert!(msg.contains("end of"), "{msg}");
        assert!(msg.contains("7.1"), "{msg}");
    }

    #[test]
    fn malformed_display_without_context() {
        let msg = Error::malformed("").to_string();
        assert!(msg.contains("malformed"), "{msg}");
        assert!(msg.contains("6.2"), "{msg}");
    }

    #[test]
    fn malformed_display_with_context() {
        let msg = Error::malformed("cookie truncated").to_string();
        assert!(msg.contains("cookie truncated"), "{msg}");
    }

    #[test]
    fn unsupported_option_display() {
        let msg = Error::UnsupportedOption("selfContained".into()).to_string();
        assert!(msg.contains("selfContained"), "{msg}");
        assert!(msg.contains("5.4"), "{msg}");
    }

    #[test]
    fn schema_mismatch_display() {
        let msg = Error::SchemaMismatch("no resolver for 'urn:x'".into()).to_string();
        assert!(msg.contains("urn:x"), "{msg}");
    }

    #[test]
    fn invalid_value_display() {
        let msg = Error::invalid_value("surrogate code point U+D800").to_string();
        assert!(msg.contains("D800"), "{msg}");
        assert!(msg.contains("7.1"), "{msg}");
    }

    #[test]
    fn invariant_display() {
        let msg = Error::invariant("EE without open element").to_string();
        assert!(msg.contains("EE"), "{msg}");
    }

    #[test]
    fn error_implements_std_error() {
        let e: Box<dyn std::error::Error> = Box::new(Error::UnexpectedEndOfStream);
        assert!(!e.to_string().is_empty());
    }

    #[test]
    fn error_is_clone_and_eq() {
        let e1 = Error::malformed("x");
        assert_eq!(e1.clone(), e1);
        assert_ne!(e1, Error::UnexpectedEndOfStream);
    }

    #[test]
    fn result_alias_works() {
        let ok: Result<u8> = Ok(7);
        assert_eq!(ok.unwrap(), 7);
        let err: Result<u8> = Err(Error::UnexpectedEndOfStream);
        assert!(err.is_err());
    }

    #[test]
    fn log_error_handler_is_callable() {
        let mut h = LogErrorHandler;
        h.warning(&Error::invalid_value("probe"));
    }
}
