// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The result type returned by parsers, preprocessors, and suggestion
//! sources.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// Exactly one of success or failure, as produced by an
/// [`ArgumentParser`](crate::component::ArgumentParser).
///
/// This is modeled as a plain [`Result`] rather than a bespoke `Success`/
/// `Failure` enum: `Result` already is that sum type. The tree never
/// inspects the error payload beyond propagating it, which is why
/// [`ArgumentParseError`] wraps an opaque `dyn Error`.
pub type ParseResult<T> = Result<T, ArgumentParseError>;

/// An opaque error payload produced by a parser, preprocessor, or default
/// value evaluation.
///
/// The tree treats this as a black box: it records which component
/// produced it and forwards it to the sender's error formatter unexamined.
#[derive(Clone)]
pub struct ArgumentParseError {
    inner: Arc<dyn StdError + Send + Sync>,
}

impl ArgumentParseError {
    /// Wrap any error in an `ArgumentParseError`.
    pub fn new(error: impl StdError + Send + Sync + 'static) -> Self {
        ArgumentParseError {
            inner: Arc::new(error),
        }
    }

    /// Wrap a plain message as an `ArgumentParseError`.
    pub fn message(message: impl Into<String>) -> Self {
        ArgumentParseError::new(MessageError(message.into()))
    }
}

impl fmt::Debug for ArgumentParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl fmt::Display for ArgumentParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl StdError for ArgumentParseError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.inner.as_ref())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct MessageError(String);
