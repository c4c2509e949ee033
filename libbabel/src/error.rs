//
// error.rs
// The Babel Compiler
//

//! This module defines types for representing possible errors
//! that may be generated during the compilation of some Babel
//! source code. It also provides useful macros for reporting
//! errors in a way that is consistent across modules.

use std::io;
use std::result;
use std::fmt::{ self, Display, Formatter };
use util::{ Diagnostic, DiagnosticKind, Range };


/// Internal helper for macros `bug!()` and `lazy_bug!()`.
macro_rules! unreachable_error {
    ($msg: expr) => {
        $crate::error::Error::Unreachable {
            message: $msg,
            file: file!(),
            line: line!() as usize,
        }
    }
}

/// Indicates a compiler error. Makes the current function return
/// an `Error::Unreachable`. This is basically a non-panicking
/// substitute for the standard `unreachable!()` macro.
macro_rules! bug {
    ($msg: expr) => {
        return Err(unreachable_error!($msg.to_owned()))
    };
    ($fmt: expr, $($args: tt)*) => {
        return Err(unreachable_error!(format!($fmt, $($args)*)))
    };
}

/// Similar to `bug!()`, but it yields a closure that returns an
/// `Error::Unreachable`. Useful for handling errors efficiently,
/// lazily, primarily using `Option::ok_or_else()`.
macro_rules! lazy_bug {
    ($msg: expr) => {
        || unreachable_error!($msg.to_owned())
    };
    ($fmt: expr, $($args: tt)*) => {
        || unreachable_error!(format!($fmt, $($args)*))
    };
}


/// An error that may occur while compiling Babel source code.
/// This can be either a user-induced error (e.g. a syntax error),
/// or an Internal Compiler Error (abbreviated ICE), i.e. a bug.
#[derive(Debug)]
pub enum Error {
    /// I/O error, probably coming from the OS, not Babel itself.
    IO(io::Error),
    /// Some unreachable code was reached as a result of a bug/unforeseen condition. ICE.
    Unreachable {
        /// Description of the bug.
        message: String,
        /// Source file inside the Babel compiler that caused the bug.
        file: &'static str,
        /// Source line index within the offending file.
        line: usize,
    },
    /// A syntactic error was found in the source code.
    Syntax {
        /// Description of the syntax error.
        message: String,
        /// If available, the human-readable source range associated
        /// with the error. End-of-input is represented as `None`.
        range: Option<Range>,
    },
    /// A semantic error was found in the source code.
    Semantic {
        /// Description of the semantic error.
        message: String,
        /// If available, the human-readable source range associated
        /// with the error. End-of-input is represented as `None`.
        range: Option<Range>,
    },
}

/// Convenience type alias for expressing `Result`s of Babel `Error`s.
pub type Result<T> = result::Result<T, Error>;


impl Error {
    /// Returns the source range associated with the error, if any.
    pub fn range(&self) -> Option<Range> {
        match *self {
            Error::IO(_)                  => None,
            Error::Unreachable { .. }     => None,
            Error::Syntax   { range, .. } => range,
            Error::Semantic { range, .. } => range,
        }
    }

    /// Writes an error object as a nicely-formatted, user-readable
    /// error message, including the source name and location.
    ///
    /// # Arguments:
    ///
    /// * `wr`: the `io::Write` that the error will be printed to.
    /// * `source`: the name of the source component (e.g., file).
    pub fn pretty_print<W: io::Write>(&self, wr: &mut W, source: &str) -> io::Result<()> {
        if let Some(range) = self.range() {
            writeln!(
                wr,
                "\n\n    In {}, near {}:",
                Diagnostic::new(source, DiagnosticKind::Highlight),
                Diagnostic::new(range, DiagnosticKind::Highlight),
            )?;
        } else {
            write!(wr, "\n\n")?;
        }

        writeln!(wr, "        {}\n", Diagnostic::new(self, DiagnosticKind::Error))
    }
}

impl std::error::Error for Error {
    fn cause(&self) -> Option<&dyn std::error::Error> {
        match *self {
            Error::IO(ref err)        => Some(err),
            Error::Unreachable { .. } => None,
            Error::Syntax { .. }      => None,
            Error::Semantic { .. }    => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match *self {
            Error::IO(ref err) => write!(f, "I/O error: {}", err),
            Error::Unreachable { ref message, file, line } => write!(
                f,
                "Internal Compiler Error: Reached unreachable code: {}, in file {}, line {}. This is a bug.",
                message,
                file,
                line,
            ),
            Error::Syntax { ref message, .. } => write!(
                f, "SyntaxError: {}", message
            ),
            Error::Semantic { ref message, .. } => write!(
                f, "Semantic Error: {}", message
            ),
        }
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Error {
        Error::IO(error)
    }
}

/// Convenience helper for building an `Error::Semantic` without a
/// source range.
pub fn semantic_error<T, S: Into<String>>(message: S) -> Result<T> {
    Err(
        Error::Semantic {
            message: message.into(),
            range: None,
        }
    )
}

/// Convenience helper for building an `Error::Syntax`.
pub fn syntax_error<T, S: Into<String>>(message: S, range: Option<Range>) -> Result<T> {
    Err(
        Error::Syntax {
            message: message.into(),
            range,
        }
    )
}
