//
// util.rs
// The Babel Compiler
//

//! The `util` module provides various helper types and functions used
//! throughout the Babel source tree: package metadata, human-readable
//! source locations, colored diagnostics, and the escape-sequence
//! decoder shared by character and string literals.

use std::fmt::{ self, Display, Formatter };
use error::{ Error, Result };
use unicode_segmentation::UnicodeSegmentation;


/// Type of a global descriptor that holds information about
/// the current version of the Babel package (library and compiler).
#[derive(Debug, Clone, Copy)]
pub struct PackageInfo {
    /// The name of the Babel package.
    pub name: &'static str,
    /// The version of the Babel package.
    pub version: &'static str,
    /// The list of authors of Babel.
    pub authors: &'static str,
    /// A short summary of this package.
    pub description: &'static str,
    /// URL of the Babel home page.
    pub home_page: &'static str,
}

/// Holds metadata about the Babel package as defined in the Cargo manifest.
pub static PACKAGE_INFO: PackageInfo = PackageInfo {
    name:        env!["CARGO_PKG_NAME"],
    version:     env!["CARGO_PKG_VERSION"],
    authors:     env!["CARGO_PKG_AUTHORS"],
    description: env!["CARGO_PKG_DESCRIPTION"],
    home_page:   env!["CARGO_PKG_HOMEPAGE"],
};

/// Used for distinguishing between the types of
/// diagnostic that the compiler can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticKind {
    /// A message without any special attributes or coloring.
    Default,
    /// An informative message, eg. compilation progress or performance.
    Info,
    /// A highlighted part of a diagnostic.
    Highlight,
    /// Indicates successful compilation.
    Success,
    /// Indicates that an error occurred during compilation.
    Error,
}

/// Returns `DiagnosticKind::Default`.
impl Default for DiagnosticKind {
    fn default() -> Self {
        DiagnosticKind::Default
    }
}

/// A string which, when `Display`ed, looks pretty and colorful.
/// It is used for formatting diagnostic messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Diagnostic<T> {
    value: T,
    kind: DiagnosticKind,
}

impl<T> Diagnostic<T> {
    /// Makes a pretty-printable diagnostic that displays
    /// a given value in the specified diagnostic style.
    pub fn new(value: T, kind: DiagnosticKind) -> Self {
        Diagnostic { value, kind }
    }

    /// Consumes `self` and returns the inner value, discarding style information.
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Returns the diagnostic kind associated with this instance.
    pub fn kind(&self) -> DiagnosticKind {
        self.kind
    }
}

impl<T> From<T> for Diagnostic<T> {
    fn from(value: T) -> Self {
        Self::new(value, DiagnosticKind::Default)
    }
}

impl<T> Display for Diagnostic<T> where T: Display {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let reset = "\x1b[0m";
        let color = match self.kind {
            DiagnosticKind::Default   => "",
            DiagnosticKind::Info      => "\x1b[1;33m",
            DiagnosticKind::Highlight => "\x1b[1;36m",
            DiagnosticKind::Success   => "\x1b[1;32m",
            DiagnosticKind::Error     => "\x1b[1;31m",
        };

        write!(f, "{}{}{}{}", reset, color, self.value, reset)
    }
}

/// Represents the location of a single extended grapheme cluster
/// in the source fed to the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location {
    /// 1-based line index within the source.
    pub line: usize,
    /// 1-based character index within the line.
    pub column: usize,
}

impl Default for Location {
    fn default() -> Self {
        Location { line: 1, column: 1 }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "line {}, char {}", self.line, self.column)
    }
}

impl Location {
    /// Returns the location one past the end of `lexeme`, assuming
    /// that `lexeme` itself begins at `self`.
    pub fn advanced_by(&self, lexeme: &str) -> Location {
        // Keep this list in sync with the lexer's NEWLINE pattern
        let line_breaks: &[char] = &['\n', '\x0b', '\x0c', '\r'];
        match lexeme.rfind(line_breaks) {
            // -1 because the \n itself doesn't count,
            // +1 because humans start counting at 1.
            Some(index) => Location {
                line:   self.line + grapheme_count_by(lexeme, |g| g.contains(line_breaks)),
                column: grapheme_count(&lexeme[index..]) - 1 + 1,
            },
            None => Location {
                line:   self.line,
                column: self.column + grapheme_count(lexeme),
            },
        }
    }
}

/// A half-open range representing a source span.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Range {
    /// Location at the beginning of the source range.
    pub start: Location,
    /// Location one past the end of the source range.
    pub end: Location,
}

impl Display for Range {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}...{}", self.start, self.end)
    }
}

/// This trait is to be implemented by entities that correspond
/// to some range in the source. This is used for generating
/// location information in user-visible error messages.
pub trait Ranged {
    /// Returns the range `self` was generated from.
    fn range(&self) -> Range;
}

impl Ranged for Range {
    fn range(&self) -> Range {
        *self
    }
}

/// Appends `element` to `vec` unless an equal element is already
/// present. Returns whether the vector changed. The grammar and LR
/// table algorithms use this to keep insertion-ordered sets, which
/// keeps state numbering and diagnostics deterministic.
pub fn add_unique<T: PartialEq>(element: T, vec: &mut Vec<T>) -> bool {
    if vec.contains(&element) {
        false
    } else {
        vec.push(element);
        true
    }
}

/// Answers whether every element of `xs` is contained in `ys`.
pub fn includes<T: PartialEq>(xs: &[T], ys: &[T]) -> bool {
    xs.iter().all(|x| ys.contains(x))
}

/// Answers whether `xs` and `ys` contain the same elements, ignoring
/// order and multiplicity.
pub fn include_each_other<T: PartialEq>(xs: &[T], ys: &[T]) -> bool {
    includes(xs, ys) && includes(ys, xs)
}

/// Returns the number of extended grapheme clusters in `string`.
/// Useful for counting 'characters' in accordance with a user's
/// notion of a 'character' or grapheme. Mainly used by the lexer
/// for generating visually accurate source location data.
pub fn grapheme_count(string: &str) -> usize {
    string.graphemes(true).count()
}

/// Counts the grapheme clusters in a string that satisfy a condition.
pub fn grapheme_count_by<P: Fn(&str) -> bool>(string: &str, pred: P) -> usize {
    string.graphemes(true).filter(|&g| pred(g)).count()
}

/// Decodes the escape sequences of a character or string literal body.
/// The supported escapes are `\\`, `\r`, `\n`, `\f`, `\t`, `\a`, `\e`,
/// `\cX` (control character), `\uXXXX` and `\UXXXXXXXX` (Unicode code
/// points), and up to three octal digits. `\b` passes through verbatim.
pub fn unescape_string(oldstr: &str) -> Result<String> {
    let chars: Vec<char> = oldstr.chars().collect();
    let mut newstr = String::with_capacity(oldstr.len());
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];

        if ch != '\\' {
            newstr.push(ch);
            i += 1;
            continue;
        }

        i += 1;
        let esc = match chars.get(i) {
            Some(&c) => c,
            None => return semantic_error("trailing '\\' in literal"),
        };

        match esc {
            '\\' => newstr.push('\\'),
            'r'  => newstr.push('\r'),
            'n'  => newstr.push('\n'),
            'f'  => newstr.push('\x0c'),
            't'  => newstr.push('\t'),
            'a'  => newstr.push('\x07'),
            'e'  => newstr.push('\x1b'), // ASCII ESC
            'b'  => newstr.push_str("\\b"), // pass through
            'c'  => {
                i += 1;
                let ctrl = match chars.get(i) {
                    Some(&c) => c,
                    None => return semantic_error("trailing '\\c'"),
                };
                if !ctrl.is_ascii() {
                    return semantic_error("Expected ASCII after \\c");
                }
                newstr.push(((ctrl as u8) ^ 64) as char);
            },
            'u' | 'U' => {
                let len = if esc == 'u' { 4 } else { 8 };
                if i + len >= chars.len() {
                    return semantic_error("string too short for Unicode escape");
                }
                let hex: String = chars[i + 1..=i + len].iter().collect();
                if hex.chars().any(|c| !c.is_ascii_hexdigit()) {
                    return semantic_error("non-hex digit in Unicode escape");
                }
                let code = u32::from_str_radix(&hex, 16)
                    .map_err(|_| semantic("invalid Unicode escape"))?;
                match std::char::from_u32(code) {
                    Some(c) => newstr.push(c),
                    None => return semantic_error("invalid Unicode code point"),
                }
                i += len;
            },
            '8' | '9' => return semantic_error("Illegal octal character"),
            '0'..='7' => {
                let mut digits = 1;
                while i + digits < chars.len()
                    && digits < 3
                    && ('0'..='7').contains(&chars[i + digits])
                {
                    digits += 1;
                }
                let oct: String = chars[i..i + digits].iter().collect();
                let value = u8::from_str_radix(&oct, 8)
                    .map_err(|_| semantic("invalid octal escape"))?;
                newstr.push(value as char);
                i += digits - 1;
            },
            _ => {
                newstr.push('\\');
                newstr.push(esc);
            },
        }

        i += 1;
    }

    Ok(newstr)
}

fn semantic(message: &str) -> Error {
    Error::Semantic {
        message: message.to_owned(),
        range: None,
    }
}

fn semantic_error<T>(message: &str) -> Result<T> {
    Err(semantic(message))
}
