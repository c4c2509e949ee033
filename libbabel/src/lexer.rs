//
// lexer.rs
// The Babel Compiler
//

//! This module contains type definitions and functions for breaking up
//! unstructured source text into tokens, along with the two token
//! rewriting passes that run before parsing: elision of whitespace and
//! comments, and semicolon insertion at meaningful line breaks.

use regex::Regex;
use util::{ Location, Range, Ranged };


/// Represents a lexeme and its associated type tag and location
/// information as an abstract token. The tags are the terminal
/// symbols of the Babel grammar.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    /// The type tag associated with the recognized lexeme.
    pub kind: &'static str,
    /// The lexeme itself, as it was found in the source.
    pub value: String,
    /// Human-readable range information for the underlying lexeme.
    pub range: Range,
}

impl Token {
    /// Makes a token out of a type tag and a lexeme, with a default
    /// (all-ones) source range. Mostly useful for driving the parser
    /// from synthetic token streams.
    pub fn new<S: Into<String>>(kind: &'static str, value: S) -> Token {
        Token {
            kind,
            value: value.into(),
            range: Range::default(),
        }
    }
}

impl Ranged for Token {
    fn range(&self) -> Range {
        self.range
    }
}

lazy_static! {
    static ref TOKEN_SPECS: Vec<(&'static str, Regex)> = {
        let specs = [
            ("NEWLINE",        r"^(\r\n|[\n\x0b\x0c\r])"),
            ("WHITESPACE",     r"^[ \t]+"),
            ("COMMENT",        r"^#[^\n\x0b\x0c\r]*"),
            ("LET",            r"^let\b"),
            ("CONST",          r"^const\b"),
            ("TASK",           r"^task\b"),
            ("EXTERN",         r"^extern\b"),
            ("IF",             r"^if\b"),
            ("THEN",           r"^then\b"),
            ("ELIF",           r"^elif\b"),
            ("ELSE",           r"^else\b"),
            ("END",            r"^end\b"),
            ("GOTO",           r"^goto\b"),
            ("LABEL",          r"^label\b"),
            ("RETURN",         r"^return\b"),
            ("BOOL",           r"^(true|false)\b"),
            ("TYPE",           r"^(int128|int64|int32|int16|int8|int|float128|float64|float32|float16|float|bool|char|cstring|void)\b"),
            ("FLOATING_POINT", r"^((NaN|Inf)\b|0[xX][0-9a-fA-F']+(\.[0-9a-fA-F']*)?[pP][+\-]?[0-9]+|0[xX][0-9a-fA-F']+_[HhFfDdQq]|[0-9][0-9']*\.[0-9']*([eE][+\-]?[0-9]+)?(_?[HhFfDdQq])?|[0-9][0-9']*[eE][+\-]?[0-9]+(_?[HhFfDdQq])?|[0-9][0-9']*_?[HhFfDdQq])"),
            ("INTEGER",        r"^(0[xX][0-9a-fA-F']+(_[A-Za-z])?|0[oO][0-9a-fA-F']+(_[A-Za-z])?|0[bB][0-9a-fA-F']+(_[A-Za-z])?|[0-9][0-9']*(_?[BbSsIiLlCc])?)"),
            ("CHAR",           r"^'([^'\\]|\\.)+'"),
            ("STRING",         r#"^"([^"\\]|\\.)*""#),
            ("VAR",            r"^[a-z_][A-Za-z0-9_]*"),
            ("CLASS",          r"^[A-Z][A-Za-z0-9_]*"),
            ("ARROW",          r"^->"),
            ("AUG_ASSIGN",     r"^(\+=|-=|\*=|//=|/=|%=|<<=|>>=|\|=|&=|\^=)"),
            ("SHIFT_OP",       r"^(<<|>>)"),
            ("CMP_OP",         r"^(==|!=|<=|>=|<|>)"),
            ("OR_OP",          r"^\|\|"),
            ("AND_OP",         r"^&&"),
            ("XOR_OP",         r"^\^\^"),
            ("ASSIGN",         r"^="),
            ("PIPE",           r"^\|"),
            ("AMP",            r"^&"),
            ("CARET",          r"^\^"),
            ("STAR",           r"^\*"),
            ("MUL_OP",         r"^(//|/|%)"),
            ("SUM_OP",         r"^[+\-]"),
            ("NOT_OP",         r"^!"),
            ("LPAREN",         r"^\("),
            ("RPAREN",         r"^\)"),
            ("LBRACKET",       r"^\["),
            ("RBRACKET",       r"^\]"),
            ("COMMA",          r"^,"),
            ("COLON",          r"^:"),
            ("SEMICOLON",      r"^;"),
            ("DOT",            r"^\."),
        ];

        specs.iter()
             .map(|&(kind, pattern)| (kind, Regex::new(pattern).expect("invalid token regex")))
             .collect()
    };
}

/// Breaks up `source` into raw tokens, including whitespace, newline
/// and comment tokens. Matching is longest-match over the ordered
/// token spec list; ties go to the earlier pattern. A position where
/// no pattern matches is skipped one character at a time.
pub fn lex(source: &str) -> Vec<Token> {
    Lexer::new(source).lex()
}

/// Runs the full tokenization pipeline: `lex()`, then comment and
/// whitespace elision, then semicolon insertion. The result is what
/// the parser driver consumes.
pub fn prepare(source: &str) -> Vec<Token> {
    insert_semicolons(elide_ignored(lex(source)))
}

/// Drops `WHITESPACE` and `COMMENT` tokens.
pub fn elide_ignored(mut tokens: Vec<Token>) -> Vec<Token> {
    tokens.retain(|token| match token.kind {
        "WHITESPACE" | "COMMENT" => false,
        _                        => true,
    });
    tokens
}

/// The semicolon insertion pass:
///
/// 1. Consecutive `NEWLINE` tokens collapse into one.
/// 2. A `NEWLINE` becomes a `SEMICOLON` when the preceding token can
///    legally end a statement and the following token does not
///    continue one.
/// 3. Remaining `NEWLINE`s are dropped.
pub fn insert_semicolons(mut tokens: Vec<Token>) -> Vec<Token> {
    tokens.dedup_by(|current, previous| {
        current.kind == "NEWLINE" && previous.kind == "NEWLINE"
    });

    if tokens.len() >= 3 {
        for i in 1..tokens.len() - 1 {
            if tokens[i].kind == "NEWLINE"
                && is_line_terminating(tokens[i - 1].kind)
                && !is_continuation(tokens[i + 1].kind)
            {
                let range = tokens[i].range;
                tokens[i] = Token {
                    kind: "SEMICOLON",
                    value: ";".to_owned(),
                    range,
                };
            }
        }
    }

    tokens.retain(|token| token.kind != "NEWLINE");
    tokens
}

/// Answers whether a token of type `kind` may end a statement, so
/// that a newline right after it separates statements.
pub fn is_line_terminating(kind: &str) -> bool {
    match kind {
        "VAR" | "TYPE" | "CLASS"
        | "INTEGER" | "FLOATING_POINT" | "CHAR" | "STRING" | "BOOL"
        | "RETURN" | "END"
        | "RPAREN" | "RBRACKET" => true,
        _ => false,
    }
}

/// Answers whether a token of type `kind` continues the statement of
/// the previous line (currently only method-chaining dots do).
pub fn is_continuation(kind: &str) -> bool {
    kind == "DOT"
}

#[derive(Debug)]
struct Lexer<'a> {
    source: &'a str,
    location: Location,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Lexer<'a> {
        Lexer {
            source,
            location: Location::default(),
            tokens: Vec::new(),
        }
    }

    fn lex(mut self) -> Vec<Token> {
        while !self.source.is_empty() {
            match self.next() {
                Some(token) => self.tokens.push(token),
                None => self.skip_one(),
            }
        }

        self.tokens
    }

    fn next(&mut self) -> Option<Token> {
        let mut best: Option<(&'static str, usize)> = None;

        for &(kind, ref re) in TOKEN_SPECS.iter() {
            if let Some(m) = re.find(self.source) {
                let len = m.end();
                let longer = match best {
                    Some((_, best_len)) => len > best_len,
                    None => true,
                };
                if longer {
                    best = Some((kind, len));
                }
            }
        }

        best.map(|(kind, len)| {
            let value = &self.source[..len];
            let start = self.location;
            let end = start.advanced_by(value);
            let token = Token {
                kind,
                value: value.to_owned(),
                range: Range { start, end },
            };

            self.location = end;
            self.source = &self.source[len..];

            token
        })
    }

    fn skip_one(&mut self) {
        let len = self.source
                      .char_indices()
                      .nth(1)
                      .map_or(self.source.len(), |(idx, _)| idx);
        self.location = self.location.advanced_by(&self.source[..len]);
        self.source = &self.source[len..];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(tokens: &[Token]) -> Vec<&'static str> {
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn empty_source() {
        assert!(lex("").is_empty());
    }

    #[test]
    fn numeric_classification() {
        let tokens = prepare("5 5D 0xFF_I 1'000'000 3.5 2e6 NaN");
        assert_eq!(
            kinds(&tokens),
            &["INTEGER", "FLOATING_POINT", "INTEGER", "INTEGER",
              "FLOATING_POINT", "FLOATING_POINT", "FLOATING_POINT"]
        );
    }

    #[test]
    fn keywords_win_over_identifiers() {
        let tokens = prepare("let letter if iffy");
        assert_eq!(kinds(&tokens), &["LET", "VAR", "IF", "VAR"]);
    }

    #[test]
    fn longest_operator_wins() {
        let tokens = prepare("a <<= b << c < d");
        assert_eq!(
            kinds(&tokens),
            &["VAR", "AUG_ASSIGN", "VAR", "SHIFT_OP", "VAR", "CMP_OP", "VAR"]
        );
    }

    #[test]
    fn semicolons_replace_meaningful_newlines() {
        let tokens = prepare("let x = 1\n\n\nx = 2\n");
        let ks = kinds(&tokens);
        assert_eq!(
            ks,
            &["LET", "VAR", "ASSIGN", "INTEGER", "SEMICOLON",
              "VAR", "ASSIGN", "INTEGER"]
        );
    }

    #[test]
    fn continuation_lines_are_not_terminated() {
        // A newline before a dot continues the previous statement.
        let tokens = prepare("a\n.b");
        assert_eq!(kinds(&tokens), &["VAR", "DOT", "VAR"]);
    }

    #[test]
    fn comments_are_elided() {
        let tokens = prepare("x = 1 # trailing note\ny = 2");
        let ks = kinds(&tokens);
        assert!(!ks.contains(&"COMMENT"));
        assert_eq!(
            ks,
            &["VAR", "ASSIGN", "INTEGER", "SEMICOLON", "VAR", "ASSIGN", "INTEGER"]
        );
    }

    #[test]
    fn locations_track_lines_and_columns() {
        let tokens = lex("ab\ncd");
        let cd = tokens.last().unwrap();
        assert_eq!(cd.range.start.line, 2);
        assert_eq!(cd.range.start.column, 1);
    }
}
