//! A module implementing lexical analysis (tokenization) for the shell language.
//!
//! The lexer walks a single source line and hands out [`Token`]s one at a time.
//! It also hosts [`split_outside_quotes`], which the interpreter uses to cut a
//! raw line into `;`-separated segments before any of them is tokenized.

use std::fmt;
use thiserror::Error;

/// The kind of a token recognized by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Anything that is not an operator or a variable, including quoted text.
    Unit,
    /// A `$name` reference. The token value keeps the leading `$`.
    Variable,
    /// `=`
    Equals,
    /// `&&`
    And,
    /// `||`
    Or,
    /// `|`
    Pipe,
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `;`
    Semicolon,
    /// End of input.
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Unit => "Unit",
            TokenKind::Variable => "Variable",
            TokenKind::Equals => "Equals",
            TokenKind::And => "And",
            TokenKind::Or => "Or",
            TokenKind::Pipe => "Pipe",
            TokenKind::LeftParen => "LeftParen",
            TokenKind::RightParen => "RightParen",
            TokenKind::Semicolon => "Semicolon",
            TokenKind::Eof => "Eof",
        };
        f.write_str(name)
    }
}

/// A token with the position of its first character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            value: value.into(),
            kind,
            line,
            column,
        }
    }
}

/// Errors that can occur during the lexical analysis process.
///
/// Every variant is fatal to the line being tokenized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    /// A `"` was opened but never closed. Points at the opening quote.
    #[error("unterminated quoted unit at {line}:{column}")]
    UnterminatedQuote { line: usize, column: usize },
    /// The input ended right after a `\`.
    #[error("singular backslash at {line}:{column}")]
    DanglingBackslash { line: usize, column: usize },
    /// A lone `&`; only `&&` is an operator.
    #[error("invalid operator '&' at {line}:{column}")]
    InvalidOperator { line: usize, column: usize },
}

/// Characters that terminate a unit or a variable name.
///
/// The same set restricts assignment targets in the evaluator.
pub fn is_illegal_char(c: char) -> bool {
    c.is_whitespace() || matches!(c, '=' | '|' | '&' | ';' | '(' | ')')
}

/// Returns true if `s` contains any character rejected by [`is_illegal_char`].
pub fn contains_illegal_chars(s: &str) -> bool {
    s.chars().any(is_illegal_char)
}

/// Streaming tokenizer over one source string.
///
/// Each call to [`Lexer::next_token`] advances the cursor. Once `Eof` has been
/// returned, further calls keep returning `Eof`.
pub struct Lexer {
    input: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    finished: bool,
}

impl Lexer {
    /// Creates a lexer positioned at line 1, column 1.
    pub fn new(source: &str) -> Self {
        Self::starting_at(source, 1, 1)
    }

    /// Creates a lexer whose first character is reported at `line:column`.
    ///
    /// Used when the source is a slice of a larger line or file, so errors
    /// still point at the right place.
    pub fn starting_at(source: &str, line: usize, column: usize) -> Self {
        Lexer {
            input: source.chars().collect(),
            pos: 0,
            line,
            column,
            finished: false,
        }
    }

    /// Returns the next token from the stream.
    ///
    /// # Returns
    /// The next [`Token`], an `Eof` token at the end of input, or a [`LexError`]
    /// for a malformed token.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_trivia();

        let (line, column) = (self.line, self.column);
        let Some(ch) = self.current() else {
            return Ok(Token::new(TokenKind::Eof, "", line, column));
        };

        let single = match ch {
            '=' => Some(TokenKind::Equals),
            ';' => Some(TokenKind::Semicolon),
            '(' => Some(TokenKind::LeftParen),
            ')' => Some(TokenKind::RightParen),
            _ => None,
        };
        if let Some(kind) = single {
            self.advance();
            return Ok(Token::new(kind, ch.to_string(), line, column));
        }

        match ch {
            '&' if self.peek() == Some('&') => {
                self.advance();
                self.advance();
                Ok(Token::new(TokenKind::And, "&&", line, column))
            }
            '&' => Err(LexError::InvalidOperator { line, column }),
            '|' if self.peek() == Some('|') => {
                self.advance();
                self.advance();
                Ok(Token::new(TokenKind::Or, "||", line, column))
            }
            '|' => {
                self.advance();
                Ok(Token::new(TokenKind::Pipe, "|", line, column))
            }
            '$' => {
                self.advance();
                let mut value = String::from("$");
                while let Some(c) = self.current() {
                    if is_illegal_char(c) {
                        break;
                    }
                    value.push(c);
                    self.advance();
                }
                Ok(Token::new(TokenKind::Variable, value, line, column))
            }
            _ => self.collect_unit(line, column),
        }
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.pos + 1).copied()
    }

    fn advance(&mut self) {
        if let Some(c) = self.current() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.pos += 1;
        }
    }

    /// Skips whitespace and `#` comments until a token can begin.
    fn skip_trivia(&mut self) {
        loop {
            while self.current().is_some_and(char::is_whitespace) {
                self.advance();
            }
            if self.current() != Some('#') {
                return;
            }
            while self.current().is_some_and(|c| c != '\n') {
                self.advance();
            }
        }
    }

    fn collect_unit(&mut self, line: usize, column: usize) -> Result<Token, LexError> {
        let mut value = String::new();

        while let Some(c) = self.current() {
            if is_illegal_char(c) {
                break;
            }
            if c == '"' {
                let (quote_line, quote_column) = (self.line, self.column);
                self.advance();
                loop {
                    match self.current() {
                        None => {
                            return Err(LexError::UnterminatedQuote {
                                line: quote_line,
                                column: quote_column,
                            });
                        }
                        Some('"') => {
                            self.advance();
                            break;
                        }
                        Some(_) => self.push_escaped(&mut value)?,
                    }
                }
            } else {
                self.push_escaped(&mut value)?;
            }
        }

        Ok(Token::new(TokenKind::Unit, value, line, column))
    }

    /// Appends the current character to `out`, resolving a backslash escape.
    fn push_escaped(&mut self, out: &mut String) -> Result<(), LexError> {
        let Some(c) = self.current() else {
            return Ok(());
        };
        if c != '\\' {
            out.push(c);
            self.advance();
            return Ok(());
        }

        let (line, column) = (self.line, self.column);
        self.advance();
        let Some(escaped) = self.current() else {
            return Err(LexError::DanglingBackslash { line, column });
        };
        match escaped {
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        self.advance();
        Ok(())
    }
}

impl Iterator for Lexer {
    type Item = Result<Token, LexError>;

    /// Yields tokens up to and including `Eof`, then `None`. An error ends the
    /// stream as well.
    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let item = self.next_token();
        match &item {
            Ok(token) if token.kind == TokenKind::Eof => self.finished = true,
            Err(_) => self.finished = true,
            Ok(_) => {}
        }
        if let Ok(token) = &item {
            tracing::trace!(kind = %token.kind, value = %token.value, line = token.line, column = token.column, "token");
        }
        Some(item)
    }
}

/// The main entry point function to perform lexical analysis.
///
/// Collects the whole token sequence eagerly. The result always ends with an
/// `Eof` token.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).collect()
}

/// Splits `line` on `delimiter`, never inside a `"..."` span.
///
/// A backslash escapes the following character both inside and outside quotes,
/// so `\"` never opens or closes a span and `\;` never splits. A `#` at the
/// start of a word begins a comment; nothing after it is split. An empty final
/// segment is dropped, empty inner segments are kept.
pub fn split_outside_quotes(line: &str, delimiter: &str) -> Vec<String> {
    split_spans(line, delimiter)
        .into_iter()
        .map(|(_, segment)| segment.to_string())
        .collect()
}

/// Same as [`split_outside_quotes`], but returns each segment together with
/// its byte offset in `line`.
pub(crate) fn split_spans<'a>(line: &'a str, delimiter: &str) -> Vec<(usize, &'a str)> {
    let mut out = Vec::new();
    if delimiter.is_empty() {
        if !line.is_empty() {
            out.push((0, line));
        }
        return out;
    }

    let mut start = 0;
    let mut chars = line.char_indices().peekable();
    let mut in_quotes = false;
    let mut at_word_start = true;

    while let Some(&(i, c)) = chars.peek() {
        if !in_quotes && line[i..].starts_with(delimiter) {
            out.push((start, &line[start..i]));
            start = i + delimiter.len();
            while chars.peek().is_some_and(|&(j, _)| j < start) {
                chars.next();
            }
            at_word_start = true;
            continue;
        }

        chars.next();
        match c {
            '\\' => {
                chars.next();
                at_word_start = false;
            }
            '"' => {
                in_quotes = !in_quotes;
                at_word_start = false;
            }
            '#' if !in_quotes && at_word_start => break,
            c => at_word_start = !in_quotes && c.is_whitespace(),
        }
    }

    if start < line.len() {
        out.push((start, &line[start..]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    fn values(src: &str) -> Vec<String> {
        tokenize(src)
            .unwrap()
            .into_iter()
            .filter(|t| t.kind != TokenKind::Eof)
            .map(|t| t.value)
            .collect()
    }

    #[test]
    fn test_operators_and_punctuation() {
        use TokenKind::*;
        assert_eq!(
            kinds("a && b || c | d ; ( e ) x = y"),
            vec![
                Unit, And, Unit, Or, Unit, Pipe, Unit, Semicolon, LeftParen, Unit, RightParen,
                Unit, Equals, Unit, Eof
            ]
        );
    }

    #[test]
    fn test_operators_terminate_units_without_spaces() {
        use TokenKind::*;
        assert_eq!(kinds("a|b&&c"), vec![Unit, Pipe, Unit, And, Unit, Eof]);
        assert_eq!(values("x=5"), vec!["x", "=", "5"]);
    }

    #[test]
    fn test_quoted_unit_keeps_spaces() {
        assert_eq!(values(r#"echo "a b" c"#), vec!["echo", "a b", "c"]);
        assert_eq!(values(r#""a b"c"#), vec!["a bc"]);
        assert_eq!(values(r#""""#), vec![""]);
    }

    #[test]
    fn test_escape_sequences() {
        assert_eq!(values(r#"a\tb"#), vec!["a\tb"]);
        assert_eq!(values(r#""x\"y\\z""#), vec!["x\"y\\z"]);
        assert_eq!(values(r#"\q"#), vec!["\\q"]);
        assert_eq!(values(r#"say \"hi\""#), vec!["say", "\"hi\""]);
    }

    #[test]
    fn test_variable_is_collected_verbatim() {
        let tokens = tokenize(r#"echo $x "$y" $a"b"#).unwrap();
        assert_eq!(tokens[1].kind, TokenKind::Variable);
        assert_eq!(tokens[1].value, "$x");
        assert_eq!(tokens[2].kind, TokenKind::Unit);
        assert_eq!(tokens[2].value, "$y");
        assert_eq!(tokens[3].kind, TokenKind::Variable);
        assert_eq!(tokens[3].value, "$a\"b");
    }

    #[test]
    fn test_comments_and_whitespace_are_skipped() {
        assert_eq!(kinds("   # nothing here"), vec![TokenKind::Eof]);
        assert_eq!(values("echo a # trailing"), vec!["echo", "a"]);
        assert_eq!(values("# one\n  # two\n echo"), vec!["echo"]);
        assert_eq!(values("a#b"), vec!["a#b"]);
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("echo  hi\n  x").unwrap();
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].column), (1, 7));
        assert_eq!((tokens[2].line, tokens[2].column), (2, 3));
        assert_eq!(tokens[3].kind, TokenKind::Eof);
    }

    #[test]
    fn test_starting_at_offsets_positions() {
        let mut lexer = Lexer::starting_at("ls", 4, 10);
        let token = lexer.next_token().unwrap();
        assert_eq!((token.line, token.column), (4, 10));
    }

    #[test]
    fn test_unterminated_quote_points_at_opening_quote() {
        let err = tokenize(r#"echo "abc"#).unwrap_err();
        assert_eq!(err, LexError::UnterminatedQuote { line: 1, column: 6 });
        assert_eq!(err.to_string(), "unterminated quoted unit at 1:6");
    }

    #[test]
    fn test_dangling_backslash() {
        let err = tokenize(r"echo abc\").unwrap_err();
        assert_eq!(err, LexError::DanglingBackslash { line: 1, column: 9 });
    }

    #[test]
    fn test_lone_ampersand_is_rejected() {
        let err = tokenize("sleep 1 &").unwrap_err();
        assert_eq!(err, LexError::InvalidOperator { line: 1, column: 9 });
    }

    #[test]
    fn test_iterator_stops_after_eof() {
        let mut lexer = Lexer::new("a");
        assert_eq!(lexer.next().unwrap().unwrap().kind, TokenKind::Unit);
        assert_eq!(lexer.next().unwrap().unwrap().kind, TokenKind::Eof);
        assert!(lexer.next().is_none());
    }

    #[test]
    fn test_illegal_chars() {
        assert!(contains_illegal_chars("a b"));
        assert!(contains_illegal_chars("a;b"));
        assert!(contains_illegal_chars("a\nb"));
        assert!(!contains_illegal_chars("name_1"));
    }

    #[test]
    fn test_split_outside_quotes() {
        assert_eq!(
            split_outside_quotes(r#"x = 5; echo "a;b"; echo c"#, ";"),
            vec!["x = 5", r#" echo "a;b""#, " echo c"]
        );
        assert_eq!(split_outside_quotes("a;;b;", ";"), vec!["a", "", "b"]);
        assert_eq!(
            split_outside_quotes("a && b && c", "&&"),
            vec!["a ", " b ", " c"]
        );
    }

    #[test]
    fn test_split_honors_escapes_and_comments() {
        assert_eq!(
            split_outside_quotes(r#"echo "a\";b"; echo c"#, ";"),
            vec![r#"echo "a\";b""#, " echo c"]
        );
        assert_eq!(split_outside_quotes(r"echo a\;b", ";"), vec![r"echo a\;b"]);
        assert_eq!(
            split_outside_quotes("echo a # c; d", ";"),
            vec!["echo a # c; d"]
        );
        assert_eq!(split_outside_quotes("echo a#b; c", ";"), vec!["echo a#b", " c"]);
    }

    #[test]
    fn test_split_spans_report_offsets() {
        let spans = split_spans("ab; cd", ";");
        assert_eq!(spans, vec![(0, "ab"), (3, " cd")]);
    }
}
