//! Tokenizer and token filter for Verdict source text
//!
//! Scanning is a single pass over the source: at each position an ordered
//! matcher table is tried and the first (highest-priority) match wins.
//! Characters no matcher accepts are collected into [`LexError`]s, with
//! consecutive failures merged, and scanning continues. The stream always
//! ends with a synthetic [`TokenKind::Eof`] token.

use crate::error::LexError;

/// The kind of a scanned token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum TokenKind {
    // Trivia
    Eol,
    Whitespace,
    Comment,

    // Compound assignment
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,

    // Equality and comparison
    EqEq,
    BangEq,
    Gte,
    Lte,
    Gt,
    Lt,

    // Single-character operators
    Bang,
    Star,
    Slash,
    Plus,
    Minus,
    Percent,
    Eq,
    Question,
    Colon,
    Dot,
    Comma,
    CurlyLeft,
    CurlyRight,
    ParenLeft,
    ParenRight,

    // Keywords
    Let,
    If,
    Else,
    Each,
    In,
    As,
    From,
    Take,
    Validate,
    Reject,
    Because,
    Skip,
    Print,
    Define,
    Not,
    And,
    Or,
    Includes,
    Matches,
    Ago,
    Ahead,
    Now,
    Today,
    Index,
    This,
    True,
    False,

    // Values
    Unit,
    Identifier,
    Number,
    Str,
    Regex,

    /// `:name`, one token including the colon
    Ornament,

    Eof,
}

/// A scanned token: kind, source text, byte offset of its first character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// What the matcher table classified this text as
    pub kind: TokenKind,

    /// The matched source text
    pub lexeme: String,

    /// Byte offset of the first character in the source
    pub offset: usize,
}

impl Token {
    /// Byte offset one past the last character.
    pub fn end(&self) -> usize {
        self.offset + self.lexeme.len()
    }
}

const KEYWORDS: &[(&str, TokenKind)] = &[
    ("let", TokenKind::Let),
    ("if", TokenKind::If),
    ("else", TokenKind::Else),
    ("each", TokenKind::Each),
    ("includes", TokenKind::Includes),
    ("index", TokenKind::Index),
    ("in", TokenKind::In),
    ("as", TokenKind::As),
    ("from", TokenKind::From),
    ("take", TokenKind::Take),
    ("validate", TokenKind::Validate),
    ("reject", TokenKind::Reject),
    ("because", TokenKind::Because),
    ("skip", TokenKind::Skip),
    ("print", TokenKind::Print),
    ("define", TokenKind::Define),
    ("not", TokenKind::Not),
    ("and", TokenKind::And),
    ("or", TokenKind::Or),
    ("matches", TokenKind::Matches),
    ("ago", TokenKind::Ago),
    ("ahead", TokenKind::Ahead),
    ("now", TokenKind::Now),
    ("today", TokenKind::Today),
    ("this", TokenKind::This),
    ("true", TokenKind::True),
    ("false", TokenKind::False),
];

const UNITS: &[&str] = &[
    "millisecond",
    "second",
    "minute",
    "hour",
    "day",
    "week",
    "month",
    "year",
];

const TWO_CHAR_OPS: &[(&str, TokenKind)] = &[
    ("+=", TokenKind::PlusEq),
    ("-=", TokenKind::MinusEq),
    ("*=", TokenKind::StarEq),
    ("/=", TokenKind::SlashEq),
    ("==", TokenKind::EqEq),
    ("!=", TokenKind::BangEq),
    (">=", TokenKind::Gte),
    ("<=", TokenKind::Lte),
];

const ONE_CHAR_OPS: &[(char, TokenKind)] = &[
    ('>', TokenKind::Gt),
    ('<', TokenKind::Lt),
    ('!', TokenKind::Bang),
    ('*', TokenKind::Star),
    ('/', TokenKind::Slash),
    ('+', TokenKind::Plus),
    ('-', TokenKind::Minus),
    ('%', TokenKind::Percent),
    ('=', TokenKind::Eq),
    ('?', TokenKind::Question),
    (':', TokenKind::Colon),
    ('.', TokenKind::Dot),
    (',', TokenKind::Comma),
    ('{', TokenKind::CurlyLeft),
    ('}', TokenKind::CurlyRight),
    ('(', TokenKind::ParenLeft),
    (')', TokenKind::ParenRight),
];

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// True when `rest` starts with `word` followed by a word boundary.
fn starts_with_word(rest: &str, word: &str) -> bool {
    rest.starts_with(word)
        && !rest[word.len()..]
            .chars()
            .next()
            .is_some_and(is_word_char)
}

fn match_eol(rest: &str) -> Option<usize> {
    match rest.chars().next()? {
        '\r' | '\n' | ';' => Some(1),
        _ => None,
    }
}

fn match_whitespace(rest: &str) -> Option<usize> {
    let len = rest
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(char::len_utf8)
        .sum();
    if len > 0 {
        Some(len)
    } else {
        None
    }
}

fn match_comment(rest: &str) -> Option<usize> {
    if !rest.starts_with("//") {
        return None;
    }
    Some(rest.find(['\r', '\n']).unwrap_or(rest.len()))
}

/// `/body/flags` where the body is non-empty, `\/` escapes the delimiter,
/// the closing `/` sits on the same line, and flags draw from `imsx`.
fn match_regex(rest: &str) -> Option<usize> {
    let mut chars = rest.char_indices();
    let (_, '/') = chars.next()? else {
        return None;
    };
    let mut body_len = 0usize;
    let mut escaped = false;
    let mut close = None;
    for (i, c) in chars.by_ref() {
        if escaped {
            escaped = false;
            body_len += 1;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '\r' | '\n' => return None,
            '/' => {
                close = Some(i);
                break;
            }
            _ => body_len += 1,
        }
    }
    let close = close?;
    if body_len == 0 {
        return None;
    }
    let flags: usize = rest[close + 1..]
        .chars()
        .take_while(|c| matches!(c, 'i' | 'm' | 's' | 'x'))
        .count();
    Some(close + 1 + flags)
}

/// `:name` where the name is a lowercase word, `_` allowed.
fn match_ornament(rest: &str) -> Option<usize> {
    if !rest.starts_with(':') {
        return None;
    }
    let mut chars = rest[1..].chars();
    if !chars.next().is_some_and(|c| c.is_ascii_lowercase()) {
        return None;
    }
    let body: usize = rest[1..]
        .chars()
        .take_while(|c| c.is_ascii_lowercase() || *c == '_')
        .count();
    Some(1 + body)
}

fn match_identifier(rest: &str) -> Option<usize> {
    if !rest.starts_with('$') {
        return None;
    }
    let body: usize = rest[1..].chars().take_while(|c| is_word_char(*c)).count();
    if body > 0 {
        Some(1 + body)
    } else {
        None
    }
}

fn match_number(rest: &str) -> Option<usize> {
    let mut len = rest
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .count();
    if len == 0 {
        return None;
    }
    len += rest[len..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '_')
        .count();
    if rest[len..].starts_with('.') {
        let frac = rest[len + 1..]
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '_')
            .count();
        // `1.foo` keeps the dot as its own token
        if frac > 0 {
            len += 1 + frac;
        }
    }
    Some(len)
}

fn match_string(rest: &str) -> Option<usize> {
    let mut chars = rest.char_indices();
    let (_, '"') = chars.next()? else {
        return None;
    };
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Some(i + 1),
            '\r' | '\n' => return None,
            '\\' => match chars.next()?.1 {
                'b' | 'f' | 'n' | 'r' | 't' | 'v' | '"' | '\\' | '/' => {}
                'u' => {
                    for _ in 0..4 {
                        if !chars.next()?.1.is_ascii_hexdigit() {
                            return None;
                        }
                    }
                }
                _ => return None,
            },
            _ => {}
        }
    }
    None
}

/// A token kind that can end an expression. A `/` after one of these is
/// division, never the start of a regex literal.
fn ends_expression(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Identifier
            | TokenKind::Number
            | TokenKind::Str
            | TokenKind::Regex
            | TokenKind::Unit
            | TokenKind::ParenRight
            | TokenKind::CurlyRight
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Now
            | TokenKind::Today
            | TokenKind::Index
            | TokenKind::This
            | TokenKind::Ago
            | TokenKind::Ahead
            | TokenKind::Question
            | TokenKind::Ornament
    )
}

/// Scan `source` into tokens plus any lexical errors.
///
/// Scanning always completes; errors never abort it. The returned stream
/// includes trivia (whitespace, comments, line ends) and a final `Eof`.
pub fn tokenize(source: &str) -> (Vec<Token>, Vec<LexError>) {
    let mut tokens: Vec<Token> = Vec::new();
    let mut errors: Vec<LexError> = Vec::new();
    let mut pos = 0usize;
    let mut prev_was_error = false;

    while pos < source.len() {
        let rest = &source[pos..];
        if let Some((kind, len)) = match_at(rest, &tokens) {
            tokens.push(Token {
                kind,
                lexeme: rest[..len].to_string(),
                offset: pos,
            });
            pos += len;
            prev_was_error = false;
            continue;
        }

        // No matcher accepted this character
        let c = rest.chars().next().unwrap_or('\u{fffd}');
        if prev_was_error {
            if let Some(last) = errors.last_mut() {
                last.text.push(c);
            }
        } else {
            let (line, column) = line_col(source, pos);
            errors.push(LexError {
                text: c.to_string(),
                line,
                column,
                offset: pos,
            });
        }
        pos += c.len_utf8();
        prev_was_error = true;
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        lexeme: String::new(),
        offset: source.len(),
    });
    (tokens, errors)
}

fn match_at(rest: &str, scanned: &[Token]) -> Option<(TokenKind, usize)> {
    if let Some(len) = match_eol(rest) {
        return Some((TokenKind::Eol, len));
    }
    if let Some(len) = match_whitespace(rest) {
        return Some((TokenKind::Whitespace, len));
    }
    if let Some(len) = match_comment(rest) {
        return Some((TokenKind::Comment, len));
    }
    for (text, kind) in TWO_CHAR_OPS {
        if rest.starts_with(text) {
            return Some((*kind, text.len()));
        }
    }
    // Regex literals are only legal where an expression may begin
    let prev = scanned
        .iter()
        .rev()
        .find(|t| {
            !matches!(
                t.kind,
                TokenKind::Whitespace | TokenKind::Comment
            )
        })
        .map(|t| t.kind);
    if !prev.is_some_and(ends_expression) {
        if let Some(len) = match_regex(rest) {
            return Some((TokenKind::Regex, len));
        }
    }
    if let Some(len) = match_ornament(rest) {
        return Some((TokenKind::Ornament, len));
    }
    let first = rest.chars().next()?;
    for (c, kind) in ONE_CHAR_OPS {
        if first == *c {
            return Some((*kind, c.len_utf8()));
        }
    }
    for (word, kind) in KEYWORDS {
        if starts_with_word(rest, word) {
            return Some((*kind, word.len()));
        }
    }
    for unit in UNITS {
        if starts_with_word(rest, unit) {
            return Some((TokenKind::Unit, unit.len()));
        }
        let plural = format!("{unit}s");
        if starts_with_word(rest, &plural) {
            return Some((TokenKind::Unit, plural.len()));
        }
    }
    if let Some(len) = match_identifier(rest) {
        return Some((TokenKind::Identifier, len));
    }
    if let Some(len) = match_number(rest) {
        return Some((TokenKind::Number, len));
    }
    if let Some(len) = match_string(rest) {
        return Some((TokenKind::Str, len));
    }
    None
}

fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for c in source[..offset].chars() {
        if c == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

// ═══════════════════════════════════════════════════════════════════════
// Token Filter
// ═══════════════════════════════════════════════════════════════════════

/// Operators that may straddle a line break. A line end next to one of
/// these continues the statement instead of terminating it.
fn continues_statement(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Star
            | TokenKind::Slash
            | TokenKind::Percent
            | TokenKind::PlusEq
            | TokenKind::MinusEq
            | TokenKind::StarEq
            | TokenKind::SlashEq
            | TokenKind::Eq
            | TokenKind::EqEq
            | TokenKind::BangEq
            | TokenKind::Gte
            | TokenKind::Lte
            | TokenKind::Gt
            | TokenKind::Lt
            | TokenKind::And
            | TokenKind::Or
            | TokenKind::Includes
            | TokenKind::Matches
            | TokenKind::In
            | TokenKind::Because
            | TokenKind::Else
            | TokenKind::Dot
            | TokenKind::Comma
            | TokenKind::Colon
            | TokenKind::Ornament
    )
}

/// Drop trivia from a scanned stream.
///
/// Whitespace and comments are removed outright. A line-end token is
/// removed when it opens the stream, follows another line end or an
/// opening brace, or sits next to an operator that continues the
/// statement across the break.
pub fn filter(tokens: Vec<Token>) -> Vec<Token> {
    let solid: Vec<Token> = tokens
        .into_iter()
        .filter(|t| !matches!(t.kind, TokenKind::Whitespace | TokenKind::Comment))
        .collect();

    let mut kept: Vec<Token> = Vec::with_capacity(solid.len());
    for (i, token) in solid.iter().enumerate() {
        if token.kind == TokenKind::Eol {
            let prev = kept.last().map(|t| t.kind);
            let next = solid.get(i + 1).map(|t| t.kind);
            let drop = match prev {
                None => true,
                Some(TokenKind::Eol) | Some(TokenKind::CurlyLeft) => true,
                Some(p) => {
                    continues_statement(p) || next.is_some_and(continues_statement)
                }
            };
            if drop {
                continue;
            }
        }
        kept.push(token.clone());
    }
    kept
}

/// Tokenize and filter in one step.
pub fn scan(source: &str) -> (Vec<Token>, Vec<LexError>) {
    let (tokens, errors) = tokenize(source);
    (filter(tokens), errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, errors) = scan(source);
        assert!(errors.is_empty(), "unexpected lex errors: {errors:?}");
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_scan_simple_expression() {
        assert_eq!(
            kinds("1 + 2"),
            vec![
                TokenKind::Number,
                TokenKind::Plus,
                TokenKind::Number,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_scan_identifier_and_keywords() {
        assert_eq!(
            kinds("let $total_1 = 0"),
            vec![
                TokenKind::Let,
                TokenKind::Identifier,
                TokenKind::Eq,
                TokenKind::Number,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_scan_units_singular_and_plural() {
        assert_eq!(
            kinds("1 day"),
            vec![TokenKind::Number, TokenKind::Unit, TokenKind::Eof]
        );
        assert_eq!(
            kinds("3 weeks ago"),
            vec![
                TokenKind::Number,
                TokenKind::Unit,
                TokenKind::Ago,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_scan_number_forms() {
        let (tokens, _) = scan("1_000 3.14 2.");
        assert_eq!(tokens[0].lexeme, "1_000");
        assert_eq!(tokens[1].lexeme, "3.14");
        // a bare trailing dot is not part of the number
        assert_eq!(tokens[2].lexeme, "2");
        assert_eq!(tokens[3].kind, TokenKind::Dot);
    }

    #[test]
    fn test_scan_string_with_escapes() {
        let (tokens, errors) = scan(r#""a\n\"b\" A""#);
        assert!(errors.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::Str);
    }

    #[test]
    fn test_scan_regex_literal() {
        assert_eq!(
            kinds(r#""hello" matches /h.llo/i"#),
            vec![
                TokenKind::Str,
                TokenKind::Matches,
                TokenKind::Regex,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_scan_slash_is_division_after_value() {
        assert_eq!(
            kinds("6 / 2 / 3"),
            vec![
                TokenKind::Number,
                TokenKind::Slash,
                TokenKind::Number,
                TokenKind::Slash,
                TokenKind::Number,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_scan_ornament_chain() {
        let (tokens, errors) = scan("$name:length:round");
        assert!(errors.is_empty());
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier,
                TokenKind::Ornament,
                TokenKind::Ornament,
                TokenKind::Eof
            ]
        );
        assert_eq!(tokens[1].lexeme, ":length");
    }

    #[test]
    fn test_scan_comment_dropped() {
        assert_eq!(
            kinds("1 // the one\n+ 2"),
            vec![
                TokenKind::Number,
                TokenKind::Plus,
                TokenKind::Number,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_scan_unknown_chars_merge() {
        let (_, errors) = tokenize("1 @@~ 2");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].text, "@@~");
        assert_eq!(errors[0].line, 1);
        assert_eq!(errors[0].column, 3);
    }

    #[test]
    fn test_scan_bare_dollar_is_error() {
        let (_, errors) = tokenize("let $ = 1");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].text, "$");
    }

    #[test]
    fn test_filter_eol_rules() {
        // leading newline, doubled newlines, newline after `{` all vanish
        assert_eq!(
            kinds("\n1\n\n2\n"),
            vec![
                TokenKind::Number,
                TokenKind::Eol,
                TokenKind::Number,
                TokenKind::Eol,
                TokenKind::Eof
            ]
        );
        assert_eq!(
            kinds("{\n1 }"),
            vec![
                TokenKind::CurlyLeft,
                TokenKind::Number,
                TokenKind::CurlyRight,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_filter_operator_continuation() {
        assert_eq!(
            kinds("1 +\n2"),
            vec![
                TokenKind::Number,
                TokenKind::Plus,
                TokenKind::Number,
                TokenKind::Eof
            ]
        );
        assert_eq!(
            kinds("1\nand 2"),
            vec![
                TokenKind::Number,
                TokenKind::And,
                TokenKind::Number,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_filter_else_continuation() {
        assert_eq!(
            kinds("if true { 1 }\nelse { 2 }"),
            vec![
                TokenKind::If,
                TokenKind::True,
                TokenKind::CurlyLeft,
                TokenKind::Number,
                TokenKind::CurlyRight,
                TokenKind::Else,
                TokenKind::CurlyLeft,
                TokenKind::Number,
                TokenKind::CurlyRight,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_offsets_are_byte_positions() {
        let (tokens, _) = scan("let $x = 10");
        let offsets: Vec<usize> = tokens.iter().map(|t| t.offset).collect();
        assert_eq!(offsets, vec![0, 4, 7, 9, 11]);
    }
}
