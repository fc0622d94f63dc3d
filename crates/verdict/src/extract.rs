//! Static reference extraction
//!
//! Walks the filtered token stream, no parse, and reports which subject
//! data a program touches: fields taken out of structs, iterated
//! collections, and script-declared variables. Hosts use this to know
//! what data a program needs before running it.

use std::collections::HashMap;

use crate::lexer::{self, Token, TokenKind};

/// What a [`Reference`] stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    /// A name bound from subject data (`take`, aliased iteration items,
    /// `let` bound to a data path)
    Ref,

    /// A script-made variable with no subject-data root
    User,

    /// An iterated collection; its path ends with the `#` element marker
    Scope,
}

/// One extracted reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    /// Byte offset of the statement keyword
    pub position: usize,

    /// Start of the statement
    pub from: usize,

    /// End of the statement header
    pub to: usize,

    /// The path as written, relative to its nearest binding
    pub path: Vec<String>,

    /// What the reference stands for
    pub kind: RefKind,

    /// The bound name, when the statement names one
    pub alias: Option<String>,

    /// Inferred value type for `User` references (`"number"`,
    /// `"string[]"`, `"timestamp"`, ...)
    pub user_type: Option<String>,

    /// The path resolved through aliases to the subject-data root;
    /// `None` when the root is a script-made variable
    pub path_long: Option<Vec<String>>,
}

/// Extract every reference in the source. Unscannable characters are
/// skipped; extraction is best-effort by design.
pub fn extract_references(source: &str) -> Vec<Reference> {
    let (tokens, _) = lexer::scan(source);
    Extractor::new(&tokens).walk()
}

/// Only the script-declared (`User`) references.
pub fn extract_declarations(source: &str) -> Vec<Reference> {
    extract_references(source)
        .into_iter()
        .filter(|r| r.kind == RefKind::User)
        .collect()
}

/// How a bound name resolves.
#[derive(Debug, Clone)]
enum Resolution {
    /// Full path to the subject-data root
    Rooted(Vec<String>),

    /// Script-made; resolution stops here
    User,
}

#[derive(Debug, Default)]
struct Frame {
    aliases: HashMap<String, Resolution>,
}

struct Extractor<'a> {
    tokens: &'a [Token],
    pos: usize,
    frames: Vec<Frame>,

    /// Aliases to install in the next opened frame
    pending: Vec<(String, Resolution)>,
    out: Vec<Reference>,
}

impl<'a> Extractor<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            frames: vec![Frame::default()],
            pending: Vec::new(),
            out: Vec::new(),
        }
    }

    fn walk(mut self) -> Vec<Reference> {
        while self.kind() != TokenKind::Eof {
            match self.kind() {
                TokenKind::CurlyLeft => {
                    let mut frame = Frame::default();
                    for (name, resolution) in self.pending.drain(..) {
                        frame.aliases.insert(name, resolution);
                    }
                    self.frames.push(frame);
                    self.pos += 1;
                }
                TokenKind::CurlyRight => {
                    if self.frames.len() > 1 {
                        self.frames.pop();
                    }
                    self.pos += 1;
                }
                TokenKind::Each => self.each_header(),
                TokenKind::Take => self.take_statement(),
                TokenKind::Let => self.let_statement(),
                _ => self.pos += 1,
            }
        }
        self.out
    }

    fn kind(&self) -> TokenKind {
        self.tokens
            .get(self.pos)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn kind_at(&self, ahead: usize) -> TokenKind {
        self.tokens
            .get(self.pos + ahead)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn token(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    /// `$a.$b.$c` starting at the current position. Advances past it.
    fn ident_chain(&mut self) -> Option<Vec<String>> {
        if self.kind() != TokenKind::Identifier {
            return None;
        }
        let mut path = vec![self.token()?.lexeme.clone()];
        self.pos += 1;
        while self.kind() == TokenKind::Dot && self.kind_at(1) == TokenKind::Identifier {
            self.pos += 1;
            path.push(self.token()?.lexeme.clone());
            self.pos += 1;
        }
        Some(path)
    }

    /// Trailing `:name` ornaments. Advances past them.
    fn ornament_names(&mut self) -> Vec<String> {
        let mut names = Vec::new();
        while self.kind() == TokenKind::Ornament {
            if let Some(t) = self.token() {
                names.push(t.lexeme.trim_start_matches(':').to_string());
            }
            self.pos += 1;
        }
        names
    }

    /// Resolve a written path through aliases to the subject-data root.
    fn resolve(&self, path: &[String]) -> Option<Vec<String>> {
        let root = path.first()?;
        for frame in self.frames.iter().rev() {
            match frame.aliases.get(root) {
                Some(Resolution::Rooted(long)) => {
                    let mut full = long.clone();
                    full.extend(path[1..].iter().cloned());
                    return Some(full);
                }
                Some(Resolution::User) => return None,
                None => {}
            }
        }
        // Unbound roots are subject data
        Some(path.to_vec())
    }

    /// The path of the innermost iteration scope, when inside one.
    fn enclosing_scope(&self) -> Option<Vec<String>> {
        for frame in self.frames.iter().rev() {
            if let Some(Resolution::Rooted(long)) = frame.aliases.get("this") {
                return Some(long.clone());
            }
        }
        None
    }

    // ═══════════════════════════════════════════════════════════════════
    // Statement Headers
    // ═══════════════════════════════════════════════════════════════════

    fn each_header(&mut self) {
        let position = self.token().map(|t| t.offset).unwrap_or(0);
        self.pos += 1; // each

        // `each $item in <chain>` binds the alias first
        let mut alias = None;
        if self.kind() == TokenKind::Identifier && self.kind_at(1) == TokenKind::In {
            alias = self.token().map(|t| t.lexeme.clone());
            self.pos += 2;
        }

        let Some(subject) = self.ident_chain() else {
            // Not a plain data path; skip to the body
            self.skip_to_body();
            return;
        };

        if alias.is_none() && self.kind() == TokenKind::As {
            self.pos += 1;
            if self.kind() == TokenKind::Identifier {
                alias = self.token().map(|t| t.lexeme.clone());
                self.pos += 1;
            }
        }

        let to = self.prev_end();
        let long = self.resolve(&subject);
        let mut item_path = long.clone().unwrap_or_else(|| subject.clone());
        item_path.push("#".to_string());

        self.out.push(Reference {
            position,
            from: position,
            to,
            path: {
                let mut p = subject.clone();
                p.push("#".to_string());
                p
            },
            kind: RefKind::Scope,
            alias: alias.clone(),
            user_type: None,
            path_long: long.map(|mut l| {
                l.push("#".to_string());
                l
            }),
        });

        // The body frame sees the item as `this`, and as the alias when
        // one was named
        let resolution = Resolution::Rooted(item_path.clone());
        self.pending.push(("this".to_string(), resolution.clone()));
        if let Some(alias) = alias {
            self.out.push(Reference {
                position,
                from: position,
                to,
                path: vec!["#".to_string()],
                kind: RefKind::Ref,
                alias: Some(alias.clone()),
                user_type: None,
                path_long: Some(item_path),
            });
            self.pending.push((alias, resolution));
        }
    }

    fn take_statement(&mut self) {
        let position = self.token().map(|t| t.offset).unwrap_or(0);
        self.pos += 1; // take

        let mut bindings: Vec<(Vec<String>, Option<String>)> = Vec::new();
        if self.kind() == TokenKind::CurlyLeft {
            self.pos += 1;
            loop {
                match self.kind() {
                    TokenKind::CurlyRight => {
                        self.pos += 1;
                        break;
                    }
                    TokenKind::Eof => return,
                    TokenKind::Identifier => {
                        if let Some(binding) = self.take_binding() {
                            bindings.push(binding);
                        }
                    }
                    _ => self.pos += 1,
                }
            }
        } else if let Some(binding) = self.take_binding() {
            bindings.push(binding);
        }

        // Optional `from <chain>` source, else the enclosing iteration
        let prefix = if self.kind() == TokenKind::From {
            self.pos += 1;
            self.ident_chain()
                .map(|chain| (chain.clone(), self.resolve(&chain)))
        } else {
            None
        };
        let to = self.prev_end();

        for (path, alias) in bindings {
            let (written, rooted) = match &prefix {
                Some((chain, long)) => {
                    let mut written = chain.clone();
                    written.extend(path.iter().cloned());
                    let rooted = long.as_ref().map(|l| {
                        let mut full = l.clone();
                        full.extend(path.iter().cloned());
                        full
                    });
                    (written, rooted)
                }
                None => {
                    let rooted = self.enclosing_scope().map(|mut scope| {
                        scope.extend(path.iter().cloned());
                        scope
                    });
                    (path.clone(), rooted)
                }
            };
            let name = alias
                .clone()
                .or_else(|| path.last().cloned())
                .unwrap_or_default();
            let resolution = match &rooted {
                Some(full) => Resolution::Rooted(full.clone()),
                None => Resolution::User,
            };
            self.current_frame().aliases.insert(name.clone(), resolution);
            self.out.push(Reference {
                position,
                from: position,
                to,
                path: written,
                kind: RefKind::Ref,
                alias: Some(name),
                user_type: None,
                path_long: rooted,
            });
        }
    }

    fn take_binding(&mut self) -> Option<(Vec<String>, Option<String>)> {
        let path = self.ident_chain()?;
        let mut alias = None;
        if self.kind() == TokenKind::As {
            self.pos += 1;
            if self.kind() == TokenKind::Identifier {
                alias = self.token().map(|t| t.lexeme.clone());
                self.pos += 1;
            }
        }
        Some((path, alias))
    }

    fn let_statement(&mut self) {
        let position = self.token().map(|t| t.offset).unwrap_or(0);
        self.pos += 1; // let
        if self.kind() != TokenKind::Identifier {
            return;
        }
        let name = self.token().map(|t| t.lexeme.clone()).unwrap_or_default();
        self.pos += 1;
        if self.kind() != TokenKind::Eq {
            return;
        }
        self.pos += 1;

        // A right side that is a plain data path keeps its rooting; any
        // other right side makes a script variable
        let chain_start = self.pos;
        if let Some(chain) = self.ident_chain() {
            let ornaments = self.ornament_names();
            let statement_done = matches!(
                self.kind(),
                TokenKind::Eol | TokenKind::Eof | TokenKind::CurlyRight
            );
            if statement_done {
                let to = self.prev_end();
                if ornaments.is_empty() {
                    let rooted = self.resolve(&chain);
                    let resolution = match &rooted {
                        Some(full) => Resolution::Rooted(full.clone()),
                        None => Resolution::User,
                    };
                    self.current_frame().aliases.insert(name.clone(), resolution);
                    self.out.push(Reference {
                        position,
                        from: position,
                        to,
                        path: chain,
                        kind: RefKind::Ref,
                        alias: Some(name),
                        user_type: None,
                        path_long: rooted,
                    });
                } else {
                    self.user_reference(position, to, name, ornament_type(&ornaments));
                }
                return;
            }
        }
        self.pos = chain_start;
        let user_type = self.infer_literal_type();
        self.skip_to_statement_end();
        let to = self.prev_end();
        self.user_reference(position, to, name, user_type);
    }

    fn user_reference(
        &mut self,
        position: usize,
        to: usize,
        name: String,
        user_type: Option<String>,
    ) {
        self.current_frame()
            .aliases
            .insert(name.clone(), Resolution::User);
        self.out.push(Reference {
            position,
            from: position,
            to,
            path: vec![name.clone()],
            kind: RefKind::User,
            alias: Some(name),
            user_type,
            path_long: None,
        });
    }

    /// Type of a literal right-hand side, when it is one.
    fn infer_literal_type(&self) -> Option<String> {
        let scalar = |kind: TokenKind| -> Option<&'static str> {
            match kind {
                TokenKind::Number => Some("number"),
                TokenKind::Str => Some("string"),
                TokenKind::True | TokenKind::False => Some("boolean"),
                TokenKind::Now | TokenKind::Today => Some("timestamp"),
                _ => None,
            }
        };
        if let Some(t) = scalar(self.kind()) {
            // `5 days` is a duration, not a number
            if self.kind() == TokenKind::Number && self.kind_at(1) == TokenKind::Unit {
                return None;
            }
            if matches!(self.kind_at(1), TokenKind::Eol | TokenKind::Eof) {
                return Some(t.to_string());
            }
            return None;
        }
        // `{1, 2, 3}` of one scalar kind
        if self.kind() == TokenKind::CurlyLeft {
            let first = scalar(self.kind_at(1))?;
            let mut ahead = 1;
            loop {
                if scalar(self.kind_at(ahead)) != Some(first) {
                    return None;
                }
                match self.kind_at(ahead + 1) {
                    TokenKind::Comma => ahead += 2,
                    TokenKind::CurlyRight => return Some(format!("{first}[]")),
                    _ => return None,
                }
            }
        }
        None
    }

    fn current_frame(&mut self) -> &mut Frame {
        // frame 0 is never popped
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn prev_end(&self) -> usize {
        if self.pos == 0 {
            0
        } else {
            self.tokens
                .get(self.pos - 1)
                .map(|t| t.end())
                .unwrap_or(0)
        }
    }

    fn skip_to_body(&mut self) {
        while !matches!(self.kind(), TokenKind::CurlyLeft | TokenKind::Eof) {
            self.pos += 1;
        }
    }

    fn skip_to_statement_end(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.kind() {
                TokenKind::Eof => return,
                TokenKind::Eol if depth == 0 => return,
                TokenKind::CurlyLeft | TokenKind::ParenLeft => depth += 1,
                TokenKind::CurlyRight if depth == 0 => return,
                TokenKind::CurlyRight | TokenKind::ParenRight => {
                    depth = depth.saturating_sub(1)
                }
                _ => {}
            }
            self.pos += 1;
        }
    }
}

/// Result type of a `let` whose right side is a data path transformed
/// by ornaments.
fn ornament_type(names: &[String]) -> Option<String> {
    let last = names.last()?;
    match last.as_str() {
        "characters" | "words" | "lines" => Some("string[]".to_string()),
        "length" | "round" | "floor" | "ceiling" | "min" | "max" | "sum" | "year" | "month"
        | "day" | "hour" | "minute" | "second" => Some("number".to_string()),
        "trim" | "upper" | "lower" => Some("string".to_string()),
        _ => None,
    }
}
