//! Span-annotated syntax tree produced by the parser

use crate::value::DurationUnit;

/// A half-open byte range into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Byte offset of the first character
    pub start: usize,

    /// Byte offset one past the last character
    pub end: usize,
}

impl Span {
    /// Build a span from start and end offsets.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// The smallest span covering both inputs.
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// A compiled regex literal, `/pattern/flags`.
#[derive(Debug, Clone)]
pub struct RegexLiteral {
    /// The pattern text between the delimiters
    pub pattern: String,

    /// Flag characters as written (`i`, `m`, `s`, `x`)
    pub flags: String,

    /// The compiled matcher, flags already applied
    pub compiled: regex::Regex,
}

impl PartialEq for RegexLiteral {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern && self.flags == other.flags
    }
}

/// A literal value in source text.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Numeric literal
    Number(f64),

    /// String literal, escapes already decoded
    String(String),

    /// `true` or `false`
    Boolean(bool),

    /// `/pattern/flags`
    Regex(RegexLiteral),
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `not`
    Not,

    /// `-`
    Neg,
}

/// Binary operators (short-circuiting `and`/`or` are [`LogicalOp`]s).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Includes,
    Matches,
    In,
}

impl BinaryOp {
    /// Source spelling, used in diagnostics.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Gt => ">",
            BinaryOp::Lt => "<",
            BinaryOp::Ge => ">=",
            BinaryOp::Le => "<=",
            BinaryOp::Includes => "includes",
            BinaryOp::Matches => "matches",
            BinaryOp::In => "in",
        }
    }
}

/// Short-circuiting logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum LogicalOp {
    And,
    Or,
}

/// Assignment operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// `=`
    Set,

    /// `+=`
    Add,

    /// `-=`
    Sub,

    /// `*=`
    Mul,

    /// `/=`
    Div,
}

/// Direction of a relative date, `ago` or `ahead`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Direction {
    Ago,
    Ahead,
}

/// Meta keywords that read interpreter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaKind {
    /// `index`: the current loop counter
    Index,

    /// `this`: the current iteration or ornament subject
    This,
}

/// One binding in a `take` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct TakeBinding {
    /// Dotted path of the field being taken (first segment keeps its `$`)
    pub path: Vec<String>,

    /// `as` alias, when given
    pub alias: Option<String>,
}

/// The node variants of the syntax tree.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// A literal value
    Literal(Literal),

    /// `<expr> <unit>`, a duration measurement
    Measurement {
        /// The magnitude expression
        value: Box<SyntaxNode>,

        /// The unit the magnitude is measured in
        unit: DurationUnit,
    },

    /// `<measurement> ago` / `<measurement> ahead`
    RelativeDate {
        /// The underlying measurement
        measurement: Box<SyntaxNode>,

        /// Which side of now the date falls on
        direction: Direction,
    },

    /// `now` / `today`
    DateNow,

    /// `$name` with optional dotted path, `$a.b.c`
    Variable(Vec<String>),

    /// `index` / `this`
    Meta(MetaKind),

    /// `not <expr>` / `-<expr>`
    Unary {
        /// The operator
        op: UnaryOp,

        /// The operand
        operand: Box<SyntaxNode>,
    },

    /// A non-short-circuiting binary operation
    Binary {
        /// The operator
        op: BinaryOp,

        /// Left operand
        lhs: Box<SyntaxNode>,

        /// Right operand
        rhs: Box<SyntaxNode>,
    },

    /// `and` / `or`
    Logical {
        /// The operator
        op: LogicalOp,

        /// Left operand, always evaluated
        lhs: Box<SyntaxNode>,

        /// Right operand, evaluated when the left does not decide
        rhs: Box<SyntaxNode>,
    },

    /// A postfix `:name` chain
    Ornament {
        /// The expression the chain applies to
        subject: Box<SyntaxNode>,

        /// Ornament names in application order, each with its span
        names: Vec<(String, Span)>,
    },

    /// `(expr)`
    Grouping(Box<SyntaxNode>),

    /// `{ statements }`
    Block(Vec<SyntaxNode>),

    /// `{ a, b, c }`
    Collection(Vec<SyntaxNode>),

    /// A sequence of statements; the program root
    StatementList(Vec<SyntaxNode>),

    /// `print <expr>`
    Print(Box<SyntaxNode>),

    /// `let $name = <expr>`
    Declare {
        /// The variable name, `$` included
        name: String,

        /// The initializer
        init: Box<SyntaxNode>,
    },

    /// `define :name { ... }`
    Define {
        /// The ornament name being defined
        name: String,

        /// The stored body, evaluated at each application
        body: Box<SyntaxNode>,
    },

    /// `$name = e` and the compound forms
    Assign {
        /// The operator
        op: AssignOp,

        /// Dotted path of the target
        target: Vec<String>,

        /// The right-hand side
        value: Box<SyntaxNode>,
    },

    /// `if <cond> { ... } else ...`
    If {
        /// The condition
        cond: Box<SyntaxNode>,

        /// Taken when the condition is truthy
        then_branch: Box<SyntaxNode>,

        /// `else` block or chained `if`
        else_branch: Option<Box<SyntaxNode>>,
    },

    /// `each ... { ... }`
    Each {
        /// The iterated expression
        subject: Box<SyntaxNode>,

        /// Per-item alias, when given
        alias: Option<String>,

        /// The loop body
        body: Box<SyntaxNode>,
    },

    /// `take ... [from <expr>]`
    Take {
        /// The fields being taken
        bindings: Vec<TakeBinding>,

        /// Explicit source; the iteration subject when absent
        source: Option<Box<SyntaxNode>>,
    },

    /// `reject <expr> [because <expr>]`
    Reject {
        /// The displayed message; the subject's display when absent
        message: Option<Box<SyntaxNode>>,

        /// The rejected value
        subject: Box<SyntaxNode>,
    },

    /// `validate [<label>] { ... }`
    Validate {
        /// Optional label expression
        label: Option<Box<SyntaxNode>>,

        /// The validated statements
        body: Vec<SyntaxNode>,
    },

    /// `skip`
    Skip,
}

/// A parsed node: kind, source span, inspect flag.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxNode {
    /// What this node is
    pub kind: NodeKind,

    /// The source range it covers
    pub span: Span,

    /// Whether a `?` marker targets this node
    pub inspect: bool,
}

impl SyntaxNode {
    /// Build a node with the inspect flag clear.
    pub fn new(kind: NodeKind, span: Span) -> Self {
        Self {
            kind,
            span,
            inspect: false,
        }
    }

    /// Whether this node is a bare literal. Literals never take inspect
    /// markers.
    pub fn is_literal(&self) -> bool {
        matches!(self.kind, NodeKind::Literal(_))
    }
}
