//! Variable scope stack
//!
//! Frames are insertion-ordered maps of name to binding. Frame 0 is the
//! global frame: it holds the subject data and survives [`ScopeStack::flush`].
//! Reads resolve the first path segment innermost-outward; the remaining
//! segments of a dotted name index into struct fields.

use indexmap::IndexMap;

use crate::error::ScopeError;
use crate::value::{Value, ValueData};

/// A single variable binding.
#[derive(Debug, Clone)]
pub struct Binding {
    /// The bound value
    pub value: Value,

    /// Whether assignment may replace the value
    pub mutable: bool,
}

/// Which frame a write targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeEnv {
    /// The innermost frame
    Local,

    /// Frame 0
    Global,

    /// The nearest frame that already binds the name
    Enclosure,
}

/// How a write treats an existing binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Fail if the name is already bound in the target frame
    Insert,

    /// Fail unless the name is already bound
    Update,

    /// Update when bound, insert locally otherwise
    Upsert,
}

/// Full write configuration.
#[derive(Debug, Clone, Copy)]
pub struct WriteConfig {
    /// Which frame to write into
    pub environment: ScopeEnv,

    /// Insert, update, or upsert
    pub mode: WriteMode,

    /// Mutability of a newly inserted binding
    pub mutable: bool,
}

impl WriteConfig {
    /// A mutable local insert, the `let` configuration.
    pub fn declare() -> Self {
        Self {
            environment: ScopeEnv::Local,
            mode: WriteMode::Insert,
            mutable: true,
        }
    }

    /// An enclosure update, the assignment configuration.
    pub fn assign() -> Self {
        Self {
            environment: ScopeEnv::Enclosure,
            mode: WriteMode::Update,
            mutable: true,
        }
    }
}

/// The frame stack.
#[derive(Debug, Clone, Default)]
pub struct ScopeStack {
    frames: Vec<IndexMap<String, Binding>>,
}

impl ScopeStack {
    /// A stack holding only the empty global frame.
    pub fn new() -> Self {
        Self {
            frames: vec![IndexMap::new()],
        }
    }

    /// Enter a scope.
    pub fn push_frame(&mut self) {
        self.frames.push(IndexMap::new());
    }

    /// Leave a scope. The global frame is never popped.
    pub fn pop_frame(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Number of frames on the stack.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Drop every frame above the global one.
    pub fn flush(&mut self) {
        self.frames.truncate(1);
    }

    /// Whether any frame binds the first segment of `key`.
    pub fn contains(&self, key: &str) -> bool {
        let first = key.split('.').next().unwrap_or(key);
        self.frames.iter().any(|f| f.contains_key(first))
    }

    /// Read a possibly dotted name.
    pub fn read(&self, key: &str) -> Result<Value, ScopeError> {
        let mut segments = key.split('.');
        let first = segments.next().unwrap_or(key);
        let mut current = &self
            .frames
            .iter()
            .rev()
            .find_map(|f| f.get(first))
            .ok_or_else(|| ScopeError::Undefined(first.to_string()))?
            .value;
        for segment in segments {
            current = struct_field(current, segment)?;
        }
        Ok(current.clone())
    }

    /// Write a possibly dotted name.
    pub fn write(&mut self, key: &str, value: Value, config: WriteConfig) -> Result<(), ScopeError> {
        let (first, rest) = match key.split_once('.') {
            Some((first, rest)) => (first, Some(rest)),
            None => (key, None),
        };

        if let Some(rest) = rest {
            // Dotted writes mutate a field of an existing binding; the
            // root binding's mutability gates the whole write
            let binding = self
                .find_mut(first, config.environment)
                .ok_or_else(|| ScopeError::Undefined(first.to_string()))?;
            if !binding.mutable {
                return Err(ScopeError::Immutable(first.to_string()));
            }
            return write_field(&mut binding.value, rest, value);
        }

        match config.mode {
            WriteMode::Insert => self.insert(first, value, config),
            WriteMode::Update => self.update(first, value, config),
            WriteMode::Upsert => {
                if self.find_mut(first, config.environment).is_some() {
                    self.update(first, value, config)
                } else {
                    self.insert(first, value, config)
                }
            }
        }
    }

    fn insert(&mut self, key: &str, value: Value, config: WriteConfig) -> Result<(), ScopeError> {
        let idx = match config.environment {
            ScopeEnv::Global => 0,
            _ => self.frames.len() - 1,
        };
        let frame = &mut self.frames[idx];
        if frame.contains_key(key) {
            return Err(ScopeError::AlreadyExists(key.to_string()));
        }
        frame.insert(
            key.to_string(),
            Binding {
                value,
                mutable: config.mutable,
            },
        );
        Ok(())
    }

    fn update(&mut self, key: &str, value: Value, config: WriteConfig) -> Result<(), ScopeError> {
        let binding = self
            .find_mut(key, config.environment)
            .ok_or_else(|| ScopeError::Undefined(key.to_string()))?;
        if !binding.mutable {
            return Err(ScopeError::Immutable(key.to_string()));
        }
        binding.value = value;
        Ok(())
    }

    fn find_mut(&mut self, key: &str, environment: ScopeEnv) -> Option<&mut Binding> {
        match environment {
            ScopeEnv::Global => self.frames[0].get_mut(key),
            ScopeEnv::Local => self.frames.last_mut()?.get_mut(key),
            ScopeEnv::Enclosure => self
                .frames
                .iter_mut()
                .rev()
                .find_map(|f| f.get_mut(key)),
        }
    }
}

/// Look up a struct field. Script paths spell segments with a `$` while
/// subject data uses raw keys, so both spellings are accepted.
fn struct_field<'a>(value: &'a Value, segment: &str) -> Result<&'a Value, ScopeError> {
    let ValueData::Struct(fields) = &value.data else {
        return Err(ScopeError::NotAStruct {
            field: segment.to_string(),
            kind: value.type_name().to_string(),
        });
    };
    lookup(fields, segment).ok_or_else(|| ScopeError::UnknownField(segment.to_string()))
}

fn lookup<'a>(fields: &'a IndexMap<String, Value>, segment: &str) -> Option<&'a Value> {
    if let Some(v) = fields.get(segment) {
        return Some(v);
    }
    match segment.strip_prefix('$') {
        Some(stripped) => fields.get(stripped),
        None => fields.get(&format!("${segment}")),
    }
}

fn write_field(root: &mut Value, path: &str, value: Value) -> Result<(), ScopeError> {
    let mut current = root;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let last = segments.peek().is_none();
        let kind = current.type_name().to_string();
        let ValueData::Struct(fields) = &mut current.data else {
            return Err(ScopeError::NotAStruct {
                field: segment.to_string(),
                kind,
            });
        };
        let key = if fields.contains_key(segment) {
            segment.to_string()
        } else if let Some(stripped) = segment.strip_prefix('$') {
            if fields.contains_key(stripped) {
                stripped.to_string()
            } else {
                segment.to_string()
            }
        } else {
            segment.to_string()
        };
        if last {
            fields.insert(key, value);
            return Ok(());
        }
        current = fields
            .get_mut(&key)
            .ok_or_else(|| ScopeError::UnknownField(segment.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn declare(stack: &mut ScopeStack, key: &str, value: Value) {
        stack.write(key, value, WriteConfig::declare()).unwrap();
    }

    #[test]
    fn test_read_innermost_wins() {
        let mut stack = ScopeStack::new();
        declare(&mut stack, "$x", Value::number(1.0));
        stack.push_frame();
        declare(&mut stack, "$x", Value::number(2.0));
        assert_eq!(stack.read("$x").unwrap(), Value::number(2.0));
        stack.pop_frame();
        assert_eq!(stack.read("$x").unwrap(), Value::number(1.0));
    }

    #[test]
    fn test_insert_duplicate_fails() {
        let mut stack = ScopeStack::new();
        declare(&mut stack, "$x", Value::number(1.0));
        let err = stack
            .write("$x", Value::number(2.0), WriteConfig::declare())
            .unwrap_err();
        assert_eq!(err, ScopeError::AlreadyExists("$x".to_string()));
    }

    #[test]
    fn test_update_reaches_enclosure() {
        let mut stack = ScopeStack::new();
        declare(&mut stack, "$x", Value::number(1.0));
        stack.push_frame();
        stack
            .write("$x", Value::number(5.0), WriteConfig::assign())
            .unwrap();
        stack.pop_frame();
        assert_eq!(stack.read("$x").unwrap(), Value::number(5.0));
    }

    #[test]
    fn test_update_missing_and_immutable() {
        let mut stack = ScopeStack::new();
        let err = stack
            .write("$x", Value::number(1.0), WriteConfig::assign())
            .unwrap_err();
        assert_eq!(err, ScopeError::Undefined("$x".to_string()));

        stack
            .write(
                "$locked",
                Value::number(1.0),
                WriteConfig {
                    environment: ScopeEnv::Global,
                    mode: WriteMode::Insert,
                    mutable: false,
                },
            )
            .unwrap();
        let err = stack
            .write("$locked", Value::number(2.0), WriteConfig::assign())
            .unwrap_err();
        assert_eq!(err, ScopeError::Immutable("$locked".to_string()));
    }

    #[test]
    fn test_dotted_read_strips_sigil() {
        let mut stack = ScopeStack::new();
        let subject = Value::from_json(&serde_json::json!({"total": 9}), vec![]);
        declare(&mut stack, "$order", subject);
        assert_eq!(stack.read("$order.$total").unwrap(), Value::number(9.0));
        assert_eq!(stack.read("$order.total").unwrap(), Value::number(9.0));
        assert_eq!(
            stack.read("$order.missing").unwrap_err(),
            ScopeError::UnknownField("missing".to_string())
        );
    }

    #[test]
    fn test_dotted_write_updates_fields_and_rejects_non_structs() {
        let mut stack = ScopeStack::new();
        let subject = Value::from_json(&serde_json::json!({"total": 9}), vec![]);
        declare(&mut stack, "$order", subject);
        stack
            .write("$order.$total", Value::number(12.0), WriteConfig::assign())
            .unwrap();
        assert_eq!(stack.read("$order.total").unwrap(), Value::number(12.0));

        declare(&mut stack, "$n", Value::number(1.0));
        let err = stack
            .write("$n.field", Value::number(2.0), WriteConfig::assign())
            .unwrap_err();
        assert_eq!(
            err,
            ScopeError::NotAStruct {
                field: "field".to_string(),
                kind: "number".to_string(),
            }
        );
    }

    #[test]
    fn test_flush_keeps_global() {
        let mut stack = ScopeStack::new();
        declare(&mut stack, "$g", Value::number(1.0));
        stack.push_frame();
        declare(&mut stack, "$x", Value::number(2.0));
        stack.flush();
        assert_eq!(stack.depth(), 1);
        assert!(stack.contains("$g"));
        assert!(!stack.contains("$x"));
    }
}
