//! Raw SQL literals.
//!
//! [`RawSql`] is the only escape hatch for SQL the compiler does not know how
//! to generate. The text is split on `?` into fragments with interleaved
//! bindings; the compiler threads those bindings through the same positional
//! stream as every other placeholder, so an N-fragment raw node interpolates
//! fully. Raw bindings bypass the operator whitelist (there is no operator to
//! validate).

use crate::value::Value;

/// An opaque SQL fragment with optional interleaved bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSql {
    /// Text segments; always `bindings.len() + 1` entries.
    pub(crate) fragments: Vec<String>,
    /// Values bound between consecutive fragments.
    pub(crate) bindings: Vec<Value>,
}

impl RawSql {
    /// Create a raw fragment, replacing each `?` in `text` with the matching
    /// binding. A `?` beyond the binding list stays literal.
    pub fn new(text: impl Into<String>, mut bindings: Vec<Value>) -> Self {
        let text = text.into();
        let mut fragments = Vec::with_capacity(bindings.len() + 1);
        let mut current = String::new();
        let mut used = 0;
        for ch in text.chars() {
            if ch == '?' && used < bindings.len() {
                fragments.push(std::mem::take(&mut current));
                used += 1;
            } else {
                current.push(ch);
            }
        }
        fragments.push(current);
        // Bindings past the last `?` can never render; drop them to keep the
        // fragments.len() == bindings.len() + 1 invariant.
        bindings.truncate(used);
        Self { fragments, bindings }
    }

    /// Text segments interleaved with the bindings.
    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    /// Bound values, in order.
    pub fn bindings(&self) -> &[Value] {
        &self.bindings
    }
}

/// Create a raw SQL fragment without bindings.
///
/// # Example
/// ```ignore
/// select([raw("count(*) as total")]).from("users");
/// ```
pub fn raw(text: impl Into<String>) -> RawSql {
    RawSql::new(text, Vec::new())
}

/// Create a raw SQL fragment with `?` placeholders and bindings.
///
/// # Example
/// ```ignore
/// from("users").where_raw(raw_with("lower(name) = ?", ["alice"]));
/// ```
pub fn raw_with<V>(text: impl Into<String>, bindings: impl IntoIterator<Item = V>) -> RawSql
where
    V: Into<Value>,
{
    RawSql::new(text, bindings.into_iter().map(Into::into).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_placeholders() {
        let r = raw_with("a = ? OR b = ?", [1, 2]);
        assert_eq!(r.fragments(), &["a = ", " OR b = ", ""]);
        assert_eq!(r.bindings(), &[Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn no_bindings_single_fragment() {
        let r = raw("now()");
        assert_eq!(r.fragments(), &["now()"]);
        assert!(r.bindings().is_empty());
    }

    #[test]
    fn extra_question_mark_stays_literal() {
        let r = raw_with("a = ? OR b = '?'", [1]);
        assert_eq!(r.fragments(), &["a = ", " OR b = '?'"]);
        assert_eq!(r.bindings().len(), 1);
    }
}
