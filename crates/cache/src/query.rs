//! Composable filters for the catalog and edge tables.
//!
//! A [`Predicate`] is either a single comparison ([`Predicate::Leaf`]) or a
//! parenthesized [`Predicate::Group`] of further predicates. Compiling a
//! predicate produces a [`Filter`]: a clause with positional `?` placeholders
//! and the matching list of parameters, so user input never ends up inside
//! the SQL text.
//!
//! # Join elision
//!
//! Every node carries its own join operator, which is emitted *in front of*
//! the node. The first rendered child of a group (and the top-level node)
//! skips its operator: it is implicitly conjunctive with whatever precedes
//! the group. A group of `[A, B]` where `B` joins with `or` therefore renders
//! as `( A or B )`, whatever `A`'s own operator says.
//!
//! ```
//! use modgraph_cache::query::{Join, Predicate};
//!
//! let filter = Predicate::group([
//!     Predicate::equals("category", "Minions"),
//!     Predicate::contains("name", "chocobo").with_join(Join::Or),
//! ])
//! .compile()
//! .unwrap();
//! assert_eq!(filter.clause(), "( category = ? or name like ? )");
//! assert_eq!(filter.params().len(), 2);
//! ```

use sqlx::Arguments;
use sqlx::sqlite::SqliteArguments;

use crate::error::{ErrorKind, Result};

/// How a leaf compares its column against its value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Comparison {
    #[default]
    Equal,
    /// SQL `like` pattern match.
    Like,
}
impl Comparison {
    fn as_sql(&self) -> &'static str {
        match self {
            Comparison::Equal => "=",
            Comparison::Like => "like",
        }
    }
}

/// How a node joins onto the node before it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Join {
    #[default]
    And,
    Or,
}
impl Join {
    fn as_sql(&self) -> &'static str {
        match self {
            Join::And => "and",
            Join::Or => "or",
        }
    }
}

/// A bound parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Null,
}
impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}
impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}
impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}
impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}
impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}
impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}
impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}
impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// A node of the filter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Leaf {
        column: String,
        value: Value,
        comparison: Comparison,
        join: Join,
    },
    Group {
        children: Vec<Predicate>,
        join: Join,
    },
}
impl Default for Predicate {
    /// The empty tree, which matches every row.
    fn default() -> Self {
        Self::Group {
            children: Vec::new(),
            join: Join::And,
        }
    }
}
impl Predicate {
    /// `column = value`
    pub fn equals(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Leaf {
            column: column.into(),
            value: value.into(),
            comparison: Comparison::Equal,
            join: Join::And,
        }
    }

    /// `column like pattern`
    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::Leaf {
            column: column.into(),
            value: Value::Text(pattern.into()),
            comparison: Comparison::Like,
            join: Join::And,
        }
    }

    /// `column like %substring%`
    ///
    /// The substring is not escaped: `%` and `_` inside it keep their
    /// wildcard meaning.
    pub fn contains(column: impl Into<String>, substring: impl AsRef<str>) -> Self {
        Self::like(column, format!("%{}%", substring.as_ref()))
    }

    /// A parenthesized group of predicates.
    pub fn group(children: impl IntoIterator<Item = Predicate>) -> Self {
        Self::Group {
            children: children.into_iter().collect(),
            join: Join::And,
        }
    }

    pub fn with_join(mut self, join: Join) -> Self {
        match &mut self {
            Self::Leaf { join: j, .. } | Self::Group { join: j, .. } => *j = join,
        }
        self
    }

    /// Append a child to this group. A leaf is first wrapped into a group
    /// together with the new child.
    pub fn push(&mut self, child: Predicate) {
        match self {
            Self::Group { children, .. } => children.push(child),
            Self::Leaf { join, .. } => {
                let join = *join;
                let leaf = std::mem::take(self).with_join(Join::And);
                *self = Self::Group {
                    children: vec![leaf, child],
                    join,
                };
            },
        }
    }

    pub fn join(&self) -> Join {
        match self {
            Self::Leaf { join, .. } | Self::Group { join, .. } => *join,
        }
    }

    /// Whether this tree contains no leaves at all (and so filters nothing).
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Leaf { .. } => false,
            Self::Group { children, .. } => children.iter().all(Predicate::is_empty),
        }
    }

    /// Compile into a parameterized clause.
    ///
    /// Empty trees compile to an empty filter. Column names must be plain
    /// identifiers, anything else is rejected.
    pub fn compile(&self) -> Result<Filter> {
        let mut params = Vec::new();
        let clause = self.render(true, &mut params)?.unwrap_or_default();
        Ok(Filter { clause, params })
    }

    /// Render this node. `skip_join` is set for the first rendered node of
    /// a group (and the root). Returns `None` for nodes without leaves.
    fn render(&self, skip_join: bool, params: &mut Vec<Value>) -> Result<Option<String>> {
        let mut out = String::new();
        if !skip_join && !self.is_empty() {
            out.push_str(self.join().as_sql());
            out.push(' ');
        }
        match self {
            Self::Leaf {
                column,
                value,
                comparison,
                ..
            } => {
                validate_identifier(column)?;
                out.push_str(column);
                out.push(' ');
                out.push_str(comparison.as_sql());
                out.push_str(" ?");
                params.push(value.clone());
            },
            Self::Group { children, .. } => {
                let mut rendered = Vec::with_capacity(children.len());
                for child in children {
                    if let Some(piece) = child.render(rendered.is_empty(), params)? {
                        rendered.push(piece);
                    }
                }
                if rendered.is_empty() {
                    return Ok(None);
                }
                out.push_str("( ");
                out.push_str(&rendered.join(" "));
                out.push_str(" )");
            },
        }
        Ok(Some(out))
    }
}

/// A compiled [`Predicate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clause: String,
    params: Vec<Value>,
}
impl Filter {
    /// The clause body, without a leading `where`. Empty when the filter
    /// matches every row.
    pub fn clause(&self) -> &str {
        &self.clause
    }

    /// Parameters in placeholder order.
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn is_empty(&self) -> bool {
        self.clause.is_empty()
    }

    /// The clause with its leading ` where `, ready to append to a select.
    pub fn where_sql(&self) -> String {
        match self.is_empty() {
            true => String::new(),
            false => format!(" where {}", self.clause),
        }
    }

    /// Fresh sqlx arguments holding the parameters. Each query needs its own.
    pub(crate) fn arguments<'q>(&self) -> Result<SqliteArguments<'q>> {
        let mut args = SqliteArguments::default();
        for param in &self.params {
            match param {
                Value::Text(text) => args.add(text.clone()),
                Value::Integer(int) => args.add(*int),
                Value::Real(real) => args.add(*real),
                Value::Boolean(boolean) => args.add(*boolean),
                Value::Null => args.add(None::<String>),
            }
            .map_err(|_| exn::Exn::from(ErrorKind::InvalidData("query parameter")))?;
        }
        Ok(args)
    }
}

/// Table and column names are spliced into SQL text, so only plain
/// identifiers are allowed through.
pub(crate) fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        exn::bail!(ErrorKind::InvalidIdentifier(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn leaf(column: &str) -> Predicate {
        Predicate::equals(column, 1)
    }

    #[test]
    fn test_empty_tree_compiles_to_nothing() {
        let filter = Predicate::default().compile().unwrap();
        assert!(filter.is_empty());
        assert_eq!(filter.where_sql(), "");
        assert!(filter.params().is_empty());
    }

    #[test]
    fn test_nested_empty_groups_compile_to_nothing() {
        let tree = Predicate::group([Predicate::default(), Predicate::group([Predicate::default()])]);
        assert!(tree.is_empty());
        assert!(tree.compile().unwrap().is_empty());
    }

    #[test]
    fn test_single_leaf_has_no_join() {
        let filter = leaf("parent").with_join(Join::Or).compile().unwrap();
        assert_eq!(filter.clause(), "parent = ?");
        assert_eq!(filter.where_sql(), " where parent = ?");
    }

    #[test]
    fn test_first_child_join_is_elided() {
        let tree = Predicate::group([leaf("a").with_join(Join::And), leaf("b").with_join(Join::Or)]);
        assert_eq!(tree.compile().unwrap().clause(), "( a = ? or b = ? )");
        // The first child's own join is ignored, whatever it is.
        let tree = Predicate::group([leaf("a").with_join(Join::Or), leaf("b")]);
        assert_eq!(tree.compile().unwrap().clause(), "( a = ? and b = ? )");
    }

    #[test]
    fn test_nested_groups() {
        let tree = Predicate::group([
            Predicate::group([leaf("a").with_join(Join::Or), leaf("b").with_join(Join::Or)]).with_join(Join::Or),
            Predicate::group([leaf("c"), leaf("d").with_join(Join::Or)]).with_join(Join::Or),
            leaf("e"),
        ]);
        assert_eq!(tree.compile().unwrap().clause(), "( ( a = ? or b = ? ) or ( c = ? or d = ? ) and e = ? )");
    }

    #[test]
    fn test_empty_first_child_does_not_consume_elision() {
        let tree = Predicate::group([Predicate::default(), leaf("a").with_join(Join::Or), leaf("b")]);
        assert_eq!(tree.compile().unwrap().clause(), "( a = ? and b = ? )");
    }

    #[test]
    fn test_no_group_starts_with_join_token() {
        let tree = Predicate::group([
            Predicate::group([leaf("a").with_join(Join::Or)]).with_join(Join::Or),
            Predicate::group([leaf("b").with_join(Join::Or), leaf("c")]).with_join(Join::Or),
        ]);
        let clause = tree.compile().unwrap().clause().to_string();
        assert!(!clause.contains("( and"), "{clause}");
        assert!(!clause.contains("( or"), "{clause}");
        assert!(!clause.starts_with("and") && !clause.starts_with("or"), "{clause}");
    }

    #[test]
    fn test_category_and_substring_filter() {
        let mut tree = Predicate::group([Predicate::equals("category", "Minions")]);
        tree.push(Predicate::contains("name", "cat"));
        let filter = tree.compile().unwrap();
        assert_eq!(filter.where_sql(), " where ( category = ? and name like ? )");
        assert_eq!(filter.params(), &[Value::from("Minions"), Value::from("%cat%")]);
    }

    #[test]
    fn test_push_onto_leaf_wraps_into_group() {
        let mut tree = leaf("a").with_join(Join::Or);
        tree.push(leaf("b").with_join(Join::Or));
        assert_eq!(tree.join(), Join::Or);
        assert_eq!(tree.compile().unwrap().clause(), "( a = ? or b = ? )");
    }

    #[test]
    fn test_params_follow_placeholder_order() {
        let tree = Predicate::group([
            Predicate::equals("a", "first"),
            Predicate::group([Predicate::equals("b", 2), Predicate::equals("c", true).with_join(Join::Or)]),
            Predicate::equals("d", None::<String>),
        ]);
        let filter = tree.compile().unwrap();
        assert_eq!(
            filter.params(),
            &[Value::from("first"), Value::Integer(2), Value::Boolean(true), Value::Null]
        );
        assert_eq!(filter.clause().matches('?').count(), filter.params().len());
    }

    #[rstest]
    #[case("name")]
    #[case("_private")]
    #[case("icon_id2")]
    fn test_valid_identifiers(#[case] name: &str) {
        assert!(validate_identifier(name).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("2name")]
    #[case("name; drop table items")]
    #[case("name = name or 1")]
    #[case("\"quoted\"")]
    fn test_invalid_identifiers(#[case] name: &str) {
        let err = validate_identifier(name).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidIdentifier(_)));
    }

    #[test]
    fn test_invalid_column_rejected_at_compile() {
        let err = Predicate::equals("1=1 --", "x").compile().unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidIdentifier(_)));
    }
}
