//! The types that describe the chain of operators of a stage, for debugging purposes only.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Wrapper type that contains a string representing the type.
///
/// The internal representation should not be considered unique nor exact. Its purpose is to be
/// nice to look at.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DataType(String);

/// The structural information about the chain of operators of a stage.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BlockStructure {
    /// The operators of the chain.
    ///
    /// The first in the list is the source of the stage, while the last is the sink.
    pub operators: Vec<OperatorStructure>,
}

/// The structural information about an operator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OperatorStructure {
    /// The title of the operator.
    pub title: String,
    /// The subtitle of the operator, usually its configuration.
    pub subtitle: String,
    /// The kind of operator: `Operator`, `Source` or `Sink`.
    pub kind: OperatorKind,
    /// The type of the data that comes out of this operator.
    pub out_type: DataType,
}

/// The kind of operator: either `Operator`, `Source` or `Sink`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperatorKind {
    /// This operator is a normal operator.
    Operator,
    /// This operator is a sink, i.e. no message will leave it.
    Sink,
    /// This operator is a source, i.e. no message will enter it.
    Source,
}

impl DataType {
    /// Construct the `DataType` for the specified type.
    pub fn of<T: ?Sized>() -> Self {
        let type_name = std::any::type_name::<T>();
        Self(DataType::clean_str(type_name))
    }

    /// Cleanup the type information returned by `std::any::type_name`, keeping just the final name
    /// of every path and the type parameters.
    fn clean_str(s: &str) -> String {
        let mut result = String::new();
        let mut current_ident = String::new();
        for c in s.chars() {
            if c.is_alphanumeric() || c == '_' {
                current_ident.push(c);
            } else if c == ':' {
                // the current identifier was just a path segment
                current_ident.clear();
            } else {
                result += &current_ident;
                current_ident.clear();
                result.push(c);
            }
        }
        result += &current_ident;
        result
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl BlockStructure {
    /// Add a new operator at the end of the chain.
    pub fn add_operator(mut self, operator: OperatorStructure) -> Self {
        self.operators.push(operator);
        self
    }
}

impl Display for BlockStructure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, op) in self.operators.iter().enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "{}<{}>", op.title, op.out_type)?;
        }
        Ok(())
    }
}

impl OperatorStructure {
    /// Crate a new [`OperatorStructure`] with the given title that produces the given elements.
    pub fn new<Out: ?Sized, S: Into<String>>(title: S) -> Self {
        Self {
            title: title.into(),
            subtitle: String::new(),
            kind: OperatorKind::Operator,
            out_type: DataType::of::<Out>(),
        }
    }

    pub fn with_subtitle<S: Into<String>>(mut self, subtitle: S) -> Self {
        self.subtitle = subtitle.into();
        self
    }

    pub fn with_kind(mut self, kind: OperatorKind) -> Self {
        self.kind = kind;
        self
    }
}
