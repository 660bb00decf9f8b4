use serde::Serialize;
use std::fmt;

use crate::types::{
    attributes::{AttributeValue, DefineScope},
    frame::ArbitrationId,
};

/// Outcome of comparing one node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum DiffResult {
    #[default]
    Equal,
    Added,
    Deleted,
    Changed,
}

impl fmt::Display for DiffResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DiffResult::Equal => "equal",
            DiffResult::Added => "added",
            DiffResult::Deleted => "deleted",
            DiffResult::Changed => "changed",
        })
    }
}

/// Scalar field compared on a frame, signal, signal group or define.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Field {
    Name,
    Size,
    Extended,
    Fd,
    Id,
    StartBit,
    Length,
    Factor,
    Offset,
    Min,
    Max,
    ByteOrder,
    Signed,
    Multiplex,
    Unit,
    Definition,
    Default,
}

/// What a [`ResultNode`] describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    Matrix,
    Frame,
    Signal,
    SignalGroup,
    Ecu,
    Comment,
    /// Comments differing only by surrounding whitespace.
    CommentWhitespace,
    Attributes,
    Attribute,
    ValueTables,
    ValueTable,
    ValueEntry,
    Defines(DefineScope),
    Define,
    Transmitter,
    Receiver,
    GroupMember,
    Field(Field),
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Matrix => f.write_str("MATRIX"),
            Category::Frame => f.write_str("FRAME"),
            Category::Signal => f.write_str("SIGNAL"),
            Category::SignalGroup => f.write_str("SIGNALGROUP"),
            Category::Ecu => f.write_str("ECU"),
            Category::Comment => f.write_str("comment"),
            Category::CommentWhitespace => f.write_str("comment (whitespace)"),
            Category::Attributes => f.write_str("ATTRIBUTES"),
            Category::Attribute => f.write_str("attribute"),
            Category::ValueTables => f.write_str("VALUETABLES"),
            Category::ValueTable => f.write_str("VALUETABLE"),
            Category::ValueEntry => f.write_str("value"),
            Category::Defines(scope) => write!(f, "DEFINES ({})", scope),
            Category::Define => f.write_str("define"),
            Category::Transmitter => f.write_str("transmitter"),
            Category::Receiver => f.write_str("receiver"),
            Category::GroupMember => f.write_str("member"),
            Category::Field(field) => write!(f, "{:?}", field),
        }
    }
}

/// Literal value carried on leaf nodes.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Value {
    Text(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Attribute(AttributeValue),
}

impl Value {
    /// Equality where two NaN floats are the same value.
    pub(crate) fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            _ => self == other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{}", s),
            Value::Int(i) => write!(f, "{}", i),
            Value::UInt(u) => write!(f, "{}", u),
            Value::Float(x) => write!(f, "{}", x),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Attribute(a) => write!(f, "{}", a),
        }
    }
}

/// Old/new pair of a leaf. `None` on the side where the entry does not exist.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Change {
    pub old: Option<Value>,
    pub new: Option<Value>,
}

/// Entity a node refers to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum EntityRef {
    Matrix,
    Frame(ArbitrationId),
    Signal { frame: ArbitrationId, name: String },
    SignalGroup { frame: ArbitrationId, name: String },
    Ecu(String),
    Define { scope: DefineScope, key: String },
    /// Map entry or set member (attribute key, value table name, ECU name, raw value...).
    Key(String),
}

/// One node of the hierarchical comparison tree.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResultNode {
    pub category: Category,
    pub result: DiffResult,
    pub reference: EntityRef,
    pub values: Option<Change>,
    pub children: Vec<ResultNode>,
}

impl ResultNode {
    pub fn new(category: Category, result: DiffResult, reference: EntityRef) -> Self {
        ResultNode {
            category,
            result,
            reference,
            values: None,
            children: Vec::new(),
        }
    }

    /// Leaf comparing two values present on both sides.
    pub(crate) fn leaf(category: Category, reference: EntityRef, old: Value, new: Value) -> Self {
        let result: DiffResult = if old.same(&new) {
            DiffResult::Equal
        } else {
            DiffResult::Changed
        };
        ResultNode {
            values: Some(Change {
                old: Some(old),
                new: Some(new),
            }),
            ..ResultNode::new(category, result, reference)
        }
    }

    /// Entry that only exists on the second side.
    pub(crate) fn added(category: Category, reference: EntityRef, new: Option<Value>) -> Self {
        ResultNode {
            values: new.map(|v| Change {
                old: None,
                new: Some(v),
            }),
            ..ResultNode::new(category, DiffResult::Added, reference)
        }
    }

    /// Entry that only exists on the first side.
    pub(crate) fn deleted(category: Category, reference: EntityRef, old: Option<Value>) -> Self {
        ResultNode {
            values: old.map(|v| Change {
                old: Some(v),
                new: None,
            }),
            ..ResultNode::new(category, DiffResult::Deleted, reference)
        }
    }

    pub(crate) fn with_children(mut self, children: Vec<ResultNode>) -> Self {
        self.children = children;
        self
    }

    /// Post-order pass: a node that is neither added nor deleted becomes `Changed`
    /// when any descendant differs.
    pub fn propagate_changes(&mut self) {
        for child in &mut self.children {
            child.propagate_changes();
        }
        if self.result == DiffResult::Equal && self.children.iter().any(|c| c.has_changes()) {
            self.result = DiffResult::Changed;
        }
    }

    pub fn has_changes(&self) -> bool {
        self.result != DiffResult::Equal
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Pre-order traversal including `self`.
    pub fn iter(&self) -> Iter<'_> {
        Iter { stack: vec![self] }
    }

    /// First node (pre-order) of the given category.
    pub fn find(&self, category: Category) -> Option<&ResultNode> {
        self.iter().find(|n| n.category == category)
    }

    /// Leaves whose result is not `Equal`.
    pub fn changed_leaves(&self) -> impl Iterator<Item = &ResultNode> + '_ {
        self.iter().filter(|n| n.is_leaf() && n.has_changes())
    }
}

/// Pre-order iterator over a [`ResultNode`] tree.
pub struct Iter<'a> {
    stack: Vec<&'a ResultNode>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a ResultNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node: &ResultNode = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_test_tree() -> ResultNode {
        let leaf_equal = ResultNode::leaf(
            Category::Field(Field::Name),
            EntityRef::Key("a".into()),
            Value::Text("x".into()),
            Value::Text("x".into()),
        );
        let leaf_changed = ResultNode::leaf(
            Category::Comment,
            EntityRef::Key("b".into()),
            Value::Text("foo".into()),
            Value::Text("bar".into()),
        );
        let inner = ResultNode::new(Category::Signal, DiffResult::Equal, EntityRef::Key("s".into()))
            .with_children(vec![leaf_changed]);
        ResultNode::new(Category::Matrix, DiffResult::Equal, EntityRef::Matrix)
            .with_children(vec![leaf_equal, inner])
    }

    #[test]
    fn test_propagation() {
        let mut tree = build_test_tree();
        assert!(!tree.has_changes());
        tree.propagate_changes();
        assert_eq!(tree.result, DiffResult::Changed);
        assert_eq!(tree.children[0].result, DiffResult::Equal);
        assert_eq!(tree.children[1].result, DiffResult::Changed);
    }

    #[test]
    fn test_added_parent_keeps_result() {
        let mut node = ResultNode::added(Category::Frame, EntityRef::Key("f".into()), None)
            .with_children(vec![ResultNode::deleted(
                Category::Attribute,
                EntityRef::Key("k".into()),
                Some(Value::Int(1)),
            )]);
        node.propagate_changes();
        assert_eq!(node.result, DiffResult::Added);
    }

    #[test]
    fn test_traversal() {
        let tree = build_test_tree();
        let categories: Vec<Category> = tree.iter().map(|n| n.category).collect();
        assert_eq!(
            categories,
            vec![
                Category::Matrix,
                Category::Field(Field::Name),
                Category::Signal,
                Category::Comment
            ]
        );
        assert!(tree.find(Category::Signal).is_some());
        assert!(tree.find(Category::Ecu).is_none());

        let leaves: Vec<&ResultNode> = tree.changed_leaves().collect();
        assert_eq!(leaves.len(), 1);
        assert_eq!(
            leaves[0].values,
            Some(Change {
                old: Some(Value::Text("foo".into())),
                new: Some(Value::Text("bar".into()))
            })
        );
    }

    #[test]
    fn test_nan_fields_are_equal() {
        let node = ResultNode::leaf(
            Category::Field(Field::Min),
            EntityRef::Matrix,
            Value::Float(f64::NAN),
            Value::Float(f64::NAN),
        );
        assert_eq!(node.result, DiffResult::Equal);
    }
}
