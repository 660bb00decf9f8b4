use log::trace;
use std::collections::BTreeMap;

use crate::diff::{
    ignore::{IgnoreCategory, IgnoreFilter},
    result::{Category, DiffResult, EntityRef, Field, ResultNode, Value},
};
use crate::types::{
    attributes::{AttributeMap, Define, DefineScope, ValueTable},
    ecu::Ecu,
    frame::{ArbitrationId, Frame, SignalGroup},
    matrix::Matrix,
    signal::Signal,
};

/// Compares two matrices and returns the propagated change tree.
///
/// Children of the root, in order: frames (matched by arbitration id; a frame whose
/// standard/extended flag flipped is matched by its numeric id), ECUs (matched by
/// name), the four define scopes, named value tables and global attributes. Entries of
/// `m1` come first in their stored order, then the ones only present in `m2`.
pub fn compare(m1: &Matrix, m2: &Matrix, ignore: &IgnoreFilter) -> ResultNode {
    let mut children: Vec<ResultNode> = Vec::new();

    for f1 in m1.frames() {
        match counterpart(f1, m1, m2) {
            Some(f2) => children.push(compare_frame(f1, f2, ignore)),
            None => children.push(ResultNode::deleted(Category::Frame, EntityRef::Frame(f1.id), None)),
        }
    }
    for f2 in m2.frames().filter(|f| counterpart(f, m2, m1).is_none()) {
        children.push(ResultNode::added(Category::Frame, EntityRef::Frame(f2.id), None));
    }

    for e1 in m1.ecus() {
        match m2.ecu(&e1.name) {
            Some(e2) => children.push(compare_ecu(e1, e2, ignore)),
            None => children.push(ResultNode::deleted(
                Category::Ecu,
                EntityRef::Ecu(e1.name.clone()),
                None,
            )),
        }
    }
    for e2 in m2.ecus().filter(|e| m1.ecu(&e.name).is_none()) {
        children.push(ResultNode::added(Category::Ecu, EntityRef::Ecu(e2.name.clone()), None));
    }

    if !ignore.skips_all(IgnoreCategory::Defines) {
        for scope in DefineScope::ALL {
            children.push(compare_define_list(
                scope,
                m1.defines(scope),
                m2.defines(scope),
                ignore,
            ));
        }
    }

    if !ignore.skips_all(IgnoreCategory::ValueTables) {
        let tables: Vec<ResultNode> = compare_entries(
            (m1.value_tables(), m2.value_tables()),
            Category::ValueTable,
            |name| ignore.skips(IgnoreCategory::ValueTables, name),
            |name, t1, t2| compare_value_table(EntityRef::Key(name.clone()), t1, t2),
            |name| EntityRef::Key(name.clone()),
            |_| None,
        );
        children.push(
            ResultNode::new(Category::ValueTables, DiffResult::Equal, EntityRef::Matrix)
                .with_children(tables),
        );
    }

    if let Some(attrs) = attributes_node(EntityRef::Matrix, "", m1.attributes(), m2.attributes(), ignore) {
        children.push(attrs);
    }

    let mut root: ResultNode =
        ResultNode::new(Category::Matrix, DiffResult::Equal, EntityRef::Matrix).with_children(children);
    root.propagate_changes();
    root
}

// Exact arbitration id first, else a frame with the same numeric id under the other
// format, as long as `own` does not hold that one itself.
fn counterpart<'a>(frame: &Frame, own: &Matrix, other: &'a Matrix) -> Option<&'a Frame> {
    other.frame(frame.id).or_else(|| {
        other
            .frames()
            .find(|f| f.id.id() == frame.id.id() && own.frame(f.id).is_none())
    })
}

/// Compares two frames with the same numeric id.
pub fn compare_frame(f1: &Frame, f2: &Frame, ignore: &IgnoreFilter) -> ResultNode {
    trace!("Comparing frame {} '{}' / '{}'", f1.id, f1.name, f2.name);
    let reference: EntityRef = EntityRef::Frame(f1.id);
    let leaf = |field: Field, old: Value, new: Value| {
        ResultNode::leaf(Category::Field(field), reference.clone(), old, new)
    };

    let mut children: Vec<ResultNode> = vec![
        leaf(Field::Name, Value::Text(f1.name.clone()), Value::Text(f2.name.clone())),
        leaf(Field::Size, Value::UInt(f1.size as u64), Value::UInt(f2.size as u64)),
        leaf(
            Field::Extended,
            Value::Bool(f1.id.is_extended()),
            Value::Bool(f2.id.is_extended()),
        ),
        leaf(Field::Fd, Value::Bool(f1.fd), Value::Bool(f2.fd)),
    ];
    if !ignore.skips(IgnoreCategory::Comments, &f1.name) {
        children.push(compare_comment(reference.clone(), &f1.comment, &f2.comment));
    }
    if let Some(attrs) = attributes_node(reference.clone(), &f1.name, &f1.attributes, &f2.attributes, ignore) {
        children.push(attrs);
    }
    children.extend(compare_name_set(
        Category::Transmitter,
        &f1.transmitters,
        &f2.transmitters,
    ));

    for s1 in &f1.signals {
        match f2.signal(&s1.name) {
            Some(s2) => children.push(compare_signal(f1.id, s1, s2, ignore)),
            None => children.push(ResultNode::deleted(
                Category::Signal,
                signal_ref(f1.id, &s1.name),
                None,
            )),
        }
    }
    for s2 in f2.signals.iter().filter(|s| f1.signal(&s.name).is_none()) {
        children.push(ResultNode::added(Category::Signal, signal_ref(f1.id, &s2.name), None));
    }

    for g1 in &f1.signal_groups {
        match f2.signal_group(&g1.name) {
            Some(g2) => children.push(compare_signal_group(f1.id, g1, g2)),
            None => children.push(ResultNode::deleted(
                Category::SignalGroup,
                group_ref(f1.id, &g1.name),
                None,
            )),
        }
    }
    for g2 in f2.signal_groups.iter().filter(|g| f1.signal_group(&g.name).is_none()) {
        children.push(ResultNode::added(
            Category::SignalGroup,
            group_ref(f1.id, &g2.name),
            None,
        ));
    }

    let mut node: ResultNode =
        ResultNode::new(Category::Frame, DiffResult::Equal, reference).with_children(children);
    node.propagate_changes();
    node
}

/// Compares two signals with the same name inside frame `frame`.
pub fn compare_signal(frame: ArbitrationId, s1: &Signal, s2: &Signal, ignore: &IgnoreFilter) -> ResultNode {
    let reference: EntityRef = signal_ref(frame, &s1.name);
    let leaf = |field: Field, old: Value, new: Value| {
        ResultNode::leaf(Category::Field(field), reference.clone(), old, new)
    };

    let mut children: Vec<ResultNode> = vec![
        leaf(
            Field::StartBit,
            Value::UInt(s1.start_bit as u64),
            Value::UInt(s2.start_bit as u64),
        ),
        leaf(Field::Length, Value::UInt(s1.length as u64), Value::UInt(s2.length as u64)),
        leaf(Field::Factor, Value::Float(s1.factor), Value::Float(s2.factor)),
        leaf(Field::Offset, Value::Float(s1.offset), Value::Float(s2.offset)),
        leaf(Field::Min, Value::Float(s1.min), Value::Float(s2.min)),
        leaf(Field::Max, Value::Float(s1.max), Value::Float(s2.max)),
        leaf(
            Field::ByteOrder,
            Value::Text(s1.byte_order.to_string()),
            Value::Text(s2.byte_order.to_string()),
        ),
        leaf(Field::Signed, Value::Bool(s1.signed), Value::Bool(s2.signed)),
        leaf(
            Field::Multiplex,
            Value::Text(s1.mux.to_string()),
            Value::Text(s2.mux.to_string()),
        ),
        leaf(Field::Unit, Value::Text(s1.unit.clone()), Value::Text(s2.unit.clone())),
    ];
    if !ignore.skips(IgnoreCategory::Comments, &s1.name) {
        children.push(compare_comment(reference.clone(), &s1.comment, &s2.comment));
    }
    children.extend(compare_name_set(Category::Receiver, &s1.receivers, &s2.receivers));
    if let Some(attrs) = attributes_node(reference.clone(), &s1.name, &s1.attributes, &s2.attributes, ignore) {
        children.push(attrs);
    }
    if !ignore.skips(IgnoreCategory::ValueTables, &s1.name) {
        children.push(compare_value_table(reference.clone(), &s1.values, &s2.values));
    }

    let mut node: ResultNode =
        ResultNode::new(Category::Signal, DiffResult::Equal, reference).with_children(children);
    node.propagate_changes();
    node
}

/// Compares two signal groups with the same name inside frame `frame`.
pub fn compare_signal_group(frame: ArbitrationId, g1: &SignalGroup, g2: &SignalGroup) -> ResultNode {
    let reference: EntityRef = group_ref(frame, &g1.name);
    let mut children: Vec<ResultNode> = vec![
        ResultNode::leaf(
            Category::Field(Field::Name),
            reference.clone(),
            Value::Text(g1.name.clone()),
            Value::Text(g2.name.clone()),
        ),
        ResultNode::leaf(
            Category::Field(Field::Id),
            reference.clone(),
            Value::UInt(g1.id as u64),
            Value::UInt(g2.id as u64),
        ),
    ];
    children.extend(compare_name_set(Category::GroupMember, &g1.signals, &g2.signals));

    let mut node: ResultNode =
        ResultNode::new(Category::SignalGroup, DiffResult::Equal, reference).with_children(children);
    node.propagate_changes();
    node
}

/// Compares two ECUs with the same name.
pub fn compare_ecu(e1: &Ecu, e2: &Ecu, ignore: &IgnoreFilter) -> ResultNode {
    trace!("Comparing ECU '{}'", e1.name);
    let reference: EntityRef = EntityRef::Ecu(e1.name.clone());
    let mut children: Vec<ResultNode> = Vec::new();
    if !ignore.skips(IgnoreCategory::Comments, &e1.name) {
        children.push(compare_comment(reference.clone(), &e1.comment, &e2.comment));
    }
    if let Some(attrs) = attributes_node(reference.clone(), &e1.name, &e1.attributes, &e2.attributes, ignore) {
        children.push(attrs);
    }

    let mut node: ResultNode =
        ResultNode::new(Category::Ecu, DiffResult::Equal, reference).with_children(children);
    node.propagate_changes();
    node
}

/// Key/value diff of two attribute maps, under an `Attributes` node referring to `owner`.
///
/// Keys registered with [`IgnoreFilter::ignore_attribute_key`] are skipped.
pub fn compare_attributes(
    owner: EntityRef,
    a1: &AttributeMap,
    a2: &AttributeMap,
    ignore: &IgnoreFilter,
) -> ResultNode {
    let children: Vec<ResultNode> = compare_entries(
        (a1, a2),
        Category::Attribute,
        |key| ignore.skips_attribute_key(key),
        |key, v1, v2| {
            ResultNode::leaf(
                Category::Attribute,
                EntityRef::Key(key.clone()),
                Value::Attribute(v1.clone()),
                Value::Attribute(v2.clone()),
            )
        },
        |key| EntityRef::Key(key.clone()),
        |v| Some(Value::Attribute(v.clone())),
    );

    let mut node: ResultNode =
        ResultNode::new(Category::Attributes, DiffResult::Equal, owner).with_children(children);
    node.propagate_changes();
    node
}

/// Raw value → label diff of two value tables, under a `ValueTable` node referring to `owner`.
pub fn compare_value_table(owner: EntityRef, t1: &ValueTable, t2: &ValueTable) -> ResultNode {
    let children: Vec<ResultNode> = compare_entries(
        (t1, t2),
        Category::ValueEntry,
        |_| false,
        |raw, l1, l2| {
            ResultNode::leaf(
                Category::ValueEntry,
                EntityRef::Key(raw.to_string()),
                Value::Text(l1.clone()),
                Value::Text(l2.clone()),
            )
        },
        |raw| EntityRef::Key(raw.to_string()),
        |label| Some(Value::Text(label.clone())),
    );

    let mut node: ResultNode =
        ResultNode::new(Category::ValueTable, DiffResult::Equal, owner).with_children(children);
    node.propagate_changes();
    node
}

/// Diff of one Define dictionary. Each common key gets a `Define` node with a
/// `Definition` and a `Default` leaf.
pub fn compare_define_list(
    scope: DefineScope,
    d1: &BTreeMap<String, Define>,
    d2: &BTreeMap<String, Define>,
    ignore: &IgnoreFilter,
) -> ResultNode {
    let reference = |key: &String| EntityRef::Define {
        scope,
        key: key.clone(),
    };
    let children: Vec<ResultNode> = compare_entries(
        (d1, d2),
        Category::Define,
        |key| ignore.skips(IgnoreCategory::Defines, key),
        |key, def1, def2| {
            let default = |d: &Define| d.default.clone().map(Value::Attribute);
            let default_leaf: ResultNode = match (default(def1), default(def2)) {
                (Some(old), Some(new)) => {
                    ResultNode::leaf(Category::Field(Field::Default), reference(key), old, new)
                }
                (None, Some(new)) => {
                    ResultNode::added(Category::Field(Field::Default), reference(key), Some(new))
                }
                (Some(old), None) => {
                    ResultNode::deleted(Category::Field(Field::Default), reference(key), Some(old))
                }
                (None, None) => ResultNode::new(
                    Category::Field(Field::Default),
                    DiffResult::Equal,
                    reference(key),
                ),
            };
            ResultNode::new(Category::Define, DiffResult::Equal, reference(key)).with_children(vec![
                ResultNode::leaf(
                    Category::Field(Field::Definition),
                    reference(key),
                    Value::Text(def1.definition()),
                    Value::Text(def2.definition()),
                ),
                default_leaf,
            ])
        },
        &reference,
        |d| Some(Value::Text(d.definition())),
    );

    let mut node: ResultNode = ResultNode::new(Category::Defines(scope), DiffResult::Equal, EntityRef::Matrix)
        .with_children(children);
    node.propagate_changes();
    node
}

// ---------- helpers ----------

fn signal_ref(frame: ArbitrationId, name: &str) -> EntityRef {
    EntityRef::Signal {
        frame,
        name: name.to_string(),
    }
}

fn group_ref(frame: ArbitrationId, name: &str) -> EntityRef {
    EntityRef::SignalGroup {
        frame,
        name: name.to_string(),
    }
}

fn attributes_node(
    owner: EntityRef,
    owner_name: &str,
    a1: &AttributeMap,
    a2: &AttributeMap,
    ignore: &IgnoreFilter,
) -> Option<ResultNode> {
    if ignore.skips_all(IgnoreCategory::Attributes)
        || (!owner_name.is_empty() && ignore.skips(IgnoreCategory::Attributes, owner_name))
    {
        return None;
    }
    Some(compare_attributes(owner, a1, a2, ignore))
}

fn compare_comment(reference: EntityRef, c1: &str, c2: &str) -> ResultNode {
    let old: Value = Value::Text(c1.to_string());
    let new: Value = Value::Text(c2.to_string());
    if c1 != c2 && c1.trim() == c2.trim() {
        return ResultNode::leaf(Category::CommentWhitespace, reference, old, new);
    }
    ResultNode::leaf(Category::Comment, reference, old, new)
}

/// Two-way set difference over name lists; members of `n1` first, then the new ones.
fn compare_name_set(category: Category, n1: &[String], n2: &[String]) -> Vec<ResultNode> {
    let text = |name: &String| Some(Value::Text(name.clone()));
    let mut out: Vec<ResultNode> = Vec::with_capacity(n1.len().max(n2.len()));
    for name in n1 {
        let reference: EntityRef = EntityRef::Key(name.clone());
        if n2.contains(name) {
            out.push(ResultNode::leaf(
                category,
                reference,
                Value::Text(name.clone()),
                Value::Text(name.clone()),
            ));
        } else {
            out.push(ResultNode::deleted(category, reference, text(name)));
        }
    }
    for name in n2.iter().filter(|n| !n1.contains(n)) {
        out.push(ResultNode::added(category, EntityRef::Key(name.clone()), text(name)));
    }
    out
}

/// Generic ordered map diff: common keys go through `both`, the others become
/// added/deleted nodes of `category` carrying `value` of the one side present.
fn compare_entries<K, V, S, B, R, T>(
    maps: (&BTreeMap<K, V>, &BTreeMap<K, V>),
    category: Category,
    skip: S,
    both: B,
    reference: R,
    value: T,
) -> Vec<ResultNode>
where
    K: Ord,
    S: Fn(&K) -> bool,
    B: Fn(&K, &V, &V) -> ResultNode,
    R: Fn(&K) -> EntityRef,
    T: Fn(&V) -> Option<Value>,
{
    let (m1, m2) = maps;
    let mut out: Vec<ResultNode> = Vec::new();
    for (key, v1) in m1.iter().filter(|&(k, _)| !skip(k)) {
        match m2.get(key) {
            Some(v2) => out.push(both(key, v1, v2)),
            None => out.push(ResultNode::deleted(category, reference(key), value(v1))),
        }
    }
    for (key, v2) in m2.iter().filter(|&(k, _)| !skip(k) && !m1.contains_key(k)) {
        out.push(ResultNode::added(category, reference(key), value(v2)));
    }
    out
}
