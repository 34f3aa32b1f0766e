//! Node query predicates.
//!
//! A small document-query language over the JSON form of [`Node`]:
//!
//! ```text
//! {"status": 1, "assignedSpace": {"$gt": 0}, "stableStat.ratio": {"$gte": 0.5}}
//! {"$or": [{"poolID": "p1"}, {"poolID": "p2"}]}
//! ```
//!
//! Field paths use dots; plain values mean equality; operator objects
//! support `$eq $ne $gt $gte $lt $lte $in $nin $exists`.
//!
//! [`Node`]: tracker_types::Node

use std::cmp::Ordering;

use serde_json::Value;

use crate::StoreError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeQuery {
    clauses: Vec<Clause>,
}

#[derive(Clone, Debug, PartialEq)]
enum Clause {
    Field { path: String, conds: Vec<Condition> },
    And(Vec<NodeQuery>),
    Or(Vec<NodeQuery>),
}

#[derive(Clone, Debug, PartialEq)]
enum Condition {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Exists(bool),
}

impl NodeQuery {
    /// Matches every record.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn from_json(value: &Value) -> Result<Self, StoreError> {
        let obj = match value {
            Value::Object(obj) => obj,
            Value::Null => return Ok(Self::all()),
            other => return Err(invalid(format!("expected an object, got {other}"))),
        };
        let mut clauses = Vec::with_capacity(obj.len());
        for (key, val) in obj {
            match key.as_str() {
                "$and" => clauses.push(Clause::And(sub_queries(key, val)?)),
                "$or" => clauses.push(Clause::Or(sub_queries(key, val)?)),
                k if k.starts_with('$') => return Err(invalid(format!("unknown operator {k}"))),
                path => clauses.push(Clause::Field {
                    path: path.to_string(),
                    conds: conditions(val)?,
                }),
            }
        }
        Ok(Self { clauses })
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.clauses.iter().all(|clause| match clause {
            Clause::Field { path, conds } => {
                let found = lookup(doc, path);
                conds.iter().all(|c| c.holds(found))
            }
            Clause::And(qs) => qs.iter().all(|q| q.matches(doc)),
            Clause::Or(qs) => qs.iter().any(|q| q.matches(doc)),
        })
    }
}

fn invalid(msg: String) -> StoreError {
    StoreError::InvalidQuery(msg)
}

fn sub_queries(op: &str, val: &Value) -> Result<Vec<NodeQuery>, StoreError> {
    let Value::Array(items) = val else {
        return Err(invalid(format!("{op} takes an array")));
    };
    items.iter().map(NodeQuery::from_json).collect()
}

fn conditions(val: &Value) -> Result<Vec<Condition>, StoreError> {
    let Value::Object(obj) = val else {
        return Ok(vec![Condition::Eq(val.clone())]);
    };
    if !obj.keys().any(|k| k.starts_with('$')) {
        return Ok(vec![Condition::Eq(val.clone())]);
    }
    obj.iter().map(|(op, arg)| condition(op, arg)).collect()
}

fn condition(op: &str, arg: &Value) -> Result<Condition, StoreError> {
    let list = |arg: &Value| match arg {
        Value::Array(items) => Ok(items.clone()),
        _ => Err(invalid(format!("{op} takes an array"))),
    };
    Ok(match op {
        "$eq" => Condition::Eq(arg.clone()),
        "$ne" => Condition::Ne(arg.clone()),
        "$gt" => Condition::Gt(arg.clone()),
        "$gte" => Condition::Gte(arg.clone()),
        "$lt" => Condition::Lt(arg.clone()),
        "$lte" => Condition::Lte(arg.clone()),
        "$in" => Condition::In(list(arg)?),
        "$nin" => Condition::Nin(list(arg)?),
        "$exists" => Condition::Exists(arg.as_bool().unwrap_or(true)),
        other => return Err(invalid(format!("unknown operator {other}"))),
    })
}

impl Condition {
    fn holds(&self, found: Option<&Value>) -> bool {
        match self {
            Condition::Exists(want) => found.is_some() == *want,
            Condition::Eq(target) => found.is_some_and(|v| equals_or_contains(v, target)),
            Condition::Ne(target) => !found.is_some_and(|v| equals_or_contains(v, target)),
            Condition::In(targets) => {
                found.is_some_and(|v| targets.iter().any(|t| equals_or_contains(v, t)))
            }
            Condition::Nin(targets) => {
                !found.is_some_and(|v| targets.iter().any(|t| equals_or_contains(v, t)))
            }
            Condition::Gt(t) => ordered(found, t, |o| o == Ordering::Greater),
            Condition::Gte(t) => ordered(found, t, |o| o != Ordering::Less),
            Condition::Lt(t) => ordered(found, t, |o| o == Ordering::Less),
            Condition::Lte(t) => ordered(found, t, |o| o != Ordering::Greater),
        }
    }
}

fn ordered(found: Option<&Value>, target: &Value, pred: impl Fn(Ordering) -> bool) -> bool {
    found
        .and_then(|v| compare(v, target))
        .is_some_and(pred)
}

fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut cur = doc;
    for seg in path.split('.') {
        cur = match cur {
            Value::Object(map) => map.get(seg)?,
            Value::Array(items) => items.get(seg.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    if cur.is_null() {
        None
    } else {
        Some(cur)
    }
}

fn equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Array fields match when any element equals the target.
fn equals_or_contains(found: &Value, target: &Value) -> bool {
    if equals(found, target) {
        return true;
    }
    matches!(found, Value::Array(items) if items.iter().any(|item| equals(item, target)))
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Sort rank of a JSON type: numbers < strings < bools < arrays and objects.
fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Bool(_) => 3,
        Value::Array(_) | Value::Object(_) => 4,
    }
}

/// Total order over JSON values: by type rank, then by value within a type.
/// Arrays and objects are all equal to each other.
fn sort_cmp(a: &Value, b: &Value) -> Ordering {
    type_rank(a).cmp(&type_rank(b)).then_with(|| match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    })
}

/// Missing values sort before everything else; present values of different
/// types sort by type rank.
pub(crate) fn sort_documents<T>(docs: &mut [(Value, T)], field: &str, order: SortOrder) {
    docs.sort_by(|(a, _), (b, _)| {
        let ord = match (lookup(a, field), lookup(b, field)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => sort_cmp(x, y),
        };
        match order {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        }
    });
}
