use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

use crate::bbox_filter::{geometry_intersects_extent, Extent};
use crate::feature::{Feature, FeatureId};

/// Comparison used by property filters
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
}

/// Arbitrary predicate supplied from Rust code
#[derive(Clone)]
pub struct FilterFn(Rc<dyn Fn(&Feature) -> bool>);

impl fmt::Debug for FilterFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FilterFn(..)")
    }
}

/// Predicate deciding which features of a layer are visible / returned.
///
/// Every variant except `Function` has a JSON form tagged by `type`, e.g.
/// `{"type": "property", "key": "kind", "op": "eq", "value": "school"}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Filter {
    Property {
        key: String,
        op: CompareOp,
        value: serde_json::Value,
    },
    Bbox {
        extent: Extent,
    },
    Ids {
        ids: Vec<FeatureId>,
    },
    And {
        filters: Vec<Filter>,
    },
    Or {
        filters: Vec<Filter>,
    },
    Not {
        filter: Box<Filter>,
    },
    #[serde(skip)]
    Function(FilterFn),
}

impl Filter {
    pub fn function(f: impl Fn(&Feature) -> bool + 'static) -> Self {
        Filter::Function(FilterFn(Rc::new(f)))
    }

    pub fn property(key: &str, op: CompareOp, value: serde_json::Value) -> Self {
        Filter::Property { key: key.to_string(), op, value }
    }

    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::And { mut filters } => {
                filters.push(other);
                Filter::And { filters }
            }
            first => Filter::And { filters: vec![first, other] },
        }
    }

    pub fn or(self, other: Filter) -> Self {
        match self {
            Filter::Or { mut filters } => {
                filters.push(other);
                Filter::Or { filters }
            }
            first => Filter::Or { filters: vec![first, other] },
        }
    }

    pub fn negate(self) -> Self {
        Filter::Not { filter: Box::new(self) }
    }

    pub fn matches(&self, feature: &Feature) -> bool {
        match self {
            Filter::Property { key, op, value } => match feature.property(key) {
                Some(actual) => compare(&actual, *op, value),
                // a missing property only satisfies "not equal"
                None => *op == CompareOp::Ne,
            },
            Filter::Bbox { extent } => {
                feature.with_geometry(|g| g.map_or(false, |g| geometry_intersects_extent(g, extent)))
            }
            Filter::Ids { ids } => ids.contains(feature.id()),
            Filter::And { filters } => filters.iter().all(|f| f.matches(feature)),
            Filter::Or { filters } => filters.iter().any(|f| f.matches(feature)),
            Filter::Not { filter } => !filter.matches(feature),
            Filter::Function(FilterFn(f)) => f(feature),
        }
    }

    /// Keep the features this filter accepts, preserving order
    pub fn execute(&self, features: &[Feature]) -> Vec<Feature> {
        features.iter().filter(|f| self.matches(f)).cloned().collect()
    }
}

fn compare(actual: &serde_json::Value, op: CompareOp, expected: &serde_json::Value) -> bool {
    use serde_json::Value;

    match op {
        CompareOp::Eq => loosely_equal(actual, expected),
        CompareOp::Ne => !loosely_equal(actual, expected),
        CompareOp::Like => match (actual, expected) {
            (Value::String(a), Value::String(pattern)) => a.to_lowercase().contains(&pattern.to_lowercase()),
            _ => false,
        },
        _ => {
            let ordering = match (as_number(actual), as_number(expected)) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => match (actual, expected) {
                    (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                    _ => None,
                },
            };
            match ordering {
                Some(o) => match op {
                    CompareOp::Lt => o.is_lt(),
                    CompareOp::Le => o.is_le(),
                    CompareOp::Gt => o.is_gt(),
                    CompareOp::Ge => o.is_ge(),
                    _ => false,
                },
                None => false,
            }
        }
    }
}

// Attribute tables mix "3" and 3 freely, numeric strings compare as numbers
fn as_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn loosely_equal(a: &serde_json::Value, b: &serde_json::Value) -> bool {
    if a == b {
        return true;
    }
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}
