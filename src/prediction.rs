use crate::bounding_box::BoundingBox;
use serde_json::{Map, Value};

/// A detection picked out of a workflow response.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub class_label: String,
    pub confidence: f64,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

impl Prediction {
    pub fn from_candidate(node: &Map<String, Value>) -> Self {
        let class_label = match node.get("class") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };

        Self {
            class_label,
            confidence: confidence_of(node),
            x: node.get("x").and_then(Value::as_f64),
            y: node.get("y").and_then(Value::as_f64),
            width: node.get("width").and_then(Value::as_f64),
            height: node.get("height").and_then(Value::as_f64),
        }
    }

    pub fn label(&self) -> String {
        format!("{} ({:.2})", self.class_label, self.confidence)
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        match (self.x, self.y, self.width, self.height) {
            (Some(x), Some(y), Some(width), Some(height)) => {
                Some(BoundingBox::from_center(x, y, width, height))
            }
            _ => None,
        }
    }
}

fn is_candidate(node: &Map<String, Value>) -> bool {
    node.contains_key("class") && node.contains_key("confidence")
}

/// Missing, null and non-numeric confidences compare as zero.
fn confidence_of(node: &Map<String, Value>) -> f64 {
    node.get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(0.)
}

/// Shape of a response node, as far as traversal is concerned.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Mapping(&'a Map<String, Value>),
    Sequence(&'a [Value]),
    Scalar(&'a Value),
}

impl<'a> From<&'a Value> for Node<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Object(map) => Node::Mapping(map),
            Value::Array(items) => Node::Sequence(items),
            scalar => Node::Scalar(scalar),
        }
    }
}

pub trait Visitor<'a> {
    fn visit_mapping(&mut self, map: &'a Map<String, Value>);
}

/// Pre-order depth-first walk. Object members are visited in document order,
/// array items in index order.
pub fn walk<'a, V: Visitor<'a>>(value: &'a Value, visitor: &mut V) {
    match Node::from(value) {
        Node::Mapping(map) => {
            visitor.visit_mapping(map);
            for child in map.values() {
                walk(child, visitor);
            }
        }
        Node::Sequence(items) => {
            for item in items {
                walk(item, visitor);
            }
        }
        Node::Scalar(_) => {}
    }
}

#[derive(Default)]
struct BestCandidate<'a> {
    best: Option<(f64, &'a Map<String, Value>)>,
    seen: usize,
}

impl<'a> Visitor<'a> for BestCandidate<'a> {
    fn visit_mapping(&mut self, map: &'a Map<String, Value>) {
        if !is_candidate(map) {
            return;
        }
        self.seen += 1;

        let confidence = confidence_of(map);
        match self.best {
            // strictly greater, so the first of equal candidates is kept
            Some((best, _)) if confidence <= best => {}
            _ => self.best = Some((confidence, map)),
        }
    }
}

/// Highest-confidence candidate anywhere in `result`, or `None` if the
/// response carries no object with both `class` and `confidence`.
pub fn best_prediction(result: &Value) -> Option<Prediction> {
    let mut selector = BestCandidate::default();
    walk(result, &mut selector);

    tracing::debug!("Found {} candidate predictions", selector.seen);

    selector
        .best
        .map(|(_, node)| Prediction::from_candidate(node))
}
