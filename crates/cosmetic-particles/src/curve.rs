//! Curves exposed to expressions as virtual variables
//!
//! An effect may declare `"variable.size": { "type": "linear", ... }`. Reading
//! `v.size` then samples the curve at `input / horizontal_range`.

use cosmetic_molang::{Expression, Runtime};
use serde::Deserialize;
use serde::de::{self, Deserializer};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveKind {
    Linear,
    Bezier,
    CatmullRom,
    BezierChain,
}

/// A node of a `bezier_chain` curve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainNode {
    /// Position on the curve input, `[0, 1]`
    pub time: f32,
    /// Value approaching the node
    pub left_value: f32,
    /// Value leaving the node
    pub right_value: f32,
    /// Slope approaching the node
    pub left_slope: f32,
    /// Slope leaving the node
    pub right_slope: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CurveNodes {
    /// Evenly spaced values over `[0, 1]`
    Values(Vec<Expression>),
    /// Explicitly timed nodes, sorted by time
    Chain(Vec<ChainNode>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    /// Interpolation between nodes
    pub kind: CurveKind,
    /// Value the curve is sampled at
    pub input: Expression,
    /// Input value mapped to the last node
    pub horizontal_range: Expression,
    /// Control values
    pub nodes: CurveNodes,
}

impl Curve {
    /// Sample the curve for the current state of `runtime`
    pub fn evaluate<R: Runtime + ?Sized>(&self, runtime: &mut R) -> f32 {
        let input = self.input.eval(runtime);
        let range = self.horizontal_range.eval(runtime);
        let t = if range == 0.0 { 0.0 } else { input / range };
        let t = t.clamp(0.0, 1.0);

        match &self.nodes {
            CurveNodes::Chain(nodes) => sample_chain(nodes, t),
            CurveNodes::Values(nodes) => {
                let values: Vec<f32> = nodes.iter().map(|node| node.eval(runtime)).collect();
                match self.kind {
                    CurveKind::Bezier => sample_bezier(&values, t),
                    CurveKind::CatmullRom => sample_catmull_rom(&values, t),
                    CurveKind::Linear | CurveKind::BezierChain => sample_linear(&values, t),
                }
            }
        }
    }
}

fn sample_linear(values: &[f32], t: f32) -> f32 {
    match values {
        [] => 0.0,
        [only] => *only,
        _ => {
            let scaled = t * (values.len() - 1) as f32;
            let index = (scaled.floor() as usize).min(values.len() - 2);
            let local = scaled - index as f32;
            values[index] + (values[index + 1] - values[index]) * local
        }
    }
}

fn cubic_bezier(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
    let u = 1.0 - t;
    u * u * u * p0 + 3.0 * u * u * t * p1 + 3.0 * u * t * t * p2 + t * t * t * p3
}

fn sample_bezier(values: &[f32], t: f32) -> f32 {
    match values {
        [p0, p1, p2, p3, ..] => cubic_bezier(*p0, *p1, *p2, *p3, t),
        _ => sample_linear(values, t),
    }
}

/// The outer two values only shape the tangents at the ends
fn sample_catmull_rom(values: &[f32], t: f32) -> f32 {
    if values.len() < 4 {
        return sample_linear(values, t);
    }
    let segments = values.len() - 3;
    let scaled = t * segments as f32;
    let index = (scaled.floor() as usize).min(segments - 1);
    let local = scaled - index as f32;
    let [p0, p1, p2, p3] = [
        values[index],
        values[index + 1],
        values[index + 2],
        values[index + 3],
    ];

    let t2 = local * local;
    let t3 = t2 * local;
    0.5 * ((2.0 * p1)
        + (-p0 + p2) * local
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * t3)
}

fn sample_chain(nodes: &[ChainNode], t: f32) -> f32 {
    let Some(first) = nodes.first() else {
        return 0.0;
    };
    if t <= first.time {
        return first.left_value;
    }
    for pair in nodes.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if t <= b.time {
            let span = b.time - a.time;
            if span <= 0.0 {
                return b.left_value;
            }
            let local = (t - a.time) / span;
            let p1 = a.right_value + a.right_slope * span / 3.0;
            let p2 = b.left_value - b.left_slope * span / 3.0;
            return cubic_bezier(a.right_value, p1, p2, b.left_value, local);
        }
    }
    nodes.last().map_or(0.0, |last| last.right_value)
}

#[derive(Deserialize)]
struct CurveDef {
    #[serde(rename = "type", default = "default_kind")]
    kind: CurveKind,
    #[serde(default)]
    input: Expression,
    #[serde(default = "Expression::one")]
    horizontal_range: Expression,
    #[serde(default)]
    nodes: NodesDef,
}

fn default_kind() -> CurveKind {
    CurveKind::Linear
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NodesDef {
    Values(Vec<Expression>),
    Chain(BTreeMap<String, ChainNodeDef>),
}

impl Default for NodesDef {
    fn default() -> Self {
        NodesDef::Values(Vec::new())
    }
}

#[derive(Deserialize)]
struct ChainNodeDef {
    value: Option<f32>,
    left_value: Option<f32>,
    right_value: Option<f32>,
    slope: Option<f32>,
    left_slope: Option<f32>,
    right_slope: Option<f32>,
}

impl<'de> Deserialize<'de> for Curve {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let def = CurveDef::deserialize(deserializer)?;
        let nodes = match def.nodes {
            NodesDef::Values(values) => CurveNodes::Values(values),
            NodesDef::Chain(map) => {
                let mut nodes = Vec::with_capacity(map.len());
                for (key, node) in map {
                    let time: f32 = key
                        .trim()
                        .parse()
                        .map_err(|_| de::Error::custom(format!("invalid curve node time '{key}'")))?;
                    let value = node.value.unwrap_or(0.0);
                    let slope = node.slope.unwrap_or(0.0);
                    nodes.push(ChainNode {
                        time,
                        left_value: node.left_value.unwrap_or(value),
                        right_value: node.right_value.unwrap_or(value),
                        left_slope: node.left_slope.unwrap_or(slope),
                        right_slope: node.right_slope.unwrap_or(slope),
                    });
                }
                nodes.sort_by(|a, b| a.time.total_cmp(&b.time));
                CurveNodes::Chain(nodes)
            }
        };
        Ok(Curve {
            kind: def.kind,
            input: def.input,
            horizontal_range: def.horizontal_range,
            nodes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmetic_molang::SimpleRuntime;
    use test_case::test_case;

    fn curve(json: &str) -> Curve {
        serde_json::from_str(json).unwrap()
    }

    fn sample(curve: &Curve, input: f32) -> f32 {
        let mut runtime = SimpleRuntime::new(1);
        runtime.variables.set("x", input);
        curve.evaluate(&mut runtime)
    }

    #[test_case(0.0, 0.0)]
    #[test_case(0.25, 5.0)]
    #[test_case(0.5, 10.0)]
    #[test_case(0.75, 7.0)]
    #[test_case(2.0, 4.0 ; "clamped past the end")]
    fn test_linear(input: f32, expected: f32) {
        let c = curve(r#"{ "type": "linear", "input": "v.x", "nodes": [0, 10, 4] }"#);
        assert!((sample(&c, input) - expected).abs() < 1e-5);
    }

    #[test]
    fn test_horizontal_range() {
        let c = curve(r#"{ "type": "linear", "input": "v.x", "horizontal_range": 4, "nodes": [0, 1] }"#);
        assert!((sample(&c, 1.0) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_bezier_end_points() {
        let c = curve(r#"{ "type": "bezier", "input": "v.x", "nodes": [1, 5, -3, 2] }"#);
        assert_eq!(sample(&c, 0.0), 1.0);
        assert_eq!(sample(&c, 1.0), 2.0);
    }

    #[test]
    fn test_catmull_rom_passes_through_inner_nodes() {
        let c = curve(r#"{ "type": "catmull_rom", "input": "v.x", "nodes": [9, 0, 1, 3, -9] }"#);
        assert!((sample(&c, 0.0) - 0.0).abs() < 1e-5);
        assert!((sample(&c, 0.5) - 1.0).abs() < 1e-5);
        assert!((sample(&c, 1.0) - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_bezier_chain() {
        let c = curve(
            r#"{
                "type": "bezier_chain",
                "input": "v.x",
                "nodes": {
                    "1.0": { "value": 4 },
                    "0.0": { "value": 0, "slope": 0 },
                    "0.5": { "left_value": 2, "right_value": 3 }
                }
            }"#,
        );
        assert_eq!(sample(&c, 0.0), 0.0);
        assert_eq!(sample(&c, 0.5), 2.0);
        assert!((sample(&c, 0.75) - 3.5).abs() < 1e-5);
        assert_eq!(sample(&c, 1.0), 4.0);
    }
}
