//! The line protocol shared by every stage.
//!
//! All the lines are tab-separated UTF-8 text, keyed by the first field:
//!
//! | shape                          | meaning                                   |
//! |--------------------------------|-------------------------------------------|
//! | `node\tadjacency`              | mapper input of the first iteration       |
//! | `node\trank\tadjacency`        | mapper input, reducer output              |
//! | `node\tADJ\tadjacency`         | topology of a node                        |
//! | `node\tPR\tv1,v2,...`          | contributions (or partial sums) to a node |
//! | `node\tadjacency\tv1,v2,...`   | topology and contributions of a node      |
//!
//! Every line describes itself, so any stage reading intermediate records can consume the output
//! of the mapper or of the combiner alike.
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use thiserror::Error;

/// Opaque identifier of a node of the graph.
pub type NodeId = String;

const FIELD_SEPARATOR: char = '\t';
const LIST_SEPARATOR: char = ',';

/// A line that does not follow the protocol.
///
/// These errors are local to a single line: the line is skipped and the stream goes on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedRecord {
    #[error("expected {expected} tab-separated fields, found {found}")]
    FieldCount { expected: &'static str, found: usize },
    #[error("empty node identifier")]
    EmptyNode,
    #[error("empty neighbor in adjacency list {0:?}")]
    EmptyNeighbor(String),
    #[error("{0:?} is not a number")]
    NotANumber(String),
    #[error("{0} is not a valid rank value")]
    InvalidValue(f64),
    #[error("unknown tag {0:?}")]
    UnknownTag(String),
    #[error("missing contribution value")]
    EmptyContributions,
}

/// Remove the line terminator, but not the other whitespace: tabs are significant and a trailing
/// tab separates an empty adjacency list.
pub fn strip_line_terminator(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

/// The tag of an intermediate record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Adjacency list of the node.
    Adj,
    /// Rank contribution directed to the node.
    Pr,
}

impl Tag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Adj => "ADJ",
            Tag::Pr => "PR",
        }
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tag {
    type Err = MalformedRecord;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADJ" => Ok(Tag::Adj),
            "PR" => Ok(Tag::Pr),
            other => Err(MalformedRecord::UnknownTag(other.to_string())),
        }
    }
}

/// The ordered list of the successors of a node. Empty for a dangling node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Adjacency(Vec<NodeId>);

impl Adjacency {
    pub fn new(neighbors: Vec<NodeId>) -> Self {
        Self(neighbors)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of outgoing edges, counting repeated neighbors once per occurrence.
    pub fn outdegree(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeId> {
        self.0.iter()
    }
}

impl<S: Into<NodeId>> FromIterator<S> for Adjacency {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl FromStr for Adjacency {
    type Err = MalformedRecord;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Adjacency::default());
        }
        s.split(LIST_SEPARATOR)
            .map(|neighbor| {
                if neighbor.is_empty() {
                    Err(MalformedRecord::EmptyNeighbor(s.to_string()))
                } else {
                    Ok(neighbor.to_string())
                }
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Adjacency)
    }
}

impl Display for Adjacency {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, neighbor) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "{LIST_SEPARATOR}")?;
            }
            f.write_str(neighbor)?;
        }
        Ok(())
    }
}

/// Parse a single rank or contribution value: a finite, non-negative decimal number.
pub fn parse_value(s: &str) -> Result<f64, MalformedRecord> {
    let value: f64 = s
        .trim()
        .parse()
        .map_err(|_| MalformedRecord::NotANumber(s.to_string()))?;
    if !value.is_finite() || value < 0.0 {
        return Err(MalformedRecord::InvalidValue(value));
    }
    Ok(value)
}

/// Parse a comma-joined list of values. The empty string is an empty list.
fn parse_values(s: &str) -> Result<Vec<f64>, MalformedRecord> {
    if s.is_empty() {
        return Ok(Vec::new());
    }
    s.split(LIST_SEPARATOR).map(parse_value).collect()
}

fn parse_node(s: &str) -> Result<NodeId, MalformedRecord> {
    if s.is_empty() {
        Err(MalformedRecord::EmptyNode)
    } else {
        Ok(s.to_string())
    }
}

/// The input of the mapper: a node with its current rank and its successors.
///
/// The rank is absent in the input of the first iteration, where every node implicitly starts
/// with `1 / TOTAL_NODES`.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub node: NodeId,
    pub rank: Option<f64>,
    pub adjacency: Adjacency,
}

impl FromStr for NodeRecord {
    type Err = MalformedRecord;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = strip_line_terminator(line).split(FIELD_SEPARATOR).collect();
        let (node, rank, adjacency) = match fields[..] {
            [node, adjacency] => (node, None, adjacency),
            [node, rank, adjacency] => (node, Some(parse_value(rank)?), adjacency),
            _ => {
                return Err(MalformedRecord::FieldCount {
                    expected: "2 or 3",
                    found: fields.len(),
                })
            }
        };
        Ok(NodeRecord {
            node: parse_node(node)?,
            rank,
            adjacency: adjacency.parse()?,
        })
    }
}

/// The output of the reducer, which is also the mapper input of the next iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedNode {
    pub node: NodeId,
    pub rank: f64,
    pub adjacency: Adjacency,
}

impl Display for RankedNode {
    /// Ranks are written with six fractional digits so that identical inputs always produce
    /// byte-identical outputs.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\t{:.6}\t{}", self.node, self.rank, self.adjacency)
    }
}

impl From<RankedNode> for NodeRecord {
    fn from(ranked: RankedNode) -> Self {
        NodeRecord {
            node: ranked.node,
            rank: Some(ranked.rank),
            adjacency: ranked.adjacency,
        }
    }
}

/// The payload of an intermediate record.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// `ADJ`: the adjacency list of the key.
    Adjacency(Adjacency),
    /// `PR`: one or more contributions (or partial sums) directed to the key.
    Contributions(Vec<f64>),
    /// Both the adjacency list and the contributions of the key, in a single untagged line.
    Joined {
        adjacency: Adjacency,
        contributions: Vec<f64>,
    },
}

/// A record exchanged between the mapper, the combiner and the reducer.
#[derive(Debug, Clone, PartialEq)]
pub struct IntermediateRecord {
    pub node: NodeId,
    pub payload: Payload,
}

impl IntermediateRecord {
    pub fn adjacency(node: impl Into<NodeId>, adjacency: Adjacency) -> Self {
        Self {
            node: node.into(),
            payload: Payload::Adjacency(adjacency),
        }
    }

    pub fn contribution(node: impl Into<NodeId>, value: f64) -> Self {
        Self {
            node: node.into(),
            payload: Payload::Contributions(vec![value]),
        }
    }

    pub fn key(&self) -> &str {
        &self.node
    }

    pub fn tag(&self) -> Option<Tag> {
        match self.payload {
            Payload::Adjacency(_) => Some(Tag::Adj),
            Payload::Contributions(_) => Some(Tag::Pr),
            Payload::Joined { .. } => None,
        }
    }

    /// Parse a tag and its payload.
    fn tagged(node: &str, tag: Tag, payload: &str) -> Result<Self, MalformedRecord> {
        let payload = match tag {
            Tag::Adj => Payload::Adjacency(payload.parse()?),
            Tag::Pr => {
                let values = parse_values(payload)?;
                if values.is_empty() {
                    return Err(MalformedRecord::EmptyContributions);
                }
                Payload::Contributions(values)
            }
        };
        Ok(Self {
            node: parse_node(node)?,
            payload,
        })
    }
}

impl FromStr for IntermediateRecord {
    type Err = MalformedRecord;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = strip_line_terminator(line).split(FIELD_SEPARATOR).collect();
        match fields[..] {
            [node, "ADJ", payload] => Self::tagged(node, Tag::Adj, payload),
            [node, "PR", payload] => Self::tagged(node, Tag::Pr, payload),
            [node, adjacency, contributions] => Ok(Self {
                node: parse_node(node)?,
                payload: Payload::Joined {
                    adjacency: adjacency.parse()?,
                    contributions: parse_values(contributions)?,
                },
            }),
            // a dangling node whose trailing empty field was dropped
            [node, "ADJ"] => Self::tagged(node, Tag::Adj, ""),
            // tag and payload separated by a space
            [node, rest] => match rest.split_once(' ') {
                Some((tag, payload)) => Self::tagged(node, tag.parse()?, payload),
                None => Err(MalformedRecord::UnknownTag(rest.to_string())),
            },
            _ => Err(MalformedRecord::FieldCount {
                expected: "3",
                found: fields.len(),
            }),
        }
    }
}

impl Display for IntermediateRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.payload {
            Payload::Adjacency(adjacency) => write!(f, "{}\t{}\t{}", self.node, Tag::Adj, adjacency),
            Payload::Contributions(values) => {
                write!(f, "{}\t{}\t", self.node, Tag::Pr)?;
                write_values(f, values)
            }
            Payload::Joined {
                adjacency,
                contributions,
            } => {
                write!(f, "{}\t{}\t", self.node, adjacency)?;
                write_values(f, contributions)
            }
        }
    }
}

fn write_values(f: &mut Formatter<'_>, values: &[f64]) -> std::fmt::Result {
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            write!(f, "{LIST_SEPARATOR}")?;
        }
        write!(f, "{value}")?;
    }
    Ok(())
}
