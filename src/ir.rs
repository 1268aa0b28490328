//! Parse tree for a pattern.

use crate::types::{CaptureGroupID, CharRange, CharacterClassType};

#[derive(Debug, Copy, Clone)]
pub enum AnchorType {
    StartOfLine, // ^
    EndOfLine,   // $
}

/// The lookaround kinds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LookAround {
    LookAhead,
    NegatedLookAhead,
    LookBehind,
    NegatedLookBehind,
}

impl LookAround {
    pub fn is_behind(self) -> bool {
        matches!(self, LookAround::LookBehind | LookAround::NegatedLookBehind)
    }

    pub fn is_negated(self) -> bool {
        matches!(
            self,
            LookAround::NegatedLookAhead | LookAround::NegatedLookBehind
        )
    }
}

/// A quantifier.
#[derive(Debug, Copy, Clone)]
pub struct Quantifier {
    /// Minimum number of iterations, inclusive.
    pub min: usize,

    /// Maximum number of iterations, inclusive; None means unbounded.
    pub max: Option<usize>,

    /// Whether the loop prefers more iterations.
    pub greedy: bool,

    /// Whether the loop refuses to give back consumed input.
    pub possessive: bool,
}

/// One element of a bracket expression.
#[derive(Debug, Copy, Clone)]
pub enum ClassItem {
    Char(u32),
    Range(CharRange),
    Class {
        class_type: CharacterClassType,
        positive: bool,
    },
}

/// The contents of a bracket expression.
#[derive(Debug, Clone)]
pub struct BracketContents {
    pub invert: bool,
    pub items: Vec<ClassItem>,
}

/// The node types of our IR.
#[derive(Debug)]
pub enum Node {
    /// Matches the empty string.
    Empty,

    /// Match a literal character.
    Char(u32),

    /// Match any character; `.` (DotAll is applied at emit time).
    AnyChar,

    /// A bracket expression.
    Bracket(BracketContents),

    /// Match an anchor like ^ or $.
    Anchor(AnchorType),

    /// Word boundary (\b or \B).
    WordBoundary { invert: bool },

    /// Match the catenation of multiple nodes.
    Cat(NodeList),

    /// Match an alternation like a|b.
    Alt(NodeList),

    /// A loop like /.*/ or /x{3,5}?/.
    Loop { loopee: Box<Node>, quant: Quantifier },

    /// A capturing group.
    CaptureGroup(Box<Node>, CaptureGroupID),

    /// A named capturing group.
    NamedCaptureGroup(Box<Node>, CaptureGroupID, String),

    /// A non-capturing group.
    Group(Box<Node>),

    /// A backreference.
    BackRef(CaptureGroupID),

    /// A lookaround assertion like (?=..) or (?<!..).
    LookaroundAssertion {
        kind: LookAround,
        contents: Box<Node>,
    },
}

pub type NodeList = Vec<Node>;

impl Node {
    /// The smallest number of code units any match of this node consumes.
    pub fn match_length_minimum(&self) -> usize {
        match self {
            Node::Empty | Node::Anchor(..) | Node::WordBoundary { .. } => 0,
            Node::Char(..) | Node::AnyChar | Node::Bracket(..) => 1,
            Node::Cat(nodes) => nodes.iter().map(Node::match_length_minimum).sum(),
            Node::Alt(nodes) => nodes
                .iter()
                .map(Node::match_length_minimum)
                .min()
                .unwrap_or(0),
            Node::Loop { loopee, quant } => loopee.match_length_minimum() * quant.min,
            Node::CaptureGroup(node, ..)
            | Node::NamedCaptureGroup(node, ..)
            | Node::Group(node) => node.match_length_minimum(),
            // A backreference to an unmatched group consumes nothing.
            Node::BackRef(..) => 0,
            Node::LookaroundAssertion { .. } => 0,
        }
    }

    /// The largest number of code units any match of this node consumes, or
    /// None if unbounded. Backreference lengths are unknowable, so they are
    /// unbounded here; this is only used to reject variable-length
    /// lookbehinds.
    pub fn match_length_maximum(&self) -> Option<usize> {
        match self {
            Node::Empty | Node::Anchor(..) | Node::WordBoundary { .. } => Some(0),
            Node::Char(..) | Node::AnyChar | Node::Bracket(..) => Some(1),
            Node::Cat(nodes) => {
                let mut total = 0usize;
                for node in nodes {
                    total = total.checked_add(node.match_length_maximum()?)?;
                }
                Some(total)
            }
            Node::Alt(nodes) => {
                let mut max = 0usize;
                for node in nodes {
                    max = max.max(node.match_length_maximum()?);
                }
                Some(max)
            }
            Node::Loop { loopee, quant } => {
                let body = loopee.match_length_maximum()?;
                let max_iters = quant.max?;
                body.checked_mul(max_iters)
            }
            Node::CaptureGroup(node, ..)
            | Node::NamedCaptureGroup(node, ..)
            | Node::Group(node) => node.match_length_maximum(),
            Node::BackRef(..) => None,
            Node::LookaroundAssertion { .. } => Some(0),
        }
    }

    /// Collect the IDs of all capture groups contained in this node.
    pub fn collect_capture_groups(&self, out: &mut Vec<CaptureGroupID>) {
        match self {
            Node::Cat(nodes) | Node::Alt(nodes) => {
                for node in nodes {
                    node.collect_capture_groups(out);
                }
            }
            Node::Loop { loopee, .. } => loopee.collect_capture_groups(out),
            Node::CaptureGroup(node, id) => {
                out.push(*id);
                node.collect_capture_groups(out);
            }
            Node::NamedCaptureGroup(node, id, _) => {
                out.push(*id);
                node.collect_capture_groups(out);
            }
            Node::Group(node) => node.collect_capture_groups(out),
            Node::LookaroundAssertion { contents, .. } => contents.collect_capture_groups(out),
            _ => {}
        }
    }

    /// \return whether this is an Empty node.
    pub fn is_empty_node(&self) -> bool {
        matches!(self, Node::Empty)
    }
}

/// Helper to build a catenation, collapsing the trivial cases.
pub fn make_cat(mut nodes: NodeList) -> Node {
    match nodes.len() {
        0 => Node::Empty,
        1 => nodes.pop().unwrap_or(Node::Empty),
        _ => Node::Cat(nodes),
    }
}

/// Helper to build an alternation, collapsing the trivial case.
pub fn make_alt(mut nodes: NodeList) -> Node {
    match nodes.len() {
        0 => Node::Empty,
        1 => nodes.pop().unwrap_or(Node::Empty),
        _ => Node::Alt(nodes),
    }
}
