//! Path queries over document trees
//!
//! A path query addresses zero, one or many elements relative to a context
//! node. The grammar is a small XPath-like subset:
//!
//! | Syntax | Meaning | Example |
//! |--------|---------|---------|
//! | `name` | Child elements named `name` | `ITEM` |
//! | `*` | Any child element | `*` |
//! | `.` / `..` | Context node / parent | `../OWNER` |
//! | `name[n]` | n-th (1-based) matching child | `ITEM[2]` |
//! | `name[@a='v']` | Matching children with attribute `a` equal to `v` | `ITEM[@code='A']` |
//! | `//name` | Descendants named `name` | `.//OWNER` |
//! | `/` prefix | Start from the document root | `/ROOT/ITEM` |
//! | (empty) | The context node itself | `` |
//!
//! A leading `:{label}` selects a context label; splitting it off is the
//! binding table's job, see [`split_context_label`].
//!
//! ## Creation
//!
//! In create mode, a step that matches nothing is synthesized under the
//! single current context node. `name`, `name[n]` (padded with new siblings
//! up to position n) and `name[@a='v']` are creatable; every other step fails
//! with [`Error::PathNotCreatable`]. Because creation only happens when a
//! step matches nothing, re-running a creating query finds the nodes created
//! the first time and creates nothing more.

use crate::error::{Error, Result};
use crate::tree::DocumentTree;
use crate::types::NodeId;
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for path parsing
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathParseError {
    /// Empty step in path
    #[error("empty step in path at position {0}")]
    EmptyStep(usize),
    /// Unclosed predicate bracket
    #[error("unclosed bracket starting at position {0}")]
    UnclosedBracket(usize),
    /// Unclosed `:{label}` prefix
    #[error("unclosed context label starting at position {0}")]
    UnclosedLabel(usize),
    /// Invalid position predicate
    #[error("invalid position at position {0}: {1}")]
    InvalidPosition(usize, String),
    /// Unsupported predicate
    #[error("invalid predicate at position {0}: {1}")]
    InvalidPredicate(usize, String),
    /// Unexpected character
    #[error("unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),
}

/// Node test of a step
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeTest {
    /// Elements with this name
    Name(String),
    /// Any element
    Any,
}

impl NodeTest {
    fn matches(&self, name: &str) -> bool {
        match self {
            NodeTest::Name(n) => n == name,
            NodeTest::Any => true,
        }
    }
}

/// Step predicate
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Predicate {
    /// 1-based position among the step's matches
    Position(usize),
    /// Attribute equality
    AttrEquals(String, String),
}

/// One step of a path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Step {
    /// `.`
    SelfNode,
    /// `..`
    Parent,
    /// `name`, `*`, with optional predicate
    Child {
        /// Node test
        test: NodeTest,
        /// Optional predicate
        predicate: Option<Predicate>,
    },
    /// `//name`, with optional predicate
    Descendant {
        /// Node test
        test: NodeTest,
        /// Optional predicate
        predicate: Option<Predicate>,
    },
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (prefix, test, predicate) = match self {
            Step::SelfNode => return write!(f, "."),
            Step::Parent => return write!(f, ".."),
            Step::Child { test, predicate } => ("", test, predicate),
            Step::Descendant { test, predicate } => ("/", test, predicate),
        };
        write!(f, "{}", prefix)?;
        match test {
            NodeTest::Name(n) => write!(f, "{}", n)?,
            NodeTest::Any => write!(f, "*")?,
        }
        match predicate {
            Some(Predicate::Position(p)) => write!(f, "[{}]", p),
            Some(Predicate::AttrEquals(a, v)) => write!(f, "[@{}='{}']", a, v),
            None => Ok(()),
        }
    }
}

/// A parsed path query (without context label)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct NodePath {
    absolute: bool,
    steps: Vec<Step>,
}

impl NodePath {
    /// The empty path, which resolves to the context node
    pub fn context() -> Self {
        NodePath::default()
    }

    /// Whether the path starts at the document root
    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// Steps in order
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Name characters after the first; ':' admits namespace prefixes
fn is_name_char(c: char) -> bool {
    is_name_start(c) || c == '-' || c == ':'
}

impl FromStr for NodePath {
    type Err = PathParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let chars: Vec<char> = s.trim().chars().collect();
        let n = chars.len();
        let mut i = 0;
        let mut absolute = false;
        let mut steps = Vec::new();
        let mut first = true;

        while i < n {
            let mut descendant = false;
            if chars[i] == '/' {
                if first {
                    absolute = true;
                }
                i += 1;
                if i < n && chars[i] == '/' {
                    descendant = true;
                    i += 1;
                }
                if i >= n {
                    if first && !descendant {
                        // "/" alone: the root element
                        break;
                    }
                    return Err(PathParseError::EmptyStep(i));
                }
            } else if !first {
                return Err(PathParseError::UnexpectedChar(chars[i], i));
            }
            first = false;

            if chars[i] == '.' {
                if descendant {
                    return Err(PathParseError::UnexpectedChar('.', i));
                }
                if i + 1 < n && chars[i + 1] == '.' {
                    steps.push(Step::Parent);
                    i += 2;
                } else {
                    steps.push(Step::SelfNode);
                    i += 1;
                }
                continue;
            }

            let test = if chars[i] == '*' {
                i += 1;
                NodeTest::Any
            } else if is_name_start(chars[i]) {
                let start = i;
                while i < n && is_name_char(chars[i]) {
                    i += 1;
                }
                NodeTest::Name(chars[start..i].iter().collect())
            } else if chars[i] == '/' {
                return Err(PathParseError::EmptyStep(i));
            } else {
                return Err(PathParseError::UnexpectedChar(chars[i], i));
            };

            let mut predicate = None;
            if i < n && chars[i] == '[' {
                let start = i;
                i += 1;
                let body_start = i;
                while i < n && chars[i] != ']' {
                    i += 1;
                }
                if i >= n {
                    return Err(PathParseError::UnclosedBracket(start));
                }
                let body: String = chars[body_start..i].iter().collect();
                i += 1;
                predicate = Some(parse_predicate(body_start, body.trim())?);
            }

            steps.push(if descendant {
                Step::Descendant { test, predicate }
            } else {
                Step::Child { test, predicate }
            });
        }

        Ok(NodePath { absolute, steps })
    }
}

fn parse_predicate(pos: usize, body: &str) -> std::result::Result<Predicate, PathParseError> {
    if let Some(rest) = body.strip_prefix('@') {
        let (attr, value) = rest
            .split_once('=')
            .ok_or_else(|| PathParseError::InvalidPredicate(pos, body.to_string()))?;
        let attr = attr.trim();
        let value = value.trim();
        let quoted = value.len() >= 2
            && ((value.starts_with('\'') && value.ends_with('\''))
                || (value.starts_with('"') && value.ends_with('"')));
        let valid_attr = attr.chars().next().map_or(false, is_name_start)
            && attr.chars().all(is_name_char);
        if !valid_attr || !quoted {
            return Err(PathParseError::InvalidPredicate(pos, body.to_string()));
        }
        return Ok(Predicate::AttrEquals(
            attr.to_string(),
            value[1..value.len() - 1].to_string(),
        ));
    }
    match body.parse::<usize>() {
        Ok(p) if p >= 1 => Ok(Predicate::Position(p)),
        _ => Err(PathParseError::InvalidPosition(pos, body.to_string())),
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.absolute {
            write!(f, "/")?;
        }
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{}", step)?;
        }
        Ok(())
    }
}

/// Split a leading `:{label}` off a query
///
/// Returns the label (if any) and the remainder, rewritten so that it is
/// relative to the label's node: `:{theme}/A` yields `("theme", "A")` and
/// `:{theme}//A` yields `("theme", ".//A")`.
pub fn split_context_label(query: &str) -> Result<(Option<&str>, Cow<'_, str>)> {
    let trimmed = query.trim_start();
    let Some(rest) = trimmed.strip_prefix(":{") else {
        return Ok((None, Cow::Borrowed(query)));
    };
    let close = rest.find('}').ok_or_else(|| Error::PathSyntax {
        path: query.to_string(),
        source: PathParseError::UnclosedLabel(0),
    })?;
    let label = rest[..close].trim();
    let remainder = &rest[close + 1..];
    let remainder = if remainder.starts_with("//") {
        Cow::Owned(format!(".{}", remainder))
    } else {
        Cow::Borrowed(remainder.strip_prefix('/').unwrap_or(remainder))
    };
    Ok((Some(label), remainder))
}

/// Evaluates path queries against a tree
///
/// The binding table treats this as an opaque, swappable dependency.
pub trait PathEvaluator: Send + Sync {
    /// Nodes matched by `query` from `context`, in document order
    fn select(&self, tree: &DocumentTree, context: NodeId, query: &str) -> Result<Vec<NodeId>>;

    /// As [`PathEvaluator::select`], synthesizing missing steps
    fn select_or_create(
        &self,
        tree: &mut DocumentTree,
        context: NodeId,
        query: &str,
    ) -> Result<Vec<NodeId>>;
}

/// Evaluator for the grammar described in the module docs
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPathEvaluator;

impl DefaultPathEvaluator {
    fn parse(query: &str) -> Result<NodePath> {
        query.parse().map_err(|source| Error::PathSyntax {
            path: query.to_string(),
            source,
        })
    }

    fn start(tree: &DocumentTree, context: NodeId, path: &NodePath) -> Result<Vec<NodeId>> {
        if path.absolute {
            return Ok(vec![tree.root()]);
        }
        if !tree.contains(context) {
            return Err(Error::NodeNotFound {
                document: tree.id().to_string(),
                node: context.to_string(),
            });
        }
        Ok(vec![context])
    }

    /// Candidates of one step from one context node
    ///
    /// `from_document` marks the first step of an absolute path, whose
    /// implicit context is the document itself (the root is its only child).
    fn step_from(
        tree: &DocumentTree,
        ctx: NodeId,
        step: &Step,
        from_document: bool,
    ) -> Result<Vec<NodeId>> {
        let (candidates, test, predicate) = match step {
            Step::SelfNode => return Ok(vec![ctx]),
            Step::Parent => return Ok(tree.parent(ctx)?.into_iter().collect()),
            Step::Child { test, predicate } => {
                let candidates = if from_document {
                    vec![tree.root()]
                } else {
                    tree.children(ctx)?.to_vec()
                };
                (candidates, test, predicate)
            }
            Step::Descendant { test, predicate } => {
                let mut candidates = Vec::new();
                if from_document {
                    candidates.push(tree.root());
                }
                candidates.extend(tree.descendants(ctx)?);
                (candidates, test, predicate)
            }
        };

        let mut matched = Vec::new();
        for c in candidates {
            if test.matches(tree.name(c)?) {
                matched.push(c);
            }
        }
        match predicate {
            None => Ok(matched),
            Some(Predicate::Position(p)) => Ok(matched.get(p - 1).copied().into_iter().collect()),
            Some(Predicate::AttrEquals(a, v)) => {
                let mut out = Vec::new();
                for c in matched {
                    if tree.attr(c, a)? == Some(v.as_str()) {
                        out.push(c);
                    }
                }
                Ok(out)
            }
        }
    }

    fn apply_step(
        tree: &DocumentTree,
        current: &[NodeId],
        step: &Step,
        from_document: bool,
    ) -> Result<Vec<NodeId>> {
        let mut seen = HashSet::new();
        let mut next = Vec::new();
        for ctx in current {
            for node in Self::step_from(tree, *ctx, step, from_document)? {
                if seen.insert(node) {
                    next.push(node);
                }
            }
        }
        Ok(next)
    }

    fn create_step(
        tree: &mut DocumentTree,
        ctx: NodeId,
        step: &Step,
        from_document: bool,
        query: &str,
    ) -> Result<Vec<NodeId>> {
        let not_creatable = || Error::PathNotCreatable {
            path: query.to_string(),
            step: step.to_string(),
        };
        if from_document {
            return Err(not_creatable());
        }
        let (name, predicate) = match step {
            Step::Child {
                test: NodeTest::Name(name),
                predicate,
            } => (name, predicate),
            _ => return Err(not_creatable()),
        };
        match predicate {
            None => Ok(vec![tree.append_child(ctx, name.clone())?]),
            Some(Predicate::Position(p)) => {
                let existing = tree.child_elements(ctx, name)?.len();
                let mut last = None;
                for _ in existing..*p {
                    last = Some(tree.append_child(ctx, name.clone())?);
                }
                Ok(last.into_iter().collect())
            }
            Some(Predicate::AttrEquals(a, v)) => {
                let id = tree.append_child(ctx, name.clone())?;
                tree.set_attr(id, a.clone(), v.clone())?;
                Ok(vec![id])
            }
        }
    }
}

impl PathEvaluator for DefaultPathEvaluator {
    fn select(&self, tree: &DocumentTree, context: NodeId, query: &str) -> Result<Vec<NodeId>> {
        let path = Self::parse(query)?;
        let mut current = Self::start(tree, context, &path)?;
        for (idx, step) in path.steps.iter().enumerate() {
            current = Self::apply_step(tree, &current, step, path.absolute && idx == 0)?;
            if current.is_empty() {
                break;
            }
        }
        Ok(current)
    }

    fn select_or_create(
        &self,
        tree: &mut DocumentTree,
        context: NodeId,
        query: &str,
    ) -> Result<Vec<NodeId>> {
        let path = Self::parse(query)?;
        let mut current = Self::start(tree, context, &path)?;
        for (idx, step) in path.steps.iter().enumerate() {
            let from_document = path.absolute && idx == 0;
            let next = Self::apply_step(tree, &current, step, from_document)?;
            if !next.is_empty() {
                current = next;
                continue;
            }
            if current.len() > 1 {
                return Err(Error::TooMany {
                    path: query.to_string(),
                    count: current.len(),
                    expected: 1,
                });
            }
            current = Self::create_step(tree, current[0], step, from_document, query)?;
        }
        Ok(current)
    }
}
