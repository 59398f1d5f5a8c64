//! Goal expressions: predicate calls over named objects
//!
//! Goals arrive already parsed, as nested lists in the shape the task
//! loader produces: `["open", "wooden_cabinet_1_top_region", 0.5]` for a
//! predicate call, `["and", [...], [...]]` for combinators.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{GoalError, Result};
use crate::object::ObjectRegistry;
use crate::predicate::{BoundAtom, EvalContext};

/// One argument of a predicate call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GoalArg {
    /// Literal numeric parameter (open amount, distance, ...)
    Number(f64),
    /// Name of an object or site
    Object(String),
}

impl GoalArg {
    /// Interpret a bare token: numbers become literals, anything else a name
    #[must_use]
    pub fn parse(token: &str) -> Self {
        token
            .parse::<f64>()
            .map_or_else(|_| Self::Object(token.to_string()), Self::Number)
    }

    /// The object name, if this is an object argument
    #[must_use]
    pub fn as_object(&self) -> Option<&str> {
        match self {
            Self::Object(name) => Some(name),
            Self::Number(_) => None,
        }
    }

    /// The literal, if this is a numeric argument
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Object(_) => None,
        }
    }
}

impl fmt::Display for GoalArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Object(name) => f.write_str(name),
        }
    }
}

/// A single predicate call
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Predicate name, matched case-insensitively
    pub predicate: String,
    /// Ordered arguments
    pub args: Vec<GoalArg>,
}

impl Atom {
    /// Create a predicate call
    pub fn new(predicate: impl Into<String>, args: impl IntoIterator<Item = GoalArg>) -> Self {
        Self {
            predicate: predicate.into(),
            args: args.into_iter().collect(),
        }
    }

    /// Names of the objects this call refers to, in argument order
    pub fn objects(&self) -> impl Iterator<Item = &str> {
        self.args.iter().filter_map(GoalArg::as_object)
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.predicate)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        f.write_str(")")
    }
}

/// Immutable goal tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNode", into = "RawNode")]
pub enum GoalExpression {
    /// Predicate call
    Atom(Atom),
    /// All children hold
    And(Vec<GoalExpression>),
    /// Any child holds
    Or(Vec<GoalExpression>),
    /// Child does not hold
    Not(Box<GoalExpression>),
}

impl GoalExpression {
    /// Shorthand for a predicate call
    pub fn atom(predicate: impl Into<String>, args: impl IntoIterator<Item = GoalArg>) -> Self {
        Self::Atom(Atom::new(predicate, args))
    }

    /// The first predicate call of the top-level conjunction
    #[must_use]
    pub fn first_atom(&self) -> Option<&Atom> {
        match self {
            Self::Atom(atom) => Some(atom),
            Self::And(children) => children.first().and_then(Self::first_atom),
            Self::Or(_) | Self::Not(_) => None,
        }
    }

    /// Every object name referenced anywhere in the tree
    #[must_use]
    pub fn object_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_objects(&mut names);
        names
    }

    fn collect_objects<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Self::Atom(atom) => {
                for name in atom.objects() {
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.collect_objects(names);
                }
            }
            Self::Not(child) => child.collect_objects(names),
        }
    }
}

impl fmt::Display for GoalExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_all = |f: &mut fmt::Formatter<'_>, op: &str, children: &[GoalExpression]| {
            write!(f, "({op}")?;
            for child in children {
                write!(f, " {child}")?;
            }
            f.write_str(")")
        };
        match self {
            Self::Atom(atom) => write!(f, "{atom}"),
            Self::And(children) => write_all(f, "And", children),
            Self::Or(children) => write_all(f, "Or", children),
            Self::Not(child) => write!(f, "(Not {child})"),
        }
    }
}

/// Wire form of a goal: nested lists of symbols and numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawNode {
    /// Numeric literal
    Number(f64),
    /// Predicate, combinator, or object name
    Symbol(String),
    /// A call
    List(Vec<RawNode>),
}

impl TryFrom<RawNode> for GoalExpression {
    type Error = GoalError;

    fn try_from(node: RawNode) -> Result<Self> {
        let items = match node {
            RawNode::List(items) => items,
            other => {
                return Err(GoalError::TypeMismatch(format!(
                    "goal must be a list, got {other:?}"
                )))
            }
        };
        let mut items = items.into_iter();
        let head = match items.next() {
            Some(RawNode::Symbol(head)) => head,
            other => {
                return Err(GoalError::TypeMismatch(format!(
                    "goal must start with a predicate name, got {other:?}"
                )))
            }
        };

        let children = |items: std::vec::IntoIter<RawNode>| {
            items.map(GoalExpression::try_from).collect::<Result<Vec<_>>>()
        };

        match head.to_ascii_lowercase().as_str() {
            "and" => Ok(Self::And(children(items)?)),
            "or" => Ok(Self::Or(children(items)?)),
            "not" => {
                let mut inner = children(items)?;
                if inner.len() != 1 {
                    return Err(GoalError::Arity {
                        predicate: head,
                        expected: "1".to_string(),
                        actual: inner.len(),
                    });
                }
                Ok(Self::Not(Box::new(inner.remove(0))))
            }
            _ => {
                let args = items
                    .map(|item| match item {
                        RawNode::Number(v) => Ok(GoalArg::Number(v)),
                        RawNode::Symbol(s) => Ok(GoalArg::parse(&s)),
                        RawNode::List(_) => Err(GoalError::TypeMismatch(format!(
                            "{head} takes objects and numbers, not nested calls"
                        ))),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self::Atom(Atom {
                    predicate: head,
                    args,
                }))
            }
        }
    }
}

impl From<GoalExpression> for RawNode {
    fn from(expr: GoalExpression) -> Self {
        let list = |op: &str, children: Vec<GoalExpression>| {
            let mut items = vec![RawNode::Symbol(op.to_string())];
            items.extend(children.into_iter().map(RawNode::from));
            RawNode::List(items)
        };
        match expr {
            GoalExpression::Atom(atom) => {
                let mut items = vec![RawNode::Symbol(atom.predicate)];
                items.extend(atom.args.into_iter().map(|arg| match arg {
                    GoalArg::Number(v) => RawNode::Number(v),
                    GoalArg::Object(name) => RawNode::Symbol(name),
                }));
                RawNode::List(items)
            }
            GoalExpression::And(children) => list("And", children),
            GoalExpression::Or(children) => list("Or", children),
            GoalExpression::Not(child) => list("Not", vec![*child]),
        }
    }
}

/// A goal tree whose calls have been checked against the predicate table
/// and bound to resolved objects
#[derive(Debug, Clone)]
pub enum BoundGoal {
    /// Predicate call
    Atom(BoundAtom),
    /// Conjunction
    And(Vec<BoundGoal>),
    /// Disjunction
    Or(Vec<BoundGoal>),
    /// Negation
    Not(Box<BoundGoal>),
}

impl BoundGoal {
    /// Validate every call in `expr`.
    ///
    /// Fails on unknown predicates, wrong arity, wrong argument kinds, and
    /// open/close calls on objects that are not articulated.
    pub fn bind(expr: &GoalExpression, registry: &ObjectRegistry) -> Result<Self> {
        let bind_all = |children: &[GoalExpression]| {
            children
                .iter()
                .map(|c| Self::bind(c, registry))
                .collect::<Result<Vec<_>>>()
        };
        Ok(match expr {
            GoalExpression::Atom(atom) => Self::Atom(BoundAtom::bind(atom, registry)?),
            GoalExpression::And(children) => Self::And(bind_all(children)?),
            GoalExpression::Or(children) => Self::Or(bind_all(children)?),
            GoalExpression::Not(child) => Self::Not(Box::new(Self::bind(child, registry)?)),
        })
    }

    /// Evaluate against the current step
    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<bool> {
        match self {
            Self::Atom(atom) => {
                let holds = atom.evaluate(ctx)?;
                trace!(goal = %atom, holds, "evaluated predicate");
                Ok(holds)
            }
            Self::And(children) => {
                for child in children {
                    if !child.evaluate(ctx)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Or(children) => {
                for child in children {
                    if child.evaluate(ctx)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Self::Not(child) => Ok(!child.evaluate(ctx)?),
        }
    }
}
