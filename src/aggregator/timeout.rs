//! Group timeouts
//!
//! A group timeout is the deadline after which an incomplete group is force
//! completed. It is either fixed, computed by a closure over the group, or
//! given as a small conditional expression over the group size:
//!
//! ```text
//! 250                          always 250ms
//! null                         never
//! size() >= 2 ? 100 : null     100ms once two messages are held
//! ```
//!
//! The timeout is evaluated again on every message added to the group; the
//! previous deadline is always cancelled first.

use crate::aggregator::config::ConfigError;
use crate::store::MessageGroup;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use strum_macros::{Display, EnumString};

pub type TimeoutFn = Arc<dyn Fn(&MessageGroup) -> Option<Duration> + Send + Sync>;

#[derive(Clone)]
pub enum GroupTimeout {
    Fixed(Duration),
    Expression(TimeoutExpression),
    Computed(TimeoutFn),
}

impl fmt::Debug for GroupTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupTimeout::Fixed(delay) => f.debug_tuple("Fixed").field(delay).finish(),
            GroupTimeout::Expression(expression) => {
                f.debug_tuple("Expression").field(&expression.to_string()).finish()
            }
            GroupTimeout::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl GroupTimeout {
    pub fn expression(source: &str) -> Result<Self, ConfigError> {
        source.parse().map(GroupTimeout::Expression)
    }

    pub fn computed(
        timeout: impl Fn(&MessageGroup) -> Option<Duration> + Send + Sync + 'static,
    ) -> Self {
        GroupTimeout::Computed(Arc::new(timeout))
    }

    /// Deadline for `group` in its current state; `None` means no timeout
    pub fn timeout_for(&self, group: &MessageGroup) -> Option<Duration> {
        match self {
            GroupTimeout::Fixed(delay) => Some(*delay),
            GroupTimeout::Expression(expression) => expression.evaluate(group.size()),
            GroupTimeout::Computed(timeout) => timeout(group),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
enum Comparison {
    #[strum(serialize = ">=")]
    GreaterOrEqual,
    #[strum(serialize = "<=")]
    LessOrEqual,
    #[strum(serialize = ">")]
    Greater,
    #[strum(serialize = "<")]
    Less,
    #[strum(serialize = "==")]
    Equal,
    #[strum(serialize = "!=")]
    NotEqual,
}

impl Comparison {
    fn apply(self, left: u64, right: u64) -> bool {
        match self {
            Comparison::GreaterOrEqual => left >= right,
            Comparison::LessOrEqual => left <= right,
            Comparison::Greater => left > right,
            Comparison::Less => left < right,
            Comparison::Equal => left == right,
            Comparison::NotEqual => left != right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operand {
    Size,
    Literal(u64),
}

impl Operand {
    fn value(self, size: u64) -> u64 {
        match self {
            Operand::Size => size,
            Operand::Literal(value) => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Form {
    Constant(Option<u64>),
    Conditional {
        left: Operand,
        comparison: Comparison,
        right: Operand,
        then: Option<u64>,
        otherwise: Option<u64>,
    },
}

/// Parsed group timeout expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutExpression {
    source: String,
    form: Form,
}

const CONSTANT_PATTERN: &str = r"^\s*(\d+|null)\s*$";
const CONDITIONAL_PATTERN: &str = r"^\s*(size\(\)|\d+)\s*(>=|<=|==|!=|>|<)\s*(size\(\)|\d+)\s*\?\s*(\d+|null)\s*:\s*(\d+|null)\s*$";

impl TimeoutExpression {
    /// Timeout in milliseconds for a group holding `size` messages
    pub fn evaluate(&self, size: usize) -> Option<Duration> {
        let millis = match &self.form {
            Form::Constant(millis) => *millis,
            Form::Conditional {
                left,
                comparison,
                right,
                then,
                otherwise,
            } => {
                let size = size as u64;
                if comparison.apply(left.value(size), right.value(size)) {
                    *then
                } else {
                    *otherwise
                }
            }
        };
        millis.map(Duration::from_millis)
    }
}

impl fmt::Display for TimeoutExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for TimeoutExpression {
    type Err = ConfigError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        let unsupported =
            || ConfigError::invalid(format!("Unsupported group timeout expression '{}'", source));
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| ConfigError::invalid(format!("Invalid expression pattern: {}", e)))
        };

        if let Some(captures) = compile(CONSTANT_PATTERN)?.captures(source) {
            return Ok(Self {
                source: source.trim().to_string(),
                form: Form::Constant(parse_millis(&captures[1]).ok_or_else(unsupported)?),
            });
        }

        let captures = compile(CONDITIONAL_PATTERN)?
            .captures(source)
            .ok_or_else(unsupported)?;
        let form = Form::Conditional {
            left: parse_operand(&captures[1]).ok_or_else(unsupported)?,
            comparison: Comparison::from_str(&captures[2]).map_err(|_| unsupported())?,
            right: parse_operand(&captures[3]).ok_or_else(unsupported)?,
            then: parse_millis(&captures[4]).ok_or_else(unsupported)?,
            otherwise: parse_millis(&captures[5]).ok_or_else(unsupported)?,
        };

        Ok(Self {
            source: source.trim().to_string(),
            form,
        })
    }
}

/// `null` is `Some(None)`, a number is `Some(Some(ms))`, overflow is `None`
fn parse_millis(token: &str) -> Option<Option<u64>> {
    if token == "null" {
        Some(None)
    } else {
        token.parse().ok().map(Some)
    }
}

fn parse_operand(token: &str) -> Option<Operand> {
    if token == "size()" {
        Some(Operand::Size)
    } else {
        token.parse().ok().map(Operand::Literal)
    }
}
