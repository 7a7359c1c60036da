use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter, Result},
    num::NonZeroU64,
    str::FromStr,
};

use nom::{
    IResult,
    branch::alt,
    character::complete::{char, digit1},
    combinator::{all_consuming, map, map_opt, opt},
    multi::separated_list1,
    sequence::{pair, preceded},
};
use thiserror::Error;

use crate::repository::Uid;

/// One end of a range in a message set: either a concrete number or `*`,
/// the last message of the folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetValue {
    Number(NonZeroU64),
    Last,
}

impl SetValue {
    pub fn number(value: u64) -> Option<Self> {
        NonZeroU64::new(value).map(Self::Number)
    }
}

impl From<Uid> for SetValue {
    fn from(value: Uid) -> Self {
        Self::Number(value.into())
    }
}

impl Display for SetValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            SetValue::Number(n) => n.fmt(f),
            SetValue::Last => write!(f, "*"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceRange {
    start: SetValue,
    end: Option<SetValue>,
}

impl SequenceRange {
    pub fn single(value: SetValue) -> Self {
        Self {
            start: value,
            end: None,
        }
    }

    pub fn range(start: SetValue, end: SetValue) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    pub fn start(&self) -> SetValue {
        self.start
    }

    /// `None` means the range only names its start.
    pub fn end(&self) -> Option<SetValue> {
        self.end
    }
}

impl Display for SequenceRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        if let Some(to) = self.end {
            write!(f, "{}:{}", self.start, to)
        } else {
            write!(f, "{}", self.start)
        }
    }
}

/// Ordered list of ranges as sent by a mail client, e.g. `1:4,7,9:*`.
///
/// Ranges are kept in input order and are neither merged nor sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceSet {
    ranges: Vec<SequenceRange>,
}

impl SequenceSet {
    pub fn ranges(&self) -> &[SequenceRange] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

impl Display for SequenceSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        if let Some(string) =
            self.ranges
                .iter()
                .map(ToString::to_string)
                .reduce(|mut acc, range| {
                    acc.push(',');
                    acc + &range
                })
        {
            write!(f, "{string}")
        } else {
            write!(f, "")
        }
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("malformed message set {input:?}")]
pub struct ParseSetError {
    input: String,
}

fn number(input: &str) -> IResult<&str, NonZeroU64> {
    map_opt(digit1, |digits: &str| {
        digits.parse::<u64>().ok().and_then(NonZeroU64::new)
    })(input)
}

fn set_value(input: &str) -> IResult<&str, SetValue> {
    alt((
        map(char('*'), |_| SetValue::Last),
        map(number, SetValue::Number),
    ))(input)
}

fn sequence_range(input: &str) -> IResult<&str, SequenceRange> {
    map(
        pair(set_value, opt(preceded(char(':'), set_value))),
        |(start, end)| SequenceRange { start, end },
    )(input)
}

fn sequence_set(input: &str) -> IResult<&str, Vec<SequenceRange>> {
    separated_list1(char(','), sequence_range)(input)
}

impl FromStr for SequenceSet {
    type Err = ParseSetError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        all_consuming(sequence_set)(s)
            .map(|(_, ranges)| Self { ranges })
            .map_err(|_| ParseSetError {
                input: s.to_string(),
            })
    }
}

#[derive(Debug, Error, Default)]
#[error("message set would be empty")]
pub struct EmptySetError;

/// Collects uids and compacts them into the shortest list of ranges.
#[derive(Default, Debug, PartialEq, Clone)]
pub struct SequenceSetBuilder {
    uids: BTreeSet<Uid>,
}

impl SequenceSetBuilder {
    pub fn add(&mut self, uid: Uid) {
        self.uids.insert(uid);
    }

    pub fn build(self) -> std::result::Result<SequenceSet, EmptySetError> {
        let mut runs: Vec<(Uid, Uid)> = Vec::new();
        for uid in self.uids {
            match runs.last_mut() {
                Some((_, end)) if *end + 1 == uid => *end = uid,
                _ => runs.push((uid, uid)),
            }
        }
        if runs.is_empty() {
            return Err(EmptySetError);
        }

        let ranges = runs
            .into_iter()
            .map(|(start, end)| {
                if start == end {
                    SequenceRange::single(start.into())
                } else {
                    SequenceRange::range(start.into(), end.into())
                }
            })
            .collect();
        Ok(SequenceSet { ranges })
    }
}

impl FromIterator<Uid> for SequenceSetBuilder {
    fn from_iter<T: IntoIterator<Item = Uid>>(iter: T) -> Self {
        Self {
            uids: iter.into_iter().collect(),
        }
    }
}
