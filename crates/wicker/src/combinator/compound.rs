use std::cell::RefCell;
use std::ops::{Range, RangeFrom, RangeFull, RangeInclusive, RangeTo, RangeToInclusive};

use super::{IntoRule, Kind, Rule};
use crate::error::ParseError;
use crate::state::ParseState;

impl<T> Rule<T> {
    /// Exactly `count` occurrences.
    pub fn times(self, count: usize) -> Rule<T> {
        self.repeat(count)
    }

    /// Greedy repetition within `bounds`: a plain count means exactly that
    /// many, range forms give a minimum and an optional maximum.
    ///
    /// ```rust
    /// use wicker::{lit, Rule};
    ///
    /// let rule: Rule = lit("ab").repeat(1..=2);
    /// let state = rule.parse("ababab").unwrap();
    /// assert_eq!(state.text(), "ab");
    /// ```
    pub fn repeat(self, bounds: impl Into<Bounds>) -> Rule<T> {
        repeat_rule(self, bounds.into(), None)
    }

    /// Like [`Rule::repeat`], with `sep` between occurrences: not before the
    /// first, not after the last.
    pub fn separated(self, bounds: impl Into<Bounds>, sep: impl IntoRule<T>) -> Rule<T> {
        repeat_rule(self, bounds.into(), Some(sep.into_rule()))
    }

    /// Zero or one occurrence. Also spelled `!rule`.
    pub fn opt(self) -> Rule<T> {
        self.repeat(0..=1)
    }

    /// Zero or more occurrences.
    pub fn many0(self) -> Rule<T> {
        self.repeat(0..)
    }
}

pub(crate) fn seq_rule<T>(items: Vec<Rule<T>>) -> Rule<T> {
    Rule::from_kind(Kind::Seq(RefCell::new(items)))
}

pub(crate) fn choice_rule<T>(items: Vec<Rule<T>>) -> Rule<T> {
    Rule::from_kind(Kind::Choice(RefCell::new(items)))
}

fn repeat_rule<T>(item: Rule<T>, bounds: Bounds, sep: Option<Rule<T>>) -> Rule<T> {
    if let Some(max) = bounds.max {
        debug_assert!(bounds.min <= max, "repeat bounds are inverted");
    }
    Rule::from_kind(Kind::Repeat {
        item: RefCell::new(item),
        min: bounds.min,
        max: bounds.max,
        sep: RefCell::new(sep),
    })
}

/// Occurrence bounds for [`Rule::repeat`]. `max = None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min: usize,
    pub max: Option<usize>,
}

impl From<usize> for Bounds {
    fn from(count: usize) -> Self {
        Bounds {
            min: count,
            max: Some(count),
        }
    }
}

impl From<Range<usize>> for Bounds {
    fn from(range: Range<usize>) -> Self {
        Bounds {
            min: range.start,
            max: Some(range.end.saturating_sub(1)),
        }
    }
}

impl From<RangeInclusive<usize>> for Bounds {
    fn from(range: RangeInclusive<usize>) -> Self {
        let (min, max) = range.into_inner();
        Bounds {
            min,
            max: Some(max),
        }
    }
}

impl From<RangeFrom<usize>> for Bounds {
    fn from(range: RangeFrom<usize>) -> Self {
        Bounds {
            min: range.start,
            max: None,
        }
    }
}

impl From<RangeFull> for Bounds {
    fn from(_: RangeFull) -> Self {
        Bounds { min: 0, max: None }
    }
}

impl From<RangeTo<usize>> for Bounds {
    fn from(range: RangeTo<usize>) -> Self {
        Bounds {
            min: 0,
            max: Some(range.end.saturating_sub(1)),
        }
    }
}

impl From<RangeToInclusive<usize>> for Bounds {
    fn from(range: RangeToInclusive<usize>) -> Self {
        Bounds {
            min: 0,
            max: Some(range.end),
        }
    }
}

/// Each element in declaration order. Every element after the first runs in
/// its own recursion frame, so recursion back into the head of the sequence
/// stays blocked while an independent sub-grammar in a later element may
/// recurse freely. A failing element aborts the whole sequence.
pub(crate) fn recognize_seq<T>(
    items: &[Rule<T>],
    state: &mut ParseState<'_, T>,
) -> Result<bool, ParseError> {
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            state.shift();
        }
        let outcome = item.parse_core(state);
        if index > 0 {
            state.unshift();
        }
        outcome?;
    }
    Ok(true)
}

/// First match wins. Compound alternatives run inside a trial checkpoint so
/// a partial match is undone before the next alternative; a cut left
/// recursion arrives here as an ordinary `ParseError` and just moves the
/// choice along.
pub(crate) fn recognize_choice<T>(
    alternatives: &[Rule<T>],
    state: &mut ParseState<'_, T>,
) -> Result<bool, ParseError> {
    for alternative in alternatives {
        if alternative.is_compound() {
            let trial = state.trial();
            match alternative.parse_core(state) {
                Ok(()) => {
                    state.commit(trial);
                    return Ok(true);
                }
                Err(err) => {
                    log::trace!("alternative failed: {err}");
                    state.rollback(trial);
                }
            }
        } else {
            match alternative.parse_core(state) {
                Ok(()) => return Ok(true),
                Err(err) => log::trace!("alternative failed: {err}"),
            }
        }
    }
    Ok(false)
}

/// The mandatory prefix runs bare: a failure there fails the whole repeat.
/// Optional occurrences past `min` are checkpointed whenever the attempt
/// can consume input before failing (a compound item, or any separator),
/// and commit greedily; once committed an occurrence is never re-tried.
pub(crate) fn recognize_repeat<T>(
    item: &Rule<T>,
    min: usize,
    max: Option<usize>,
    sep: Option<&Rule<T>>,
    state: &mut ParseState<'_, T>,
) -> Result<bool, ParseError> {
    let mut parsed = 0;
    while parsed < min {
        step(item, sep, parsed == 0, state)?;
        parsed += 1;
    }
    loop {
        if let Some(max) = max {
            if parsed >= max {
                break;
            }
        }
        let before = state.offset();
        if item.is_compound() || sep.is_some() {
            let trial = state.trial();
            match step(item, sep, parsed == 0, state) {
                Ok(()) => state.commit(trial),
                Err(_) => {
                    state.rollback(trial);
                    break;
                }
            }
        } else if step(item, sep, parsed == 0, state).is_err() {
            break;
        }
        parsed += 1;
        // An occurrence that consumed nothing would match forever.
        if state.offset() == before {
            break;
        }
    }
    Ok(true)
}

fn step<T>(
    item: &Rule<T>,
    sep: Option<&Rule<T>>,
    first: bool,
    state: &mut ParseState<'_, T>,
) -> Result<(), ParseError> {
    if !first {
        if let Some(sep) = sep {
            sep.parse_core(state)?;
        }
    }
    item.parse_core(state)
}

#[cfg(test)]
mod tests {
    use super::super::{defer, empty, lit, one_of, pattern};
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sequence_matches_in_order() {
        let rule: Rule = lit("foo") + "bar";

        let state = rule.parse("foobar").unwrap();
        assert_eq!(state.text(), "");
        assert_eq!(*state.tree(), ["foo", "bar"]);

        assert!(rule.parse("foo").is_err());
        assert!(rule.parse("bar").is_err());
    }

    #[test]
    fn sequence_skips_whitespace_between_tokens() {
        let rule: Rule = empty() + "foo" + "bar";
        let state = rule.parse("foo \n\tbar").unwrap();
        assert_eq!(state.text(), "");
        assert_eq!(*state.tree(), ["foo", "bar"]);
    }

    #[test]
    fn sequence_expects_its_head() {
        let rule: Rule = lit("foo") + "bar";
        assert_eq!(rule.expect(), ["foo"]);
    }

    #[test]
    fn choice_takes_the_first_match() {
        let rule: Rule = lit("foo") | "bar";

        let state = rule.parse("foo").unwrap();
        assert_eq!(*state.tree(), ["foo"]);

        let state = rule.parse("bar").unwrap();
        assert_eq!(*state.tree(), ["bar"]);

        assert!(rule.parse("baz").is_err());
    }

    #[test]
    fn choice_prefers_declaration_order_over_length() {
        let rule: Rule = lit("a") | "ab";
        let state = rule.parse("ab").unwrap();
        assert_eq!(*state.tree(), ["a"]);
        assert_eq!(state.text(), "b");
    }

    #[test]
    fn choice_expects_the_union() {
        let rule: Rule = lit("foo") | "bar";
        assert_eq!(rule.expect(), ["foo", "bar"]);
    }

    #[test]
    fn choice_restores_position_after_a_partial_match() {
        let rule: Rule = (lit("foo") + "bar") | (lit("foo") + "baz");
        let state = rule.parse("foo baz").unwrap();
        assert_eq!(state.text(), "");
        assert_eq!(*state.tree(), ["foo", "baz"]);
    }

    #[test]
    fn repeat_exact() {
        let rule: Rule = lit("foo").times(2);

        let state = rule.parse("foofoo").unwrap();
        assert_eq!(state.text(), "");
        assert_eq!(*state.tree(), ["foo", "foo"]);

        assert!(rule.parse("foo").is_err());
    }

    #[test]
    fn repeat_optional() {
        let rule: Rule = lit("foo").repeat(0..=1);

        let state = rule.parse("foo").unwrap();
        assert_eq!(state.text(), "");
        assert_eq!(*state.tree(), ["foo"]);

        let state = rule.parse("bar").unwrap();
        assert_eq!(state.text(), "bar");
        assert!(state.tree().is_empty());
    }

    #[test]
    fn repeat_with_max() {
        let rule: Rule = lit("foo").repeat(1..=2);

        let state = rule.parse("foo").unwrap();
        assert_eq!(state.text(), "");
        assert_eq!(*state.tree(), ["foo"]);

        let state = rule.parse("foobar").unwrap();
        assert_eq!(state.text(), "bar");
        assert_eq!(*state.tree(), ["foo"]);

        let state = rule.parse("foofoo").unwrap();
        assert_eq!(state.text(), "");
        assert_eq!(*state.tree(), ["foo", "foo"]);

        let state = rule.parse("foofoofoo").unwrap();
        assert_eq!(state.text(), "foo");
        assert_eq!(*state.tree(), ["foo", "foo"]);

        assert!(rule.parse("baz").is_err());
        assert!(rule.parse("").is_err());
    }

    #[test]
    fn repeat_unbounded() {
        let rule: Rule = lit("foo").many0();

        let state = rule.parse("foofoofoo").unwrap();
        assert_eq!(state.text(), "");
        assert_eq!(*state.tree(), ["foo", "foo", "foo"]);

        let state = rule.parse("foofoobarfoo").unwrap();
        assert_eq!(state.text(), "barfoo");
        assert_eq!(*state.tree(), ["foo", "foo"]);
    }

    #[test]
    fn repeat_with_separator() {
        let rule: Rule = lit("foo").separated(0.., ",");

        let state = rule.parse("foo, foo, foo!").unwrap();
        assert_eq!(state.text(), "!");
        assert_eq!(*state.tree(), ["foo", ",", "foo", ",", "foo"]);

        let state = rule.parse("bar").unwrap();
        assert!(state.tree().is_empty());
    }

    #[test]
    fn separator_is_rolled_back_with_the_occurrence() {
        let rule: Rule = lit("foo").separated(0.., ",");
        let state = rule.parse("foo, bar").unwrap();
        assert_eq!(state.text(), ", bar");
        assert_eq!(*state.tree(), ["foo"]);
    }

    #[test]
    fn repeat_expects_its_item() {
        let rule: Rule = lit("foo").repeat(0..=1);
        assert_eq!(rule.expect(), ["foo"]);
    }

    #[test]
    fn empty_match_cannot_repeat_forever() {
        let rule: Rule = pattern("x?").many0();
        let state = rule.parse("y").unwrap();
        assert_eq!(state.text(), "y");
    }

    #[test]
    fn greedy_commit_does_not_retry() {
        // The inner repeat greedily takes both "a"s; the trailing "a" of the
        // sequence then fails, and the committed occurrence is not given
        // back.
        let rule: Rule = lit("a").many0() + "b";
        assert!(rule.parse("aab").is_ok());
        let rule: Rule = lit("a").many0() + "a";
        assert!(rule.parse("aa").is_err());
    }

    #[test]
    fn mandatory_prefix_failure_propagates() {
        let rule: Rule = (lit("foo") | "bar").separated(2..=3, one_of(",;"));
        let err = rule.parse("foo,").unwrap_err();
        assert!(err.is_eof());

        let state = rule.parse("foo;bar,foo,foo").unwrap();
        assert_eq!(state.text(), ",foo");
        assert_eq!(*state.tree(), ["foo", ";", "bar", ",", "foo"]);
    }

    #[test]
    fn bounds_conversions() {
        assert_eq!(Bounds::from(3), Bounds { min: 3, max: Some(3) });
        assert_eq!(Bounds::from(1..4), Bounds { min: 1, max: Some(3) });
        assert_eq!(Bounds::from(1..=4), Bounds { min: 1, max: Some(4) });
        assert_eq!(Bounds::from(2..), Bounds { min: 2, max: None });
        assert_eq!(Bounds::from(..), Bounds { min: 0, max: None });
        assert_eq!(Bounds::from(..3), Bounds { min: 0, max: Some(2) });
        assert_eq!(Bounds::from(..=3), Bounds { min: 0, max: Some(3) });
    }

    #[test]
    fn deferred_alternative_is_checkpointed() {
        // The deferred rule forwards to a sequence that consumes "foo"
        // before failing; the next alternative must still see "foobar".
        let inner: Rule = defer();
        inner.fill(lit("foo") + "baz");
        let rule = inner | (lit("foo") + "bar");
        let state = rule.parse("foobar").unwrap();
        assert_eq!(*state.tree(), ["foo", "bar"]);
    }
}
