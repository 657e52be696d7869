use std::cell::RefCell;

use regex::{Regex, RegexBuilder};

use super::{IntoRule, Kind, Rule};
use crate::state::ParseState;

/// An exact-string rule.
pub fn lit<T>(text: impl Into<String>) -> Rule<T> {
    Rule::from_kind(Kind::Lit(text.into()))
}

/// A rule matching any one member of a set of strings, tried in declaration
/// order. Accepts a `&str` (one alternative per character) or a list of
/// strings:
///
/// ```rust
/// use wicker::{one_of, Rule};
///
/// let sign: Rule = one_of("+-");
/// let keyword: Rule = one_of(["let", "if"]);
/// # let _ = (sign, keyword);
/// ```
pub fn one_of<T>(members: impl IntoSet) -> Rule<T> {
    Rule::from_kind(Kind::Set(members.into_set()))
}

/// A rule matching a regular expression anchored at the cursor.
///
/// Panics when the pattern does not compile; a grammar-construction bug,
/// like an unfilled deferred rule.
pub fn pattern<T>(raw: impl Into<String>) -> Rule<T> {
    build_pattern(raw.into(), false)
}

/// Case-insensitive [`pattern`].
pub fn pattern_ci<T>(raw: impl Into<String>) -> Rule<T> {
    build_pattern(raw.into(), true)
}

fn build_pattern<T>(raw: String, insensitive: bool) -> Rule<T> {
    let regex = RegexBuilder::new(&format!("^(?:{raw})"))
        .case_insensitive(insensitive)
        .build()
        .unwrap_or_else(|err| panic!("invalid pattern {raw:?}: {err}"));
    Rule::from_kind(Kind::Pattern {
        raw,
        insensitive,
        regex,
    })
}

/// A forward-declared rule; install its target later with [`Rule::fill`].
/// This is the one way to close a cycle, i.e. to express a recursive or
/// mutually-recursive grammar.
pub fn defer<T>() -> Rule<T> {
    Rule::from_kind(Kind::Defer(RefCell::new(None)))
}

/// Wrap a rule in its own identity: to give one occurrence of a shared
/// sub-expression its own name or reducer, or to stop sequence flattening.
pub fn group<T>(inner: impl IntoRule<T>) -> Rule<T> {
    Rule::from_kind(Kind::Group(RefCell::new(inner.into_rule())))
}

/// The empty rule: matches nothing and succeeds. As the head of a `+` chain
/// it starts a sequence from plain strings and flattens away:
/// `empty() + "let" + name`.
pub fn empty<T>() -> Rule<T> {
    Rule::from_kind(Kind::Seq(RefCell::new(Vec::new())))
}

pub(crate) fn match_lit<T>(text: &str, state: &mut ParseState<'_, T>) -> bool {
    log::trace!("literal {:?} at {}:{}", text, state.line(), state.column());
    if state.text().starts_with(text) {
        state.consume(text.len());
        true
    } else {
        false
    }
}

pub(crate) fn match_set<T>(members: &[String], state: &mut ParseState<'_, T>) -> bool {
    for member in members {
        if state.text().starts_with(member.as_str()) {
            state.consume(member.len());
            return true;
        }
    }
    false
}

pub(crate) fn match_pattern<T>(regex: &Regex, state: &mut ParseState<'_, T>) -> bool {
    match regex.find(state.text()) {
        Some(found) => {
            state.consume(found.end());
            true
        }
        None => false,
    }
}

/// Conversion into the member list of a string-set rule.
pub trait IntoSet {
    fn into_set(self) -> Vec<String>;
}

impl IntoSet for &str {
    fn into_set(self) -> Vec<String> {
        self.chars().map(String::from).collect()
    }
}

impl<const N: usize> IntoSet for [&str; N] {
    fn into_set(self) -> Vec<String> {
        self.iter().map(|member| member.to_string()).collect()
    }
}

impl IntoSet for &[&str] {
    fn into_set(self) -> Vec<String> {
        self.iter().map(|member| member.to_string()).collect()
    }
}

impl IntoSet for Vec<&str> {
    fn into_set(self) -> Vec<String> {
        self.into_iter().map(String::from).collect()
    }
}

impl IntoSet for Vec<String> {
    fn into_set(self) -> Vec<String> {
        self
    }
}
