use std::ops::{Add, BitOr, Mul, Not};

use super::compound::{choice_rule, seq_rule};
use super::primitive::lit;
use super::{Kind, Rule};

/// Conversion into a [`Rule`]; plain strings become literal rules, so the
/// right-hand side of every operator accepts a `&str` directly.
pub trait IntoRule<T> {
    fn into_rule(self) -> Rule<T>;
}

impl<T> IntoRule<T> for Rule<T> {
    fn into_rule(self) -> Rule<T> {
        self
    }
}

impl<T> IntoRule<T> for &Rule<T> {
    fn into_rule(self) -> Rule<T> {
        self.clone()
    }
}

impl<T> IntoRule<T> for &str {
    fn into_rule(self) -> Rule<T> {
        lit(self)
    }
}

impl<T> IntoRule<T> for String {
    fn into_rule(self) -> Rule<T> {
        lit(self)
    }
}

impl<T> Rule<T> {
    /// A name or a reducer pins the grouping of a sequence or choice, so
    /// only plain ones flatten when extended.
    fn flattens(&self) -> bool {
        self.node.name.borrow().is_none() && self.node.reducer.borrow().is_none()
    }
}

impl<T, R: IntoRule<T>> Add<R> for Rule<T> {
    type Output = Rule<T>;

    /// Sequence: `a + b` matches `a` then `b`. An unnamed, reducer-free
    /// sequence on the left extends its element list instead of nesting.
    fn add(self, rhs: R) -> Rule<T> {
        let rhs = rhs.into_rule();
        if self.flattens() {
            if let Kind::Seq(items) = &self.node.kind {
                let mut items = items.borrow().clone();
                items.push(rhs);
                return seq_rule(items);
            }
        }
        seq_rule(vec![self, rhs])
    }
}

impl<T, R: IntoRule<T>> BitOr<R> for Rule<T> {
    type Output = Rule<T>;

    /// Ordered choice: `a | b` matches `a`, or `b` where `a` failed. An
    /// unnamed, reducer-free choice on the left extends its alternative
    /// list instead of nesting.
    fn bitor(self, rhs: R) -> Rule<T> {
        let rhs = rhs.into_rule();
        if self.flattens() {
            if let Kind::Choice(items) = &self.node.kind {
                let mut items = items.borrow().clone();
                items.push(rhs);
                return choice_rule(items);
            }
        }
        choice_rule(vec![self, rhs])
    }
}

impl<T, R: IntoRule<T>> Mul<R> for Rule<T> {
    type Output = Rule<T>;

    /// `a * sep`: zero or more `a`, separated by `sep`.
    fn mul(self, sep: R) -> Rule<T> {
        self.separated(0.., sep)
    }
}

impl<T> Not for Rule<T> {
    type Output = Rule<T>;

    /// `!a`: optional `a`.
    fn not(self) -> Rule<T> {
        self.opt()
    }
}
