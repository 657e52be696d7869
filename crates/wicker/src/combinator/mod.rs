pub(crate) mod compound;
pub(crate) mod expect;
mod ops;
mod primitive;

pub use compound::Bounds;
pub use ops::IntoRule;
pub use primitive::{defer, empty, group, lit, one_of, pattern, pattern_ci, IntoSet};

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use crate::error::{ErrorKind, ParseError};
use crate::state::{NodeId, ParseState, Whitespace};
use expect::ExpectGuard;

/// A reducer folds the leaves matched by one rule into a single value.
pub(crate) type Reducer<T> = Rc<dyn Fn(Vec<Leaf<T>>) -> T>;

/// One entry of a parse tree: matched input text, or a value produced by a
/// rule's reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum Leaf<T> {
    Text(String),
    Value(T),
}

impl<T> Leaf<T> {
    /// The matched text, when this leaf is raw input.
    pub fn text(&self) -> Option<&str> {
        match self {
            Leaf::Text(text) => Some(text),
            Leaf::Value(_) => None,
        }
    }

    /// The reduced value, when this leaf was produced by a reducer.
    pub fn value(&self) -> Option<&T> {
        match self {
            Leaf::Text(_) => None,
            Leaf::Value(value) => Some(value),
        }
    }
}

impl<T> PartialEq<&str> for Leaf<T> {
    fn eq(&self, other: &&str) -> bool {
        matches!(self, Leaf::Text(text) if text == other)
    }
}

/// A grammar rule: one node of a combinator graph.
///
/// Rules are cheap reference-counted handles; cloning shares the node, which
/// is how one rule appears in several places of a grammar. Sharing is also
/// visible to mutators: naming or reducing a rule affects every occurrence.
///
/// Rules are composed with operators — `a + b` (sequence), `a | b` (ordered
/// choice), `a * sep` (zero-or-more separated by `sep`), `!a` (optional) —
/// and the repetition methods. Plain strings convert to literal rules on the
/// right-hand side of every operator. See the crate docs for a worked
/// example.
pub struct Rule<T = ()> {
    pub(crate) node: Rc<Node<T>>,
}

impl<T> Clone for Rule<T> {
    fn clone(&self) -> Self {
        Rule {
            node: Rc::clone(&self.node),
        }
    }
}

pub(crate) struct Node<T> {
    pub(crate) kind: Kind<T>,
    pub(crate) name: RefCell<Option<String>>,
    pub(crate) reducer: RefCell<Option<Reducer<T>>>,
    pub(crate) whitespace: RefCell<Option<Whitespace>>,
}

pub(crate) enum Kind<T> {
    /// An exact string.
    Lit(String),
    /// Any one of a set of strings, tried in declaration order.
    Set(Vec<String>),
    /// A regular expression anchored at the cursor.
    Pattern {
        raw: String,
        insensitive: bool,
        regex: regex::Regex,
    },
    /// Each element in order.
    Seq(RefCell<Vec<Rule<T>>>),
    /// The first alternative to match wins.
    Choice(RefCell<Vec<Rule<T>>>),
    /// `min..=max` occurrences of `item`, `max = None` meaning unbounded,
    /// optionally interleaved with `sep`.
    Repeat {
        item: RefCell<Rule<T>>,
        min: usize,
        max: Option<usize>,
        sep: RefCell<Option<Rule<T>>>,
    },
    /// A transparent wrapper giving a sub-expression its own identity.
    Group(RefCell<Rule<T>>),
    /// A forward declaration, filled once with the real rule.
    Defer(RefCell<Option<Rule<T>>>),
}

impl<T> Rule<T> {
    pub(crate) fn from_kind(kind: Kind<T>) -> Self {
        Rule {
            node: Rc::new(Node {
                kind,
                name: RefCell::new(None),
                reducer: RefCell::new(None),
                whitespace: RefCell::new(None),
            }),
        }
    }

    pub(crate) fn id(&self) -> NodeId {
        Rc::as_ptr(&self.node) as NodeId
    }

    /// Whether this variant may re-enter itself without tripping the
    /// left-recursion guard.
    pub(crate) fn recurse_ok(&self) -> bool {
        matches!(
            self.node.kind,
            Kind::Lit(_) | Kind::Choice(_) | Kind::Defer(_)
        )
    }

    /// Whether a failed partial match may have consumed input, requiring a
    /// trial checkpoint around the attempt. A deferred rule forwards to an
    /// arbitrary target, so it counts as compound.
    pub(crate) fn is_compound(&self) -> bool {
        matches!(
            self.node.kind,
            Kind::Seq(_) | Kind::Choice(_) | Kind::Repeat { .. } | Kind::Group(_) | Kind::Defer(_)
        )
    }

    /// Attach a human-readable label. A named rule reports itself as a
    /// single opaque non-terminal in expected-input sets and error messages.
    pub fn named(self, name: impl Into<String>) -> Self {
        *self.node.name.borrow_mut() = Some(name.into());
        self
    }

    /// Attach a reducer: on a successful match the leaves this rule matched
    /// are folded into a single [`Leaf::Value`].
    pub fn map(self, reducer: impl Fn(Vec<Leaf<T>>) -> T + 'static) -> Self {
        *self.node.reducer.borrow_mut() = Some(Rc::new(reducer));
        self
    }

    /// Pin the whitespace policy used when this rule is the parse root.
    pub fn with_whitespace(self, whitespace: impl Into<Whitespace>) -> Self {
        *self.node.whitespace.borrow_mut() = Some(whitespace.into());
        self
    }

    /// Install the target of a deferred rule.
    ///
    /// Panics when `self` was not created with [`defer`] or is already
    /// filled; both are grammar-construction bugs.
    pub fn fill(&self, target: impl IntoRule<T>) {
        let Kind::Defer(slot) = &self.node.kind else {
            panic!("fill() is only valid on a deferred rule");
        };
        let mut slot = slot.borrow_mut();
        assert!(slot.is_none(), "deferred rule filled twice");
        *slot = Some(target.into_rule());
    }

    /// Run this rule over `input` using the rule's pinned whitespace policy
    /// (default: spaces, tabs and newlines between tokens).
    pub fn parse<'i>(&self, input: &'i str) -> Result<ParseState<'i, T>, ParseError> {
        let whitespace = self.node.whitespace.borrow().clone().unwrap_or_default();
        self.parse_with(input, whitespace)
    }

    /// Run this rule over `input` with an explicit whitespace policy.
    pub fn parse_with<'i>(
        &self,
        input: &'i str,
        whitespace: Whitespace,
    ) -> Result<ParseState<'i, T>, ParseError> {
        log::debug!("parsing {} bytes", input.len());
        let mut state = ParseState::new(input, whitespace);
        self.parse_core(&mut state)?;
        Ok(state)
    }

    /// The shared driver protocol, run for every rule: left-recursion
    /// check, reducer branch scoping, guard bookkeeping, error construction.
    pub(crate) fn parse_core(&self, state: &mut ParseState<'_, T>) -> Result<(), ParseError> {
        let id = self.id();
        let guarded = !self.recurse_ok();
        if guarded && state.in_recursion(id) {
            log::trace!(
                "shift-shift conflict at {}:{}",
                state.line(),
                state.column()
            );
            return Err(state.error(ErrorKind::LeftRecursion, self.expect()));
        }
        let reducer = self.node.reducer.borrow().clone();
        if reducer.is_some() {
            state.push_branch();
        }
        if guarded {
            state.push_parser(id);
        }
        let outcome = self.recognize(state);
        if guarded {
            state.pop_parser();
        }
        // On an inner error the reducer branch stays open; the enclosing
        // trial rollback truncates it together with the cursor.
        let matched = outcome?;
        if !matched {
            // A primitive miss consumed nothing, so its branch is empty.
            if reducer.is_some() {
                state.pop_branch();
            }
            let kind = if state.at_eof() {
                ErrorKind::EndOfInput
            } else {
                ErrorKind::Unexpected
            };
            return Err(state.error(kind, self.expect()));
        }
        if let Some(reduce) = reducer {
            let children = state.pop_branch();
            state.push_leaf(Leaf::Value(reduce(children)));
        }
        Ok(())
    }

    /// Variant dispatch. `Ok(false)` means "no match at the cursor"; the
    /// driver turns it into the right error.
    fn recognize(&self, state: &mut ParseState<'_, T>) -> Result<bool, ParseError> {
        match &self.node.kind {
            Kind::Lit(text) => Ok(primitive::match_lit(text, state)),
            Kind::Set(members) => Ok(primitive::match_set(members, state)),
            Kind::Pattern { regex, .. } => Ok(primitive::match_pattern(regex, state)),
            Kind::Seq(items) => compound::recognize_seq(&items.borrow(), state),
            Kind::Choice(alternatives) => {
                compound::recognize_choice(&alternatives.borrow(), state)
            }
            Kind::Repeat {
                item,
                min,
                max,
                sep,
            } => {
                let item = item.borrow();
                let sep = sep.borrow();
                compound::recognize_repeat(&item, *min, *max, sep.as_ref(), state)
            }
            Kind::Group(inner) => {
                inner.borrow().parse_core(state)?;
                Ok(true)
            }
            Kind::Defer(slot) => {
                let target = slot
                    .borrow()
                    .clone()
                    .expect("deferred rule used before fill()");
                target.parse_core(state)?;
                Ok(true)
            }
        }
    }

    /// The terminals (or named non-terminals) this rule would accept next.
    pub fn expect(&self) -> Vec<String> {
        self.expect_core(&mut ExpectGuard::new())
    }

    /// Splice filled deferred rules out of the graph in place, saving one
    /// delegation per indirection at parse time. Purely an optimization;
    /// parse results never depend on it. The resolved graph can contain
    /// direct cycles, so prefer naming recursive rules before debug-printing
    /// an analyzed grammar.
    pub fn analyze(&self) {
        let mut seen = HashSet::new();
        self.resolve(&mut seen);
    }

    fn resolve(&self, seen: &mut HashSet<NodeId>) {
        if !seen.insert(self.id()) {
            return;
        }
        match &self.node.kind {
            Kind::Lit(_) | Kind::Set(_) | Kind::Pattern { .. } => {}
            Kind::Seq(items) | Kind::Choice(items) => {
                let children = {
                    let mut items = items.borrow_mut();
                    for slot in items.iter_mut() {
                        splice(slot);
                    }
                    items.clone()
                };
                for child in &children {
                    child.resolve(seen);
                }
            }
            Kind::Repeat { item, sep, .. } => {
                let child = {
                    let mut item = item.borrow_mut();
                    splice(&mut item);
                    item.clone()
                };
                child.resolve(seen);
                let separator = {
                    let mut sep = sep.borrow_mut();
                    if let Some(slot) = sep.as_mut() {
                        splice(slot);
                    }
                    sep.clone()
                };
                if let Some(separator) = separator {
                    separator.resolve(seen);
                }
            }
            Kind::Group(inner) => {
                let child = {
                    let mut inner = inner.borrow_mut();
                    splice(&mut inner);
                    inner.clone()
                };
                child.resolve(seen);
            }
            Kind::Defer(slot) => {
                let target = slot.borrow().clone();
                if let Some(target) = target {
                    target.resolve(seen);
                }
            }
        }
    }
}

/// Replace a deferred rule in a child slot with its filled target.
fn splice<T>(slot: &mut Rule<T>) {
    loop {
        let target = match &slot.node.kind {
            Kind::Defer(inner) => inner
                .borrow()
                .clone()
                .expect("deferred rule used before fill()"),
            _ => break,
        };
        *slot = target;
    }
}

impl<T> fmt::Debug for Rule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &*self.node.name.borrow() {
            return write!(f, "@{name}");
        }
        match &self.node.kind {
            Kind::Lit(text) => write!(f, "Lit({text:?})"),
            Kind::Set(members) => write!(f, "Set({members:?})"),
            Kind::Pattern { raw, .. } => write!(f, "Pattern({raw:?})"),
            Kind::Seq(items) => write!(f, "Seq({:?})", items.borrow()),
            Kind::Choice(items) => write!(f, "Choice({:?})", items.borrow()),
            Kind::Repeat {
                item, min, max, ..
            } => write!(f, "Repeat({:?}, {min}, {max:?})", item.borrow()),
            Kind::Group(inner) => write!(f, "Group({:?})", inner.borrow()),
            // Deferred rules close every cycle in a grammar graph; printing
            // their target shallowly keeps Debug terminating.
            Kind::Defer(slot) => match &*slot.borrow() {
                None => write!(f, "Defer(None)"),
                Some(target) => match &*target.node.name.borrow() {
                    Some(name) => write!(f, "Defer(@{name})"),
                    None => write!(f, "Defer(..)"),
                },
            },
        }
    }
}

/// Structural equality on the variant payloads. Deferred rules compare by
/// node identity, which keeps equality terminating on cyclic grammars.
/// Names and reducers are not part of a rule's matching shape and are
/// ignored.
impl<T> PartialEq for Rule<T> {
    fn eq(&self, other: &Self) -> bool {
        match (&self.node.kind, &other.node.kind) {
            (Kind::Lit(a), Kind::Lit(b)) => a == b,
            (Kind::Set(a), Kind::Set(b)) => a == b,
            (
                Kind::Pattern {
                    raw: a,
                    insensitive: a_ci,
                    ..
                },
                Kind::Pattern {
                    raw: b,
                    insensitive: b_ci,
                    ..
                },
            ) => a == b && a_ci == b_ci,
            (Kind::Seq(a), Kind::Seq(b)) => *a.borrow() == *b.borrow(),
            (Kind::Choice(a), Kind::Choice(b)) => *a.borrow() == *b.borrow(),
            (
                Kind::Repeat {
                    item: a,
                    min: a_min,
                    max: a_max,
                    sep: a_sep,
                },
                Kind::Repeat {
                    item: b,
                    min: b_min,
                    max: b_max,
                    sep: b_sep,
                },
            ) => {
                a_min == b_min
                    && a_max == b_max
                    && *a.borrow() == *b.borrow()
                    && *a_sep.borrow() == *b_sep.borrow()
            }
            (Kind::Group(a), Kind::Group(b)) => *a.borrow() == *b.borrow(),
            (Kind::Defer(_), Kind::Defer(_)) => self.id() == other.id(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defer_parses_through_its_target() {
        let rule: Rule = defer();
        rule.fill(lit("foo"));

        let state = rule.parse("foo").unwrap();
        assert_eq!(state.text(), "");
        assert_eq!(*state.tree(), ["foo"]);

        assert!(rule.parse("bar").is_err());
    }

    #[test]
    fn defer_expects_through_its_target() {
        let rule: Rule = defer();
        rule.fill(lit("foo"));
        assert_eq!(rule.expect(), ["foo"]);
    }

    #[test]
    #[should_panic(expected = "before fill()")]
    fn unfilled_defer_is_a_bug() {
        let rule: Rule = defer();
        let _ = rule.parse("foo");
    }

    #[test]
    #[should_panic(expected = "before fill()")]
    fn unfilled_named_defer_is_a_bug() {
        let rule: Rule = defer().named("bar");
        let _ = rule.parse("foo");
    }

    #[test]
    #[should_panic(expected = "filled twice")]
    fn double_fill_is_a_bug() {
        let rule: Rule = defer();
        rule.fill("foo");
        rule.fill("bar");
    }

    #[test]
    #[should_panic(expected = "only valid on a deferred rule")]
    fn fill_on_a_literal_is_a_bug() {
        let rule: Rule = lit("foo");
        rule.fill("bar");
    }

    #[test]
    fn defer_closes_recursive_grammars() {
        let single: Rule = defer();
        let double = single.clone() + "bar";
        single.fill(double | "foo");

        let state = single.parse("foo").unwrap();
        assert_eq!(state.text(), "");
        assert_eq!(*state.tree(), ["foo"]);

        let state = single.parse("foobar").unwrap();
        assert_eq!(state.text(), "");
        assert_eq!(*state.tree(), ["foo", "bar"]);

        assert!(single.parse("bar").is_err());
    }

    #[test]
    fn debug_rendering() {
        let rule: Rule = defer();
        assert_eq!(format!("{rule:?}"), "Defer(None)");
        rule.fill("foo");
        assert_eq!(format!("{rule:?}"), "Defer(..)");

        let named: Rule = lit("foo").named("word");
        assert_eq!(format!("{named:?}"), "@word");
        let seq: Rule = lit("foo") + "bar";
        assert_eq!(format!("{seq:?}"), r#"Seq([Lit("foo"), Lit("bar")])"#);
    }

    #[test]
    fn analyze_splices_choice_children() {
        let single: Rule = defer();
        let double = single.clone() + "bar";
        single.fill(double | "foo");
        let grammar = single.clone() | "baz";

        let deferred_first = match &grammar.node.kind {
            Kind::Choice(items) => matches!(items.borrow()[0].node.kind, Kind::Defer(_)),
            _ => unreachable!(),
        };
        assert!(deferred_first);

        grammar.analyze();

        let choice_first = match &grammar.node.kind {
            Kind::Choice(items) => matches!(items.borrow()[0].node.kind, Kind::Choice(_)),
            _ => unreachable!(),
        };
        assert!(choice_first);

        let state = grammar.parse("foobar").unwrap();
        assert_eq!(*state.tree(), ["foo", "bar"]);
    }

    #[test]
    fn analyze_splices_repeat_items() {
        let single: Rule = defer();
        let double = single.clone() + "bar";
        single.fill(double | "foo");
        let grammar = single.clone() * ",";

        grammar.analyze();

        let spliced = match &grammar.node.kind {
            Kind::Repeat { item, .. } => matches!(item.borrow().node.kind, Kind::Choice(_)),
            _ => unreachable!(),
        };
        assert!(spliced);

        let state = grammar.parse("foo, foobar").unwrap();
        assert_eq!(*state.tree(), ["foo", ",", "foobar"]);
    }

    #[test]
    fn structural_equality_ignores_labels() {
        let plain: Rule = lit("foo");
        let named: Rule = lit("foo").named("word");
        let other: Rule = lit("bar");
        assert_eq!(plain, named);
        assert_ne!(plain, other);

        let left: Rule = lit("a") + "b" + "c";
        let right: Rule = lit("a") + "b" + "c";
        assert_eq!(left, right);

        let deferred: Rule = defer();
        assert_eq!(deferred, deferred.clone());
        assert_ne!(deferred, defer());
    }
}
