use super::{Kind, Rule};
use crate::state::NodeId;

/// Recursion guard for expected-set computation.
///
/// Same purpose as the parse-time guard, but its own structure: expectation
/// is computed without consuming input, so it must not touch a parse state.
/// Unlike the parse-time guard it tracks every node, which is what makes the
/// traversal terminate on cyclic grammars.
pub(crate) struct ExpectGuard {
    active: Vec<NodeId>,
}

impl ExpectGuard {
    pub(crate) fn new() -> Self {
        Self { active: Vec::new() }
    }

    fn enter(&mut self, id: NodeId) -> bool {
        if self.active.contains(&id) {
            return false;
        }
        self.active.push(id);
        true
    }

    fn leave(&mut self) {
        self.active.pop();
    }
}

impl<T> Rule<T> {
    /// The expected-input set of this rule: its name when it has one, the
    /// variant-specific union otherwise, and nothing when the rule is
    /// already being expanded further up the traversal.
    pub(crate) fn expect_core(&self, guard: &mut ExpectGuard) -> Vec<String> {
        if !guard.enter(self.id()) {
            return Vec::new();
        }
        let name = self.node.name.borrow().clone();
        let expected = match name {
            Some(name) => vec![name],
            None => self.expect_inner(guard),
        };
        guard.leave();
        expected
    }

    fn expect_inner(&self, guard: &mut ExpectGuard) -> Vec<String> {
        match &self.node.kind {
            Kind::Lit(text) => vec![text.clone()],
            Kind::Set(members) => members.clone(),
            Kind::Pattern { raw, .. } => vec![raw.clone()],
            // Only the first element is mandatory at the current position.
            Kind::Seq(items) => items
                .borrow()
                .first()
                .map(|head| head.expect_core(guard))
                .unwrap_or_default(),
            Kind::Choice(items) => items
                .borrow()
                .iter()
                .flat_map(|alternative| alternative.expect_core(guard))
                .collect(),
            Kind::Repeat { item, .. } => item.borrow().expect_core(guard),
            Kind::Group(inner) => inner.borrow().expect_core(guard),
            Kind::Defer(slot) => slot
                .borrow()
                .clone()
                .expect("deferred rule used before fill()")
                .expect_core(guard),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{defer, lit};
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn a_name_hides_the_internals() {
        let rule: Rule = (lit("foo") | "bar").named("baz");
        assert_eq!(rule.expect(), ["baz"]);
    }

    #[test]
    fn recursive_grammars_terminate() {
        let expr: Rule = defer();
        expr.fill(expr.clone() + "x" | "y");
        assert_eq!(expr.expect(), ["y"]);
    }

    #[test]
    fn named_alternatives_stay_in_declaration_order() {
        let rule: Rule =
            lit("foo").named("first") | lit("bar").named("second") | "baz";
        assert_eq!(rule.expect(), ["first", "second", "baz"]);
    }
}
