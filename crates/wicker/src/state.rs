use crate::combinator::Leaf;
use crate::error::{ErrorKind, ParseError};

/// Characters treated as inter-token whitespace during a parse.
///
/// Whitespace is skipped once at the very start of a parse and after every
/// successful token match, never in the middle of a primitive match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Whitespace {
    /// Skip nothing; every character is significant.
    None,
    /// Skip any of the contained characters between tokens.
    Chars(String),
}

impl Default for Whitespace {
    fn default() -> Self {
        Whitespace::Chars(" \t\n".to_string())
    }
}

impl From<&str> for Whitespace {
    fn from(chars: &str) -> Self {
        Whitespace::Chars(chars.to_string())
    }
}

/// Identity of a rule node, used by the recursion guards. Rules are compared
/// by node address, not by structure.
pub(crate) type NodeId = usize;

/// A checkpoint taken before a trial match, enough to undo it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Trial {
    pos: usize,
    line: usize,
    col: usize,
    depth: usize,
}

/// Mutable state threaded through a parse: the cursor over the input, the
/// parse tree under construction, and the left-recursion guard.
///
/// A successful parse returns its final state; [`ParseState::text`] is the
/// input that was not consumed and [`ParseState::tree`] the flat list of
/// matched leaves. Parsing does not require consuming the whole input.
#[derive(Debug)]
pub struct ParseState<'i, T = ()> {
    input: &'i str,
    pos: usize,
    line: usize,
    col: usize,
    tree: Vec<Vec<Leaf<T>>>,
    guard: Vec<Vec<NodeId>>,
    whitespace: Whitespace,
}

impl<'i, T> ParseState<'i, T> {
    pub(crate) fn new(input: &'i str, whitespace: Whitespace) -> Self {
        let mut state = Self {
            input,
            pos: 0,
            line: 1,
            col: 1,
            tree: vec![Vec::new()],
            guard: vec![Vec::new()],
            whitespace,
        };
        state.eat_white();
        state
    }

    /// The input that has not been consumed yet.
    pub fn text(&self) -> &'i str {
        &self.input[self.pos..]
    }

    /// 1-based line of the cursor.
    pub fn line(&self) -> usize {
        self.line
    }

    /// 1-based column of the cursor.
    pub fn column(&self) -> usize {
        self.col
    }

    /// True once the whole input has been consumed.
    pub fn at_eof(&self) -> bool {
        self.pos == self.input.len()
    }

    /// The completed parse tree.
    pub fn tree(&self) -> &Vec<Leaf<T>> {
        &self.tree[0]
    }

    /// Consume the state, keeping only the parse tree.
    pub fn into_tree(mut self) -> Vec<Leaf<T>> {
        self.tree.swap_remove(0)
    }

    /// Byte offset of the cursor, used to detect iterations that consume
    /// nothing.
    pub(crate) fn offset(&self) -> usize {
        self.pos
    }

    /// Drop leading whitespace characters, updating the position counters.
    pub(crate) fn eat_white(&mut self) {
        let Whitespace::Chars(skip) = &self.whitespace else {
            return;
        };
        let rest = &self.input[self.pos..];
        let kept = rest.trim_start_matches(|c: char| skip.contains(c));
        let eaten = rest.len() - kept.len();
        for c in rest[..eaten].chars() {
            if c == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
        self.pos += eaten;
    }

    /// Consume `len` bytes: push them as a text leaf on the current branch,
    /// advance the cursor, then skip whitespace.
    pub(crate) fn consume(&mut self, len: usize) {
        let input = self.input;
        let piece = &input[self.pos..self.pos + len];
        for c in piece.chars() {
            if c == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
        self.pos += len;
        self.push_leaf(Leaf::Text(piece.to_string()));
        self.eat_white();
    }

    pub(crate) fn push_leaf(&mut self, leaf: Leaf<T>) {
        self.tree
            .last_mut()
            .expect("tree stack is never empty")
            .push(leaf);
    }

    /// Open a private branch; leaves land there until [`Self::pop_branch`].
    pub(crate) fn push_branch(&mut self) {
        self.tree.push(Vec::new());
    }

    pub(crate) fn pop_branch(&mut self) -> Vec<Leaf<T>> {
        self.tree.pop().expect("tree stack is never empty")
    }

    /// Start a trial match: record the cursor and open a scratch branch.
    pub(crate) fn trial(&mut self) -> Trial {
        let trial = Trial {
            pos: self.pos,
            line: self.line,
            col: self.col,
            depth: self.tree.len(),
        };
        self.tree.push(Vec::new());
        trial
    }

    /// Accept a trial: merge its branch into the parent and keep the cursor.
    pub(crate) fn commit(&mut self, trial: Trial) {
        debug_assert_eq!(self.tree.len(), trial.depth + 1);
        let branch = self.pop_branch();
        self.tree
            .last_mut()
            .expect("tree stack is never empty")
            .extend(branch);
    }

    /// Undo a trial: restore the cursor and drop the scratch branch along
    /// with any branch a failed reducer rule left open above it.
    pub(crate) fn rollback(&mut self, trial: Trial) {
        self.tree.truncate(trial.depth);
        self.pos = trial.pos;
        self.line = trial.line;
        self.col = trial.col;
    }

    /// Mark a rule as active in the current recursion frame.
    pub(crate) fn push_parser(&mut self, id: NodeId) {
        self.guard
            .last_mut()
            .expect("guard stack is never empty")
            .push(id);
    }

    pub(crate) fn pop_parser(&mut self) {
        self.guard
            .last_mut()
            .expect("guard stack is never empty")
            .pop();
    }

    /// Open a fresh recursion frame for a non-head sequence element.
    pub(crate) fn shift(&mut self) {
        self.guard.push(Vec::new());
    }

    pub(crate) fn unshift(&mut self) {
        self.guard.pop();
    }

    /// True when the rule is already being matched in the current frame.
    pub(crate) fn in_recursion(&self, id: NodeId) -> bool {
        self.guard.last().is_some_and(|frame| frame.contains(&id))
    }

    pub(crate) fn error(&self, kind: ErrorKind, expected: Vec<String>) -> ParseError {
        ParseError {
            line: self.line,
            col: self.col,
            found: self.text().chars().take(10).collect(),
            expected,
            kind,
        }
    }
}
