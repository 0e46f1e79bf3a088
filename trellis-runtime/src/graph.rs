//! The subject/listener graph.
//!
//! A many-to-many adjacency between producers ("subjects") and consumers
//! ("listeners"), with O(1)-amortized link/unlink and insertion-order
//! iteration in both directions.
//!
//! Pulled out into its own small module since the graph has a distinct
//! shape from the cell arena: a many-to-many adjacency, not a value store.
//!
//! # Weakness
//!
//! A natural design holds links weakly from the subject side, excising a
//! dropped listener's links lazily. This implementation instead excises them
//! eagerly: every cell's `Drop` impl calls [`ListenerGraph::purge`] before the
//! symbol is freed, which Rust's ownership model lets us do precisely, rather
//! than rediscovering dead entries lazily at traversal time the way a
//! garbage-collected host language would have to.

use std::collections::HashMap;

use crate::symbol::Symbol;

#[derive(Default)]
pub struct ListenerGraph {
    // listener -> its subjects, in subscription order
    subjects_of: HashMap<Symbol, Vec<Symbol>>,
    // subject -> its listeners, in subscription order
    listeners_of: HashMap<Symbol, Vec<Symbol>>,
}

impl ListenerGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a `subject -> listener` link if one doesn't already exist.
    pub fn link(&mut self, subject: Symbol, listener: Symbol) {
        let subjects = self.subjects_of.entry(listener).or_default();
        if !subjects.contains(&subject) {
            subjects.push(subject);
        }
        let listeners = self.listeners_of.entry(subject).or_default();
        if !listeners.contains(&listener) {
            listeners.push(listener);
        }
    }

    /// Removes a `subject -> listener` link, if present.
    pub fn unlink(&mut self, subject: Symbol, listener: Symbol) {
        if let Some(v) = self.subjects_of.get_mut(&listener) {
            v.retain(|&s| s != subject);
        }
        if let Some(v) = self.listeners_of.get_mut(&subject) {
            v.retain(|&l| l != listener);
        }
    }

    /// Replaces `listener`'s whole subject set, diffing against the previous
    /// one so links that are no longer read are dropped and freshly read
    /// ones are added, each exactly once.
    pub fn set_subjects(&mut self, listener: Symbol, new_subjects: &[Symbol]) {
        let old = self.subjects_of.get(&listener).cloned().unwrap_or_default();
        for &s in &old {
            if !new_subjects.contains(&s) {
                self.unlink(s, listener);
            }
        }
        for &s in new_subjects {
            if !old.contains(&s) {
                self.link(s, listener);
            }
        }
    }

    /// Excises every link touching `id`, in either direction. Called when a
    /// cell is purged.
    pub fn purge(&mut self, id: Symbol) {
        if let Some(subjects) = self.subjects_of.remove(&id) {
            for s in subjects {
                if let Some(v) = self.listeners_of.get_mut(&s) {
                    v.retain(|&l| l != id);
                }
            }
        }
        if let Some(listeners) = self.listeners_of.remove(&id) {
            for l in listeners {
                if let Some(v) = self.subjects_of.get_mut(&l) {
                    v.retain(|&s| s != id);
                }
            }
        }
    }

    /// `listener`'s subjects, in reverse of subscription order.
    pub fn iter_subjects_of(&self, listener: Symbol) -> impl Iterator<Item = Symbol> + '_ {
        self.subjects_of.get(&listener).into_iter().flatten().rev().copied()
    }

    /// `subject`'s listeners, in reverse of subscription order.
    pub fn iter_listeners_of(&self, subject: Symbol) -> impl Iterator<Item = Symbol> + '_ {
        self.listeners_of.get(&subject).into_iter().flatten().rev().copied()
    }

    /// How many listeners `subject` currently has, for callers that only
    /// care about the 0/nonzero transition (a sensor's connect/disconnect).
    pub fn listener_count(&self, subject: Symbol) -> usize {
        self.listeners_of.get(&subject).map_or(0, |v| v.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(n: u64) -> Symbol {
        Symbol::from_raw(n)
    }

    #[test]
    fn link_is_idempotent() {
        let mut g = ListenerGraph::new();
        g.link(sym(1), sym(2));
        g.link(sym(1), sym(2));
        assert_eq!(g.iter_subjects_of(sym(2)).collect::<Vec<_>>(), vec![sym(1)]);
        assert_eq!(g.iter_listeners_of(sym(1)).collect::<Vec<_>>(), vec![sym(2)]);
    }

    #[test]
    fn reverse_subscription_order() {
        let mut g = ListenerGraph::new();
        g.link(sym(1), sym(10));
        g.link(sym(2), sym(10));
        g.link(sym(3), sym(10));
        assert_eq!(
            g.iter_subjects_of(sym(10)).collect::<Vec<_>>(),
            vec![sym(3), sym(2), sym(1)]
        );
    }

    #[test]
    fn set_subjects_diffs() {
        let mut g = ListenerGraph::new();
        g.set_subjects(sym(10), &[sym(1), sym(2)]);
        g.set_subjects(sym(10), &[sym(2), sym(3)]);
        let mut subs: Vec<_> = g.iter_subjects_of(sym(10)).collect();
        subs.sort();
        assert_eq!(subs, vec![sym(2), sym(3)]);
        assert!(g.iter_listeners_of(sym(1)).next().is_none());
    }

    #[test]
    fn purge_removes_both_directions() {
        let mut g = ListenerGraph::new();
        g.link(sym(1), sym(2));
        g.purge(sym(1));
        assert!(g.iter_listeners_of(sym(1)).next().is_none());
        assert!(g.iter_subjects_of(sym(2)).next().is_none());
    }
}
