//! Chained evaluation scopes.
//!
//! A [`Context`] is one frame of named bindings plus an optional parent.
//! Lookup walks outward, so inner frames shadow outer ones. Frames borrow
//! their parent rather than owning it; a `where` clause or a per-unit
//! overlay builds a child frame on the stack and drops it when done,
//! leaving the base context untouched.

use std::collections::{BTreeMap, BTreeSet};

use crate::value::Value;

#[derive(Debug, Default)]
pub struct Context<'a> {
    vars: BTreeMap<String, Value>,
    parent: Option<&'a Context<'a>>,
}

impl Context<'static> {
    /// An empty root frame with no parent.
    pub fn root() -> Context<'static> {
        Context {
            vars: BTreeMap::new(),
            parent: None,
        }
    }

    /// A root frame seeded with the given bindings.
    pub fn from_map(vars: BTreeMap<String, Value>) -> Context<'static> {
        Context { vars, parent: None }
    }
}

impl<'a> Context<'a> {
    /// Look up a binding, innermost frame first.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self.vars.get(name) {
            Some(v) => Some(v),
            None => self.parent.and_then(|p| p.get(name)),
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Add or replace a binding in this frame. Shadows any parent binding
    /// of the same name; never touches the parent.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    /// Every visible binding, innermost frame first. A name shadowed by
    /// an inner frame appears once, with the inner value.
    pub fn enumerate(&self) -> Vec<(&str, &Value)> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        let mut frame = Some(self);
        while let Some(ctx) = frame {
            for (name, value) in &ctx.vars {
                if seen.insert(name.as_str()) {
                    out.push((name.as_str(), value));
                }
            }
            frame = ctx.parent;
        }
        out
    }

    /// An empty child frame whose lookups fall through to `self`.
    pub fn child(&'a self) -> Context<'a> {
        Context {
            vars: BTreeMap::new(),
            parent: Some(self),
        }
    }

    /// A child frame carrying a single binding.
    pub fn overlay(&'a self, name: impl Into<String>, value: Value) -> Context<'a> {
        let mut frame = self.child();
        frame.set(name, value);
        frame
    }
}
