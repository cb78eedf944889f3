//! The move registry.
//!
//! Declared moves compile here, in declaration order, against a table
//! that already holds the builtins and host functions. Each registered
//! move also becomes callable from later formulas under its own name.
//! Names are unique across the whole table; a declaration that collides
//! with anything, or fails to compile, leaves the registry untouched.

use std::sync::Arc;

use gambit_core::ParseError;
use tracing::info;

use crate::candidate::CandidateMove;
use crate::content::MoveDecl;
use crate::error::RegistryError;
use crate::formula::{Formula, FormulaRef};
use crate::functions::{FunctionTable, MoveFn};

#[derive(Debug)]
pub struct Registry {
    moves: Vec<Arc<CandidateMove>>,
    table: FunctionTable,
}

impl Registry {
    pub fn new() -> Registry {
        Registry {
            moves: Vec::new(),
            table: FunctionTable::standard(),
        }
    }

    pub fn from_decls(decls: &[MoveDecl]) -> Result<Registry, RegistryError> {
        let mut registry = Registry::new();
        for decl in decls {
            registry.register(decl)?;
        }
        Ok(registry)
    }

    /// Register one declared move. The name must not collide with a
    /// builtin, a host function, or an earlier move.
    pub fn register(&mut self, decl: &MoveDecl) -> Result<(), RegistryError> {
        if self.table.contains(&decl.name) {
            return Err(RegistryError::DuplicateDeclaration {
                name: decl.name.clone(),
            });
        }
        let score = self.compile_field(decl, &decl.score, "score")?;
        let action = self.compile_field(decl, &decl.action, "action")?;
        let precondition = match &decl.precondition {
            Some(src) => Some(self.compile_field(decl, src, "precondition")?),
            None => None,
        };
        self.table.register_move(
            &decl.name,
            MoveFn {
                params: decl.args.clone(),
                body: Arc::clone(&action),
            },
        );
        self.moves.push(Arc::new(CandidateMove {
            name: decl.name.clone(),
            score,
            action,
            precondition,
            args: decl.args.clone(),
        }));
        info!(move_name = %decl.name, "candidate move registered");
        Ok(())
    }

    fn compile_field(
        &self,
        decl: &MoveDecl,
        src: &str,
        field: &'static str,
    ) -> Result<FormulaRef, RegistryError> {
        Formula::compile(src, &self.table)
            .map(Arc::new)
            .map_err(|source| RegistryError::Parse {
                name: decl.name.clone(),
                field,
                source,
            })
    }

    /// Registered moves, in registration order. Iteration is restartable;
    /// callers walk this slice from the top on every selection pass.
    pub fn candidate_moves(&self) -> &[Arc<CandidateMove>] {
        &self.moves
    }

    /// Compile arbitrary source against the full table, registered moves
    /// included. This is the path the console shares with declared moves.
    pub fn compile(&self, src: &str) -> Result<Formula, ParseError> {
        Formula::compile(src, &self.table)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
