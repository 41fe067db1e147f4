//! A small arithmetic dialect of the guest language.
//!
//! Source text is tokenized and parsed into a host [`ast::Expr`] tree, which
//! is cached by the SHA-256 digest of the text. Each parse lowers the tree
//! into fresh guest call cells through the caller's region, and evaluation
//! walks those cells.

pub mod ast;
pub mod deparse;
mod eval;
pub mod lexer;
mod lower;
pub mod parser;
pub mod precedence;
pub mod token;

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    rc::Rc,
};

use sha2::{Digest, Sha256};

use crate::{
    error::BridgeError,
    runtime::{
        evaluator::{Evaluator, GuestError},
        form::forms,
        handle::Handle,
        region::Region,
    },
};
use ast::Expr;
use parser::{ParseError, Parser};

pub fn hash_source(source: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    out
}

#[derive(Default)]
pub struct ArithEvaluator {
    cache: RefCell<HashMap<[u8; 32], Rc<[Expr]>>>,
    cache_hits: Cell<usize>,
}

impl ArithEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Distinct source texts parsed so far.
    pub fn cached_sources(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn cache_hits(&self) -> usize {
        self.cache_hits.get()
    }

    fn parse_ast(&self, source: &str) -> Result<Rc<[Expr]>, ParseError> {
        let key = hash_source(source);
        if let Some(ast) = self.cache.borrow().get(&key) {
            self.cache_hits.set(self.cache_hits.get() + 1);
            log::trace!("parse cache hit for {:?}", source);
            return Ok(Rc::clone(ast));
        }
        let ast: Rc<[Expr]> = Parser::new(source).parse_program()?.into();
        self.cache.borrow_mut().insert(key, Rc::clone(&ast));
        Ok(ast)
    }
}

impl Evaluator for ArithEvaluator {
    fn parse<'r>(
        &self,
        region: &Region<'r>,
        source: &str,
    ) -> Result<Handle<'r, forms::Expr>, BridgeError> {
        let ast = self.parse_ast(source).map_err(|err| {
            GuestError::in_call(format!("parse(text = {:?})", source), err.to_string())
        })?;
        let exprs: Vec<Handle<'r>> = ast.iter().map(|expr| lower::lower(region, expr)).collect();
        Ok(region.mk_expr(&exprs))
    }

    fn eval<'r>(
        &self,
        region: &Region<'r>,
        expr: Handle<'r>,
        env: Handle<'r, forms::Env>,
    ) -> Result<Handle<'r>, BridgeError> {
        eval::eval(region, expr, env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_sources_hit_the_cache() {
        let evaluator = ArithEvaluator::new();
        evaluator.parse_ast("1 + 2").unwrap();
        evaluator.parse_ast("1 + 2").unwrap();
        evaluator.parse_ast("3").unwrap();
        assert_eq!(evaluator.cached_sources(), 2);
        assert_eq!(evaluator.cache_hits(), 1);
    }

    #[test]
    fn parse_errors_are_guest_errors() {
        let session = crate::runtime::session::Session::new(crate::config::Config::default());
        let err = session.with_region(|region| region.eval("1 +").unwrap_err());
        assert_eq!(
            err.to_string(),
            "Error in parse(text = \"1 +\") :\n  <text>:1:4: unexpected end of input"
        );
    }

    #[test]
    fn digest_is_stable() {
        assert_eq!(hash_source("x"), hash_source("x"));
        assert_ne!(hash_source("x"), hash_source("y"));
    }
}
