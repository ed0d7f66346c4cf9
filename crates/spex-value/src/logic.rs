// SPDX-License-Identifier: AGPL-3.0

//! Logical connectives and quantifiers over symbolic booleans.
//!
//! All helpers accept mixed symbolic and concrete operands and degrade to
//! host evaluation when everything is concrete.

use spex_exceptions::SpexResult;
use z3::ast::{exists_const, forall_const, Ast, Bool as Z3Bool, Dynamic};
use z3::{Context, Pattern};

use crate::scalar::SpexBool;
use crate::value::SpexValue;

/// Conjunction of all operands.
pub fn sym_and<'ctx>(ctx: &'ctx Context, operands: &[&SpexBool<'ctx>]) -> SpexBool<'ctx> {
    let mut terms: Vec<Z3Bool<'ctx>> = Vec::new();
    for operand in operands {
        match operand {
            SpexBool::Concrete(false) => return SpexBool::Concrete(false),
            SpexBool::Concrete(true) => {}
            SpexBool::Symbolic(term) => terms.push(term.clone()),
        }
    }
    match terms.len() {
        0 => SpexBool::Concrete(true),
        1 => SpexBool::Symbolic(terms.remove(0)),
        _ => {
            let refs: Vec<&Z3Bool<'ctx>> = terms.iter().collect();
            SpexBool::from_z3(Z3Bool::and(ctx, &refs))
        }
    }
}

/// Disjunction of all operands.
pub fn sym_or<'ctx>(ctx: &'ctx Context, operands: &[&SpexBool<'ctx>]) -> SpexBool<'ctx> {
    let mut terms: Vec<Z3Bool<'ctx>> = Vec::new();
    for operand in operands {
        match operand {
            SpexBool::Concrete(true) => return SpexBool::Concrete(true),
            SpexBool::Concrete(false) => {}
            SpexBool::Symbolic(term) => terms.push(term.clone()),
        }
    }
    match terms.len() {
        0 => SpexBool::Concrete(false),
        1 => SpexBool::Symbolic(terms.remove(0)),
        _ => {
            let refs: Vec<&Z3Bool<'ctx>> = terms.iter().collect();
            SpexBool::from_z3(Z3Bool::or(ctx, &refs))
        }
    }
}

/// Negation.
pub fn sym_not<'ctx>(operand: &SpexBool<'ctx>) -> SpexBool<'ctx> {
    operand.not()
}

/// Implication.
pub fn implies<'ctx>(
    ctx: &'ctx Context,
    antecedent: &SpexBool<'ctx>,
    consequent: &SpexBool<'ctx>,
) -> SpexBool<'ctx> {
    antecedent.implies(consequent, ctx)
}

/// Value equality over any two same-sorted symbolic values; concrete
/// operands fold to a concrete boolean.
pub fn equal<'ctx>(
    ctx: &'ctx Context,
    a: &SpexValue<'ctx>,
    b: &SpexValue<'ctx>,
) -> SpexResult<SpexBool<'ctx>> {
    a.eq_value(b, ctx)
}

/// Universal quantification over the given bound constants. A concrete body
/// is returned unchanged.
pub fn forall<'ctx>(
    ctx: &'ctx Context,
    bounds: &[&Dynamic<'ctx>],
    patterns: &[&Pattern<'ctx>],
    body: &SpexBool<'ctx>,
) -> SpexBool<'ctx> {
    match body {
        SpexBool::Concrete(_) => body.clone(),
        SpexBool::Symbolic(term) => {
            let asts: Vec<&dyn Ast<'ctx>> = bounds.iter().map(|b| *b as &dyn Ast<'ctx>).collect();
            SpexBool::from_z3(forall_const(ctx, &asts, patterns, term))
        }
    }
}

/// Existential quantification over the given bound constants. A concrete
/// body is returned unchanged.
pub fn exists<'ctx>(
    ctx: &'ctx Context,
    bounds: &[&Dynamic<'ctx>],
    patterns: &[&Pattern<'ctx>],
    body: &SpexBool<'ctx>,
) -> SpexBool<'ctx> {
    match body {
        SpexBool::Concrete(_) => body.clone(),
        SpexBool::Symbolic(term) => {
            let asts: Vec<&dyn Ast<'ctx>> = bounds.iter().map(|b| *b as &dyn Ast<'ctx>).collect();
            SpexBool::from_z3(exists_const(ctx, &asts, patterns, term))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use z3::ast::Int as Z3Int;
    use z3::Config;

    #[test]
    fn test_concrete_degradation() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);

        let t = SpexBool::from_bool(true);
        let f = SpexBool::from_bool(false);

        assert!(!sym_and(&ctx, &[&t, &f]).as_bool().unwrap());
        assert!(sym_or(&ctx, &[&t, &f]).as_bool().unwrap());
        assert!(sym_not(&f).as_bool().unwrap());
        assert!(implies(&ctx, &f, &t).as_bool().unwrap());
        assert!(sym_and(&ctx, &[]).as_bool().unwrap());
        assert!(!sym_or(&ctx, &[]).as_bool().unwrap());
    }

    #[test]
    fn test_mixed_operands() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);

        let p = SpexBool::fresh(&ctx, "logic_p");
        let t = SpexBool::from_bool(true);
        let f = SpexBool::from_bool(false);

        // Concrete identities drop out of the conjunction
        assert!(sym_and(&ctx, &[&p, &t]).is_symbolic());
        // Concrete dominators decide it
        assert!(!sym_and(&ctx, &[&p, &f]).as_bool().unwrap());
        assert!(sym_or(&ctx, &[&p, &t]).as_bool().unwrap());
    }

    #[test]
    fn test_equal_helper_folds_concretes() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);

        let a = SpexValue::from_i64(3);
        let b = SpexValue::from_i64(3);
        let c = SpexValue::from_i64(4);
        assert!(equal(&ctx, &a, &b).unwrap().as_bool().unwrap());
        assert!(!equal(&ctx, &a, &c).unwrap().as_bool().unwrap());
    }

    #[test]
    fn test_forall_concrete_body_passes_through() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);

        let x = Dynamic::from_ast(&Z3Int::new_const(&ctx, "x"));
        let body = SpexBool::from_bool(true);
        assert!(forall(&ctx, &[&x], &[], &body).as_bool().unwrap());
    }

    #[test]
    fn test_forall_builds_quantifier() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);

        let x_int = Z3Int::new_const(&ctx, "qx");
        let x = Dynamic::from_ast(&x_int);
        let body = SpexBool::from_z3(x_int.ge(&Z3Int::from_i64(&ctx, 0)));
        let quantified = forall(&ctx, &[&x], &[], &body);
        match quantified {
            SpexBool::Symbolic(term) => assert!(format!("{}", term).contains("forall")),
            SpexBool::Concrete(_) => panic!("expected a quantified term"),
        }

        let existential = exists(&ctx, &[&x], &[], &body);
        match existential {
            SpexBool::Symbolic(term) => assert!(format!("{}", term).contains("exists")),
            SpexBool::Concrete(_) => panic!("expected a quantified term"),
        }
    }
}
