// SPDX-License-Identifier: AGPL-3.0

//! Symbolic boolean and integer scalars.
//!
//! Both types fold constants eagerly and only build Z3 terms when at least
//! one operand is symbolic. Concrete integer arithmetic that would overflow
//! `i64` (or divide by zero) is promoted to Z3 terms, where Int arithmetic is
//! exact. Integer division and modulo use Euclidean semantics to match
//! SMT-LIB.

use spex_exceptions::{SpexException, SpexResult};
use std::fmt;
use z3::ast::{Ast, Bool as Z3Bool, Int as Z3Int};
use z3::Context;

/// Symbolic or concrete boolean value
#[derive(Clone)]
pub enum SpexBool<'ctx> {
    Concrete(bool),
    Symbolic(Z3Bool<'ctx>),
}

impl<'ctx> SpexBool<'ctx> {
    /// Create a new concrete boolean
    pub fn from_bool(value: bool) -> Self {
        Self::Concrete(value)
    }

    /// Create a new symbolic boolean
    pub fn from_z3(value: Z3Bool<'ctx>) -> Self {
        // Try to simplify to concrete if possible
        if let Some(simplified) = value.simplify().as_bool() {
            Self::Concrete(simplified)
        } else {
            Self::Symbolic(value)
        }
    }

    /// Create a fresh symbolic variable
    pub fn fresh(ctx: &'ctx Context, name: &str) -> Self {
        Self::Symbolic(Z3Bool::new_const(ctx, name))
    }

    pub fn is_concrete(&self) -> bool {
        matches!(self, Self::Concrete(_))
    }

    pub fn is_symbolic(&self) -> bool {
        matches!(self, Self::Symbolic(_))
    }

    /// Get concrete value, returns error if symbolic
    pub fn as_bool(&self) -> SpexResult<bool> {
        match self {
            Self::Concrete(b) => Ok(*b),
            Self::Symbolic(term) => Err(SpexException::NotConcrete(format!(
                "boolean is symbolic: {}",
                term
            ))),
        }
    }

    /// Get as Z3 boolean
    pub fn as_z3(&self, ctx: &'ctx Context) -> Z3Bool<'ctx> {
        match self {
            Self::Concrete(b) => Z3Bool::from_bool(ctx, *b),
            Self::Symbolic(term) => term.clone(),
        }
    }

    /// Logical AND
    pub fn and(&self, other: &Self, ctx: &'ctx Context) -> Self {
        match (self, other) {
            (Self::Concrete(false), _) | (_, Self::Concrete(false)) => Self::Concrete(false),
            (Self::Concrete(true), other) => other.clone(),
            (this, Self::Concrete(true)) => this.clone(),
            (Self::Symbolic(a), Self::Symbolic(b)) => Self::from_z3(Z3Bool::and(ctx, &[a, b])),
        }
    }

    /// Logical OR
    pub fn or(&self, other: &Self, ctx: &'ctx Context) -> Self {
        match (self, other) {
            (Self::Concrete(true), _) | (_, Self::Concrete(true)) => Self::Concrete(true),
            (Self::Concrete(false), other) => other.clone(),
            (this, Self::Concrete(false)) => this.clone(),
            (Self::Symbolic(a), Self::Symbolic(b)) => Self::from_z3(Z3Bool::or(ctx, &[a, b])),
        }
    }

    /// Logical NOT
    pub fn not(&self) -> Self {
        match self {
            Self::Concrete(b) => Self::Concrete(!b),
            Self::Symbolic(term) => Self::from_z3(term.not()),
        }
    }

    /// Logical implication
    pub fn implies(&self, other: &Self, _ctx: &'ctx Context) -> Self {
        match (self, other) {
            (Self::Concrete(false), _) | (_, Self::Concrete(true)) => Self::Concrete(true),
            (Self::Concrete(true), other) => other.clone(),
            (this, Self::Concrete(false)) => this.not(),
            (Self::Symbolic(a), Self::Symbolic(b)) => Self::from_z3(a.implies(b)),
        }
    }

    /// Equality
    pub fn eq(&self, other: &Self, ctx: &'ctx Context) -> Self {
        match (self, other) {
            (Self::Concrete(a), Self::Concrete(b)) => Self::Concrete(a == b),
            _ => {
                let lhs = self.as_z3(ctx);
                let rhs = other.as_z3(ctx);
                Self::from_z3(lhs._eq(&rhs))
            }
        }
    }

    /// Disequality
    pub fn ne(&self, other: &Self, ctx: &'ctx Context) -> Self {
        self.eq(other, ctx).not()
    }
}

impl<'ctx> fmt::Debug for SpexBool<'ctx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Concrete(b) => write!(f, "Bool({})", b),
            Self::Symbolic(term) => write!(f, "Bool({})", term),
        }
    }
}

/// Largest exponent expanded into repeated multiplication.
const MAX_EXPANDED_EXPONENT: i64 = 256;

/// Symbolic or concrete integer value
#[derive(Clone)]
pub enum SpexInt<'ctx> {
    Concrete(i64),
    Symbolic(Z3Int<'ctx>),
}

impl<'ctx> SpexInt<'ctx> {
    /// Create a concrete integer
    pub fn from_i64(value: i64) -> Self {
        Self::Concrete(value)
    }

    /// Create a symbolic integer
    pub fn from_z3(value: Z3Int<'ctx>) -> Self {
        if let Some(simplified) = value.simplify().as_i64() {
            Self::Concrete(simplified)
        } else {
            Self::Symbolic(value)
        }
    }

    /// Create a fresh symbolic variable
    pub fn fresh(ctx: &'ctx Context, name: &str) -> Self {
        Self::Symbolic(Z3Int::new_const(ctx, name))
    }

    pub fn is_concrete(&self) -> bool {
        matches!(self, Self::Concrete(_))
    }

    pub fn is_symbolic(&self) -> bool {
        matches!(self, Self::Symbolic(_))
    }

    /// Get concrete value, returns error if symbolic
    pub fn as_i64(&self) -> SpexResult<i64> {
        match self {
            Self::Concrete(v) => Ok(*v),
            Self::Symbolic(term) => Err(SpexException::NotConcrete(format!(
                "integer is symbolic: {}",
                term
            ))),
        }
    }

    /// Get as Z3 integer
    pub fn as_z3(&self, ctx: &'ctx Context) -> Z3Int<'ctx> {
        match self {
            Self::Concrete(v) => Z3Int::from_i64(ctx, *v),
            Self::Symbolic(term) => term.clone(),
        }
    }

    /// Addition
    pub fn add(&self, other: &Self, ctx: &'ctx Context) -> Self {
        if let (Self::Concrete(a), Self::Concrete(b)) = (self, other) {
            if let Some(sum) = a.checked_add(*b) {
                return Self::Concrete(sum);
            }
        }
        Self::from_z3(Z3Int::add(ctx, &[&self.as_z3(ctx), &other.as_z3(ctx)]))
    }

    /// Subtraction
    pub fn sub(&self, other: &Self, ctx: &'ctx Context) -> Self {
        if let (Self::Concrete(a), Self::Concrete(b)) = (self, other) {
            if let Some(diff) = a.checked_sub(*b) {
                return Self::Concrete(diff);
            }
        }
        Self::from_z3(Z3Int::sub(ctx, &[&self.as_z3(ctx), &other.as_z3(ctx)]))
    }

    /// Multiplication
    pub fn mul(&self, other: &Self, ctx: &'ctx Context) -> Self {
        if let (Self::Concrete(a), Self::Concrete(b)) = (self, other) {
            if let Some(product) = a.checked_mul(*b) {
                return Self::Concrete(product);
            }
        }
        Self::from_z3(Z3Int::mul(ctx, &[&self.as_z3(ctx), &other.as_z3(ctx)]))
    }

    /// Euclidean division (SMT-LIB Int semantics)
    pub fn div(&self, other: &Self, ctx: &'ctx Context) -> Self {
        if let (Self::Concrete(a), Self::Concrete(b)) = (self, other) {
            if *b != 0 {
                if let Some(quotient) = a.checked_div_euclid(*b) {
                    return Self::Concrete(quotient);
                }
            }
        }
        Self::from_z3(self.as_z3(ctx).div(&other.as_z3(ctx)))
    }

    /// Euclidean modulo (SMT-LIB Int semantics)
    pub fn modulo(&self, other: &Self, ctx: &'ctx Context) -> Self {
        if let (Self::Concrete(a), Self::Concrete(b)) = (self, other) {
            if *b != 0 {
                if let Some(rem) = a.checked_rem_euclid(*b) {
                    return Self::Concrete(rem);
                }
            }
        }
        Self::from_z3(self.as_z3(ctx).modulo(&other.as_z3(ctx)))
    }

    /// Exponentiation. The exponent must be a concrete non-negative
    /// integer; symbolic exponents have no linear-arithmetic encoding.
    pub fn pow(&self, other: &Self, ctx: &'ctx Context) -> SpexResult<Self> {
        let exponent = match other {
            Self::Concrete(e) if *e >= 0 => *e,
            Self::Concrete(e) => {
                return Err(SpexException::TypeMismatch(format!(
                    "negative exponent {} in integer power",
                    e
                )))
            }
            Self::Symbolic(term) => {
                return Err(SpexException::NotConcrete(format!(
                    "exponent is symbolic: {}",
                    term
                )))
            }
        };

        if let Self::Concrete(base) = self {
            if exponent <= u32::MAX as i64 {
                if let Some(result) = base.checked_pow(exponent as u32) {
                    return Ok(Self::Concrete(result));
                }
            }
        }

        // Expand by repeated multiplication, within reason
        if exponent > MAX_EXPANDED_EXPONENT {
            return Err(SpexException::TypeMismatch(format!(
                "exponent {} exceeds the expansion bound {}",
                exponent, MAX_EXPANDED_EXPONENT
            )));
        }
        if exponent == 0 {
            return Ok(Self::Concrete(1));
        }
        let mut acc = self.clone();
        for _ in 1..exponent {
            acc = acc.mul(self, ctx);
        }
        Ok(acc)
    }

    /// Unary negation
    pub fn neg(&self, ctx: &'ctx Context) -> Self {
        if let Self::Concrete(v) = self {
            if let Some(negated) = v.checked_neg() {
                return Self::Concrete(negated);
            }
        }
        Self::from_z3(self.as_z3(ctx).unary_minus())
    }

    /// Less than
    pub fn lt(&self, other: &Self, ctx: &'ctx Context) -> SpexBool<'ctx> {
        match (self, other) {
            (Self::Concrete(a), Self::Concrete(b)) => SpexBool::Concrete(a < b),
            _ => SpexBool::from_z3(self.as_z3(ctx).lt(&other.as_z3(ctx))),
        }
    }

    /// Less or equal
    pub fn le(&self, other: &Self, ctx: &'ctx Context) -> SpexBool<'ctx> {
        match (self, other) {
            (Self::Concrete(a), Self::Concrete(b)) => SpexBool::Concrete(a <= b),
            _ => SpexBool::from_z3(self.as_z3(ctx).le(&other.as_z3(ctx))),
        }
    }

    /// Greater than
    pub fn gt(&self, other: &Self, ctx: &'ctx Context) -> SpexBool<'ctx> {
        match (self, other) {
            (Self::Concrete(a), Self::Concrete(b)) => SpexBool::Concrete(a > b),
            _ => SpexBool::from_z3(self.as_z3(ctx).gt(&other.as_z3(ctx))),
        }
    }

    /// Greater or equal
    pub fn ge(&self, other: &Self, ctx: &'ctx Context) -> SpexBool<'ctx> {
        match (self, other) {
            (Self::Concrete(a), Self::Concrete(b)) => SpexBool::Concrete(a >= b),
            _ => SpexBool::from_z3(self.as_z3(ctx).ge(&other.as_z3(ctx))),
        }
    }

    /// Equality
    pub fn eq(&self, other: &Self, ctx: &'ctx Context) -> SpexBool<'ctx> {
        match (self, other) {
            (Self::Concrete(a), Self::Concrete(b)) => SpexBool::Concrete(a == b),
            _ => SpexBool::from_z3(self.as_z3(ctx)._eq(&other.as_z3(ctx))),
        }
    }

    /// Disequality
    pub fn ne(&self, other: &Self, ctx: &'ctx Context) -> SpexBool<'ctx> {
        self.eq(other, ctx).not()
    }
}

impl<'ctx> fmt::Debug for SpexInt<'ctx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Concrete(v) => write!(f, "Int({})", v),
            Self::Symbolic(term) => write!(f, "Int({})", term),
        }
    }
}
