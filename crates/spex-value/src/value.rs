// SPDX-License-Identifier: AGPL-3.0

//! The typed symbolic value.
//!
//! Every value carries its [`Sort`] (invariant: sort-respecting operations
//! produce values of the result sort). Constant kinds are deeply immutable;
//! struct and map kinds are lvalues over a shared compound cell with
//! copy-on-assign snapshots.

use spex_exceptions::{SpexException, SpexResult};
use z3::ast::{Array, Ast, Bool as Z3Bool, Dynamic};
use z3::Context;

use crate::compound::{Compound, Lvalue};
use crate::scalar::{SpexBool, SpexInt};
use crate::sort::{Sort, SortCache};

/// The runtime representation behind a [`SpexValue`].
#[derive(Debug, Clone)]
pub enum ValueKind<'ctx> {
    Int(SpexInt<'ctx>),
    Bool(SpexBool<'ctx>),
    Enum(Dynamic<'ctx>),
    Uninterp(Dynamic<'ctx>),
    ConstMap(Array<'ctx>),
    Struct(Lvalue<'ctx>),
    Map(Lvalue<'ctx>),
}

/// A typed symbolic value.
#[derive(Debug, Clone)]
pub struct SpexValue<'ctx> {
    sort: Sort,
    kind: ValueKind<'ctx>,
}

impl<'ctx> SpexValue<'ctx> {
    pub fn from_int(value: SpexInt<'ctx>) -> Self {
        Self {
            sort: Sort::Int,
            kind: ValueKind::Int(value),
        }
    }

    pub fn from_bool(value: SpexBool<'ctx>) -> Self {
        Self {
            sort: Sort::Bool,
            kind: ValueKind::Bool(value),
        }
    }

    pub fn from_i64(value: i64) -> Self {
        Self::from_int(SpexInt::from_i64(value))
    }

    /// Wrap a single Z3 term as a value of a non-compound sort.
    pub fn wrap_leaf(sort: &Sort, term: Dynamic<'ctx>) -> SpexResult<Self> {
        let kind = match sort.resolve() {
            Sort::Int => {
                let int = term.as_int().ok_or_else(|| {
                    SpexException::TypeMismatch(format!("expected an Int term, got {}", term))
                })?;
                ValueKind::Int(SpexInt::from_z3(int))
            }
            Sort::Bool => {
                let boolean = term.as_bool().ok_or_else(|| {
                    SpexException::TypeMismatch(format!("expected a Bool term, got {}", term))
                })?;
                ValueKind::Bool(SpexBool::from_z3(boolean))
            }
            Sort::Enum { .. } => ValueKind::Enum(term),
            Sort::Uninterpreted(_) => ValueKind::Uninterp(term),
            Sort::ConstMap { .. } => {
                let array = term.as_array().ok_or_else(|| {
                    SpexException::TypeMismatch(format!("expected an array term, got {}", term))
                })?;
                ValueKind::ConstMap(array)
            }
            Sort::Struct { .. } | Sort::Map { .. } => {
                return Err(SpexException::Internal(
                    "compound sort cannot wrap a single term".to_string(),
                ))
            }
            Sort::Synonym { .. } => unreachable!("resolve() peels synonyms"),
        };
        Ok(Self {
            sort: sort.clone(),
            kind,
        })
    }

    /// Wrap an lvalue handle as a value of the given sort. Non-compound sorts
    /// fetch their current term immediately instead of staying lvalues.
    pub fn wrap_lvalue(sort: &Sort, lvalue: Lvalue<'ctx>) -> SpexResult<Self> {
        match sort.resolve() {
            Sort::Struct { .. } => Ok(Self {
                sort: sort.clone(),
                kind: ValueKind::Struct(lvalue),
            }),
            Sort::Map { .. } => Ok(Self {
                sort: sort.clone(),
                kind: ValueKind::Map(lvalue),
            }),
            _ => {
                let term = lvalue.get()?.leaf()?.clone();
                Self::wrap_leaf(sort, term)
            }
        }
    }

    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    pub fn kind(&self) -> &ValueKind<'ctx> {
        &self.kind
    }

    /// The same value viewed at a different sort (used to peel synonyms).
    pub(crate) fn with_sort(&self, sort: Sort) -> Self {
        Self {
            sort,
            kind: self.kind.clone(),
        }
    }

    pub fn as_int(&self) -> SpexResult<SpexInt<'ctx>> {
        match &self.kind {
            ValueKind::Int(value) => Ok(value.clone()),
            _ => Err(SpexException::TypeMismatch(format!(
                "{} is not an integer value",
                self.sort
            ))),
        }
    }

    pub fn as_bool(&self) -> SpexResult<SpexBool<'ctx>> {
        match &self.kind {
            ValueKind::Bool(value) => Ok(value.clone()),
            _ => Err(SpexException::TypeMismatch(format!(
                "{} is not a boolean value",
                self.sort
            ))),
        }
    }

    /// The single Z3 term of a constant value.
    pub fn to_dynamic(&self, ctx: &'ctx Context) -> SpexResult<Dynamic<'ctx>> {
        match &self.kind {
            ValueKind::Int(value) => Ok(Dynamic::from_ast(&value.as_z3(ctx))),
            ValueKind::Bool(value) => Ok(Dynamic::from_ast(&value.as_z3(ctx))),
            ValueKind::Enum(term) | ValueKind::Uninterp(term) => Ok(term.clone()),
            ValueKind::ConstMap(array) => Ok(Dynamic::from_ast(array)),
            ValueKind::Struct(_) | ValueKind::Map(_) => Err(SpexException::NotConcrete(format!(
                "{} is a compound value, not a single term",
                self.sort
            ))),
        }
    }

    /// The current compound Z3 value.
    pub fn to_compound(&self, ctx: &'ctx Context) -> SpexResult<Compound<'ctx>> {
        match &self.kind {
            ValueKind::Struct(lvalue) | ValueKind::Map(lvalue) => lvalue.get(),
            _ => Ok(Compound::Leaf(self.to_dynamic(ctx)?)),
        }
    }

    /// All leaf terms in declared field order.
    pub fn flatten(&self, ctx: &'ctx Context) -> SpexResult<Vec<Dynamic<'ctx>>> {
        Ok(self.to_compound(ctx)?.flatten())
    }

    /// Copy-on-assign: an independent value capturing the current state.
    /// Constants are shared (they are immutable); lvalues get a fresh cell.
    pub fn snapshot(&self) -> SpexResult<Self> {
        let kind = match &self.kind {
            ValueKind::Struct(lvalue) => ValueKind::Struct(lvalue.snapshot()?),
            ValueKind::Map(lvalue) => ValueKind::Map(lvalue.snapshot()?),
            other => other.clone(),
        };
        Ok(Self {
            sort: self.sort.clone(),
            kind,
        })
    }

    fn struct_field_sort(&self, name: &str) -> SpexResult<Sort> {
        match self.sort.resolve() {
            Sort::Struct { fields } => fields
                .iter()
                .find(|(field, _)| field == name)
                .map(|(_, sort)| sort.clone())
                .ok_or_else(|| {
                    SpexException::TypeMismatch(format!(
                        "{} has no field {}",
                        self.sort, name
                    ))
                }),
            _ => Err(SpexException::TypeMismatch(format!(
                "{} is not a struct sort",
                self.sort
            ))),
        }
    }

    /// Read a struct field. The result is a view into the same cell: writes
    /// through it are visible through `self`.
    pub fn field(&self, name: &str) -> SpexResult<Self> {
        let field_sort = self.struct_field_sort(name)?;
        match &self.kind {
            ValueKind::Struct(lvalue) => {
                Self::wrap_lvalue(&field_sort, lvalue.child_field(name))
            }
            _ => Err(SpexException::TypeMismatch(format!(
                "field access on non-struct value of sort {}",
                self.sort
            ))),
        }
    }

    /// Write a struct field.
    pub fn set_field(
        &self,
        name: &str,
        value: &SpexValue<'ctx>,
        ctx: &'ctx Context,
    ) -> SpexResult<()> {
        let field_sort = self.struct_field_sort(name)?;
        if field_sort.resolve() != value.sort.resolve() {
            return Err(SpexException::TypeMismatch(format!(
                "cannot store {} into field {} of sort {}",
                value.sort, name, field_sort
            )));
        }
        match &self.kind {
            ValueKind::Struct(lvalue) => {
                lvalue.child_field(name).set(value.to_compound(ctx)?)
            }
            _ => Err(SpexException::TypeMismatch(format!(
                "field update on non-struct value of sort {}",
                self.sort
            ))),
        }
    }

    fn map_sorts(&self) -> SpexResult<(Sort, Sort)> {
        match self.sort.resolve() {
            Sort::Map { index, value } | Sort::ConstMap { index, value } => {
                Ok((*index.clone(), *value.clone()))
            }
            _ => Err(SpexException::TypeMismatch(format!(
                "{} is not a map sort",
                self.sort
            ))),
        }
    }

    /// Read the element at `index`.
    pub fn load(&self, index: &SpexValue<'ctx>, ctx: &'ctx Context) -> SpexResult<Self> {
        let (_, value_sort) = self.map_sorts()?;
        let index_term = index.to_dynamic(ctx)?;
        match &self.kind {
            ValueKind::Map(lvalue) => {
                Self::wrap_lvalue(&value_sort, lvalue.child_select(index_term))
            }
            ValueKind::ConstMap(array) => {
                Self::wrap_leaf(&value_sort, array.select(&index_term))
            }
            _ => Err(SpexException::TypeMismatch(format!(
                "indexing non-map value of sort {}",
                self.sort
            ))),
        }
    }

    /// Write the element at `index` in place (mutable maps only).
    pub fn store(
        &self,
        index: &SpexValue<'ctx>,
        value: &SpexValue<'ctx>,
        ctx: &'ctx Context,
    ) -> SpexResult<()> {
        let (_, value_sort) = self.map_sorts()?;
        if value_sort.resolve() != value.sort.resolve() {
            return Err(SpexException::TypeMismatch(format!(
                "cannot store {} into map with value sort {}",
                value.sort, value_sort
            )));
        }
        match &self.kind {
            ValueKind::Map(lvalue) => lvalue
                .child_select(index.to_dynamic(ctx)?)
                .set(value.to_compound(ctx)?),
            ValueKind::ConstMap(_) => Err(SpexException::TypeMismatch(
                "const-map is immutable; use store_value".to_string(),
            )),
            _ => Err(SpexException::TypeMismatch(format!(
                "indexing non-map value of sort {}",
                self.sort
            ))),
        }
    }

    /// Functional store (const maps): a fresh map identical to this one
    /// except at `index`.
    pub fn store_value(
        &self,
        index: &SpexValue<'ctx>,
        value: &SpexValue<'ctx>,
        ctx: &'ctx Context,
    ) -> SpexResult<Self> {
        match &self.kind {
            ValueKind::ConstMap(array) => {
                let updated = array.store(&index.to_dynamic(ctx)?, &value.to_dynamic(ctx)?);
                Ok(Self {
                    sort: self.sort.clone(),
                    kind: ValueKind::ConstMap(updated),
                })
            }
            _ => Err(SpexException::TypeMismatch(format!(
                "store_value on non-const-map value of sort {}",
                self.sort
            ))),
        }
    }

    /// Value equality. Compounds flatten to their leaves in declared field
    /// order and compare pointwise.
    pub fn eq_value(&self, other: &SpexValue<'ctx>, ctx: &'ctx Context) -> SpexResult<SpexBool<'ctx>> {
        match (&self.kind, &other.kind) {
            (ValueKind::Int(a), ValueKind::Int(b)) => Ok(a.eq(b, ctx)),
            (ValueKind::Bool(a), ValueKind::Bool(b)) => Ok(a.eq(b, ctx)),
            (ValueKind::Enum(a), ValueKind::Enum(b))
            | (ValueKind::Uninterp(a), ValueKind::Uninterp(b)) => {
                self.require_same_sort(other)?;
                Ok(SpexBool::from_z3(a._eq(b)))
            }
            (ValueKind::ConstMap(a), ValueKind::ConstMap(b)) => {
                self.require_same_sort(other)?;
                Ok(SpexBool::from_z3(a._eq(b)))
            }
            (ValueKind::Struct(_), ValueKind::Struct(_))
            | (ValueKind::Map(_), ValueKind::Map(_)) => {
                self.require_same_sort(other)?;
                let lhs = self.flatten(ctx)?;
                let rhs = other.flatten(ctx)?;
                if lhs.len() != rhs.len() {
                    return Err(SpexException::Internal(
                        "compound shape mismatch in equality".to_string(),
                    ));
                }
                let pointwise: Vec<Z3Bool<'ctx>> = lhs
                    .iter()
                    .zip(rhs.iter())
                    .map(|(a, b)| a._eq(b))
                    .collect();
                let refs: Vec<&Z3Bool<'ctx>> = pointwise.iter().collect();
                Ok(SpexBool::from_z3(Z3Bool::and(ctx, &refs)))
            }
            _ => Err(SpexException::TypeMismatch(format!(
                "cannot compare {} with {}",
                self.sort, other.sort
            ))),
        }
    }

    /// Value disequality: the negation of [`SpexValue::eq_value`].
    pub fn ne_value(&self, other: &SpexValue<'ctx>, ctx: &'ctx Context) -> SpexResult<SpexBool<'ctx>> {
        Ok(self.eq_value(other, ctx)?.not())
    }

    fn require_same_sort(&self, other: &SpexValue<'ctx>) -> SpexResult<()> {
        if self.sort.resolve() != other.sort.resolve() {
            return Err(SpexException::TypeMismatch(format!(
                "cannot compare {} with {}",
                self.sort, other.sort
            )));
        }
        Ok(())
    }
}

/// A map (or const-map) where every key initially maps to `value`.
pub fn const_map<'ctx>(
    cache: &SortCache<'ctx>,
    sort: &Sort,
    value: &SpexValue<'ctx>,
) -> SpexResult<SpexValue<'ctx>> {
    let ctx = cache.ctx();
    match sort.resolve() {
        Sort::ConstMap { index, value: value_sort } => {
            if value_sort.resolve() != value.sort().resolve() {
                return Err(SpexException::TypeMismatch(format!(
                    "const-map of {} initialized with {}",
                    value_sort,
                    value.sort()
                )));
            }
            let domain = cache.lower_leaf(index);
            let array = Array::const_array(ctx, &domain, &value.to_dynamic(ctx)?);
            SpexValue::wrap_leaf(sort, Dynamic::from_ast(&array))
        }
        Sort::Map { index, value: value_sort } => {
            if value_sort.resolve() != value.sort().resolve() {
                return Err(SpexException::TypeMismatch(format!(
                    "map of {} initialized with {}",
                    value_sort,
                    value.sort()
                )));
            }
            let domain = cache.lower_leaf(index);
            let compound = value.to_compound(ctx)?.try_map(&mut |leaf| {
                Ok(Dynamic::from_ast(&Array::const_array(ctx, &domain, leaf)))
            })?;
            SpexValue::wrap_lvalue(sort, Lvalue::new_root(compound))
        }
        other => Err(SpexException::TypeMismatch(format!(
            "{} is not a map sort",
            other
        ))),
    }
}

/// The engine operations the assumption-declaration protocol needs: bare
/// constants to bind under quantifiers, and asserting a condition on the
/// current path.
pub trait AssumeHost<'ctx> {
    /// A fresh constant of the given sort used only as a quantifier binder.
    /// Implementations must create it bare: the assumption protocol must
    /// NOT run on it (its only occurrences are bound inside the quantified
    /// condition; asserting its invariants separately would leak an
    /// unquantified constraint about a throwaway constant into the path).
    fn fresh_binder(&mut self, sort: &Sort) -> SpexResult<SpexValue<'ctx>>;
    fn assume_bool(&mut self, cond: SpexBool<'ctx>) -> SpexResult<()>;
}

/// Run the assumption-declaration protocol for a fresh lvalue.
///
/// Synonym invariants are assumed for the value itself; struct fields
/// recurse; a map element's assumptions are bound under a universal
/// quantifier over a fresh index binder.
pub fn declare_assumptions<'ctx>(
    ctx: &'ctx Context,
    value: &SpexValue<'ctx>,
    host: &mut dyn AssumeHost<'ctx>,
) -> SpexResult<()> {
    let mut binders: Vec<Dynamic<'ctx>> = Vec::new();
    declare_rec(ctx, value, &mut binders, host)
}

fn declare_rec<'ctx>(
    ctx: &'ctx Context,
    value: &SpexValue<'ctx>,
    binders: &mut Vec<Dynamic<'ctx>>,
    host: &mut dyn AssumeHost<'ctx>,
) -> SpexResult<()> {
    match value.sort().clone() {
        Sort::Synonym { base, invariant, .. } => {
            if let Some(invariant) = invariant {
                let cond = invariant(value);
                assume_under_binders(ctx, cond, binders, host)?;
            }
            let base_view = value.with_sort(*base);
            declare_rec(ctx, &base_view, binders, host)
        }
        Sort::Struct { fields } => {
            for (name, _) in &fields {
                let field = value.field(name)?;
                declare_rec(ctx, &field, binders, host)?;
            }
            Ok(())
        }
        Sort::Map { index, .. } => {
            let index_var = host.fresh_binder(&index)?;
            let element = value.load(&index_var, ctx)?;
            binders.push(index_var.to_dynamic(ctx)?);
            let result = declare_rec(ctx, &element, binders, host);
            binders.pop();
            result
        }
        _ => Ok(()),
    }
}

fn assume_under_binders<'ctx>(
    ctx: &'ctx Context,
    cond: SpexBool<'ctx>,
    binders: &[Dynamic<'ctx>],
    host: &mut dyn AssumeHost<'ctx>,
) -> SpexResult<()> {
    if binders.is_empty() {
        return host.assume_bool(cond);
    }
    let bound: Vec<&Dynamic<'ctx>> = binders.iter().collect();
    host.assume_bool(crate::logic::forall(ctx, &bound, &[], &cond))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compound::Compound;
    use z3::ast::Int as Z3Int;
    use z3::{Config, Context};

    fn fresh_struct<'ctx>(ctx: &'ctx Context, sort: &Sort, name: &str) -> SpexValue<'ctx> {
        // Build the compound by hand the way the engine does
        let fields = match sort.resolve() {
            Sort::Struct { fields } => fields.clone(),
            _ => panic!("not a struct"),
        };
        let mut compound = indexmap::IndexMap::new();
        for (fname, _) in &fields {
            let leaf = Z3Int::new_const(ctx, format!("{}.{}", name, fname).as_str());
            compound.insert(fname.clone(), Compound::Leaf(Dynamic::from_ast(&leaf)));
        }
        SpexValue::wrap_lvalue(sort, Lvalue::new_root(Compound::Fields(compound))).unwrap()
    }

    fn pair_sort() -> Sort {
        Sort::structure(vec![("a", Sort::int()), ("b", Sort::int())])
    }

    #[test]
    fn test_field_read_write() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let sort = pair_sort();
        let s = fresh_struct(&ctx, &sort, "s");

        let a = s.field("a").unwrap();
        assert_eq!(a.sort(), &Sort::Int);

        s.set_field("a", &SpexValue::from_i64(0), &ctx).unwrap();
        let a_after = s.field("a").unwrap();
        assert_eq!(a_after.as_int().unwrap().as_i64().unwrap(), 0);

        assert!(s.field("missing").is_err());
        assert!(s
            .set_field("a", &SpexValue::from_bool(SpexBool::from_bool(true)), &ctx)
            .is_err());
    }

    #[test]
    fn test_snapshot_is_copy_on_assign() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let sort = pair_sort();
        let s = fresh_struct(&ctx, &sort, "s");

        let t = s.snapshot().unwrap();
        t.set_field("a", &SpexValue::from_i64(0), &ctx).unwrap();

        // s.a is still the original constant
        let s_a = s.field("a").unwrap();
        assert!(s_a.as_int().unwrap().is_symbolic());
        let t_a = t.field("a").unwrap();
        assert_eq!(t_a.as_int().unwrap().as_i64().unwrap(), 0);
    }

    #[test]
    fn test_struct_equality_flattens_pointwise() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let sort = pair_sort();
        let s = fresh_struct(&ctx, &sort, "s");

        // A value equals its own snapshot before any mutation
        let t = s.snapshot().unwrap();
        let eq = s.eq_value(&t, &ctx).unwrap();
        assert!(eq.as_bool().unwrap());

        // After mutating the snapshot the equality becomes a symbolic term
        t.set_field("a", &SpexValue::from_i64(7), &ctx).unwrap();
        let eq = s.eq_value(&t, &ctx).unwrap();
        assert!(eq.is_symbolic());
    }

    #[test]
    fn test_sort_mismatch_in_equality() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let s = fresh_struct(&ctx, &pair_sort(), "s");
        let other = fresh_struct(
            &ctx,
            &Sort::structure(vec![("x", Sort::int())]),
            "other",
        );
        assert!(s.eq_value(&other, &ctx).is_err());
    }

    #[test]
    fn test_const_map_store_is_functional() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let cache = SortCache::new(&ctx);

        let sort = Sort::const_map(Sort::int(), Sort::int());
        let m = const_map(&cache, &sort, &SpexValue::from_i64(0)).unwrap();

        let idx = SpexValue::from_i64(1);
        let m2 = m
            .store_value(&idx, &SpexValue::from_i64(5), &ctx)
            .unwrap();

        // The original map still reads 0 at index 1
        let original = m.load(&idx, &ctx).unwrap();
        assert_eq!(original.as_int().unwrap().as_i64().unwrap(), 0);
        let updated = m2.load(&idx, &ctx).unwrap();
        assert_eq!(updated.as_int().unwrap().as_i64().unwrap(), 5);

        // In-place store is rejected for const maps
        assert!(m.store(&idx, &SpexValue::from_i64(9), &ctx).is_err());
    }

    #[test]
    fn test_mutable_map_const_val_and_store() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let cache = SortCache::new(&ctx);

        let sort = Sort::map(Sort::int(), Sort::int());
        let m = const_map(&cache, &sort, &SpexValue::from_i64(0)).unwrap();

        let one = SpexValue::from_i64(1);
        m.store(&one, &SpexValue::from_i64(5), &ctx).unwrap();

        let read = m.load(&one, &ctx).unwrap();
        assert_eq!(read.as_int().unwrap().as_i64().unwrap(), 5);

        let two = SpexValue::from_i64(2);
        let untouched = m.load(&two, &ctx).unwrap();
        assert_eq!(untouched.as_int().unwrap().as_i64().unwrap(), 0);
    }

    #[test]
    fn test_map_of_struct_element_access() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let cache = SortCache::new(&ctx);

        let sort = Sort::map(Sort::int(), pair_sort());
        let init = fresh_struct(&ctx, &pair_sort(), "init");
        let m = const_map(&cache, &sort, &init).unwrap();

        let elem = m.load(&SpexValue::from_i64(3), &ctx).unwrap();
        let a = elem.field("a").unwrap();
        assert!(a.as_int().is_ok());

        // Writing through the element handle updates the map
        elem.set_field("a", &SpexValue::from_i64(9), &ctx).unwrap();
        let again = m
            .load(&SpexValue::from_i64(3), &ctx)
            .unwrap()
            .field("a")
            .unwrap();
        assert_eq!(again.as_int().unwrap().as_i64().unwrap(), 9);
    }

    #[test]
    fn test_declare_assumptions_invariant_plain_and_quantified() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let cache = SortCache::new(&ctx);

        fn non_negative<'ctx>(value: &SpexValue<'ctx>) -> SpexBool<'ctx> {
            let int = value.as_int().expect("invariant sort is int-based");
            let term = match int {
                SpexInt::Symbolic(term) => term,
                SpexInt::Concrete(v) => return SpexBool::from_bool(v >= 0),
            };
            SpexBool::from_z3(term.ge(&Z3Int::from_i64(term.get_ctx(), 0)))
        }

        struct Recorder<'ctx> {
            ctx: &'ctx Context,
            counter: usize,
            seen: Vec<String>,
        }

        impl<'ctx> AssumeHost<'ctx> for Recorder<'ctx> {
            fn fresh_binder(&mut self, sort: &Sort) -> SpexResult<SpexValue<'ctx>> {
                self.counter += 1;
                let name = format!("anon{}", self.counter);
                let leaf = Z3Int::new_const(self.ctx, name.as_str());
                SpexValue::wrap_leaf(sort, Dynamic::from_ast(&leaf))
            }

            fn assume_bool(&mut self, cond: SpexBool<'ctx>) -> SpexResult<()> {
                self.seen.push(format!("{:?}", cond));
                Ok(())
            }
        }

        let nat = Sort::synonym_with_invariant("Nat", Sort::int(), non_negative);

        // Plain value: assumption arrives unquantified
        let value =
            SpexValue::wrap_leaf(&nat, Dynamic::from_ast(&Z3Int::new_const(&ctx, "n"))).unwrap();
        let mut host = Recorder {
            ctx: &ctx,
            counter: 0,
            seen: Vec::new(),
        };
        declare_assumptions(&ctx, &value, &mut host).unwrap();
        assert_eq!(host.seen.len(), 1);
        assert!(host.seen[0].contains(">="));

        // Map of Nat: assumption arrives under a forall
        let map_sort = Sort::map(Sort::int(), nat.clone());
        let m = const_map(&cache, &map_sort, &value).unwrap();
        let mut host = Recorder {
            ctx: &ctx,
            counter: 0,
            seen: Vec::new(),
        };
        declare_assumptions(&ctx, &m, &mut host).unwrap();
        assert_eq!(host.seen.len(), 1);
        assert!(host.seen[0].contains("forall"));
    }
}
