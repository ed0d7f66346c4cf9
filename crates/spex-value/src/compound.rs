// SPDX-License-Identifier: AGPL-3.0

//! Compound value trees and lvalue cells.
//!
//! A compound is a tree whose interior nodes are named fields and whose
//! leaves are Z3 terms (primitives or whole arrays). Mutable symbolic values
//! hold a shared cell containing their current compound; an [`Lvalue`] is a
//! projection path into such a cell. Reads project through the path, writes
//! rebuild the compound along it, and assignment snapshots the source into a
//! fresh cell.

use indexmap::IndexMap;
use spex_exceptions::{SpexException, SpexResult};
use std::cell::RefCell;
use std::rc::Rc;
use z3::ast::Dynamic;

/// A tree of Z3 terms shaped like the value's sort lowering.
#[derive(Debug, Clone)]
pub enum Compound<'ctx> {
    Leaf(Dynamic<'ctx>),
    Fields(IndexMap<String, Compound<'ctx>>),
}

impl<'ctx> Compound<'ctx> {
    /// The single term of a non-compound value.
    pub fn leaf(&self) -> SpexResult<&Dynamic<'ctx>> {
        match self {
            Compound::Leaf(term) => Ok(term),
            Compound::Fields(_) => Err(SpexException::Internal(
                "expected a leaf, found a field tree".to_string(),
            )),
        }
    }

    /// Project a named field.
    pub fn field(&self, name: &str) -> SpexResult<&Compound<'ctx>> {
        match self {
            Compound::Fields(fields) => fields.get(name).ok_or_else(|| {
                SpexException::TypeMismatch(format!("unknown struct field {}", name))
            }),
            Compound::Leaf(_) => Err(SpexException::TypeMismatch(
                "field access on a non-struct value".to_string(),
            )),
        }
    }

    /// A copy of this compound with one field replaced.
    pub fn with_field(&self, name: &str, value: Compound<'ctx>) -> SpexResult<Compound<'ctx>> {
        match self {
            Compound::Fields(fields) => {
                if !fields.contains_key(name) {
                    return Err(SpexException::TypeMismatch(format!(
                        "unknown struct field {}",
                        name
                    )));
                }
                let mut copy = fields.clone();
                copy.insert(name.to_string(), value);
                Ok(Compound::Fields(copy))
            }
            Compound::Leaf(_) => Err(SpexException::TypeMismatch(
                "field update on a non-struct value".to_string(),
            )),
        }
    }

    /// Apply `f` to every leaf, preserving the shape.
    pub fn try_map(
        &self,
        f: &mut dyn FnMut(&Dynamic<'ctx>) -> SpexResult<Dynamic<'ctx>>,
    ) -> SpexResult<Compound<'ctx>> {
        match self {
            Compound::Leaf(term) => Ok(Compound::Leaf(f(term)?)),
            Compound::Fields(fields) => {
                let mut mapped = IndexMap::new();
                for (name, sub) in fields {
                    mapped.insert(name.clone(), sub.try_map(f)?);
                }
                Ok(Compound::Fields(mapped))
            }
        }
    }

    /// Apply `f` pointwise to the leaves of two same-shaped compounds.
    pub fn try_zip(
        &self,
        other: &Compound<'ctx>,
        f: &mut dyn FnMut(&Dynamic<'ctx>, &Dynamic<'ctx>) -> SpexResult<Dynamic<'ctx>>,
    ) -> SpexResult<Compound<'ctx>> {
        match (self, other) {
            (Compound::Leaf(a), Compound::Leaf(b)) => Ok(Compound::Leaf(f(a, b)?)),
            (Compound::Fields(af), Compound::Fields(bf)) if af.len() == bf.len() => {
                let mut zipped = IndexMap::new();
                for (name, a_sub) in af {
                    let b_sub = bf.get(name).ok_or_else(|| {
                        SpexException::Internal("compound shape mismatch".to_string())
                    })?;
                    zipped.insert(name.clone(), a_sub.try_zip(b_sub, f)?);
                }
                Ok(Compound::Fields(zipped))
            }
            _ => Err(SpexException::Internal(
                "compound shape mismatch".to_string(),
            )),
        }
    }

    /// All leaves in declared field order.
    pub fn flatten(&self) -> Vec<Dynamic<'ctx>> {
        let mut leaves = Vec::new();
        self.flatten_into(&mut leaves);
        leaves
    }

    fn flatten_into(&self, out: &mut Vec<Dynamic<'ctx>>) {
        match self {
            Compound::Leaf(term) => out.push(term.clone()),
            Compound::Fields(fields) => {
                for sub in fields.values() {
                    sub.flatten_into(out);
                }
            }
        }
    }
}

/// One projection step of an lvalue path.
#[derive(Debug, Clone)]
pub enum Step<'ctx> {
    /// Descend into a struct field.
    Field(String),
    /// Select a map element at the given index term.
    Select(Dynamic<'ctx>),
}

/// A handle into a shared compound cell.
///
/// Child handles share the parent's cell, so writes through a field or
/// element handle are visible through the parent. [`Lvalue::snapshot`] is the
/// copy-on-assign point: it captures the current compound into a fresh cell,
/// after which the two handles evolve independently.
#[derive(Debug, Clone)]
pub struct Lvalue<'ctx> {
    root: Rc<RefCell<Compound<'ctx>>>,
    path: Vec<Step<'ctx>>,
}

impl<'ctx> Lvalue<'ctx> {
    pub fn new_root(init: Compound<'ctx>) -> Self {
        Self {
            root: Rc::new(RefCell::new(init)),
            path: Vec::new(),
        }
    }

    /// The current compound at this handle's position.
    pub fn get(&self) -> SpexResult<Compound<'ctx>> {
        let root = self.root.borrow();
        project(&root, &self.path)
    }

    /// Replace the compound at this handle's position, writing back through
    /// every enclosing field and map level.
    pub fn set(&self, value: Compound<'ctx>) -> SpexResult<()> {
        let updated = {
            let root = self.root.borrow();
            write(&root, &self.path, &value)?
        };
        *self.root.borrow_mut() = updated;
        Ok(())
    }

    pub fn child_field(&self, name: &str) -> Lvalue<'ctx> {
        let mut path = self.path.clone();
        path.push(Step::Field(name.to_string()));
        Lvalue {
            root: Rc::clone(&self.root),
            path,
        }
    }

    pub fn child_select(&self, index: Dynamic<'ctx>) -> Lvalue<'ctx> {
        let mut path = self.path.clone();
        path.push(Step::Select(index));
        Lvalue {
            root: Rc::clone(&self.root),
            path,
        }
    }

    /// Copy-on-assign: capture the current value into an independent cell.
    pub fn snapshot(&self) -> SpexResult<Lvalue<'ctx>> {
        Ok(Lvalue::new_root(self.get()?))
    }
}

fn select_leaf<'ctx>(leaf: &Dynamic<'ctx>, index: &Dynamic<'ctx>) -> SpexResult<Dynamic<'ctx>> {
    let array = leaf
        .as_array()
        .ok_or_else(|| SpexException::TypeMismatch("select on a non-array term".to_string()))?;
    Ok(array.select(index))
}

fn store_leaf<'ctx>(
    leaf: &Dynamic<'ctx>,
    index: &Dynamic<'ctx>,
    value: &Dynamic<'ctx>,
) -> SpexResult<Dynamic<'ctx>> {
    let array = leaf
        .as_array()
        .ok_or_else(|| SpexException::TypeMismatch("store on a non-array term".to_string()))?;
    Ok(Dynamic::from_ast(&array.store(index, value)))
}

fn project<'ctx>(current: &Compound<'ctx>, path: &[Step<'ctx>]) -> SpexResult<Compound<'ctx>> {
    match path.split_first() {
        None => Ok(current.clone()),
        Some((Step::Field(name), rest)) => project(current.field(name)?, rest),
        Some((Step::Select(index), rest)) => {
            let selected = current.try_map(&mut |leaf| select_leaf(leaf, index))?;
            project(&selected, rest)
        }
    }
}

fn write<'ctx>(
    current: &Compound<'ctx>,
    path: &[Step<'ctx>],
    value: &Compound<'ctx>,
) -> SpexResult<Compound<'ctx>> {
    match path.split_first() {
        None => Ok(value.clone()),
        Some((Step::Field(name), rest)) => {
            let updated = write(current.field(name)?, rest, value)?;
            current.with_field(name, updated)
        }
        Some((Step::Select(index), rest)) => {
            let selected = current.try_map(&mut |leaf| select_leaf(leaf, index))?;
            let updated = write(&selected, rest, value)?;
            current.try_zip(&updated, &mut |array, element| {
                store_leaf(array, index, element)
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use z3::ast::{Ast, Int};
    use z3::{Config, Context};

    fn int_leaf<'ctx>(ctx: &'ctx Context, name: &str) -> Compound<'ctx> {
        Compound::Leaf(Dynamic::from_ast(&Int::new_const(ctx, name)))
    }

    fn pair<'ctx>(ctx: &'ctx Context) -> Compound<'ctx> {
        let mut fields = IndexMap::new();
        fields.insert("a".to_string(), int_leaf(ctx, "a"));
        fields.insert("b".to_string(), int_leaf(ctx, "b"));
        Compound::Fields(fields)
    }

    #[test]
    fn test_flatten_preserves_declared_order() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let compound = pair(&ctx);

        let leaves = compound.flatten();
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves[0].to_string(), "a");
        assert_eq!(leaves[1].to_string(), "b");
    }

    #[test]
    fn test_field_read_and_update() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let compound = pair(&ctx);

        assert_eq!(compound.field("a").unwrap().leaf().unwrap().to_string(), "a");
        assert!(compound.field("missing").is_err());

        let updated = compound
            .with_field("a", int_leaf(&ctx, "fresh"))
            .unwrap();
        assert_eq!(
            updated.field("a").unwrap().leaf().unwrap().to_string(),
            "fresh"
        );
        // Original untouched
        assert_eq!(compound.field("a").unwrap().leaf().unwrap().to_string(), "a");
    }

    #[test]
    fn test_lvalue_field_write_reaches_parent() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let root = Lvalue::new_root(pair(&ctx));

        let a = root.child_field("a");
        a.set(int_leaf(&ctx, "changed")).unwrap();

        let current = root.get().unwrap();
        assert_eq!(
            current.field("a").unwrap().leaf().unwrap().to_string(),
            "changed"
        );
        assert_eq!(current.field("b").unwrap().leaf().unwrap().to_string(), "b");
    }

    #[test]
    fn test_snapshot_isolates_handles() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let original = Lvalue::new_root(pair(&ctx));
        let copy = original.snapshot().unwrap();

        original
            .child_field("a")
            .set(int_leaf(&ctx, "mutated"))
            .unwrap();

        let copied = copy.get().unwrap();
        assert_eq!(copied.field("a").unwrap().leaf().unwrap().to_string(), "a");
    }

    #[test]
    fn test_select_and_store_through_path() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);

        let int_sort = z3::Sort::int(&ctx);
        let array = z3::ast::Array::new_const(&ctx, "m", &int_sort, &int_sort);
        let root = Lvalue::new_root(Compound::Leaf(Dynamic::from_ast(&array)));

        let idx = Dynamic::from_ast(&Int::from_i64(&ctx, 1));
        let element = root.child_select(idx.clone());

        let read = element.get().unwrap();
        assert!(read.leaf().unwrap().to_string().contains("select"));

        element
            .set(Compound::Leaf(Dynamic::from_ast(&Int::from_i64(&ctx, 5))))
            .unwrap();
        let stored = root.get().unwrap();
        assert!(stored.leaf().unwrap().to_string().contains("store"));

        // Reading back at the same index simplifies to the stored value
        let read_back = element.get().unwrap();
        let simplified = read_back.leaf().unwrap().simplify();
        assert_eq!(simplified.as_int().unwrap().as_i64(), Some(5));
    }
}
