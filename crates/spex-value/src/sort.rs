// SPDX-License-Identifier: AGPL-3.0

//! Sort descriptors and their lowering to Z3 sorts.
//!
//! A [`Sort`] is the static type of a symbolic value: primitive kinds,
//! enumerations, uninterpreted sorts, maps, const-maps, struct shapes and
//! synonyms. Sorts are context-free descriptors; [`SortCache`] lowers them to
//! Z3 sorts for one context, memoizing the declarations that Z3 must see
//! exactly once per name.

use indexmap::IndexMap;
use spex_exceptions::{SpexException, SpexResult};
use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use z3::ast::Dynamic;
use z3::{Context, FuncDecl, Symbol};

use crate::scalar::SpexBool;
use crate::value::SpexValue;

/// A well-formedness invariant attached to a synonym sort. Fresh lvalues of
/// the sort assume the returned condition; for map elements the engine binds
/// it under a universal quantifier over the map index.
pub type Invariant = for<'ctx> fn(&SpexValue<'ctx>) -> SpexBool<'ctx>;

/// The static type descriptor of a symbolic value.
#[derive(Debug, Clone)]
pub enum Sort {
    Int,
    Bool,
    Uninterpreted(String),
    Enum {
        name: String,
        variants: Vec<String>,
    },
    /// Immutable functional map; `store` returns a fresh value.
    ConstMap {
        index: Box<Sort>,
        value: Box<Sort>,
    },
    /// Mutable map with lvalue semantics.
    Map {
        index: Box<Sort>,
        value: Box<Sort>,
    },
    /// Ordered named fields.
    Struct {
        fields: Vec<(String, Sort)>,
    },
    /// A distinct type identity over the same underlying sort.
    Synonym {
        name: String,
        base: Box<Sort>,
        invariant: Option<Invariant>,
    },
}

impl Sort {
    pub fn int() -> Sort {
        Sort::Int
    }

    pub fn boolean() -> Sort {
        Sort::Bool
    }

    /// A sort inhabited by an unbounded number of distinct constants.
    pub fn uninterpreted(name: &str) -> Sort {
        Sort::Uninterpreted(name.to_string())
    }

    pub fn enumeration(name: &str, variants: &[&str]) -> Sort {
        assert!(!variants.is_empty(), "enumeration must have variants");
        Sort::Enum {
            name: name.to_string(),
            variants: variants.iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn map(index: Sort, value: Sort) -> Sort {
        assert!(
            !index.is_compound(),
            "map index may not be a compound type"
        );
        Sort::Map {
            index: Box::new(index),
            value: Box::new(value),
        }
    }

    pub fn const_map(index: Sort, value: Sort) -> Sort {
        assert!(
            !index.is_compound(),
            "map index may not be a compound type"
        );
        assert!(
            !value.is_compound(),
            "const-map value may not be a compound type"
        );
        Sort::ConstMap {
            index: Box::new(index),
            value: Box::new(value),
        }
    }

    pub fn structure<S: Into<String>>(fields: Vec<(S, Sort)>) -> Sort {
        let fields: Vec<(String, Sort)> = fields
            .into_iter()
            .map(|(name, sort)| (name.into(), sort))
            .collect();
        for (i, (name, _)) in fields.iter().enumerate() {
            assert!(
                !fields[i + 1..].iter().any(|(other, _)| other == name),
                "duplicate struct field {}",
                name
            );
        }
        Sort::Struct { fields }
    }

    pub fn synonym(name: &str, base: Sort) -> Sort {
        Sort::Synonym {
            name: name.to_string(),
            base: Box::new(base),
            invariant: None,
        }
    }

    pub fn synonym_with_invariant(name: &str, base: Sort, invariant: Invariant) -> Sort {
        Sort::Synonym {
            name: name.to_string(),
            base: Box::new(base),
            invariant: Some(invariant),
        }
    }

    /// The sort with synonym layers peeled off.
    pub fn resolve(&self) -> &Sort {
        match self {
            Sort::Synonym { base, .. } => base.resolve(),
            other => other,
        }
    }

    /// Whether values of this sort are lvalues (struct or mutable map).
    pub fn is_mutable(&self) -> bool {
        matches!(self.resolve(), Sort::Struct { .. } | Sort::Map { .. })
    }

    /// Whether the Z3 lowering of this sort is a tree rather than one sort.
    pub fn is_compound(&self) -> bool {
        match self.resolve() {
            Sort::Struct { .. } => true,
            Sort::Map { value, .. } => value.is_compound(),
            _ => false,
        }
    }

    /// Canonical string form; sorts hash and compare by this.
    pub fn canonical(&self) -> String {
        match self {
            Sort::Int => "int".to_string(),
            Sort::Bool => "bool".to_string(),
            Sort::Uninterpreted(name) => format!("uninterpreted({})", name),
            Sort::Enum { name, variants } => {
                format!("enum({}[{}])", name, variants.join(" "))
            }
            Sort::ConstMap { index, value } => {
                format!("constmap({},{})", index.canonical(), value.canonical())
            }
            Sort::Map { index, value } => {
                format!("map({},{})", index.canonical(), value.canonical())
            }
            Sort::Struct { fields } => {
                let inner: Vec<String> = fields
                    .iter()
                    .map(|(name, sort)| format!("{}:{}", name, sort.canonical()))
                    .collect();
                format!("struct({})", inner.join(","))
            }
            Sort::Synonym { name, base, .. } => {
                format!("synonym({},{})", name, base.canonical())
            }
        }
    }
}

impl std::fmt::Display for Sort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

impl PartialEq for Sort {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for Sort {}

impl Hash for Sort {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}

/// The Z3 lowering of a sort: a single Z3 sort, or an ordered tree of them
/// for struct shapes.
#[derive(Debug, Clone)]
pub enum SortTree<'ctx> {
    Leaf(z3::Sort<'ctx>),
    Fields(IndexMap<String, SortTree<'ctx>>),
}

/// Lowers [`Sort`] descriptors for one Z3 context.
///
/// Uninterpreted and enumeration sorts are declared once and memoized so that
/// every value of the same sort shares one Z3 declaration.
pub struct SortCache<'ctx> {
    ctx: &'ctx Context,
    uninterpreted: RefCell<HashMap<Sort, z3::Sort<'ctx>>>,
    enums: RefCell<HashMap<Sort, z3::Sort<'ctx>>>,
    enum_variants: RefCell<HashMap<(Sort, String), FuncDecl<'ctx>>>,
}

impl<'ctx> SortCache<'ctx> {
    pub fn new(ctx: &'ctx Context) -> Self {
        Self {
            ctx,
            uninterpreted: RefCell::new(HashMap::new()),
            enums: RefCell::new(HashMap::new()),
            enum_variants: RefCell::new(HashMap::new()),
        }
    }

    pub fn ctx(&self) -> &'ctx Context {
        self.ctx
    }

    /// Lower a sort to its Z3 representation.
    pub fn lower(&self, sort: &Sort) -> SortTree<'ctx> {
        match sort {
            Sort::Int => SortTree::Leaf(z3::Sort::int(self.ctx)),
            Sort::Bool => SortTree::Leaf(z3::Sort::bool(self.ctx)),
            Sort::Uninterpreted(_) => SortTree::Leaf(self.uninterpreted_sort(sort)),
            Sort::Enum { .. } => SortTree::Leaf(self.enum_sort(sort)),
            Sort::ConstMap { index, value } => {
                let domain = self.lower_leaf(index);
                let range = self.lower_leaf(value);
                SortTree::Leaf(z3::Sort::array(self.ctx, &domain, &range))
            }
            Sort::Map { index, value } => {
                let domain = self.lower_leaf(index);
                map_over_tree(self.ctx, &domain, &self.lower(value))
            }
            Sort::Struct { fields } => {
                let mut lowered = IndexMap::new();
                for (name, field_sort) in fields {
                    lowered.insert(name.clone(), self.lower(field_sort));
                }
                SortTree::Fields(lowered)
            }
            Sort::Synonym { base, .. } => self.lower(base),
        }
    }

    /// Lower a sort that must be a single Z3 sort.
    pub fn lower_leaf(&self, sort: &Sort) -> z3::Sort<'ctx> {
        match self.lower(sort) {
            SortTree::Leaf(z3sort) => z3sort,
            SortTree::Fields(_) => unreachable!("compound sort where a leaf is required"),
        }
    }

    /// The constant for an enumeration variant.
    pub fn enum_variant(&self, sort: &Sort, variant: &str) -> SpexResult<Dynamic<'ctx>> {
        let resolved = sort.resolve().clone();
        match &resolved {
            Sort::Enum { name, variants } => {
                if !variants.iter().any(|v| v == variant) {
                    return Err(SpexException::TypeMismatch(format!(
                        "enum {} has no variant {}",
                        name, variant
                    )));
                }
                self.enum_sort(&resolved);
                let key = (resolved.clone(), variant.to_string());
                let decls = self.enum_variants.borrow();
                let decl = decls
                    .get(&key)
                    .ok_or_else(|| SpexException::Internal("enum variant not declared".into()))?;
                Ok(decl.apply(&[]))
            }
            other => Err(SpexException::TypeMismatch(format!(
                "{} is not an enumeration sort",
                other
            ))),
        }
    }

    fn uninterpreted_sort(&self, sort: &Sort) -> z3::Sort<'ctx> {
        if let Some(cached) = self.uninterpreted.borrow().get(sort) {
            return cached.clone();
        }
        let name = match sort {
            Sort::Uninterpreted(name) => name.clone(),
            _ => unreachable!(),
        };
        let z3sort = z3::Sort::uninterpreted(self.ctx, Symbol::String(name));
        self.uninterpreted
            .borrow_mut()
            .insert(sort.clone(), z3sort.clone());
        z3sort
    }

    fn enum_sort(&self, sort: &Sort) -> z3::Sort<'ctx> {
        if let Some(cached) = self.enums.borrow().get(sort) {
            return cached.clone();
        }
        let (name, variants) = match sort {
            Sort::Enum { name, variants } => (name.clone(), variants.clone()),
            _ => unreachable!(),
        };
        let variant_symbols: Vec<Symbol> = variants
            .iter()
            .map(|v| Symbol::String(v.clone()))
            .collect();
        let (z3sort, consts, _testers) =
            z3::Sort::enumeration(self.ctx, Symbol::String(name), &variant_symbols);
        {
            let mut decls = self.enum_variants.borrow_mut();
            for (variant, decl) in variants.iter().zip(consts) {
                decls.insert((sort.clone(), variant.clone()), decl);
            }
        }
        self.enums.borrow_mut().insert(sort.clone(), z3sort.clone());
        z3sort
    }
}

fn map_over_tree<'ctx>(
    ctx: &'ctx Context,
    domain: &z3::Sort<'ctx>,
    value: &SortTree<'ctx>,
) -> SortTree<'ctx> {
    match value {
        SortTree::Leaf(range) => SortTree::Leaf(z3::Sort::array(ctx, domain, range)),
        SortTree::Fields(fields) => SortTree::Fields(
            fields
                .iter()
                .map(|(name, sub)| (name.clone(), map_over_tree(ctx, domain, sub)))
                .collect(),
        ),
    }
}
