// SPDX-License-Identifier: AGPL-3.0

//! Exploration results and model projection.
//!
//! A yielded result bundles the return value, the path condition, and the
//! side tables recorded while the path ran: the constructor for every named
//! symbolic input and the (outer sort, field path) of every created
//! constant. Projection re-creates the typed value tree and evaluates leaf
//! reads under a Z3 model with model completion, so the user gets back the
//! same typed view they declared.

use indexmap::IndexMap;
use spex_exceptions::{SpexException, SpexResult};
use spex_solver::check_formula;
use spex_value::{logic, Compound, Sort, SortCache, SortTree, SpexBool, SpexInt, SpexValue};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use z3::ast::{Ast, Bool as Z3Bool, Dynamic, Int as Z3Int};
use z3::{FuncDecl, SortKind, Symbol};

/// The recorded type of one Z3 constant: the outer declared sort and the
/// field path from it down to the constant.
#[derive(Debug, Clone)]
pub struct ConstType {
    pub outer: Sort,
    pub path: Vec<String>,
}

/// The recorded constructor of a named symbolic input. Overrides hold the
/// snapshotted compounds of struct fields that were supplied explicitly.
#[derive(Debug, Clone)]
pub struct VarCtor<'ctx> {
    pub sort: Sort,
    pub overrides: Vec<(String, Compound<'ctx>)>,
}

/// The typed view of a constant, recovered from the side table.
#[derive(Debug, Clone, PartialEq)]
pub enum SymType {
    /// An exact sort; a synonym when the value was declared through one.
    Exact(Sort),
    /// An array from the index type to the value type.
    Map(Box<SymType>, Box<SymType>),
}

/// Build the compound of Z3 constants for a variable, naming leaves
/// `name.field.path` and reporting each created leaf through `record`.
/// Overridden struct fields are spliced in unchanged and not reported.
pub(crate) fn build_compound<'ctx>(
    sorts: &SortCache<'ctx>,
    sort: &Sort,
    name: &str,
    overrides: &[(String, Compound<'ctx>)],
    record: &mut dyn FnMut(String, Vec<String>),
) -> Compound<'ctx> {
    let tree = sorts.lower(sort);
    build_rec(sorts, &tree, name, &mut Vec::new(), overrides, record)
}

fn build_rec<'ctx>(
    sorts: &SortCache<'ctx>,
    tree: &SortTree<'ctx>,
    name: &str,
    path: &mut Vec<String>,
    overrides: &[(String, Compound<'ctx>)],
    record: &mut dyn FnMut(String, Vec<String>),
) -> Compound<'ctx> {
    if path.len() == 1 {
        if let Some((_, compound)) = overrides.iter().find(|(field, _)| field == &path[0]) {
            return compound.clone();
        }
    }
    match tree {
        SortTree::Leaf(z3sort) => {
            let full_name = if path.is_empty() {
                name.to_string()
            } else {
                format!("{}.{}", name, path.join("."))
            };
            record(full_name.clone(), path.clone());
            let decl = FuncDecl::new(sorts.ctx(), Symbol::String(full_name), &[], z3sort);
            Compound::Leaf(decl.apply(&[]))
        }
        SortTree::Fields(fields) => {
            let mut built = IndexMap::new();
            for (field, sub) in fields {
                path.push(field.clone());
                built.insert(
                    field.clone(),
                    build_rec(sorts, sub, name, path, overrides, record),
                );
                path.pop();
            }
            Compound::Fields(built)
        }
    }
}

/// The result of exploring one feasible path.
pub struct ExploreResult<'ctx, R> {
    pub(crate) value: R,
    pub(crate) conditions: Vec<Z3Bool<'ctx>>,
    pub(crate) ctors: HashMap<String, VarCtor<'ctx>>,
    pub(crate) const_types: HashMap<String, ConstType>,
    pub(crate) sorts: Rc<SortCache<'ctx>>,
}

impl<'ctx, R> ExploreResult<'ctx, R> {
    /// The value returned by the function on this path.
    pub fn value(&self) -> &R {
        &self.value
    }

    pub fn into_value(self) -> R {
        self.value
    }

    /// The path condition as a list of booleans, in assertion order.
    pub fn path_condition_list(&self) -> Vec<SpexBool<'ctx>> {
        self.conditions
            .iter()
            .map(|cond| SpexBool::from_z3(cond.clone()))
            .collect()
    }

    /// The path condition as a single conjunction.
    pub fn path_condition(&self) -> SpexBool<'ctx> {
        let wrapped = self.path_condition_list();
        let refs: Vec<&SpexBool<'ctx>> = wrapped.iter().collect();
        logic::sym_and(self.sorts.ctx(), &refs)
    }

    /// A model of satisfying concrete assignments for this path.
    ///
    /// By default the path condition is checked on a fresh solver to obtain
    /// one; the caller can supply a specific model instead (which must be
    /// consistent with the path condition).
    pub fn get_model(&self, z3_model: Option<z3::Model<'ctx>>) -> SpexResult<Model<'ctx>> {
        let z3_model = match z3_model {
            Some(model) => model,
            None => {
                let ctx = self.sorts.ctx();
                let condition = self.path_condition().as_z3(ctx);
                let (outcome, model) = check_formula(ctx, &condition);
                if !outcome.is_sat() {
                    return Err(SpexException::Internal(format!(
                        "path condition is {} instead of sat",
                        outcome
                    )));
                }
                model.ok_or_else(|| {
                    SpexException::Internal("solver returned sat without a model".to_string())
                })?
            }
        };
        Ok(Model {
            ctors: self.ctors.clone(),
            inner: Rc::new(ModelInner {
                z3: z3_model,
                sorts: Rc::clone(&self.sorts),
                track: RefCell::new(false),
                assignments: RefCell::new(Vec::new()),
            }),
        })
    }

    /// Recover the typed view of a Z3 constant created on this path.
    pub fn symbolic_type(&self, const_name: &str) -> SpexResult<SymType> {
        let const_type = self.const_types.get(const_name).ok_or_else(|| {
            SpexException::TypeMismatch(format!("unknown constant {}", const_name))
        })?;
        resolve_sym_type(&const_type.outer, &const_type.path)
    }
}

fn resolve_sym_type(outer: &Sort, path: &[String]) -> SpexResult<SymType> {
    match outer.resolve() {
        Sort::Struct { fields } if !path.is_empty() => {
            let (_, field_sort) = fields
                .iter()
                .find(|(name, _)| name == &path[0])
                .ok_or_else(|| {
                    SpexException::TypeMismatch(format!("unknown struct field {}", path[0]))
                })?;
            resolve_sym_type(field_sort, &path[1..])
        }
        Sort::Map { index, value } => Ok(SymType::Map(
            Box::new(resolve_sym_type(index, &[])?),
            Box::new(resolve_sym_type(value, path)?),
        )),
        _ if path.is_empty() => Ok(SymType::Exact(outer.clone())),
        _ => Err(SpexException::TypeMismatch(format!(
            "cannot resolve type at path {:?} under {}",
            path, outer
        ))),
    }
}

pub(crate) struct ModelInner<'ctx> {
    z3: z3::Model<'ctx>,
    sorts: Rc<SortCache<'ctx>>,
    track: RefCell<bool>,
    assignments: RefCell<Vec<(Dynamic<'ctx>, ModelValue<'ctx>)>>,
}

/// A model interprets symbolic inputs into concrete values.
///
/// Indexing by a user-provided variable name re-creates the typed value and
/// evaluates leaf reads in the model (with model completion, so
/// unconstrained constants get invented values).
pub struct Model<'ctx> {
    ctors: HashMap<String, VarCtor<'ctx>>,
    inner: Rc<ModelInner<'ctx>>,
}

impl<'ctx> Model<'ctx> {
    /// Project the named symbolic input to a concrete (or lazily-projected
    /// compound) value.
    pub fn get(&self, name: &str) -> SpexResult<ModelValue<'ctx>> {
        let ctor = self
            .ctors
            .get(name)
            .ok_or_else(|| SpexException::TypeMismatch(format!("unknown variable {}", name)))?;
        let compound = build_compound(
            self.inner.sorts.as_ref(),
            &ctor.sort,
            name,
            &ctor.overrides,
            &mut |_, _| {},
        );
        project_value(&ctor.sort, &compound, &self.inner)
    }

    /// Evaluate a symbolic integer under this model.
    pub fn eval_int(&self, value: &SpexInt<'ctx>) -> SpexResult<i64> {
        let ctx = self.inner.sorts.ctx();
        let term = value.as_z3(ctx);
        let evaluated = self
            .inner
            .z3
            .eval(&term, true)
            .ok_or_else(|| SpexException::Internal("model evaluation failed".to_string()))?;
        evaluated
            .as_i64()
            .ok_or_else(|| SpexException::NotConcrete(format!("{} is not an integer literal", term)))
    }

    /// Evaluate a symbolic boolean under this model.
    pub fn eval_bool(&self, value: &SpexBool<'ctx>) -> SpexResult<bool> {
        let ctx = self.inner.sorts.ctx();
        let term = value.as_z3(ctx);
        let evaluated = self
            .inner
            .z3
            .eval(&term, true)
            .ok_or_else(|| SpexException::Internal("model evaluation failed".to_string()))?;
        evaluated
            .as_bool()
            .ok_or_else(|| SpexException::NotConcrete(format!("{} is not a boolean literal", term)))
    }

    /// Evaluate an arbitrary symbolic value under this model.
    pub fn eval_value(&self, value: &SpexValue<'ctx>) -> SpexResult<ModelValue<'ctx>> {
        let ctx = self.inner.sorts.ctx();
        let compound = value.to_compound(ctx)?;
        project_value(value.sort(), &compound, &self.inner)
    }

    /// Enable or disable assignment tracking.
    pub fn track_assignments(&self, enable: bool) {
        *self.inner.track.borrow_mut() = enable;
    }

    /// The `(expression, value)` pairs evaluated while tracking was on, in
    /// evaluation order with duplicate expressions suppressed.
    pub fn assignments(&self) -> Vec<(Dynamic<'ctx>, ModelValue<'ctx>)> {
        self.inner.assignments.borrow().clone()
    }
}

impl<'ctx> std::fmt::Debug for Model<'ctx> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Model({} variables)", self.ctors.len())
    }
}

/// An opaque value of an uninterpreted sort. Distinct values of the same
/// sort compare unequal.
#[derive(Debug, Clone)]
pub struct UninterpValue<'ctx> {
    sort: Sort,
    term: Dynamic<'ctx>,
}

impl<'ctx> UninterpValue<'ctx> {
    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    pub fn term(&self) -> &Dynamic<'ctx> {
        &self.term
    }
}

impl<'ctx> PartialEq for UninterpValue<'ctx> {
    fn eq(&self, other: &Self) -> bool {
        self.sort == other.sort && self.term.to_string() == other.term.to_string()
    }
}

impl<'ctx> Eq for UninterpValue<'ctx> {}

/// A struct projected under a model. Field reads evaluate lazily.
#[derive(Clone)]
pub struct ModelStruct<'ctx> {
    sort: Sort,
    compound: Compound<'ctx>,
    inner: Rc<ModelInner<'ctx>>,
}

impl<'ctx> ModelStruct<'ctx> {
    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    pub fn field(&self, name: &str) -> SpexResult<ModelValue<'ctx>> {
        let fields = match self.sort.resolve() {
            Sort::Struct { fields } => fields,
            _ => unreachable!("ModelStruct carries a struct sort"),
        };
        let (_, field_sort) = fields
            .iter()
            .find(|(field, _)| field == name)
            .ok_or_else(|| {
                SpexException::TypeMismatch(format!("{} has no field {}", self.sort, name))
            })?;
        let sub = self.compound.field(name)?;
        project_value(field_sort, sub, &self.inner)
    }
}

impl<'ctx> std::fmt::Debug for ModelStruct<'ctx> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ModelStruct({})", self.sort)
    }
}

/// A map projected under a model. Element reads evaluate lazily.
#[derive(Clone)]
pub struct ModelMap<'ctx> {
    index_sort: Sort,
    value_sort: Sort,
    compound: Compound<'ctx>,
    inner: Rc<ModelInner<'ctx>>,
}

impl<'ctx> ModelMap<'ctx> {
    pub fn index_sort(&self) -> &Sort {
        &self.index_sort
    }

    pub fn value_sort(&self) -> &Sort {
        &self.value_sort
    }

    /// Read the element at a previously projected index value.
    pub fn get(&self, index: &ModelValue<'ctx>) -> SpexResult<ModelValue<'ctx>> {
        let ctx = self.inner.sorts.ctx();
        let index_term = match index {
            ModelValue::Int(value) => Dynamic::from_ast(&Z3Int::from_i64(ctx, *value)),
            ModelValue::Bool(value) => Dynamic::from_ast(&Z3Bool::from_bool(ctx, *value)),
            ModelValue::Uninterp(value) => value.term.clone(),
            ModelValue::Struct(_) | ModelValue::Map(_) => {
                return Err(SpexException::TypeMismatch(
                    "map index must be a primitive value".to_string(),
                ))
            }
        };
        let selected = self.compound.try_map(&mut |leaf| {
            let array = leaf.as_array().ok_or_else(|| {
                SpexException::Internal("map leaf is not an array".to_string())
            })?;
            Ok(array.select(&index_term))
        })?;
        project_value(&self.value_sort, &selected, &self.inner)
    }

    /// Read the element at a concrete integer index.
    pub fn get_i64(&self, index: i64) -> SpexResult<ModelValue<'ctx>> {
        self.get(&ModelValue::Int(index))
    }
}

impl<'ctx> std::fmt::Debug for ModelMap<'ctx> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ModelMap({} -> {})", self.index_sort, self.value_sort)
    }
}

/// A concrete value projected from a model.
#[derive(Debug, Clone)]
pub enum ModelValue<'ctx> {
    Int(i64),
    Bool(bool),
    Uninterp(UninterpValue<'ctx>),
    Struct(ModelStruct<'ctx>),
    Map(ModelMap<'ctx>),
}

impl<'ctx> ModelValue<'ctx> {
    pub fn as_i64(&self) -> SpexResult<i64> {
        match self {
            ModelValue::Int(value) => Ok(*value),
            other => Err(SpexException::TypeMismatch(format!(
                "{:?} is not an integer",
                other
            ))),
        }
    }

    pub fn as_bool(&self) -> SpexResult<bool> {
        match self {
            ModelValue::Bool(value) => Ok(*value),
            other => Err(SpexException::TypeMismatch(format!(
                "{:?} is not a boolean",
                other
            ))),
        }
    }

    pub fn as_struct(&self) -> SpexResult<&ModelStruct<'ctx>> {
        match self {
            ModelValue::Struct(value) => Ok(value),
            other => Err(SpexException::TypeMismatch(format!(
                "{:?} is not a struct",
                other
            ))),
        }
    }

    pub fn as_map(&self) -> SpexResult<&ModelMap<'ctx>> {
        match self {
            ModelValue::Map(value) => Ok(value),
            other => Err(SpexException::TypeMismatch(format!(
                "{:?} is not a map",
                other
            ))),
        }
    }
}

fn project_value<'ctx>(
    sort: &Sort,
    compound: &Compound<'ctx>,
    inner: &Rc<ModelInner<'ctx>>,
) -> SpexResult<ModelValue<'ctx>> {
    match sort.resolve() {
        Sort::Struct { .. } => Ok(ModelValue::Struct(ModelStruct {
            sort: sort.clone(),
            compound: compound.clone(),
            inner: Rc::clone(inner),
        })),
        Sort::Map { index, value } | Sort::ConstMap { index, value } => {
            Ok(ModelValue::Map(ModelMap {
                index_sort: *index.clone(),
                value_sort: *value.clone(),
                compound: compound.clone(),
                inner: Rc::clone(inner),
            }))
        }
        _ => eval_leaf(sort, compound.leaf()?, inner),
    }
}

fn eval_leaf<'ctx>(
    sort: &Sort,
    term: &Dynamic<'ctx>,
    inner: &Rc<ModelInner<'ctx>>,
) -> SpexResult<ModelValue<'ctx>> {
    // model_completion makes Z3 invent concrete values for constants that
    // are unconstrained in the model
    let evaluated = inner
        .z3
        .eval(term, true)
        .ok_or_else(|| SpexException::Internal("model evaluation failed".to_string()))?;

    let value = if let Some(int_value) = evaluated.as_int().and_then(|i| i.as_i64()) {
        ModelValue::Int(int_value)
    } else if let Some(bool_value) = evaluated.as_bool().and_then(|b| b.as_bool()) {
        ModelValue::Bool(bool_value)
    } else if evaluated.get_sort().kind() == SortKind::Uninterpreted {
        ModelValue::Uninterp(UninterpValue {
            sort: sort.clone(),
            term: evaluated,
        })
    } else {
        // Enum constants and anything else we cannot map to a host value
        return Err(SpexException::NotConcrete(format!(
            "expression {} is not a concrete value",
            term
        )));
    };

    if *inner.track.borrow() {
        let mut assignments = inner.assignments.borrow_mut();
        let term_str = term.to_string();
        if !assignments
            .iter()
            .any(|(expr, _)| expr.to_string() == term_str)
        {
            assignments.push((term.clone(), value.clone()));
        }
    }

    Ok(value)
}
