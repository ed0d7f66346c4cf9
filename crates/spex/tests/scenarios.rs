// SPDX-License-Identifier: AGPL-3.0

//! End-to-end exploration scenarios.

use spex::{explore, Exec, Sort, SpexBool, SpexException, SpexInt, SpexResult, SpexValue};
use std::sync::Mutex;
use z3::{Config, Context};

// Explorations are process-exclusive; serialize the tests that run one.
static EXPLORE_LOCK: Mutex<()> = Mutex::new(());

fn lock() -> std::sync::MutexGuard<'static, ()> {
    EXPLORE_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[test]
fn test_single_branch_yields_two_paths() {
    let _guard = lock();
    let cfg = Config::new();
    let ctx = Context::new(&cfg);

    let explorer = explore(&ctx, |exec: &mut Exec| {
        let x = exec.var(&Sort::int(), Some("x"))?.as_int()?;
        if exec.branch(&x.gt(&SpexInt::from_i64(0), exec.ctx()))? {
            Ok(1)
        } else {
            Ok(2)
        }
    })
    .unwrap();

    let results: Vec<_> = explorer.map(|result| result.unwrap()).collect();
    assert_eq!(results.len(), 2);

    // The true direction is taken first
    assert_eq!(*results[0].value(), 1);
    assert_eq!(*results[1].value(), 2);

    let model = results[0].get_model(None).unwrap();
    assert!(model.get("x").unwrap().as_i64().unwrap() > 0);

    let model = results[1].get_model(None).unwrap();
    assert!(model.get("x").unwrap().as_i64().unwrap() <= 0);
}

#[test]
fn test_redundant_branch_is_implied() {
    let _guard = lock();
    let cfg = Config::new();
    let ctx = Context::new(&cfg);

    let explorer = explore(&ctx, |exec: &mut Exec| {
        let x = exec.var(&Sort::int(), Some("x"))?.as_int()?;
        let positive = x.gt(&SpexInt::from_i64(0), exec.ctx());
        let first = exec.branch(&positive)?;
        let second = exec.branch(&positive)?;
        if first && second {
            Ok(1)
        } else {
            Ok(2)
        }
    })
    .unwrap();

    // The second branch is decided by the path condition; still two paths
    let values: Vec<i32> = explorer.map(|result| *result.unwrap().value()).collect();
    assert_eq!(values, vec![1, 2]);
}

#[test]
fn test_map_store_then_load() {
    let _guard = lock();
    let cfg = Config::new();
    let ctx = Context::new(&cfg);

    let mut explorer = explore(&ctx, |exec: &mut Exec| {
        let sort = Sort::map(Sort::int(), Sort::int());
        let map = exec.const_map(&sort, &SpexValue::from_i64(0))?;
        let one = SpexValue::from_i64(1);
        map.store(&one, &SpexValue::from_i64(5), exec.ctx())?;
        let read = map.load(&one, exec.ctx())?.as_int()?;
        let cond = read.eq(&SpexInt::from_i64(5), exec.ctx());
        exec.branch(&cond)
    })
    .unwrap();

    let result = explorer.next().unwrap().unwrap();
    assert!(*result.value());
    // The read folded to a constant, so nothing reached the solver
    assert!(result.path_condition().as_bool().unwrap());
    assert!(explorer.next().is_none());
}

#[test]
fn test_struct_copy_on_assign() {
    let _guard = lock();
    let cfg = Config::new();
    let ctx = Context::new(&cfg);

    let explorer = explore(&ctx, |exec: &mut Exec| {
        let sort = Sort::structure(vec![("a", Sort::int()), ("b", Sort::int())]);
        let s = exec.var(&sort, Some("s"))?;
        let t = s.snapshot()?;
        t.set_field("a", &SpexValue::from_i64(0), exec.ctx())?;
        let s_a = s.field("a")?.as_int()?;
        let t_a = t.field("a")?.as_int()?;
        exec.branch(&s_a.eq(&t_a, exec.ctx()))
    })
    .unwrap();

    let values: Vec<bool> = explorer.map(|result| *result.unwrap().value()).collect();
    // Where s.a != 0 the snapshot differs from the original
    assert!(values.contains(&false));
    assert_eq!(values, vec![true, false]);
}

#[test]
fn test_assume_pins_the_model() {
    let _guard = lock();
    let cfg = Config::new();
    let ctx = Context::new(&cfg);

    let mut explorer = explore(&ctx, |exec: &mut Exec| {
        let x = exec.var(&Sort::int(), Some("x"))?.as_int()?;
        exec.assume(&x.eq(&SpexInt::from_i64(3), exec.ctx()))?;
        Ok(x.add(&SpexInt::from_i64(1), exec.ctx()))
    })
    .unwrap();

    let result = explorer.next().unwrap().unwrap();
    let model = result.get_model(None).unwrap();
    assert_eq!(model.eval_int(result.value()).unwrap(), 4);
    assert_eq!(model.get("x").unwrap().as_i64().unwrap(), 3);
    assert!(explorer.next().is_none());
}

#[test]
fn test_assume_false_yields_no_paths() {
    let _guard = lock();
    let cfg = Config::new();
    let ctx = Context::new(&cfg);

    let explorer = explore(&ctx, |exec: &mut Exec| -> SpexResult<i32> {
        exec.assume(&SpexBool::from_bool(false))?;
        Ok(0)
    })
    .unwrap();

    assert_eq!(explorer.count(), 0);
}

#[test]
fn test_enum_branching_and_projection_failure() {
    let _guard = lock();
    let cfg = Config::new();
    let ctx = Context::new(&cfg);

    let explorer = explore(&ctx, |exec: &mut Exec| {
        let color = Sort::enumeration("Color", &["red", "green", "blue"]);
        let c = exec.var(&color, Some("c"))?;
        let red = exec.enum_value(&color, "red")?;
        let is_red = c.eq_value(&red, exec.ctx())?;
        if exec.branch(&is_red)? {
            Ok(1)
        } else {
            Ok(2)
        }
    })
    .unwrap();

    let results: Vec<_> = explorer.map(|result| result.unwrap()).collect();
    assert_eq!(results.len(), 2);

    // Enum constants have no host-level projection
    let model = results[0].get_model(None).unwrap();
    assert!(model.get("c").is_err());
}

#[test]
fn test_uninterpreted_values_stay_distinguishable() {
    let _guard = lock();
    let cfg = Config::new();
    let ctx = Context::new(&cfg);

    let explorer = explore(&ctx, |exec: &mut Exec| {
        let obj = Sort::uninterpreted("Obj");
        let a = exec.var(&obj, Some("a"))?;
        let b = exec.var(&obj, Some("b"))?;
        let same = a.eq_value(&b, exec.ctx())?;
        exec.branch(&same)
    })
    .unwrap();

    let results: Vec<_> = explorer.map(|result| result.unwrap()).collect();
    assert_eq!(results.len(), 2);

    for result in &results {
        let model = result.get_model(None).unwrap();
        let a = match model.get("a").unwrap() {
            spex::ModelValue::Uninterp(value) => value,
            other => panic!("expected an uninterpreted value, got {:?}", other),
        };
        let b = match model.get("b").unwrap() {
            spex::ModelValue::Uninterp(value) => value,
            other => panic!("expected an uninterpreted value, got {:?}", other),
        };
        if *result.value() {
            assert_eq!(a, b);
        } else {
            assert_ne!(a, b);
        }
    }
}

#[test]
fn test_partial_struct_overrides() {
    let _guard = lock();
    let cfg = Config::new();
    let ctx = Context::new(&cfg);

    let mut explorer = explore(&ctx, |exec: &mut Exec| {
        let sort = Sort::structure(vec![("a", Sort::int()), ("b", Sort::int())]);
        let seven = SpexValue::from_i64(7);
        let s = exec.var_struct(&sort, "s", vec![("a", &seven)])?;
        let a = s.field("a")?.as_int()?;
        Ok(a.as_i64()?)
    })
    .unwrap();

    let result = explorer.next().unwrap().unwrap();
    assert_eq!(*result.value(), 7);

    // The override survives into model projection
    let model = result.get_model(None).unwrap();
    let projected = model.get("s").unwrap();
    let a = projected.as_struct().unwrap().field("a").unwrap();
    assert_eq!(a.as_i64().unwrap(), 7);
    assert!(explorer.next().is_none());
}

#[test]
fn test_user_error_aborts_with_path_state() {
    let _guard = lock();
    let cfg = Config::new();
    let ctx = Context::new(&cfg);

    let mut explorer = explore(&ctx, |exec: &mut Exec| {
        let x = exec.var(&Sort::int(), Some("x"))?.as_int()?;
        if exec.branch(&x.gt(&SpexInt::from_i64(0), exec.ctx()))? {
            Err(SpexException::Internal("user bug".to_string()))
        } else {
            Ok(0)
        }
    })
    .unwrap();

    let first = explorer.next().unwrap();
    match first {
        Err(SpexException::InSymbolicState { inner, state }) => {
            assert!(inner.to_string().contains("user bug"));
            assert!(state.contains("x"));
        }
        other => panic!("expected an annotated error, got {:?}", other.map(|_| ())),
    }

    // The exploration is aborted; remaining schedules are dropped
    assert!(explorer.next().is_none());
}

#[test]
fn test_recursive_exploration_rejected_and_released() {
    let _guard = lock();
    let cfg = Config::new();
    let ctx = Context::new(&cfg);

    let explorer = explore(&ctx, |exec: &mut Exec| {
        let x = exec.var(&Sort::int(), Some("x"))?.as_int()?;
        exec.branch(&x.gt(&SpexInt::from_i64(0), exec.ctx()))
    })
    .unwrap();

    // A second exploration while the first is alive is rejected
    let nested = explore(&ctx, |_exec: &mut Exec| Ok(0));
    assert!(matches!(nested, Err(SpexException::RecursiveExploration)));

    // Early termination releases the slot
    drop(explorer);
    let again = explore(&ctx, |_exec: &mut Exec| Ok(0)).unwrap();
    assert_eq!(again.count(), 1);
}

#[test]
fn test_exploration_graph_records_forks() {
    let _guard = lock();
    let cfg = Config::new();
    let ctx = Context::new(&cfg);

    let mut explorer = explore(&ctx, |exec: &mut Exec| {
        let x = exec.var(&Sort::int(), Some("x"))?.as_int()?;
        if exec.branch(&x.gt(&SpexInt::from_i64(0), exec.ctx()))? {
            Ok("positive")
        } else {
            Ok("non-positive")
        }
    })
    .unwrap();

    while let Some(result) = explorer.next() {
        result.unwrap();
    }

    let dot = explorer.graph().to_dot();
    assert!(dot.contains("\"T\""));
    assert!(dot.contains("\"F\""));
    assert!(dot.contains("positive"));
    assert_eq!(explorer.completed_paths(), 2);
}
