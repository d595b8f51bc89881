//! End-to-end solver scenarios.
use gaussat::{SharedData, Solver, SolverConfig};

use gaussat_formula::{lits, vars, ExtendFormula, Lit, Var};

fn assert_model_satisfies(solver: &Solver, clauses: &[Vec<Lit>]) {
    let model = solver.model().expect("sat result has a model");
    for clause in clauses {
        assert!(
            clause.iter().any(|lit| model.contains(lit)),
            "clause {:?} unsatisfied by {:?}",
            clause,
            model
        );
    }
}

#[test]
fn implied_literal_is_in_the_model() {
    let mut solver = Solver::new();

    solver.add_clause(&lits![1, 2]).unwrap();
    solver.add_clause(&lits![-1, 2]).unwrap();
    solver.add_clause(&lits![-1]).unwrap();

    assert_eq!(solver.solve(), Some(true));
    assert_eq!(solver.model_value(vars![2][0]), Some(true));
}

#[test]
fn xor_parity_propagates() {
    let mut solver = Solver::new();

    solver.add_xor_clause(&vars![1, 2, 3], true).unwrap();
    solver.add_xor_clause(&vars![1, 2], false).unwrap();

    assert_eq!(solver.solve(), Some(true));
    assert_eq!(solver.model_value(vars![3][0]), Some(true));

    let model = solver.model().unwrap();
    let value = |var: Var| model.contains(&var.positive());
    assert_eq!(
        value(vars![1][0]) ^ value(vars![2][0]) ^ value(vars![3][0]),
        true
    );
}

#[test]
fn xor_system_with_matrix_is_sat() {
    let mut solver = Solver::new();

    // A connected system whose constraints pairwise share two variables, so recomposition leaves
    // all three rows for the Gauss matrix.
    solver.add_xor_clause(&vars![1, 2, 3], true).unwrap();
    solver.add_xor_clause(&vars![2, 3, 4], false).unwrap();
    solver.add_xor_clause(&vars![3, 4, 5], true).unwrap();

    assert_eq!(solver.solve(), Some(true));

    let model = solver.model().unwrap();
    let value = |var: Var| model.contains(&var.positive());

    assert_eq!(
        value(vars![1][0]) ^ value(vars![2][0]) ^ value(vars![3][0]),
        true
    );
    assert_eq!(
        value(vars![2][0]) ^ value(vars![3][0]) ^ value(vars![4][0]),
        false
    );
    assert_eq!(
        value(vars![3][0]) ^ value(vars![4][0]) ^ value(vars![5][0]),
        true
    );
}

#[test]
fn dependent_xor_rows_with_flipped_parity_are_unsat() {
    let mut solver = Solver::new();

    // The first two rows imply 1 ⊕ 4 = 1; asserting 1 ⊕ 4 = 0 contradicts the system.
    solver.add_xor_clause(&vars![1, 2, 3], true).unwrap();
    solver.add_xor_clause(&vars![2, 3, 4], false).unwrap();
    solver.add_xor_clause(&vars![3, 4, 5], true).unwrap();
    solver.add_xor_clause(&vars![1, 4], false).unwrap();

    assert_eq!(solver.solve(), Some(false));
}

#[test]
fn contradicting_xors_are_unsat() {
    let mut solver = Solver::new();

    solver.add_xor_clause(&vars![1, 2, 3], true).unwrap();
    solver.add_xor_clause(&vars![1, 2, 3], false).unwrap();

    assert_eq!(solver.solve(), Some(false));
}

#[test]
fn empty_xor_with_odd_parity_is_unsat() {
    let mut solver = Solver::new();

    assert_eq!(solver.add_xor_clause(&[], true), Ok(false));
    assert_eq!(solver.solve(), Some(false));
}

#[test]
fn single_variable_xor_asserts_the_literal() {
    let mut solver = Solver::new();

    solver.add_xor_clause(&vars![4], true).unwrap();
    solver.add_xor_clause(&vars![5], false).unwrap();

    assert_eq!(solver.solve(), Some(true));
    assert_eq!(solver.model_value(vars![4][0]), Some(true));
    assert_eq!(solver.model_value(vars![5][0]), Some(false));
}

#[test]
fn empty_formula_is_sat() {
    let mut solver = Solver::new();
    assert_eq!(solver.solve(), Some(true));
}

#[test]
fn long_xor_is_cut_into_chunks() {
    let mut solver = Solver::new();

    let vars: Vec<Var> = (0..12).map(Var::from_index).collect();
    solver.add_xor_clause(&vars, true).unwrap();

    assert_eq!(solver.solve(), Some(true));

    let model = solver.model().unwrap();
    let parity = vars
        .iter()
        .fold(false, |acc, var| acc ^ model.contains(&var.positive()));
    assert!(parity);
}

#[test]
fn eliminated_variables_get_model_values() {
    let mut solver = Solver::new();

    let clauses = vec![
        lits![1, 2].to_vec(),
        lits![-1, 3].to_vec(),
        lits![-2, -3].to_vec(),
    ];
    for clause in clauses.iter() {
        solver.add_clause(clause).unwrap();
    }

    // Simplification may eliminate variable 1; the model still has to assign it a value that
    // satisfies the original clauses.
    assert_eq!(solver.solve(), Some(true));
    assert_model_satisfies(&solver, &clauses);

    for index in 0..3 {
        assert!(solver.model_value(Var::from_index(index)).is_some());
    }
}

#[test]
fn tautological_input_variables_are_assigned() {
    let mut solver = Solver::new();

    solver.add_clause(&lits![7, -7]).unwrap();
    solver.add_clause(&lits![1, 2]).unwrap();

    assert_eq!(solver.solve(), Some(true));
    // Flagged must-set; any value is fine but one must be reported.
    assert!(solver.model_value(vars![7][0]).is_some());
}

#[test]
fn assumptions_on_eliminated_variables_are_sound() {
    let mut solver = Solver::new();

    let clauses = vec![
        lits![1, 2].to_vec(),
        lits![-1, 3].to_vec(),
        lits![-2, -3].to_vec(),
    ];
    for clause in clauses.iter() {
        solver.add_clause(clause).unwrap();
    }

    // The first solve may eliminate variable 1; assuming it afterwards has to bring its clauses
    // back.
    assert_eq!(solver.solve(), Some(true));

    assert_eq!(solver.solve_with(&lits![1]), Some(true));
    let model = solver.model().unwrap();
    assert!(model.contains(&lits![1][0]));
    for clause in clauses.iter() {
        assert!(clause.iter().any(|lit| model.contains(lit)));
    }

    assert_eq!(solver.solve_with(&lits![-1]), Some(true));
    let model = solver.model().unwrap();
    assert!(model.contains(&lits![-1][0]));
    for clause in clauses.iter() {
        assert!(clause.iter().any(|lit| model.contains(lit)));
    }
}

#[test]
fn assumption_conflict_shape() {
    let mut solver = Solver::new();

    assert_eq!(solver.solve_with(&lits![1, -1]), Some(false));

    let conflict = solver.conflict();
    assert!(!conflict.is_empty());
    for lit in conflict.iter() {
        assert!(lits![-1, 1].contains(lit));
    }

    // Assumptions add no clauses; the formula itself stays satisfiable.
    assert_eq!(solver.solve(), Some(true));
}

#[test]
fn failed_assumptions_against_clauses() {
    let mut solver = Solver::new();

    solver.add_clause(&lits![-1, 2]).unwrap();
    solver.add_clause(&lits![-2, 3]).unwrap();

    assert_eq!(solver.solve_with(&lits![1, -3]), Some(false));

    let conflict = solver.conflict();
    assert!(!conflict.is_empty());
    for lit in conflict.iter() {
        assert!(lits![-1, 3].contains(lit));
    }

    assert_eq!(solver.solve_with(&lits![1, 3]), Some(true));
}

#[test]
fn detach_reattach_is_transparent() {
    let mut config = SolverConfig::default();
    config.xor_detach_reattach = true;
    config.min_matrix_rows = 2;

    let mut solver = Solver::new();
    solver.set_config(config);

    solver.add_xor_clause(&vars![1, 2, 3, 4], false).unwrap();
    solver.add_xor_clause(&vars![1, 2, 5], true).unwrap();
    solver.add_xor_clause(&vars![4, 5, 6], true).unwrap();
    solver.add_clause(&lits![1, 7]).unwrap();

    assert_eq!(solver.solve(), Some(true));

    let model = solver.model().unwrap();
    let value = |var: Var| model.contains(&var.positive());
    assert_eq!(
        value(vars![1][0]) ^ value(vars![2][0]) ^ value(vars![3][0]) ^ value(vars![4][0]),
        false
    );
    assert_eq!(value(vars![1][0]) ^ value(vars![2][0]) ^ value(vars![5][0]), true);
    assert_eq!(value(vars![4][0]) ^ value(vars![5][0]) ^ value(vars![6][0]), true);

    // Another solve round reattaches and re-detaches the encodings.
    assert_eq!(solver.solve(), Some(true));
}

#[test]
fn simplify_reaches_a_fixed_point() {
    let mut solver = Solver::new();

    solver.add_clause(&lits![1, 2, 3]).unwrap();
    solver.add_clause(&lits![1, 2, 3, 4]).unwrap();
    solver.add_clause(&lits![-1, 2]).unwrap();
    solver.add_clause(&lits![4, 5, 6]).unwrap();

    assert_eq!(solver.simplify(), None);
    let after_first = solver.stats();

    assert_eq!(solver.simplify(), None);
    let after_second = solver.stats();

    // The second run finds nothing new to subsume or strengthen.
    assert_eq!(after_first.subsumed_clauses, after_second.subsumed_clauses);
    assert_eq!(
        after_first.strengthened_clauses,
        after_second.strengthened_clauses
    );

    assert_eq!(solver.solve(), Some(true));
}

#[test]
fn interrupt_flag_clears_at_solve_entry() {
    let mut solver = Solver::new();

    solver.add_clause(&lits![1, 2]).unwrap();

    // A raise between solves does not poison the next call; within a call the flag makes the
    // schedule return unknown at its next check point.
    solver.interrupt_asap();
    assert_eq!(solver.solve(), Some(true));

    let handle = solver.interrupt_handle();
    handle.interrupt_asap();
    assert_eq!(solver.solve(), Some(true));
}

#[test]
fn conflict_budget_returns_unknown() {
    let mut config = SolverConfig::default();
    config.max_confl = Some(0);
    config.perform_occur_based_simp = false;

    let mut solver = Solver::new();
    solver.set_config(config);

    // An exactly-one constraint the exhausted budget never lets the search decide.
    let mut formula = gaussat::CnfFormula::new();
    let vars: Vec<Lit> = (0..6).map(|i| Var::from_index(i).positive()).collect();
    for a in 0..6 {
        for b in 0..a {
            formula.add_clause(&[!vars[a], !vars[b]]);
        }
    }
    formula.add_clause(&vars);
    for clause in formula.iter() {
        solver.add_clause(clause).unwrap();
    }

    assert_eq!(solver.solve(), None);

    // Lifting the budget lets the same solver finish.
    let mut config = SolverConfig::default();
    config.perform_occur_based_simp = false;
    solver.set_config(config);
    assert_eq!(solver.solve(), Some(true));
}

#[test]
fn shared_data_broker_roundtrip() {
    let shared = SharedData::new();

    let mut solver_a = Solver::new();
    let mut solver_b = Solver::new();
    solver_a.set_shared_data(shared.clone());
    solver_b.set_shared_data(shared);

    for solver in [&mut solver_a, &mut solver_b].iter_mut() {
        solver.add_clause(&lits![1, 2]).unwrap();
        solver.add_clause(&lits![-1, 2]).unwrap();
        solver.add_clause(&lits![-2, 3]).unwrap();
    }

    assert_eq!(solver_a.solve(), Some(true));
    assert_eq!(solver_b.solve(), Some(true));

    for solver in [&solver_a, &solver_b].iter() {
        let model = solver.model().unwrap();
        assert!(model.contains(&lits![2][0]));
        assert!(model.contains(&lits![3][0]));
    }
}

#[test]
fn drat_proof_ends_with_the_empty_clause() {
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    let buf = SharedBuf::default();

    let mut solver = Solver::new();
    solver.write_drat(buf.clone());

    solver.add_clause(&lits![1, 2]).unwrap();
    solver.add_clause(&lits![1, -2]).unwrap();
    solver.add_clause(&lits![-1, 2]).unwrap();
    solver.add_clause(&lits![-1, -2]).unwrap();

    assert_eq!(solver.solve(), Some(false));
    solver.close_drat();

    let written = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
    assert!(!written.is_empty());
    let last_addition = written
        .lines()
        .filter(|line| !line.starts_with("d "))
        .last()
        .unwrap();
    assert_eq!(last_addition.trim(), "0");
}

#[test]
fn snapshot_roundtrip() {
    let mut solver = Solver::new();

    solver.add_clause(&lits![1, 2]).unwrap();
    solver.add_clause(&lits![-1, 3]).unwrap();
    solver.add_clause(&lits![-2, -3]).unwrap();
    solver.add_clause(&lits![9, -9]).unwrap();

    assert_eq!(solver.solve(), Some(true));

    let mut file = tempfile::tempfile().unwrap();
    solver.write_snapshot(&mut file).unwrap();

    use std::io::{Seek, SeekFrom};
    file.seek(SeekFrom::Start(0)).unwrap();

    let mut restored = Solver::new();
    restored.read_snapshot(&mut file).unwrap();

    let stats = restored.stats();
    assert_eq!(stats.conflicts, solver.stats().conflicts);
}

#[test]
fn too_many_vars_is_reported() {
    let mut solver = Solver::new();
    assert_eq!(
        solver.new_vars(Var::max_count() + 1),
        Err(gaussat::SolverError::TooManyVars)
    );
    // The failed call did not corrupt the solver.
    solver.add_clause(&lits![1, 2]).unwrap();
    assert_eq!(solver.solve(), Some(true));
}

#[test]
fn fresh_variables_are_sequential() {
    let mut solver = Solver::new();

    solver.add_clause(&lits![1, 2]).unwrap();
    let var = solver.new_var().unwrap();
    assert_eq!(var, Var::from_index(2));

    let more = solver.new_vars(3).unwrap();
    assert_eq!(more, vec![Var::from_index(3), Var::from_index(4), Var::from_index(5)]);
}
