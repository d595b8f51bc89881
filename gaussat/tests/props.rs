//! Property based end-to-end tests.
use proptest::prelude::*;

use gaussat::{Solver, Var};

use gaussat_formula::test::{
    sat_formula, sat_xor_system, sgen_unsat_formula, unsat_xor_system,
};

proptest! {
    #[test]
    fn sgen_unsat(formula in sgen_unsat_formula(1..5usize)) {
        let mut solver = Solver::new();

        solver.add_formula(&formula).unwrap();

        prop_assert_eq!(solver.solve(), Some(false));
    }

    #[test]
    fn sat(formula in sat_formula(4..20usize, 10..100usize, 0.05..0.2, 0.9..1.0)) {
        let mut solver = Solver::new();

        solver.add_formula(&formula).unwrap();

        prop_assert_eq!(solver.solve(), Some(true));

        let model = solver.model().unwrap();

        // The model covers eliminated and replaced variables as well.
        for clause in formula.iter() {
            prop_assert!(clause.iter().any(|lit| model.contains(lit)));
        }
    }

    #[test]
    fn sat_xor_systems(xors in sat_xor_system(3..12usize, 1..8, 2..5usize)) {
        let mut solver = Solver::new();

        for (vars, rhs) in xors.iter() {
            solver.add_xor_clause(vars, *rhs).unwrap();
        }

        prop_assert_eq!(solver.solve(), Some(true));

        let model = solver.model().unwrap();
        let value = |var: Var| model.contains(&var.positive());

        for (vars, rhs) in xors.iter() {
            let parity = vars.iter().fold(false, |acc, &var| acc ^ value(var));
            prop_assert_eq!(parity, *rhs);
        }
    }

    #[test]
    fn unsat_xor_systems(xors in unsat_xor_system(3..10usize, 1..6, 2..5usize)) {
        let mut solver = Solver::new();

        for (vars, rhs) in xors.iter() {
            solver.add_xor_clause(vars, *rhs).unwrap();
        }

        prop_assert_eq!(solver.solve(), Some(false));
    }

    #[test]
    fn sat_formulas_stay_sat_under_passing_assumptions(
        formula in sat_formula(4..12usize, 5..40usize, 0.1..0.3, 0.9..1.0),
    ) {
        let mut solver = Solver::new();

        solver.add_formula(&formula).unwrap();

        prop_assert_eq!(solver.solve(), Some(true));
        let model = solver.model().unwrap();

        // Assuming literals of the found model keeps the formula satisfiable.
        let assumptions: Vec<_> = model.iter().take(3).cloned().collect();
        prop_assert_eq!(solver.solve_with(&assumptions), Some(true));
    }
}
