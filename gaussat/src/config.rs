//! Solver configuration.

/// How the polarity of a decision literal is chosen.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum PolarityMode {
    /// Always decide positive.
    Pos,
    /// Always decide negative.
    Neg,
    /// Use the value the variable last had (phase saving).
    Saved,
    /// Use a pseudo random polarity.
    Random,
    /// Phase saving with periodic inversion bursts.
    Stable,
}

/// Which simplification passes to run and in what order.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SimplifyPass {
    /// Backward subsumption and strengthening (`occ-backw-sub-str`).
    BackwSubStr,
    /// XOR recovery, recomposition and top-level Gauss reasoning (`occ-xor`).
    Xor,
    /// Ternary resolution (`occ-ternary-res`).
    TernaryRes,
    /// Bounded variable elimination (`occ-bve`).
    Bve,
    /// Bounded variable addition (`occ-bva`). Must come after `Xor` has stabilized.
    Bva,
}

/// Configurable parameters used during solving.
#[derive(Clone, Debug)]
pub struct SolverConfig {
    /// Multiplicative decay for the VSIDS decision heuristic.
    pub vsids_decay: f32,

    /// Multiplicative decay for clause activities.
    pub clause_activity_decay: f32,

    /// Number of conflicts between local clause reductions.
    pub reduce_locals_interval: u64,

    /// Number of conflicts between mid clause reductions.
    pub reduce_mids_interval: u64,

    /// Scaling factor for luby sequence based restarts (number of conflicts).
    pub luby_restart_interval_scale: u64,

    /// How to choose the polarity of decision literals.
    pub polarity_mode: PolarityMode,

    /// Whether occurrence-based simplification runs at all.
    pub perform_occur_based_simp: bool,

    /// Number of conflicts between occurrence-based simplification rounds.
    pub occur_simp_interval: u64,

    /// The simplification pass schedule.
    pub simplify_schedule: Vec<SimplifyPass>,

    /// Enables XOR recovery from CNF clauses.
    pub do_find_xors: bool,

    /// Enables bounded variable elimination.
    pub do_bve: bool,

    /// Enables ternary resolution.
    pub do_tern_res: bool,

    /// Enables bounded variable addition.
    pub do_bva: bool,

    /// Largest clause size considered during XOR recovery.
    pub max_xor_to_find: usize,

    /// When a long XOR is added via the API, cut it into chunks of this many variables.
    pub xor_var_per_cut: usize,

    /// Cap on the number of Gauss matrices instantiated.
    pub max_num_matrices: usize,

    /// Minimum number of XORs for a matrix to be worth building.
    pub min_matrix_rows: usize,

    /// Cap on rows and columns of a single Gauss matrix.
    pub max_matrix_size: usize,

    /// Disable a matrix that made fewer useful propagations than this after its probation window.
    pub autodisable: bool,

    /// Permit detaching XOR-encoding CNF clauses once Gauss owns them.
    pub xor_detach_reattach: bool,

    /// Initial allowed clause growth per eliminated variable. Doubled each outer iteration.
    pub bve_grow_start: u32,

    /// Upper bound for the doubling `grow` budget.
    pub bve_grow_limit: u32,

    /// Resolvents longer than this are never added during variable elimination.
    pub bve_resolvent_size_limit: usize,

    /// Time budget counter for a single subsumption pass.
    pub subsumption_budget: i64,

    /// Time budget counter for a single ternary resolution pass.
    pub ternary_budget: i64,

    /// Time budget counter for a single variable elimination pass.
    pub bve_budget: i64,

    /// Time budget counter for a single XOR recovery pass.
    pub xor_find_budget: i64,

    /// Number of conflicts between shared-data synchronizations.
    pub sync_interval: u64,

    /// Stop after this many conflicts, returning unknown. `None` means no limit.
    pub max_confl: Option<u64>,

    /// Stop after this much time, returning unknown. `None` means no limit.
    pub max_time: Option<std::time::Duration>,
}

impl Default for SolverConfig {
    fn default() -> SolverConfig {
        SolverConfig {
            vsids_decay: 0.95,
            clause_activity_decay: 0.999,
            reduce_locals_interval: 15000,
            reduce_mids_interval: 10000,
            luby_restart_interval_scale: 128,
            polarity_mode: PolarityMode::Saved,
            perform_occur_based_simp: true,
            occur_simp_interval: 30000,
            simplify_schedule: vec![
                SimplifyPass::BackwSubStr,
                SimplifyPass::Xor,
                SimplifyPass::TernaryRes,
                SimplifyPass::Bve,
            ],
            do_find_xors: true,
            do_bve: true,
            do_tern_res: true,
            do_bva: false,
            max_xor_to_find: 6,
            xor_var_per_cut: 4,
            max_num_matrices: 3,
            min_matrix_rows: 3,
            max_matrix_size: 2000,
            autodisable: true,
            xor_detach_reattach: false,
            bve_grow_start: 0,
            bve_grow_limit: 64,
            bve_resolvent_size_limit: 100,
            subsumption_budget: 1_000_000,
            ternary_budget: 300_000,
            bve_budget: 1_000_000,
            xor_find_budget: 400_000,
            sync_interval: 6000,
            max_confl: None,
            max_time: None,
        }
    }
}
