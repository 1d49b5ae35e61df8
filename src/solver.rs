use std::collections::BTreeSet;

use argmin::{
    core::{
        observers::{Observe, ObserverMode},
        Error, Executor, Operator, State, TerminationReason, KV,
    },
    solver::conjugategradient::ConjugateGradient,
};
use argmin_observer_slog::SlogLogger;
use indicatif::ProgressBar;
use log::{debug, info};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CsrMatrix};

use crate::{
    assembler::to_dense,
    error::{FemError, Result},
};

pub const DEFAULT_PENALTY: f64 = 1e20;
pub const DEFAULT_TOLERANCE: f64 = 1e-10;
pub const DEFAULT_MAX_ITERATIONS: u64 = 10_000;

/// Pivots smaller than this fraction of the largest mark a rank deficient
/// reduced system
pub const RANK_TOLERANCE: f64 = 1e-12;

/// How fixed DOFs are enforced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolveMethod {
    /// Eliminate fixed DOFs and solve the free system with a pivoted QR
    Reduction,
    /// Stiffen fixed DOFs with a penalty and solve the full system with
    /// conjugate gradient
    #[default]
    Penalty,
}

/// What to attach to the iterative solver while it runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IterationObserver {
    #[default]
    Silent,
    /// An indicatif bar tracking the residual against its target
    ProgressBar,
    /// argmin's slog logger, one line per iteration on the terminal
    Terminal,
}

impl IterationObserver {
    /// Looks up an observer by its input-file name: `silent`, `progress` or
    /// `terminal`
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "silent" => Some(Self::Silent),
            "progress" => Some(Self::ProgressBar),
            "terminal" => Some(Self::Terminal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    pub method: SolveMethod,
    /// Diagonal stiffness added at fixed DOFs by the penalty method
    pub penalty: f64,
    /// Target residual of conjugate gradient, relative to the load norm
    pub tolerance: f64,
    pub max_iterations: u64,
    pub observer: IterationObserver,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            method: SolveMethod::default(),
            penalty: DEFAULT_PENALTY,
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            observer: IterationObserver::default(),
        }
    }
}

/// The set of DOFs held at zero displacement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Constraints {
    fixed: BTreeSet<usize>,
}

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_dofs<I: IntoIterator<Item = usize>>(dofs: I) -> Self {
        Self {
            fixed: dofs.into_iter().collect(),
        }
    }

    /// Reads a supports vector where any nonzero entry marks a fixed DOF
    pub fn from_supports(supports: &[f64]) -> Self {
        Self::from_dofs(
            supports
                .iter()
                .enumerate()
                .filter(|(_, s)| **s != 0.0)
                .map(|(dof, _)| dof),
        )
    }

    pub fn fix(&mut self, dof: usize) {
        self.fixed.insert(dof);
    }

    /// Fixes the given local DOF offsets of one node
    pub fn fix_node_dofs(&mut self, node: usize, dof_per_node: usize, offsets: &[usize]) {
        for offset in offsets {
            self.fixed.insert(node * dof_per_node + offset);
        }
    }

    /// Fixes every DOF of one node
    pub fn fix_node(&mut self, node: usize, dof_per_node: usize) {
        let offsets: Vec<usize> = (0..dof_per_node).collect();
        self.fix_node_dofs(node, dof_per_node, &offsets);
    }

    pub fn is_fixed(&self, dof: usize) -> bool {
        self.fixed.contains(&dof)
    }

    pub fn len(&self) -> usize {
        self.fixed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixed.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.fixed.iter().copied()
    }

    /// The unconstrained DOFs of a system with `num_dofs` DOFs, ascending
    pub fn free_dofs(&self, num_dofs: usize) -> Vec<usize> {
        (0..num_dofs).filter(|dof| !self.is_fixed(*dof)).collect()
    }

    fn check(&self, num_dofs: usize) -> Result<()> {
        match self.fixed.iter().next_back() {
            Some(dof) if *dof >= num_dofs => Err(FemError::DofOutOfRange {
                dof: *dof,
                num_dofs,
            }),
            _ => Ok(()),
        }
    }
}

fn check_system(rows: usize, cols: usize, loads: usize) -> Result<()> {
    if rows != cols {
        return Err(FemError::Input(format!(
            "stiffness matrix must be square, got {rows}x{cols}"
        )));
    }
    if loads != rows {
        return Err(FemError::Input(format!(
            "load vector has {loads} entries but the system has {rows} dofs"
        )));
    }
    Ok(())
}

/// Solves `K u = f` by eliminating the fixed DOFs
///
/// # Arguments
/// * `stiffness` - The total stiffness matrix
/// * `loads` - The nodal load vector
/// * `constraints` - The fixed DOFs
///
/// # Returns
/// The full displacement vector, exactly zero at fixed DOFs
pub fn solve_reduced(
    stiffness: &DMatrix<f64>,
    loads: &DVector<f64>,
    constraints: &Constraints,
) -> Result<DVector<f64>> {
    check_system(stiffness.nrows(), stiffness.ncols(), loads.len())?;
    let num_dofs = stiffness.nrows();
    constraints.check(num_dofs)?;

    let free = constraints.free_dofs(num_dofs);
    if free.is_empty() {
        return Err(FemError::NoFreeDofs);
    }
    let num_free = free.len();

    let reduced_stiffness =
        DMatrix::from_fn(num_free, num_free, |i, j| stiffness[(free[i], free[j])]);
    let reduced_loads = DVector::from_fn(num_free, |i, _| loads[free[i]]);

    debug!("solving reduced system with {num_free} free dofs");

    let qr = reduced_stiffness.col_piv_qr();
    let r = qr.r();
    let diagonal = r.diagonal().map(f64::abs);
    let largest = diagonal.max();
    let smallest = diagonal.min();
    if !(largest > 0.0) || smallest <= largest * RANK_TOLERANCE {
        return Err(FemError::SingularSystem(format!(
            "reduced stiffness matrix is rank deficient (pivots span {smallest:e} to {largest:e})"
        )));
    }

    let reduced_displacements = match qr.solve(&reduced_loads) {
        Some(u) if u.iter().all(|v| v.is_finite()) => u,
        _ => {
            return Err(FemError::SingularSystem(
                "reduced stiffness matrix could not be inverted".to_owned(),
            ))
        }
    };

    let mut displacements = DVector::zeros(num_dofs);
    for (i, dof) in free.iter().enumerate() {
        displacements[*dof] = reduced_displacements[i];
    }

    Ok(displacements)
}

/// Multiplies a sparse matrix by a dense vector
pub fn sparse_mul(a: &CsrMatrix<f64>, x: &[f64]) -> Vec<f64> {
    a.row_iter()
        .map(|row| {
            row.col_indices()
                .iter()
                .zip(row.values())
                .map(|(col, value)| value * x[*col])
                .sum()
        })
        .collect()
}

/// Runs multiplication for Conjugate Gradient Solver
struct ConjugateGradientOperator<'a> {
    a: &'a CsrMatrix<f64>,
}

impl<'a> Operator for ConjugateGradientOperator<'a> {
    type Param = Vec<f64>;
    type Output = Vec<f64>;

    fn apply(&self, x: &Self::Param) -> std::result::Result<Self::Output, Error> {
        Ok(sparse_mul(self.a, x))
    }
}

/// Observer bar for argmin solver
struct ConjugateGradientObserverBar {
    bar: ProgressBar,
    final_mag: f64,
}

impl ConjugateGradientObserverBar {
    fn new(target_cost: f64) -> ConjugateGradientObserverBar {
        ConjugateGradientObserverBar {
            bar: ProgressBar::new(1000),
            final_mag: target_cost.log10().floor(),
        }
    }
}

impl<I> Observe<I> for ConjugateGradientObserverBar
where
    I: State<Float = f64>,
{
    fn observe_init(&mut self, _name: &str, _state: &I, _kv: &KV) -> std::result::Result<(), Error> {
        Ok(())
    }

    fn observe_iter(&mut self, state: &I, _kv: &KV) -> std::result::Result<(), Error> {
        let cost = state.get_cost();
        if !cost.is_finite() || cost <= 0.0 {
            return Ok(());
        }
        let cost_mag = cost.log10().floor();
        let remaining = (cost_mag - self.final_mag).max(1.0);
        self.bar.set_position((1000. / f64::sqrt(remaining)) as u64);

        Ok(())
    }

    fn observe_final(&mut self, _state: &I) -> std::result::Result<(), Error> {
        self.bar.finish();
        Ok(())
    }
}

/// Adds the penalty to the diagonal of every fixed DOF
fn apply_penalty(stiffness: &CsrMatrix<f64>, constraints: &Constraints, penalty: f64) -> CsrMatrix<f64> {
    let mut triplets = CooMatrix::from(stiffness);
    for dof in constraints.iter() {
        triplets.push(dof, dof, penalty);
    }
    CsrMatrix::from(&triplets)
}

/// Solves a system of equations using the conjugate gradient method with
/// symmetric Jacobi scaling.
///
/// # Arguments
/// * `a` - A square positive definite matrix
/// * `b` - The right-hand side of the system
/// * `config` - Tolerance, iteration limit and observer
///
/// # Returns
/// An approximation for x in `Ax=b`
fn run_conjugate_gradient(
    a: &CsrMatrix<f64>,
    b: &DVector<f64>,
    config: &SolverConfig,
) -> Result<DVector<f64>> {
    let n = b.len();

    let mut diagonal = vec![0.0; n];
    for (row, col, value) in a.triplet_iter() {
        if row == col {
            diagonal[row] += *value;
        }
    }
    if let Some(dof) = diagonal.iter().position(|d| !(*d > 0.0)) {
        return Err(FemError::SingularSystem(format!(
            "dof {dof} has no positive stiffness on the diagonal"
        )));
    }
    let scale: Vec<f64> = diagonal.iter().map(|d| 1.0 / d.sqrt()).collect();

    let mut scaled = a.clone();
    for (row, col, value) in scaled.triplet_iter_mut() {
        *value *= scale[row] * scale[col];
    }
    let b_scaled: Vec<f64> = b.iter().zip(&scale).map(|(bi, si)| bi * si).collect();

    let b_norm = b_scaled.iter().map(|v| v * v).sum::<f64>().sqrt();
    if b_norm == 0.0 {
        return Ok(DVector::zeros(n));
    }
    // argmin reports the squared residual norm as the cost
    let target_cost = (config.tolerance * b_norm).powi(2);

    let solver: ConjugateGradient<_, f64> = ConjugateGradient::new(b_scaled);
    let initial_guess: Vec<f64> = vec![0.0; n];
    let operator = ConjugateGradientOperator { a: &scaled };

    let mut executor = Executor::new(operator, solver).configure(|state| {
        state
            .param(initial_guess)
            .max_iters(config.max_iterations)
            .target_cost(target_cost)
    });
    executor = match config.observer {
        IterationObserver::Silent => executor,
        IterationObserver::ProgressBar => executor.add_observer(
            ConjugateGradientObserverBar::new(target_cost),
            ObserverMode::NewBest,
        ),
        IterationObserver::Terminal => executor.add_observer(SlogLogger::term(), ObserverMode::Always),
    };

    let res = match executor.run() {
        Ok(r) => r,
        Err(err) => {
            return Err(FemError::SolverDidNotConverge(format!(
                "Conjugate Gradient error: {err}"
            )))
        }
    };

    let state = res.state();
    match state.get_termination_reason() {
        Some(TerminationReason::TargetCostReached) => {}
        Some(reason) => {
            return Err(FemError::SolverDidNotConverge(format!(
                "Conjugate Gradient stopped after {} iterations: {reason:?}",
                state.get_iter()
            )))
        }
        None => {
            return Err(FemError::SolverDidNotConverge(
                "Conjugate Gradient stopped without terminating".to_owned(),
            ))
        }
    }

    let best_param = match state.get_best_param() {
        Some(vec) => vec,
        None => {
            return Err(FemError::SolverDidNotConverge(
                "Conjugate Gradient could not produce best parameter".to_owned(),
            ))
        }
    };

    debug!("conjugate gradient converged in {} iterations", state.get_iter());

    Ok(DVector::from_iterator(
        n,
        best_param.iter().zip(&scale).map(|(y, s)| y * s),
    ))
}

/// Solves `K u = f` with fixed DOFs enforced by a penalty stiffness
///
/// # Arguments
/// * `stiffness` - The total stiffness matrix
/// * `loads` - The nodal load vector
/// * `constraints` - The fixed DOFs
/// * `config` - Penalty value and iterative solver settings
///
/// # Returns
/// The full displacement vector; fixed DOFs are zero to within the penalty
/// ratio
pub fn solve_penalty(
    stiffness: &CsrMatrix<f64>,
    loads: &DVector<f64>,
    constraints: &Constraints,
    config: &SolverConfig,
) -> Result<DVector<f64>> {
    check_system(stiffness.nrows(), stiffness.ncols(), loads.len())?;
    constraints.check(stiffness.nrows())?;

    let penalized = apply_penalty(stiffness, constraints, config.penalty);
    let mut penalized_loads = loads.clone();
    for dof in constraints.iter() {
        penalized_loads[dof] = 0.0;
    }

    run_conjugate_gradient(&penalized, &penalized_loads, config)
}

/// Solves for the nodal displacements with the method chosen in `config`
pub fn solve(
    stiffness: &CsrMatrix<f64>,
    loads: &DVector<f64>,
    constraints: &Constraints,
    config: &SolverConfig,
) -> Result<DVector<f64>> {
    info!(
        "solving {} dofs ({} fixed) with the {:?} method...",
        loads.len(),
        constraints.len(),
        config.method
    );
    let start = std::time::Instant::now();

    let displacements = match config.method {
        SolveMethod::Reduction => solve_reduced(&to_dense(stiffness), loads, constraints)?,
        SolveMethod::Penalty => solve_penalty(stiffness, loads, constraints, config)?,
    };

    let elapsed = (std::time::Instant::now() - start).as_secs_f32();
    info!("solved system in {:.3} seconds", elapsed);

    Ok(displacements)
}

/// Recovers nodal forces, including support reactions, as `K u`
pub fn compute_reactions(stiffness: &CsrMatrix<f64>, displacements: &DVector<f64>) -> DVector<f64> {
    DVector::from_vec(sparse_mul(stiffness, displacements.as_slice()))
}
