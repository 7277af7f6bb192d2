//! Downhill simplex (Nelder–Mead) minimizer with a bounded number of function evaluations

const TINY: f64 = 1e-10;

/// Outcome of a simplex search
#[derive(Debug, Clone)]
pub struct Minimum {
    /// best vertex
    pub x: Vec<f64>,
    /// objective at `x`
    pub value: f64,
    /// number of objective evaluations
    pub evaluations: usize,
    /// fractional spread of the objective over the final simplex
    pub spread: f64,
    /// true if `spread` fell below the tolerance within the evaluation budget
    pub converged: bool,
}

/// Nelder–Mead simplex minimizer
///
/// The search stops when the fractional range of the objective over the simplex vertices
/// is below `ftol` or when the number of evaluations reaches `max_evaluations`.
/// On convergence the search is restarted once from the best vertex.
#[derive(Debug, Clone)]
pub struct Simplex {
    ftol: f64,
    max_evaluations: usize,
    restart: bool,
}
impl Default for Simplex {
    fn default() -> Self {
        Self {
            ftol: 1e-5,
            max_evaluations: 10_000,
            restart: true,
        }
    }
}
impl Simplex {
    pub fn new(ftol: f64) -> Self {
        Self {
            ftol,
            ..Default::default()
        }
    }
    pub fn max_evaluations(self, max_evaluations: usize) -> Self {
        Self {
            max_evaluations,
            ..self
        }
    }
    pub fn no_restart(self) -> Self {
        Self {
            restart: false,
            ..self
        }
    }
    /// Minimizes `f` starting from `start`, the initial simplex extends by `scales` along each axis
    pub fn minimize<F>(&self, mut f: F, start: &[f64], scales: &[f64]) -> Minimum
    where
        F: FnMut(&[f64]) -> f64,
    {
        let mut minimum = self.search(&mut f, start, scales, 0);
        if self.restart && minimum.converged {
            let x = minimum.x.clone();
            log::debug!(
                "simplex converged after {} evaluations, restarting",
                minimum.evaluations
            );
            minimum = self.search(&mut f, &x, scales, minimum.evaluations);
        }
        minimum
    }
    fn search<F>(&self, f: &mut F, start: &[f64], scales: &[f64], used: usize) -> Minimum
    where
        F: FnMut(&[f64]) -> f64,
    {
        let ndim = start.len();
        let mut vertices: Vec<Vec<f64>> = (0..=ndim)
            .map(|i| {
                let mut v = start.to_vec();
                if i > 0 {
                    v[i - 1] += scales[i - 1];
                }
                v
            })
            .collect();
        let mut values: Vec<f64> = vertices.iter().map(|v| f(v.as_slice())).collect();
        let mut evaluations = used + ndim + 1;
        let mut centroid_sum = column_sum(&vertices);
        loop {
            let (ilo, ihi, inhi) = rank(&values);
            let spread = 2. * (values[ihi] - values[ilo]).abs()
                / (values[ihi].abs() + values[ilo].abs() + TINY);
            if spread < self.ftol || evaluations >= self.max_evaluations {
                return Minimum {
                    x: vertices[ilo].clone(),
                    value: values[ilo],
                    evaluations,
                    spread,
                    converged: spread < self.ftol,
                };
            }
            // reflection of the worst vertex through the opposite face
            let y_try = try_vertex(f, &mut vertices, &mut values, &mut centroid_sum, ihi, -1.);
            evaluations += 1;
            if y_try <= values[ilo] {
                try_vertex(f, &mut vertices, &mut values, &mut centroid_sum, ihi, 2.);
                evaluations += 1;
            } else if y_try >= values[inhi] {
                let y_save = values[ihi];
                let y_try =
                    try_vertex(f, &mut vertices, &mut values, &mut centroid_sum, ihi, 0.5);
                evaluations += 1;
                if y_try >= y_save {
                    // contraction around the best vertex
                    let best = vertices[ilo].clone();
                    for i in (0..=ndim).filter(|&i| i != ilo) {
                        vertices[i]
                            .iter_mut()
                            .zip(&best)
                            .for_each(|(v, b)| *v = 0.5 * (*v + b));
                        values[i] = f(vertices[i].as_slice());
                    }
                    evaluations += ndim;
                    centroid_sum = column_sum(&vertices);
                }
            }
        }
    }
}

fn column_sum(vertices: &[Vec<f64>]) -> Vec<f64> {
    let ndim = vertices.first().map_or(0, |v| v.len());
    vertices.iter().fold(vec![0f64; ndim], |mut s, v| {
        s.iter_mut().zip(v).for_each(|(s, v)| *s += v);
        s
    })
}

/// Indices of the lowest, highest and next highest values
fn rank(values: &[f64]) -> (usize, usize, usize) {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let n = order.len();
    (order[0], order[n - 1], order[n.saturating_sub(2)])
}

/// Extrapolates the worst vertex through the opposite face by `factor`, replacing it if better
fn try_vertex<F>(
    f: &mut F,
    vertices: &mut [Vec<f64>],
    values: &mut [f64],
    centroid_sum: &mut [f64],
    ihi: usize,
    factor: f64,
) -> f64
where
    F: FnMut(&[f64]) -> f64,
{
    let ndim = centroid_sum.len() as f64;
    let fac1 = (1. - factor) / ndim;
    let fac2 = fac1 - factor;
    let trial: Vec<f64> = centroid_sum
        .iter()
        .zip(&vertices[ihi])
        .map(|(s, v)| s * fac1 - v * fac2)
        .collect();
    let y_try = f(trial.as_slice());
    if y_try < values[ihi] {
        values[ihi] = y_try;
        centroid_sum
            .iter_mut()
            .zip(vertices[ihi].iter().zip(&trial))
            .for_each(|(s, (old, new))| *s += new - old);
        vertices[ihi] = trial;
    }
    y_try
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadratic_bowl() {
        let f = |x: &[f64]| 1. + (x[0] - 3.).powi(2) + 10. * (x[1] + 1.).powi(2);
        let min = Simplex::new(1e-10).minimize(f, &[0., 0.], &[1., 1.]);
        assert!(min.converged);
        assert!((min.x[0] - 3.).abs() < 1e-3);
        assert!((min.x[1] + 1.).abs() < 1e-3);
    }

    #[test]
    fn rosenbrock() {
        let f = |x: &[f64]| (1. - x[0]).powi(2) + 100. * (x[1] - x[0] * x[0]).powi(2);
        let min = Simplex::new(1e-12).minimize(f, &[-1.2, 1.], &[0.5, 0.5]);
        assert!((min.x[0] - 1.).abs() < 1e-2, "{:?}", min);
        assert!((min.x[1] - 1.).abs() < 1e-2, "{:?}", min);
    }

    #[test]
    fn budget_is_bounded() {
        let f = |x: &[f64]| x.iter().map(|x| x.abs()).sum::<f64>();
        let min = Simplex::new(1e-300)
            .max_evaluations(200)
            .minimize(f, &[5., -4., 3.], &[1., 1., 1.]);
        assert!(!min.converged);
        assert!(min.evaluations <= 205);
        assert!(min.value < 12.);
    }
}
