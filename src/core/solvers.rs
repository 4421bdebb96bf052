use anyhow::{anyhow, bail};
use roots::{find_root_brent, SimpleConvergency};

const MAX_BRACKET_EXPANSIONS: usize = 60;

/// Find a root of `fun` near `x0`. Starting from `x0 ± initial_step`, the bracket is doubled
/// in width until the function changes sign across it, then refined with Brent's method.
pub(crate) fn root(
    fun: impl Fn(f64) -> f64,
    x0: f64,
    initial_step: f64,
    tol: Option<f64>,
) -> anyhow::Result<f64> {
    let mut convergency = SimpleConvergency {
        eps: tol.unwrap_or(1e-8),
        max_iter: 100,
    };

    let (mut lower, mut upper) = (x0 - initial_step.abs(), x0 + initial_step.abs());
    let mut expansions = 0;
    while fun(lower) * fun(upper) > 0. {
        if expansions == MAX_BRACKET_EXPANSIONS {
            bail!("Could not bracket a root starting from {x0}, last tried [{lower}, {upper}]");
        }
        let width = upper - lower;
        lower -= width / 2.;
        upper += width / 2.;
        expansions += 1;
    }

    find_root_brent::<f64, _>(lower, upper, &fun, &mut convergency).map_err(|e| anyhow!(e))
}
