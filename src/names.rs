//! names — column labels for algorithm output buffers.
//!
//! Every algorithm writes a fixed set of diagnostic columns followed by one
//! column per model parameter. The diagnostic prefix depends only on the
//! algorithm; the parameter names come from the live model instance as one
//! comma-delimited string.

use crate::native::Engine;
use crate::session::ModelSession;

/// Diagnostic columns written by the HMC sampler.
pub const HMC_SAMPLER_VARIABLES: [&str; 7] = [
    "lp__",
    "accept_stat__",
    "stepsize__",
    "treedepth__",
    "n_leapfrog__",
    "divergent__",
    "energy__",
];

/// Diagnostic columns written by Pathfinder.
pub const PATHFINDER_VARIABLES: [&str; 2] = ["lp_approx__", "lp__"];

/// Diagnostic columns written by the optimizer.
pub const OPTIMIZE_VARIABLES: [&str; 1] = ["lp__"];

/// Diagnostic columns written by the Laplace sampler.
pub const LAPLACE_VARIABLES: [&str; 2] = ["log_p__", "log_q__"];

/// Split a comma-delimited name list.
///
/// Surrounding whitespace is trimmed first; an empty list yields no names
/// rather than a single empty name.
pub fn split_param_names(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed.split(',').map(str::to_string).collect()
}

/// Full ordered column labels: `fixed` followed by the model's names.
pub fn resolve<E: Engine + ?Sized>(fixed: &[&str], session: &ModelSession<'_, E>) -> Vec<String> {
    let model_names = split_param_names(&session.param_names());
    let mut names = Vec::with_capacity(fixed.len() + model_names.len());
    names.extend(fixed.iter().map(|name| name.to_string()));
    names.extend(model_names);
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::mock::MockEngine;

    #[test]
    // Purpose
    // -------
    // Ensure an empty or blank name string yields no names.
    //
    // Given
    // -----
    // - "", "   " and "\n".
    //
    // Expect
    // ------
    // - Empty vectors in every case.
    fn split_param_names_empty_input_yields_no_names() {
        assert!(split_param_names("").is_empty());
        assert!(split_param_names("   ").is_empty());
        assert!(split_param_names("\n").is_empty());
    }

    #[test]
    fn split_param_names_preserves_order_and_trims_ends() {
        assert_eq!(
            split_param_names(" mu,theta.1,theta.2 \n"),
            vec!["mu".to_string(), "theta.1".to_string(), "theta.2".to_string()]
        );
    }

    #[test]
    // Purpose
    // -------
    // Verify the diagnostic prefix always precedes the model's names.
    //
    // Given
    // -----
    // - A session over a model named "mu,sigma", and a model with no names.
    //
    // Expect
    // ------
    // - Sampler labels are the 7 diagnostics then mu, sigma.
    // - The nameless model yields just the diagnostics.
    fn resolve_prepends_fixed_names() {
        // Arrange
        let engine = MockEngine::new("mu,sigma", 2);
        let empty = MockEngine::new("", 0);
        let session = ModelSession::acquire(&engine, c"", 1).unwrap();
        let empty_session = ModelSession::acquire(&empty, c"", 1).unwrap();

        // Act
        let names = resolve(&HMC_SAMPLER_VARIABLES, &session);
        let laplace = resolve(&LAPLACE_VARIABLES, &empty_session);

        // Assert
        assert_eq!(names.len(), 9);
        assert_eq!(names[0], "lp__");
        assert_eq!(&names[7..], ["mu", "sigma"]);
        assert_eq!(laplace, vec!["log_p__".to_string(), "log_q__".to_string()]);
    }
}
