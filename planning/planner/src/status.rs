use crate::config::DownwardConfig;

/// Outcome of a planner run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, derive_more::Display)]
pub enum ResultStatus {
    #[display("SOLVED_SATISFICING")]
    SolvedSatisficing,
    #[display("SOLVED_OPTIMALLY")]
    SolvedOptimally,
    #[display("UNSOLVABLE_PROVEN")]
    UnsolvableProven,
    #[display("UNSOLVABLE_INCOMPLETELY")]
    UnsolvableIncompletely,
    #[display("TIMEOUT")]
    Timeout,
    #[display("MEMOUT")]
    Memout,
    #[display("INTERNAL_ERROR")]
    InternalError,
    #[display("UNSUPPORTED_PROBLEM")]
    UnsupportedProblem,
    /// A plan reported by an anytime run that has not terminated yet.
    #[display("INTERMEDIATE")]
    Intermediate,
}

impl ResultStatus {
    pub fn is_solved(self) -> bool {
        matches!(self, ResultStatus::SolvedSatisficing | ResultStatus::SolvedOptimally)
    }
}

/// Interprets the exit code of the planner driver. `None` denotes a process killed by a signal.
pub fn result_status(config: &DownwardConfig, has_metrics: bool, plan_found: bool, exit_code: Option<i32>) -> ResultStatus {
    match exit_code {
        Some(0..=3) if plan_found => {
            if has_metrics {
                config.metrics_guarantee()
            } else {
                ResultStatus::SolvedSatisficing
            }
        }
        Some(0..=3) => config.no_plan_guarantee(),
        Some(10 | 11) => ResultStatus::UnsolvableProven,
        Some(12) => ResultStatus::UnsolvableIncompletely,
        Some(34) => ResultStatus::UnsupportedProblem,
        Some(21 | 23) => ResultStatus::Timeout,
        Some(20 | 22) => ResultStatus::Memout,
        _ => ResultStatus::InternalError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ResultStatus::*;

    #[test]
    fn exit_codes() {
        let sat = DownwardConfig::satisficing();
        let opt = DownwardConfig::optimal();

        assert_eq!(result_status(&sat, false, true, Some(0)), SolvedSatisficing);
        assert_eq!(result_status(&sat, true, true, Some(2)), SolvedSatisficing);
        assert_eq!(result_status(&opt, false, true, Some(0)), SolvedSatisficing);
        assert_eq!(result_status(&opt, true, true, Some(0)), SolvedOptimally);

        assert_eq!(result_status(&sat, false, false, Some(0)), UnsolvableIncompletely);
        assert_eq!(result_status(&opt, false, false, Some(3)), UnsolvableProven);

        for (code, status) in [
            (10, UnsolvableProven),
            (11, UnsolvableProven),
            (12, UnsolvableIncompletely),
            (34, UnsupportedProblem),
            (21, Timeout),
            (23, Timeout),
            (20, Memout),
            (22, Memout),
            (35, InternalError),
            (-1, InternalError),
        ] {
            assert_eq!(result_status(&sat, false, false, Some(code)), status, "exit code {code}");
        }
        assert_eq!(result_status(&sat, false, true, None), InternalError);
        assert!(SolvedOptimally.is_solved());
        assert!(!Intermediate.is_solved());
        assert_eq!(UnsolvableProven.to_string(), "UNSOLVABLE_PROVEN");
    }
}
