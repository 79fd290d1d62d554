/// Exit codes spec.md §6 fixes for the orchestrator CLI.
pub const EXIT_SUCCESS: i32 = 0;
/// Usage/validation failure: empty selector, missing `-m`, empty plan.
pub const EXIT_USAGE: i32 = 1;
/// A verb doesn't apply to the kind of component it targets.
pub const EXIT_UNKNOWN_VERB_ON_COMPONENT: i32 = 2;
/// One or more planned actions failed to execute.
pub const EXIT_ACTIONS_FAILED: i32 = 3;
/// The status pipeline itself failed (infrastructure, decode, unreachable
/// host without the ignore flag, ...).
pub const EXIT_STATUS_FAILED: i32 = 4;

/// Classify a planning failure into spec.md's exit codes.
pub fn exit_for_plan_error(err: &yadt_plan::PlanError) -> i32 {
    match err {
        yadt_plan::PlanError::EmptySelector { .. }
        | yadt_plan::PlanError::MissingMessage
        | yadt_plan::PlanError::PlanEmpty
        | yadt_plan::PlanError::ComponentNotFound { .. } => EXIT_USAGE,
    }
}

/// Classify an execution failure into spec.md's exit codes.
pub fn exit_for_exec_error(err: &yadt_exec::ExecError) -> i32 {
    match err {
        yadt_exec::ExecError::UnsupportedVerb { .. } => EXIT_UNKNOWN_VERB_ON_COMPONENT,
        yadt_exec::ExecError::ActionsFailed { .. } => EXIT_ACTIONS_FAILED,
        yadt_exec::ExecError::ComponentNotFound { .. }
        | yadt_exec::ExecError::Process(_)
        | yadt_exec::ExecError::Component(_) => EXIT_STATUS_FAILED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yadt_uri::{ComponentKind, Uri};

    #[test]
    fn empty_selector_is_usage() {
        let err = yadt_plan::PlanError::EmptySelector { selector: "host://nowhere".to_string() };
        assert_eq!(exit_for_plan_error(&err), EXIT_USAGE);
    }

    #[test]
    fn unsupported_verb_is_unknown_verb_on_component() {
        let err = yadt_exec::ExecError::UnsupportedVerb {
            verb: yadt_plan::Verb::Lock,
            uri: Uri::new(ComponentKind::Service, "web01", Some("nginx".to_string()), None),
        };
        assert_eq!(exit_for_exec_error(&err), EXIT_UNKNOWN_VERB_ON_COMPONENT);
    }

    #[test]
    fn actions_failed_is_its_own_code() {
        let err = yadt_exec::ExecError::ActionsFailed { count: 2 };
        assert_eq!(exit_for_exec_error(&err), EXIT_ACTIONS_FAILED);
    }
}
