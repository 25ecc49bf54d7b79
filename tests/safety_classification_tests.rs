//! Real-world command classification scenarios, grounded in the host's
//! inherited risk-tier expectations (delete/drain/scale-to-zero as the
//! highest tier, apply/create/patch as a mutating-but-unattended tier,
//! exec/port-forward as needing a live terminal, get/describe/logs as
//! safe to auto-approve).

use k13d::safety::{self, SafetyClass, SafetyPolicy};

fn class_of(command: &str) -> SafetyClass {
    safety::classify(command, &SafetyPolicy::default()).unwrap().class
}

#[test]
fn read_only_kubectl_verbs_are_safe() {
    assert_eq!(class_of("kubectl get pods"), SafetyClass::ReadOnly);
    assert_eq!(class_of("kubectl describe pod web-0"), SafetyClass::ReadOnly);
    assert_eq!(class_of("kubectl logs web-0 -f"), SafetyClass::ReadOnly);
}

#[test]
fn mutating_kubectl_verbs_need_approval_but_arent_dangerous() {
    assert_eq!(class_of("kubectl apply -f deploy.yaml"), SafetyClass::Write);
    assert_eq!(class_of("kubectl scale deployment api --replicas=3"), SafetyClass::Write);
    assert_eq!(class_of("kubectl patch deployment api -p '{}'"), SafetyClass::Write);
}

#[test]
fn destructive_kubectl_verbs_are_dangerous() {
    assert_eq!(class_of("kubectl delete namespace production"), SafetyClass::Dangerous);
    assert_eq!(class_of("kubectl delete pods --all -n prod"), SafetyClass::Dangerous);
    assert_eq!(class_of("kubectl drain node-prod-01 --force"), SafetyClass::Dangerous);
}

#[test]
fn interactive_kubectl_verbs_need_a_live_terminal() {
    assert_eq!(class_of("kubectl exec -it web-0 -- bash"), SafetyClass::Interactive);
    assert_eq!(class_of("kubectl port-forward svc/web 8080:80"), SafetyClass::Interactive);
    assert_eq!(class_of("kubectl edit deployment api"), SafetyClass::Interactive);
}

#[test]
fn pipelines_are_classified_by_their_most_severe_stage() {
    // a read-only listing piped into a destructive xargs command is as
    // dangerous as running the destructive command directly.
    let cmd = "kubectl get pods -o name | xargs kubectl delete";
    assert_eq!(class_of(cmd), SafetyClass::Dangerous);
}

#[test]
fn command_substitution_is_inspected_too() {
    let cmd = "kubectl delete pod $(kubectl get pods -o name | head -1)";
    assert_eq!(class_of(cmd), SafetyClass::Dangerous);
}

#[test]
fn shell_wrapper_around_a_command_is_classified_one_grade_worse() {
    // sh -c hides what actually runs from a casual reading, so a plain
    // write command wrapped in a shell gets bumped to interactive.
    let cmd = "sh -c 'kubectl apply -f deploy.yaml'";
    assert_eq!(class_of(cmd), SafetyClass::Interactive);
}

#[test]
fn blocked_pattern_overrides_otherwise_safe_classification() {
    let policy = SafetyPolicy::with_blocked_patterns(&["rm\\s+-rf\\s+/".to_string()]).unwrap();
    let outcome = safety::classify("rm -rf /", &policy).unwrap();
    assert_eq!(outcome.class, SafetyClass::Dangerous);
}

#[test]
fn empty_command_is_rejected() {
    let result = safety::classify("", &SafetyPolicy::default());
    assert!(result.is_err());
}
