use regex::Regex;

use super::ast::{self, SimpleCommand};
use super::{SafetyClass, SafetyError, SafetyPolicy};

#[derive(Debug, Clone)]
pub struct ClassificationOutcome {
    pub class: SafetyClass,
    pub reason: String,
}

/// Severity ordering used when a command is a wrapper around another
/// command (`xargs`, `sh -c`, ...): the wrapped command's class is looked
/// up, then bumped one grade, because the wrapper hides what actually
/// runs from a casual reading of the command line.
fn bump(class: SafetyClass) -> SafetyClass {
    match class {
        SafetyClass::ReadOnly => SafetyClass::Write,
        SafetyClass::Write => SafetyClass::Interactive,
        SafetyClass::Interactive => SafetyClass::Dangerous,
        SafetyClass::Dangerous => SafetyClass::Dangerous,
    }
}

const SHELL_INTERPRETERS: &[&str] = &["sh", "bash", "zsh", "dash", "ksh"];

/// Skips an `xargs` flag and, for the flags that take a value, its
/// argument too, returning the index of the first word that starts the
/// wrapped command.
fn xargs_command_start(args: &[String]) -> usize {
    let takes_value = ["-I", "-n", "-P", "-L", "-s", "-d", "-E", "-e", "--delimiter", "--max-args"];
    let mut i = 0;
    while i < args.len() {
        let a = &args[i];
        if !a.starts_with('-') {
            break;
        }
        if takes_value.contains(&a.as_str()) {
            i += 2;
        } else {
            i += 1;
        }
    }
    i
}

fn classify_simple(cmd: &SimpleCommand, policy: &SafetyPolicy) -> ClassificationOutcome {
    let program = base_name(&cmd.program);

    if program == "xargs" {
        let start = xargs_command_start(&cmd.args);
        if start < cmd.args.len() {
            let wrapped = SimpleCommand {
                program: cmd.args[start].clone(),
                args: cmd.args[start + 1..].to_vec(),
            };
            let inner = classify_simple(&wrapped, policy);
            return ClassificationOutcome {
                class: bump(inner.class),
                reason: format!("xargs wraps `{}`: {}", wrapped.program, inner.reason),
            };
        }
        return ClassificationOutcome {
            class: SafetyClass::Write,
            reason: "xargs with no evident target command".to_string(),
        };
    }

    if SHELL_INTERPRETERS.contains(&program) {
        if let Some(c_pos) = cmd.args.iter().position(|a| a == "-c") {
            if let Some(script) = cmd.args.get(c_pos + 1) {
                let worst = match ast::parse(script) {
                    Ok(node) => {
                        let mut cmds = Vec::new();
                        ast::collect_simple_commands(&node, &mut cmds);
                        cmds.iter()
                            .map(|c| classify_simple(c, policy))
                            .max_by_key(|o| severity_rank(o.class))
                    }
                    Err(_) => None,
                };
                return match worst {
                    Some(inner) => ClassificationOutcome {
                        class: bump(inner.class),
                        reason: format!("{} -c wraps a shell script: {}", program, inner.reason),
                    },
                    None => ClassificationOutcome {
                        class: SafetyClass::Dangerous,
                        reason: format!("{} -c script could not be parsed", program),
                    },
                };
            }
        }
        return ClassificationOutcome {
            class: SafetyClass::Interactive,
            reason: format!("{} with no -c script starts an interactive shell", program),
        };
    }

    keyword_classify(program, cmd, policy)
}

fn base_name(program: &str) -> &str {
    program.rsplit('/').next().unwrap_or(program)
}

fn severity_rank(class: SafetyClass) -> u8 {
    match class {
        SafetyClass::ReadOnly => 0,
        SafetyClass::Write => 1,
        SafetyClass::Interactive => 2,
        SafetyClass::Dangerous => 3,
    }
}

const DANGEROUS_BINARIES: &[&str] = &["rm", "mkfs", "dd", "shutdown", "reboot", "init", "kill", "pkill"];
const INTERACTIVE_BINARIES: &[&str] = &["vi", "vim", "nano", "less", "top", "htop", "ssh"];

fn keyword_classify(program: &str, cmd: &SimpleCommand, policy: &SafetyPolicy) -> ClassificationOutcome {
    if program == "kubectl" || program == "oc" {
        return classify_kubectl(cmd, policy);
    }

    if DANGEROUS_BINARIES.contains(&program) {
        return ClassificationOutcome {
            class: SafetyClass::Dangerous,
            reason: format!("`{}` is a destructive system binary", program),
        };
    }

    if INTERACTIVE_BINARIES.contains(&program) {
        return ClassificationOutcome {
            class: SafetyClass::Interactive,
            reason: format!("`{}` requires an interactive terminal", program),
        };
    }

    let joined = cmd.args.join(" ");
    if program == "chmod" && joined.contains("777") {
        return ClassificationOutcome {
            class: SafetyClass::Dangerous,
            reason: "chmod 777 grants world-writable permissions".to_string(),
        };
    }

    ClassificationOutcome {
        class: SafetyClass::Write,
        reason: format!("`{}` is treated as a generic write operation", program),
    }
}

fn classify_kubectl(cmd: &SimpleCommand, policy: &SafetyPolicy) -> ClassificationOutcome {
    let args: Vec<&str> = cmd.args.iter().map(String::as_str).collect();
    let verb = args.iter().find(|a| !a.starts_with('-')).copied().unwrap_or("");
    let lower_args: Vec<String> = cmd.args.iter().map(|a| a.to_lowercase()).collect();

    if verb == "delete" {
        if let Some(ns) = protected_namespace_target(&args, policy) {
            return ClassificationOutcome {
                class: SafetyClass::Dangerous,
                reason: format!("delete targets protected namespace `{}`", ns),
            };
        }
        return ClassificationOutcome {
            class: SafetyClass::Dangerous,
            reason: "kubectl delete is destructive".to_string(),
        };
    }

    if verb == "drain" {
        return ClassificationOutcome {
            class: SafetyClass::Dangerous,
            reason: "kubectl drain evicts workloads from a node".to_string(),
        };
    }

    if verb == "scale"
        && lower_args.iter().any(|a| a == "--replicas=0" || a == "0" && lower_args.iter().any(|b| b == "--replicas"))
    {
        return ClassificationOutcome {
            class: SafetyClass::Dangerous,
            reason: "scaling to zero replicas is effectively a delete".to_string(),
        };
    }

    if matches!(verb, "exec" | "attach" | "port-forward" | "edit" | "debug") {
        return ClassificationOutcome {
            class: SafetyClass::Interactive,
            reason: format!("kubectl {} requires an interactive session", verb),
        };
    }

    if matches!(
        verb,
        "apply" | "create" | "patch" | "replace" | "scale" | "rollout" | "restart" | "label"
            | "annotate" | "taint" | "cp" | "set" | "autoscale" | "expose"
    ) {
        return ClassificationOutcome {
            class: SafetyClass::Write,
            reason: format!("kubectl {} modifies cluster state", verb),
        };
    }

    if matches!(
        verb,
        "get" | "describe" | "logs" | "top" | "explain" | "api-resources" | "api-versions"
            | "auth" | "version" | "cluster-info" | "config" | "diff" | "events"
    ) {
        return ClassificationOutcome {
            class: SafetyClass::ReadOnly,
            reason: format!("kubectl {} is read-only", verb),
        };
    }

    ClassificationOutcome {
        class: SafetyClass::Write,
        reason: format!("kubectl {} is not recognized; treated as a write by default", verb),
    }
}

fn protected_namespace_target(args: &[&str], policy: &SafetyPolicy) -> Option<String> {
    for (i, a) in args.iter().enumerate() {
        if *a == "namespace" || *a == "namespaces" || *a == "ns" {
            if let Some(target) = args.get(i + 1) {
                if policy.protected_namespaces.iter().any(|p| p == target) {
                    return Some((*target).to_string());
                }
            }
        }
    }
    for (i, a) in args.iter().enumerate() {
        if *a == "-n" || *a == "--namespace" {
            if let Some(target) = args.get(i + 1) {
                if policy.protected_namespaces.iter().any(|p| p == target) {
                    return Some((*target).to_string());
                }
            }
        }
    }
    None
}

fn matches_blocked(text: &str, patterns: &[Regex]) -> Option<String> {
    patterns.iter().find(|re| re.is_match(text)).map(|re| re.as_str().to_string())
}

/// Classifies a raw command string into a [`SafetyClass`].
///
/// Order of evaluation:
/// 1. Blocked-pattern regexes, checked against the raw string and every
///    extracted simple command - short-circuits to `Dangerous`.
/// 2. Parse failures classify as `Dangerous` (never panics, never silently
///    downgrades an unparseable command to read-only).
/// 3. Each extracted simple command is classified independently; the
///    overall result is the most severe class found anywhere in the tree.
pub fn classify(command: &str, policy: &SafetyPolicy) -> Result<ClassificationOutcome, SafetyError> {
    if command.trim().is_empty() {
        return Err(SafetyError::InvalidInput);
    }

    if let Some(pattern) = matches_blocked(command, &policy.blocked_patterns) {
        return Ok(ClassificationOutcome {
            class: SafetyClass::Dangerous,
            reason: format!("matched blocked pattern `{}`", pattern),
        });
    }

    let node = match ast::parse(command) {
        Ok(node) => node,
        Err(e) => {
            return Ok(ClassificationOutcome {
                class: SafetyClass::Dangerous,
                reason: format!("command could not be parsed as shell syntax: {}", e),
            });
        }
    };

    let mut commands = Vec::new();
    ast::collect_simple_commands(&node, &mut commands);

    if commands.is_empty() {
        return Ok(ClassificationOutcome {
            class: SafetyClass::Dangerous,
            reason: "no executable command found".to_string(),
        });
    }

    for cmd in &commands {
        let joined = cmd.argv().join(" ");
        if let Some(pattern) = matches_blocked(&joined, &policy.blocked_patterns) {
            return Ok(ClassificationOutcome {
                class: SafetyClass::Dangerous,
                reason: format!("matched blocked pattern `{}` in `{}`", pattern, joined),
            });
        }
    }

    let worst = commands
        .iter()
        .map(|c| classify_simple(c, policy))
        .max_by_key(|o| severity_rank(o.class))
        .expect("commands is non-empty");

    Ok(worst)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> SafetyPolicy {
        SafetyPolicy::default()
    }

    #[test]
    fn delete_is_dangerous() {
        let out = classify("kubectl delete deployment nginx", &policy()).unwrap();
        assert_eq!(out.class, SafetyClass::Dangerous);
    }

    #[test]
    fn drain_is_dangerous() {
        let out = classify("kubectl drain node-01", &policy()).unwrap();
        assert_eq!(out.class, SafetyClass::Dangerous);
    }

    #[test]
    fn scale_to_zero_is_dangerous() {
        let out = classify("kubectl scale deployment nginx --replicas=0", &policy()).unwrap();
        assert_eq!(out.class, SafetyClass::Dangerous);
    }

    #[test]
    fn apply_is_write() {
        let out = classify("kubectl apply -f deployment.yaml", &policy()).unwrap();
        assert_eq!(out.class, SafetyClass::Write);
    }

    #[test]
    fn get_is_read_only() {
        let out = classify("kubectl get pods", &policy()).unwrap();
        assert_eq!(out.class, SafetyClass::ReadOnly);
    }

    #[test]
    fn exec_is_interactive() {
        let out = classify("kubectl exec -it mypod -- bash", &policy()).unwrap();
        assert_eq!(out.class, SafetyClass::Interactive);
    }

    #[test]
    fn protected_namespace_delete_is_dangerous() {
        let mut p = policy();
        p.protected_namespaces.push("kube-system".to_string());
        let out = classify("kubectl delete namespace kube-system", &p).unwrap();
        assert_eq!(out.class, SafetyClass::Dangerous);
        assert!(out.reason.contains("protected namespace"));
    }

    #[test]
    fn xargs_wrapping_delete_bumps_to_dangerous() {
        let out = classify("kubectl get pods -o name | xargs kubectl get", &policy()).unwrap();
        // xargs wraps a ReadOnly `kubectl get`, bumped one grade to Write,
        // but the pipeline also contains a plain ReadOnly `kubectl get pods`;
        // overall severity is the max across the whole pipeline.
        assert_eq!(out.class, SafetyClass::Write);
    }

    #[test]
    fn sh_c_wrapping_dangerous_command_stays_dangerous() {
        let out = classify("bash -c 'kubectl delete pod foo'", &policy()).unwrap();
        assert_eq!(out.class, SafetyClass::Dangerous);
    }

    #[test]
    fn blocked_pattern_short_circuits() {
        let mut p = policy();
        p.blocked_patterns.push(Regex::new(r"rm\s+-rf\s+/").unwrap());
        let out = classify("rm -rf /", &p).unwrap();
        assert_eq!(out.class, SafetyClass::Dangerous);
        assert!(out.reason.contains("blocked pattern"));
    }

    #[test]
    fn unparseable_command_classifies_dangerous_not_error() {
        let out = classify("kubectl get pods \"unterminated", &policy()).unwrap();
        assert_eq!(out.class, SafetyClass::Dangerous);
    }

    #[test]
    fn empty_input_is_invalid() {
        assert!(matches!(classify("", &policy()), Err(SafetyError::InvalidInput)));
        assert!(matches!(classify("   ", &policy()), Err(SafetyError::InvalidInput)));
    }
}
