//! Plan serialization for preview and plan-as-data output.
//!
//! Rendering a plan never calls `apply`; it only reads descriptions and
//! execution details.

use serde::{Deserialize, Serialize};

use crate::action::Action;

/// One action of a plan in structured form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub details: Vec<String>,
}

pub fn plan_entries(plan: &[Action]) -> Vec<PlanEntry> {
    plan.iter()
        .map(|action| PlanEntry {
            kind: action.kind().to_string(),
            description: action.description(),
            details: action.execution_details(),
        })
        .collect()
}

/// Text rendering: one description line per action with indented
/// execution details.
pub fn render_plan_text(plan: &[Action]) -> String {
    let mut out = String::new();
    for action in plan {
        out.push_str(&format!("=> {}\n", action.description()));
        for detail in action.execution_details() {
            out.push_str(&format!("   - {detail}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{PackageInstall, ServiceEnable};

    fn sample_plan() -> Vec<Action> {
        vec![
            Action::PackageInstall(PackageInstall {
                package: "htop".to_string(),
            }),
            Action::ServiceEnable(ServiceEnable {
                service: "sshd".to_string(),
                runlevel: "default".to_string(),
            }),
        ]
    }

    #[test]
    fn test_plan_entries_structure() {
        let entries = plan_entries(&sample_plan());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, "PackageInstall");
        assert_eq!(entries[0].description, "Install package htop");
        assert_eq!(entries[0].details, vec!["run: apk add htop"]);
        assert_eq!(entries[1].kind, "ServiceEnable");
        assert_eq!(entries[1].details.len(), 2);
    }

    #[test]
    fn test_plan_entries_serialize_with_type_key() {
        let entries = plan_entries(&sample_plan());
        let json = serde_json::to_string_pretty(&entries).unwrap();
        assert!(json.contains("\"type\": \"PackageInstall\""));
        assert!(json.contains("\"description\": \"Install package htop\""));
    }

    #[test]
    fn test_render_plan_text() {
        let rendered = render_plan_text(&sample_plan());
        assert_eq!(
            rendered,
            "=> Install package htop\n   - run: apk add htop\n=> Enable and start service sshd in runlevel default\n   - run: rc-update add sshd default\n   - run: rc-service sshd start\n"
        );
    }
}
