use std::fmt;
use std::slice;

use crate::{ContentSummary, DeploymentName};

/// One step of a deployment plan.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "action", rename_all = "kebab-case"))]
pub enum DeploymentAction {
    /// Register new content under a fresh name.
    Add {
        /// Deployment identity.
        name: DeploymentName,
        /// The content being registered.
        content: ContentSummary,
    },
    /// Start a previously added deployment.
    Deploy {
        /// Deployment identity.
        name: DeploymentName,
    },
    /// Swap the content of an existing deployment without changing its
    /// desired state.
    Replace {
        /// Deployment identity.
        name: DeploymentName,
        /// The replacement content.
        content: ContentSummary,
    },
    /// Stop a running deployment.
    Undeploy {
        /// Deployment identity.
        name: DeploymentName,
    },
    /// Drop a deployment's configuration entry.
    Remove {
        /// Deployment identity.
        name: DeploymentName,
    },
}

impl DeploymentAction {
    /// The deployment name this action applies to.
    pub fn name(&self) -> &DeploymentName {
        match self {
            Self::Add { name, .. }
            | Self::Deploy { name }
            | Self::Replace { name, .. }
            | Self::Undeploy { name }
            | Self::Remove { name } => name,
        }
    }

    /// Short verb for log lines.
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Deploy { .. } => "deploy",
            Self::Replace { .. } => "replace",
            Self::Undeploy { .. } => "undeploy",
            Self::Remove { .. } => "remove",
        }
    }
}

impl fmt::Display for DeploymentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.verb(), self.name())
    }
}

/// An ordered batch of deployment actions, built fresh each scan cycle
/// and discarded after execution.
///
/// The staging helpers keep the ordering invariants the runtime relies
/// on: content is added before it is deployed, a stale configuration
/// entry is removed before its replacement is added, and a deployment is
/// undeployed before its entry is removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct DeploymentPlan {
    actions: Vec<DeploymentAction>,
}

impl DeploymentPlan {
    /// An empty plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a fresh deployment: add the content, then deploy it.
    pub fn add_and_deploy(&mut self, name: DeploymentName, content: ContentSummary) {
        self.actions.push(DeploymentAction::Add {
            name: name.clone(),
            content,
        });
        self.actions.push(DeploymentAction::Deploy { name });
    }

    /// Stage a content swap for an existing, started deployment.
    pub fn replace(&mut self, name: DeploymentName, content: ContentSummary) {
        self.actions.push(DeploymentAction::Replace { name, content });
    }

    /// Stage removal of a stale configuration entry followed by a fresh
    /// add+deploy of new content under the same name.
    pub fn remove_then_add(&mut self, name: DeploymentName, content: ContentSummary) {
        self.actions.push(DeploymentAction::Remove { name: name.clone() });
        self.add_and_deploy(name, content);
    }

    /// Stage undeploy+remove for a deployment whose content is gone.
    pub fn undeploy_and_remove(&mut self, name: DeploymentName) {
        self.actions.push(DeploymentAction::Undeploy { name: name.clone() });
        self.actions.push(DeploymentAction::Remove { name });
    }

    /// True when no actions were staged.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Number of staged actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// The staged actions, in execution order.
    pub fn actions(&self) -> &[DeploymentAction] {
        &self.actions
    }

    /// Iterate over the staged actions.
    pub fn iter(&self) -> slice::Iter<'_, DeploymentAction> {
        self.actions.iter()
    }
}

impl<'a> IntoIterator for &'a DeploymentPlan {
    type Item = &'a DeploymentAction;
    type IntoIter = slice::Iter<'a, DeploymentAction>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}

/// Per-action outcome reported by the plan execution collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActionReport {
    /// Deployment the action applied to.
    pub name: DeploymentName,
    /// Whether the runtime applied the action.
    pub success: bool,
    /// Failure description, when the runtime provides one.
    pub message: Option<String>,
}

/// Result of executing one deployment plan.
///
/// A report coming back at all means the plan was accepted by the
/// runtime; per-action failure policy is the executor's concern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlanReport {
    /// One entry per executed action, in plan order.
    pub outcomes: Vec<ActionReport>,
}

impl PlanReport {
    /// A report acknowledging every action in `plan` as successful.
    pub fn success_for(plan: &DeploymentPlan) -> Self {
        Self {
            outcomes: plan
                .iter()
                .map(|action| ActionReport {
                    name: action.name().clone(),
                    success: true,
                    message: None,
                })
                .collect(),
        }
    }
}
