//! Remote call plans: which calls run for one lookup and what each waits on.

use std::collections::{BTreeMap, BTreeSet};

use roblox_types::CallName;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("call {0} appears more than once")]
    Duplicate(CallName),

    #[error("call {call} depends on {dependency}, which is not in the plan")]
    UnknownDependency {
        call: CallName,
        dependency: CallName,
    },

    #[error("call {0} is part of a dependency cycle")]
    Cycle(CallName),

    #[error("call {0} needs an account id but does not depend on resolve-account-by-name")]
    MissingAccountInput(CallName),
}

/// One call in a plan and the calls whose success it requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCall {
    pub name: CallName,
    pub depends_on: Vec<CallName>,
}

impl PlannedCall {
    pub fn new(name: CallName) -> Self {
        Self {
            name,
            depends_on: Vec::new(),
        }
    }

    pub fn after(mut self, dependency: CallName) -> Self {
        self.depends_on.push(dependency);
        self
    }
}

/// Validated, immutable set of calls for one invocation.
#[derive(Debug, Clone)]
pub struct RemoteCallPlan {
    target: String,
    group_id: u64,
    calls: Vec<PlannedCall>,
}

impl RemoteCallPlan {
    pub fn new(
        target: impl Into<String>,
        group_id: u64,
        calls: Vec<PlannedCall>,
    ) -> Result<Self, PlanError> {
        validate(&calls)?;
        Ok(Self {
            target: target.into(),
            group_id,
            calls,
        })
    }

    /// Resolve the name, then every account-scoped call concurrently.
    pub fn standard(target: impl Into<String>, group_id: u64) -> Self {
        let calls = CallName::ALL
            .iter()
            .map(|name| {
                if name.requires_account() {
                    PlannedCall::new(*name).after(CallName::ResolveAccount)
                } else {
                    PlannedCall::new(*name)
                }
            })
            .collect();
        Self {
            target: target.into(),
            group_id,
            calls,
        }
    }

    /// A plan with no calls at all.
    pub fn empty(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            group_id: 0,
            calls: Vec::new(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn group_id(&self) -> u64 {
        self.group_id
    }

    pub fn calls(&self) -> &[PlannedCall] {
        &self.calls
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

fn validate(calls: &[PlannedCall]) -> Result<(), PlanError> {
    let mut deps: BTreeMap<CallName, &[CallName]> = BTreeMap::new();
    for call in calls {
        if deps.insert(call.name, &call.depends_on).is_some() {
            return Err(PlanError::Duplicate(call.name));
        }
    }

    for call in calls {
        for dependency in &call.depends_on {
            if !deps.contains_key(dependency) {
                return Err(PlanError::UnknownDependency {
                    call: call.name,
                    dependency: *dependency,
                });
            }
        }
    }

    // Kahn's algorithm: anything left unvisited sits on a cycle.
    let mut done: BTreeSet<CallName> = BTreeSet::new();
    loop {
        let ready: Vec<CallName> = deps
            .iter()
            .filter(|(name, d)| !done.contains(*name) && d.iter().all(|x| done.contains(x)))
            .map(|(name, _)| *name)
            .collect();
        if ready.is_empty() {
            break;
        }
        done.extend(ready);
    }
    if let Some(name) = deps.keys().find(|name| !done.contains(*name)) {
        return Err(PlanError::Cycle(*name));
    }

    for call in calls {
        if call.name.requires_account() && !depends_on_resolve(call.name, &deps) {
            return Err(PlanError::MissingAccountInput(call.name));
        }
    }

    Ok(())
}

fn depends_on_resolve(name: CallName, deps: &BTreeMap<CallName, &[CallName]>) -> bool {
    let mut stack = vec![name];
    let mut seen = BTreeSet::new();
    while let Some(current) = stack.pop() {
        if !seen.insert(current) {
            continue;
        }
        for dependency in deps.get(&current).copied().unwrap_or_default() {
            if *dependency == CallName::ResolveAccount {
                return true;
            }
            stack.push(*dependency);
        }
    }
    false
}
