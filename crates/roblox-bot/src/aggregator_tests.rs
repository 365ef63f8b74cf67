use chrono::{TimeZone, Utc};
use roblox_client::MockGateway;
use roblox_types::{
    AccountAge, AccountId, CallFailure, CallName, CallPayload, FailureKind, GroupRole, Profile,
    ResolvedAccount,
};
use tokio::time::{Duration, Instant};

use super::*;
use crate::plan::{PlannedCall, RemoteCallPlan};

const GROUP_ID: u64 = 11592051;

fn account() -> ResolvedAccount {
    ResolvedAccount {
        id: AccountId(156),
        name: "builderman".to_string(),
        display_name: "Builderman".to_string(),
    }
}

fn profile() -> Profile {
    Profile {
        description: "Hello".to_string(),
        created: Utc.with_ymd_and_hms(2006, 2, 27, 21, 6, 40).unwrap(),
        is_banned: false,
    }
}

/// Script a successful reply for every catalog call.
fn happy_gateway() -> MockGateway {
    let gateway = MockGateway::new();
    gateway
        .respond(CallName::ResolveAccount, Ok(CallPayload::Account(account())))
        .respond(
            CallName::RoleInGroup,
            Ok(CallPayload::Role(Some(GroupRole {
                rank: 5,
                name: "Sergeant".to_string(),
            }))),
        )
        .respond(CallName::Profile, Ok(CallPayload::Profile(profile())))
        .respond(
            CallName::AvatarUrl,
            Ok(CallPayload::AvatarUrl("https://cdn/x.png".to_string())),
        )
        .respond(CallName::Badges, Ok(CallPayload::Badges(vec![])))
        .respond(CallName::Friends, Ok(CallPayload::Friends(12)))
        .respond(CallName::Groups, Ok(CallPayload::Groups(vec![])))
        .respond(
            CallName::AccountAge,
            Ok(CallPayload::AccountAge(AccountAge {
                created: profile().created,
                days: 7000,
            })),
        );
    gateway
}

fn no_retry() -> CallAggregator {
    CallAggregator::new(RetryPolicy::none())
}

#[tokio::test]
async fn test_standard_plan_all_succeed() {
    let gateway = happy_gateway();
    let plan = RemoteCallPlan::standard("builderman", GROUP_ID);

    let result = no_retry().run(&plan, &gateway).await.unwrap();

    assert_eq!(result.target, "builderman");
    assert_eq!(result.account, Some(account()));
    assert_eq!(result.outcomes.len(), CallName::ALL.len());
    assert!(result.is_complete());
    assert!(result.unavailable().is_empty());
    assert_eq!(gateway.total_calls(), CallName::ALL.len());
}

#[tokio::test]
async fn test_role_request_uses_resolved_id_and_group() {
    let gateway = happy_gateway();
    let plan = RemoteCallPlan::standard("builderman", GROUP_ID);

    no_retry().run(&plan, &gateway).await.unwrap();

    let role_request = gateway
        .calls()
        .into_iter()
        .find(|r| r.name() == CallName::RoleInGroup)
        .unwrap();
    assert_eq!(
        role_request,
        CallRequest::RoleInGroup {
            account_id: AccountId(156),
            group_id: GROUP_ID
        }
    );
    assert_eq!(
        gateway.calls()[0],
        CallRequest::ResolveAccount {
            name: "builderman".to_string()
        },
        "resolve must run before anything that depends on it"
    );
}

#[tokio::test]
async fn test_failed_dependency_skips_dependent_without_calling_it() {
    let gateway = MockGateway::new();
    gateway
        .respond(CallName::ResolveAccount, Ok(CallPayload::Account(account())))
        .respond(CallName::Profile, Err(CallFailure::malformed("bad body")))
        .respond(
            CallName::AccountAge,
            Ok(CallPayload::AccountAge(AccountAge {
                created: profile().created,
                days: 1,
            })),
        );
    let plan = RemoteCallPlan::new(
        "builderman",
        GROUP_ID,
        vec![
            PlannedCall::new(CallName::ResolveAccount),
            PlannedCall::new(CallName::Profile).after(CallName::ResolveAccount),
            PlannedCall::new(CallName::AccountAge).after(CallName::Profile),
        ],
    )
    .unwrap();

    let result = no_retry().run(&plan, &gateway).await.unwrap();

    assert_eq!(
        result.outcome(CallName::AccountAge),
        Some(&CallOutcome::Skipped {
            cause: CallName::Profile
        })
    );
    assert_eq!(gateway.call_count(CallName::AccountAge), 0);
}

#[tokio::test]
async fn test_unresolved_name_short_circuits_every_dependent() {
    let gateway = happy_gateway();
    gateway.respond_once(
        CallName::ResolveAccount,
        Err(CallFailure::not_found("no account named ghost")),
    );
    let plan = RemoteCallPlan::standard("ghost", GROUP_ID);

    let result = no_retry().run(&plan, &gateway).await.unwrap();

    assert!(result.account.is_none());
    assert_eq!(
        result.resolve_failure().map(|f| f.kind),
        Some(FailureKind::NotFound)
    );
    for name in &CallName::ALL[1..] {
        assert_eq!(
            result.outcome(*name),
            Some(&CallOutcome::Skipped {
                cause: CallName::ResolveAccount
            }),
            "{} must be skipped",
            name
        );
    }
    assert_eq!(gateway.total_calls(), 1);
}

#[tokio::test]
async fn test_independent_branch_failure_is_isolated() {
    let gateway = happy_gateway();
    gateway.respond(CallName::Badges, Err(CallFailure::unauthorized("cookie")));
    let plan = RemoteCallPlan::new(
        "builderman",
        GROUP_ID,
        vec![
            PlannedCall::new(CallName::ResolveAccount),
            PlannedCall::new(CallName::Badges).after(CallName::ResolveAccount),
            PlannedCall::new(CallName::Friends).after(CallName::ResolveAccount),
        ],
    )
    .unwrap();

    let result = no_retry().run(&plan, &gateway).await.unwrap();

    assert!(matches!(
        result.outcome(CallName::Badges),
        Some(CallOutcome::Failed(f)) if f.kind == FailureKind::Unauthorized
    ));
    assert_eq!(
        result.payload(CallName::Friends),
        Some(&CallPayload::Friends(12))
    );
    assert_eq!(result.unavailable(), vec![CallName::Badges]);
    assert!(!result.is_complete());
}

#[tokio::test]
async fn test_empty_plan_makes_no_calls() {
    let gateway = MockGateway::new();
    let plan = RemoteCallPlan::empty("builderman");

    let result = no_retry().run(&plan, &gateway).await.unwrap();

    assert!(result.outcomes.is_empty());
    assert!(result.account.is_none());
    assert_eq!(gateway.total_calls(), 0);
}

#[tokio::test]
async fn test_transport_failure_is_retried() {
    let gateway = happy_gateway();
    gateway.respond_once(CallName::Friends, Err(CallFailure::transport("reset")));
    let aggregator = CallAggregator::new(RetryPolicy {
        max_attempts: 2,
        initial_backoff_ms: 0,
    });

    let result = aggregator
        .run(&RemoteCallPlan::standard("builderman", GROUP_ID), &gateway)
        .await
        .unwrap();

    assert_eq!(
        result.payload(CallName::Friends),
        Some(&CallPayload::Friends(12))
    );
    assert_eq!(gateway.call_count(CallName::Friends), 2);
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let gateway = happy_gateway();
    gateway.respond(CallName::Friends, Err(CallFailure::transport("timeout")));
    let aggregator = CallAggregator::new(RetryPolicy {
        max_attempts: 3,
        initial_backoff_ms: 0,
    });

    let result = aggregator
        .run(&RemoteCallPlan::standard("builderman", GROUP_ID), &gateway)
        .await
        .unwrap();

    assert!(matches!(
        result.outcome(CallName::Friends),
        Some(CallOutcome::Failed(f)) if f.kind == FailureKind::Transport
    ));
    assert_eq!(gateway.call_count(CallName::Friends), 3);
}

#[tokio::test]
async fn test_non_transport_failures_are_not_retried() {
    let gateway = happy_gateway();
    gateway.respond(CallName::Profile, Err(CallFailure::not_found("gone")));
    let aggregator = CallAggregator::new(RetryPolicy {
        max_attempts: 5,
        initial_backoff_ms: 0,
    });

    aggregator
        .run(&RemoteCallPlan::standard("builderman", GROUP_ID), &gateway)
        .await
        .unwrap();

    assert_eq!(gateway.call_count(CallName::Profile), 1);
}

#[tokio::test(start_paused = true)]
async fn test_independent_calls_run_concurrently() {
    let gateway = happy_gateway();
    for name in &CallName::ALL[1..] {
        gateway.delay(*name, Duration::from_secs(1));
    }
    let start = Instant::now();

    let result = no_retry()
        .run(&RemoteCallPlan::standard("builderman", GROUP_ID), &gateway)
        .await
        .unwrap();

    assert!(result.is_complete());
    assert!(
        start.elapsed() < Duration::from_secs(2),
        "seven 1s calls must overlap, took {:?}",
        start.elapsed()
    );
}

#[test]
fn test_backoff_doubles() {
    let policy = RetryPolicy {
        max_attempts: 4,
        initial_backoff_ms: 100,
    };
    assert_eq!(policy.backoff_for(1), Duration::from_millis(100));
    assert_eq!(policy.backoff_for(2), Duration::from_millis(200));
    assert_eq!(policy.backoff_for(3), Duration::from_millis(400));
}
