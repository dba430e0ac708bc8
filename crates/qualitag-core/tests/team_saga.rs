mod common;

use common::{emails, Harness};
use qualitag_core::models::{Artifact, Collection, Project, Tag, Team, User};
use qualitag_core::store::StoreOp;
use qualitag_core::validation::NewTeam;
use qualitag_core::{ErrorKind, QualitagError};

fn new_team(project_id: &str, name: &str, members: &[&str]) -> NewTeam {
    NewTeam {
        project_id: project_id.into(),
        name: name.into(),
        description: None,
        member_emails: emails(members),
        created_at: None,
    }
}

/// Project with four members where dave and erin were moved out of the default team
async fn split_project(h: &Harness) -> (Vec<String>, String, String) {
    let ids = h.users(&["alice", "bob", "carol", "dave", "erin"]).await;
    let created = h.project(&ids[0], "Alpha", &["bob", "carol", "dave", "erin"]).await;
    h.orch
        .update_team_users(&ids[0], &created.default_team_id, &emails(&["bob", "carol"]))
        .await
        .unwrap();
    (ids, created.project_id, created.default_team_id)
}

#[tokio::test]
async fn test_create_team_links_members_and_project() {
    let h = Harness::new();
    let (ids, project_id, default_team_id) = split_project(&h).await;

    let team_id = h
        .orch
        .create_team(&ids[0], new_team(&project_id, "Beta", &["dave", "erin"]))
        .await
        .unwrap();

    let team: Team = h.get(&team_id).await;
    assert_eq!(team.user_ids, vec![ids[3].clone(), ids[4].clone()]);
    assert_eq!(team.description, "Hi, we are team Beta!");

    let project: Project = h.get(&project_id).await;
    assert_eq!(project.team_ids, vec![default_team_id.clone(), team_id.clone()]);

    let dave: User = h.get(&ids[3]).await;
    assert_eq!(dave.team_ids, vec![team_id]);
    let default_team: Team = h.get(&default_team_id).await;
    assert!(!default_team.user_ids.contains(&dave.id));
}

#[tokio::test]
async fn test_create_team_rolls_back_on_link_failure() {
    let h = Harness::new();
    let (ids, project_id, _) = split_project(&h).await;
    let before = h.store.snapshot().await;

    h.store.fail_on(StoreOp::Put, Collection::Users, Some(ids[4].as_str()));
    let err = h
        .orch
        .create_team(&ids[0], new_team(&project_id, "Beta", &["dave", "erin"]))
        .await
        .unwrap_err();
    h.store.clear_faults();

    assert_eq!(err.code(), "STORE_ERROR");
    assert_eq!(h.store.snapshot().await, before);
}

#[tokio::test]
async fn test_failed_compensation_needs_reconciliation() {
    let h = Harness::new();
    let (ids, project_id, _) = split_project(&h).await;

    h.store.fail_on(StoreOp::Put, Collection::Users, Some(ids[4].as_str()));
    h.store.fail_on(StoreOp::Delete, Collection::Teams, None);
    let err = h
        .orch
        .create_team(&ids[0], new_team(&project_id, "Beta", &["dave", "erin"]))
        .await
        .unwrap_err();
    h.store.clear_faults();

    match &err {
        QualitagError::NeedsReconciliation {
            operation,
            compensation_failures,
            ..
        } => {
            assert_eq!(operation, "CreateTeam");
            assert_eq!(compensation_failures.len(), 1);
            assert!(compensation_failures[0].starts_with("delete Team"));
        }
        other => panic!("expected reconciliation, got {:?}", other),
    }
    assert_eq!(err.root_cause().code(), "STORE_ERROR");
    assert_eq!(err.kind(), ErrorKind::PartialFailure);
}

#[tokio::test]
async fn test_only_owner_creates_teams() {
    let h = Harness::new();
    let (ids, project_id, _) = split_project(&h).await;

    let err = h
        .orch
        .create_team(&ids[1], new_team(&project_id, "Beta", &["dave", "erin"]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    assert_eq!(h.store.count(Collection::Teams).await, 1);
}

#[tokio::test]
async fn test_team_rules() {
    let h = Harness::new();
    let (ids, project_id, _) = split_project(&h).await;
    h.user("frank").await;

    let err = h
        .orch
        .create_team(&ids[0], new_team(&project_id, "Be ta", &["dave", "erin"]))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Validation error: Team name cannot contain whitespace");

    let err = h
        .orch
        .create_team(&ids[0], new_team(&project_id, "Beta", &["dave"]))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Validation error: Too few users: a team must have at least 2 users"
    );

    let err = h
        .orch
        .create_team(&ids[0], new_team(&project_id, "Beta", &["dave", "frank"]))
        .await
        .unwrap_err();
    assert!(matches!(err, QualitagError::NotProjectMember { .. }));

    let err = h
        .orch
        .create_team(&ids[0], new_team(&project_id, "Beta", &["dave", "bob"]))
        .await
        .unwrap_err();
    assert!(matches!(err, QualitagError::MemberInOtherTeam { .. }));

    let err = h
        .orch
        .create_team(&ids[0], new_team(&project_id, "Beta", &["dave", "alice"]))
        .await
        .unwrap_err();
    assert!(matches!(err, QualitagError::OwnerListedAsMember { .. }));
}

#[tokio::test]
async fn test_delete_team_scenario() {
    let h = Harness::new();
    let [alice, bob, carol] = h.users(&["alice", "bob", "carol"]).await.try_into().unwrap();
    let created = h.project(&alice, "Alpha", &["bob", "carol"]).await;
    let team_id = created.default_team_id.clone();
    let artifact_id = h.artifact(&alice, &created.project_id, "interview-1").await;
    let tag_id = h.tag(&bob, "urgent").await;
    h.orch.add_tag(&bob, &artifact_id, &tag_id).await.unwrap();

    let summary = h.orch.delete_team(&alice, &team_id).await.unwrap();
    assert_eq!(summary.target.id, team_id);

    for user_id in [&bob, &carol] {
        let user: User = h.get(user_id).await;
        assert!(!user.team_ids.contains(&team_id));
        assert_eq!(user.project_ids, vec![created.project_id.clone()]);
    }
    let project: Project = h.get(&created.project_id).await;
    assert!(!project.team_ids.contains(&team_id));
    assert!(project.artifact_ids.is_empty());
    assert!(!h.exists::<Artifact>(&artifact_id).await);
    assert!(!h.exists::<Team>(&team_id).await);

    let tag: Tag = h.get(&tag_id).await;
    assert!(tag.artifact_ids.is_empty());
}

#[tokio::test]
async fn test_update_team_users_replaces_membership() {
    let h = Harness::new();
    let (ids, project_id, default_team_id) = split_project(&h).await;
    let beta = h
        .orch
        .create_team(&ids[0], new_team(&project_id, "Beta", &["dave", "erin"]))
        .await
        .unwrap();

    // carol cannot join Beta while still in the default team
    let err = h
        .orch
        .update_team_users(&ids[0], &beta, &emails(&["dave", "carol"]))
        .await
        .unwrap_err();
    assert!(matches!(err, QualitagError::MemberInOtherTeam { .. }));

    let err = h
        .orch
        .update_team_users(&ids[0], &default_team_id, &emails(&["bob", "erin"]))
        .await
        .unwrap_err();
    assert!(matches!(err, QualitagError::MemberInOtherTeam { .. }));

    let frank = h.user("frank").await;
    h.orch
        .add_users_to_project(&ids[0], &project_id, &emails(&["frank"]))
        .await
        .unwrap();
    h.orch.update_team_users(&ids[0], &beta, &emails(&["dave", "frank"])).await.unwrap();

    let team: Team = h.get(&beta).await;
    assert_eq!(team.user_ids, vec![ids[3].clone(), frank.clone()]);
    let erin: User = h.get(&ids[4]).await;
    assert!(erin.team_ids.is_empty());
    let frank: User = h.get(&frank).await;
    assert_eq!(frank.team_ids, vec![beta]);
}

#[tokio::test]
async fn test_delete_team_stops_at_failed_artifact() {
    let h = Harness::new();
    let [alice, bob, carol] = h.users(&["alice", "bob", "carol"]).await.try_into().unwrap();
    let created = h.project(&alice, "Alpha", &["bob", "carol"]).await;
    let team_id = created.default_team_id.clone();
    let first = h.artifact(&alice, &created.project_id, "interview-1").await;
    let second = h.artifact(&alice, &created.project_id, "interview-2").await;

    h.store.fail_on(StoreOp::Delete, Collection::Artifacts, Some(second.as_str()));
    let err = h.orch.delete_team(&alice, &team_id).await.unwrap_err();
    h.store.clear_faults();

    assert_eq!(err.kind(), ErrorKind::PartialFailure);
    let report = err.cascade_report().unwrap();
    assert_eq!(report.operation, "DeleteTeam");
    assert_eq!(report.completed_ids(), vec![first.as_str()]);
    assert_eq!(report.failure.entity.id, second);
    assert_eq!(
        report.remaining_ids(),
        vec![bob.as_str(), carol.as_str(), created.project_id.as_str(), team_id.as_str()]
    );

    assert!(h.exists::<Team>(&team_id).await);
    assert!(!h.exists::<Artifact>(&first).await);
    assert!(h.exists::<Artifact>(&second).await);
    let bob: User = h.get(&bob).await;
    assert_eq!(bob.team_ids, vec![team_id.clone()]);
    let project: Project = h.get(&created.project_id).await;
    assert_eq!(project.team_ids, vec![team_id]);
}
