mod common;

use common::Harness;
use qualitag_core::config::QualitagConfig;
use qualitag_core::models::{Artifact, Collection, Project, Tag, Team, User};
use qualitag_core::palette::{DefaultColor, PROCESSED_TAG_COLOR};
use qualitag_core::store::StoreOp;
use qualitag_core::validation::{ArtifactTag, ArtifactUpdate, NewTag, TagUpdate};
use qualitag_core::{ErrorKind, QualitagError};

fn urgent(creator: &str) -> NewTag {
    NewTag {
        value: "urgent".into(),
        created_by: creator.into(),
        color: None,
    }
}

#[tokio::test]
async fn test_duplicate_tags_kept_by_default() {
    let h = Harness::new();
    let alice = h.user("alice").await;

    let first = h.orch.create_tag(&alice, urgent("alice")).await.unwrap();
    let second = h.orch.create_tag(&alice, urgent(&alice)).await.unwrap();
    assert_ne!(first, second);

    let tags = h.store.all::<Tag>().await;
    assert_eq!(tags.len(), 2);
    assert!(tags.iter().all(|t| t.value == "URGENT" && t.color_hex == DefaultColor::Sage.hex()));

    let user: User = h.get(&alice).await;
    assert_eq!(user.tag_ids, vec![first, second]);
}

#[tokio::test]
async fn test_duplicate_tags_rejected_when_configured() {
    let config = QualitagConfig {
        reject_duplicate_tags: true,
        ..QualitagConfig::default()
    };
    let h = Harness::with_config(config);
    let alice = h.user("alice").await;

    h.orch.create_tag(&alice, urgent(&alice)).await.unwrap();
    let err = h.orch.create_tag(&alice, urgent(&alice)).await.unwrap_err();
    assert!(matches!(err, QualitagError::TagExists { .. }));
    assert_eq!(h.store.count(Collection::Tags).await, 1);
}

#[tokio::test]
async fn test_tag_value_and_colour_rules() {
    let h = Harness::new();
    let [alice, bob] = h.users(&["alice", "bob"]).await.try_into().unwrap();

    let err = h
        .orch
        .create_tag(
            &alice,
            NewTag {
                value: "ok".into(),
                created_by: alice.clone(),
                color: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = h.orch.create_tag(&alice, urgent(&bob)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let tag_id = h
        .orch
        .create_tag(
            &alice,
            NewTag {
                value: "later".into(),
                created_by: alice.clone(),
                color: Some("salmon".into()),
            },
        )
        .await
        .unwrap();
    let tag: Tag = h.get(&tag_id).await;
    assert_eq!(tag.color_hex, "salmon");
}

#[tokio::test]
async fn test_update_tag_rejects_rename_clash() {
    let h = Harness::new();
    let [alice, bob] = h.users(&["alice", "bob"]).await.try_into().unwrap();
    h.tag(&alice, "urgent").await;
    let later = h.tag(&alice, "later").await;

    let err = h
        .orch
        .update_tag(
            &alice,
            &later,
            TagUpdate {
                value: Some("Urgent".into()),
                color: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, QualitagError::TagExists { .. }));

    let err = h.orch.update_tag(&bob, &later, TagUpdate::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    h.orch
        .update_tag(
            &alice,
            &later,
            TagUpdate {
                value: Some("someday".into()),
                color: Some("#295f98".into()),
            },
        )
        .await
        .unwrap();
    let tag: Tag = h.get(&later).await;
    assert_eq!(tag.value, "SOMEDAY");
    assert_eq!(tag.color_hex, "#295f98");
}

#[tokio::test]
async fn test_add_tag_permissions_and_idempotence() {
    let h = Harness::new();
    let [alice, bob, carol, dave] = h
        .users(&["alice", "bob", "carol", "dave"])
        .await
        .try_into()
        .unwrap();
    let created = h.project(&alice, "Alpha", &["bob", "carol"]).await;
    let artifact_id = h.artifact(&alice, &created.project_id, "interview-1").await;
    let bob_tag = h.tag(&bob, "urgent").await;
    let alice_tag = h.tag(&alice, "review").await;
    let dave_tag = h.tag(&dave, "stray").await;

    // carol may not apply bob's tag, dave is not in the team
    let err = h.orch.add_tag(&carol, &artifact_id, &bob_tag).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    let err = h.orch.add_tag(&dave, &artifact_id, &dave_tag).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    h.orch.add_tag(&bob, &artifact_id, &bob_tag).await.unwrap();
    h.orch.add_tag(&bob, &artifact_id, &bob_tag).await.unwrap();
    h.orch.add_tag(&alice, &artifact_id, &alice_tag).await.unwrap();

    let artifact: Artifact = h.get(&artifact_id).await;
    assert_eq!(artifact.tag_ids, vec![bob_tag.clone(), alice_tag.clone()]);
    let tag: Tag = h.get(&bob_tag).await;
    assert_eq!(tag.artifact_ids, vec![artifact_id.clone()]);

    h.orch.remove_tag(&bob, &artifact_id, &bob_tag).await.unwrap();
    h.orch.remove_tag(&bob, &artifact_id, &bob_tag).await.unwrap();
    let artifact: Artifact = h.get(&artifact_id).await;
    assert_eq!(artifact.tag_ids, vec![alice_tag]);
    let tag: Tag = h.get(&bob_tag).await;
    assert!(tag.artifact_ids.is_empty());
}

#[tokio::test]
async fn test_closed_tagging_rejects_changes() {
    let h = Harness::new();
    let [alice, bob, _] = h.users(&["alice", "bob", "carol"]).await.try_into().unwrap();
    let created = h.project(&alice, "Alpha", &["bob", "carol"]).await;
    let artifact_id = h.artifact(&alice, &created.project_id, "interview-1").await;
    let tag_id = h.tag(&bob, "urgent").await;

    let err = h.orch.set_tagging(&bob, &artifact_id, false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    h.orch.set_tagging(&alice, &artifact_id, false).await.unwrap();
    let err = h.orch.add_tag(&bob, &artifact_id, &tag_id).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("Validation error: Tagging is closed for artifact {}", artifact_id)
    );

    h.orch.set_tagging(&alice, &artifact_id, true).await.unwrap();
    h.orch.add_tag(&bob, &artifact_id, &tag_id).await.unwrap();
}

#[tokio::test]
async fn test_delete_tag_unlinks_everywhere() {
    let h = Harness::new();
    let [alice, bob, _] = h.users(&["alice", "bob", "carol"]).await.try_into().unwrap();
    let created = h.project(&alice, "Alpha", &["bob", "carol"]).await;
    let first = h.artifact(&alice, &created.project_id, "interview-1").await;
    let second = h.artifact(&alice, &created.project_id, "interview-2").await;
    let tag_id = h.tag(&bob, "urgent").await;
    h.orch.add_tag(&bob, &first, &tag_id).await.unwrap();
    h.orch.add_tag(&bob, &second, &tag_id).await.unwrap();

    let err = h.orch.delete_tag(&alice, &tag_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let summary = h.orch.delete_tag(&bob, &tag_id).await.unwrap();
    assert_eq!(summary.processed.len(), 4);
    assert!(!h.exists::<Tag>(&tag_id).await);
    for artifact_id in [&first, &second] {
        let artifact: Artifact = h.get(artifact_id).await;
        assert!(artifact.tag_ids.is_empty());
    }
    let bob: User = h.get(&bob).await;
    assert!(bob.tag_ids.is_empty());
}

#[tokio::test]
async fn test_artifact_goes_to_least_loaded_team() {
    let h = Harness::new();
    let ids = h.users(&["alice", "bob", "carol", "dave", "erin"]).await;
    let created = h.project(&ids[0], "Alpha", &["bob", "carol", "dave", "erin"]).await;
    h.orch
        .update_team_users(&ids[0], &created.default_team_id, &common::emails(&["bob", "carol"]))
        .await
        .unwrap();
    let beta = h
        .orch
        .create_team(
            &ids[0],
            qualitag_core::validation::NewTeam {
                project_id: created.project_id.clone(),
                name: "Beta".into(),
                description: None,
                member_emails: common::emails(&["dave", "erin"]),
                created_at: None,
            },
        )
        .await
        .unwrap();

    let first = h.artifact(&ids[0], &created.project_id, "interview-1").await;
    let second = h.artifact(&ids[0], &created.project_id, "interview-2").await;
    let third = h.artifact(&ids[0], &created.project_id, "interview-3").await;

    let default_team: Team = h.get(&created.default_team_id).await;
    let beta: Team = h.get(&beta).await;
    assert_eq!(default_team.artifact_ids, vec![first.clone(), third.clone()]);
    assert_eq!(beta.artifact_ids, vec![second.clone()]);

    let project: Project = h.get(&created.project_id).await;
    assert_eq!(project.artifact_ids, vec![first, second, third]);
}

#[tokio::test]
async fn test_artifact_delete_reports_partial_failure() {
    let h = Harness::new();
    let [alice, bob, _] = h.users(&["alice", "bob", "carol"]).await.try_into().unwrap();
    let created = h.project(&alice, "Alpha", &["bob", "carol"]).await;
    let artifact_id = h.artifact(&alice, &created.project_id, "interview-1").await;
    let tag_id = h.tag(&bob, "urgent").await;
    h.orch.add_tag(&bob, &artifact_id, &tag_id).await.unwrap();

    h.store.fail_on(StoreOp::Put, Collection::Projects, None);
    let err = h.orch.delete_artifact(&alice, &artifact_id).await.unwrap_err();
    h.store.clear_faults();

    assert_eq!(err.kind(), ErrorKind::PartialFailure);
    let report = err.cascade_report().unwrap();
    assert_eq!(report.operation, "DeleteArtifact");
    assert_eq!(report.completed_ids(), vec![tag_id.as_str(), created.default_team_id.as_str()]);
    assert_eq!(report.failure.entity.collection, Collection::Projects);
    assert_eq!(report.remaining_ids(), vec![artifact_id.as_str()]);

    // Completed steps stay applied, the artifact itself is untouched
    let tag: Tag = h.get(&tag_id).await;
    assert!(tag.artifact_ids.is_empty());
    assert!(h.exists::<Artifact>(&artifact_id).await);

    // Retrying finishes the job; already-detached items are no-ops
    h.orch.delete_artifact(&alice, &artifact_id).await.unwrap();
    assert!(!h.exists::<Artifact>(&artifact_id).await);
    let project: Project = h.get(&created.project_id).await;
    assert!(project.artifact_ids.is_empty());
}

#[tokio::test]
async fn test_process_artifact_tags() {
    let h = Harness::new();
    let [alice, bob, carol] = h.users(&["alice", "bob", "carol"]).await.try_into().unwrap();
    let created = h.project(&alice, "Alpha", &["bob", "carol"]).await;
    let artifact_id = h.artifact(&alice, &created.project_id, "interview-1").await;
    let bob_tag = h.tag(&bob, "urgnt").await;
    let carol_tag = h.tag(&carol, "urgent!").await;
    let existing = h.tag(&alice, "urgent").await;
    h.orch.add_tag(&bob, &artifact_id, &bob_tag).await.unwrap();
    h.orch.add_tag(&carol, &artifact_id, &carol_tag).await.unwrap();
    *h.agreement.processed.lock().unwrap() = vec!["urgent".into(), "x".into(), "follow up".into()];

    let err = h.orch.process_artifact_tags(&bob, &artifact_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let values = h.orch.process_artifact_tags(&alice, &artifact_id).await.unwrap();
    assert_eq!(values, vec!["URGENT".to_string(), "FOLLOW UP".to_string()]);

    let artifact: Artifact = h.get(&artifact_id).await;
    assert_eq!(artifact.tag_ids.len(), 2);
    assert_eq!(artifact.tag_ids[0], existing);
    let created_tag: Tag = h.get(&artifact.tag_ids[1]).await;
    assert_eq!(created_tag.value, "FOLLOW UP");
    assert_eq!(created_tag.created_by, alice);
    assert_eq!(created_tag.color_hex, PROCESSED_TAG_COLOR);

    for old in [&bob_tag, &carol_tag] {
        let tag: Tag = h.get(old).await;
        assert!(tag.artifact_ids.is_empty());
    }
    let owner: User = h.get(&alice).await;
    assert!(owner.tag_ids.contains(&created_tag.id));
}

fn artifact_tags(values: &[&str]) -> Vec<ArtifactTag> {
    values
        .iter()
        .map(|value| ArtifactTag {
            value: value.to_string(),
            color: None,
        })
        .collect()
}

#[tokio::test]
async fn test_tag_artifact_creates_and_applies() {
    let h = Harness::new();
    let [alice, bob, _, dave] = h
        .users(&["alice", "bob", "carol", "dave"])
        .await
        .try_into()
        .unwrap();
    let created = h.project(&alice, "Alpha", &["bob", "carol"]).await;
    let first = h.artifact(&alice, &created.project_id, "interview-1").await;
    let second = h.artifact(&alice, &created.project_id, "interview-2").await;

    let tag_ids = h
        .orch
        .tag_artifact(&bob, &first, &artifact_tags(&["urgent", "follow up"]))
        .await
        .unwrap();
    assert_eq!(tag_ids.len(), 2);

    let artifact: Artifact = h.get(&first).await;
    assert_eq!(artifact.tag_ids, tag_ids);
    let user: User = h.get(&bob).await;
    assert_eq!(user.tag_ids, tag_ids);
    for tag_id in &tag_ids {
        let tag: Tag = h.get(tag_id).await;
        assert_eq!(tag.created_by, bob);
        assert_eq!(tag.artifact_ids, vec![first.clone()]);
    }

    // Same value on the same artifact, or twice in one request
    let err = h.orch.tag_artifact(&bob, &first, &artifact_tags(&["Urgent"])).await.unwrap_err();
    assert!(matches!(err, QualitagError::TagExists { .. }));
    let err = h
        .orch
        .tag_artifact(&bob, &second, &artifact_tags(&["bug", "BUG"]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    h.orch.tag_artifact(&bob, &second, &artifact_tags(&["urgent"])).await.unwrap();

    let err = h.orch.tag_artifact(&bob, &second, &[]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = h.orch.tag_artifact(&dave, &second, &artifact_tags(&["spam"])).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    assert_eq!(h.store.count(Collection::Tags).await, 3);
}

#[tokio::test]
async fn test_tag_artifact_rolls_back_every_tag() {
    let h = Harness::new();
    let [alice, bob, _] = h.users(&["alice", "bob", "carol"]).await.try_into().unwrap();
    let created = h.project(&alice, "Alpha", &["bob", "carol"]).await;
    let artifact_id = h.artifact(&alice, &created.project_id, "interview-1").await;
    let before = h.store.snapshot().await;

    // The first tag lands on the artifact, the second does not
    h.store.fail_once(StoreOp::Put, Collection::Artifacts, Some(artifact_id.as_str()), 1);
    let err = h
        .orch
        .tag_artifact(&bob, &artifact_id, &artifact_tags(&["urgent", "later"]))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "STORE_ERROR");
    assert_eq!(h.store.snapshot().await, before);
}

#[tokio::test]
async fn test_set_tagging_many() {
    let h = Harness::new();
    let [alice, bob, _] = h.users(&["alice", "bob", "carol"]).await.try_into().unwrap();
    let created = h.project(&alice, "Alpha", &["bob", "carol"]).await;
    let first = h.artifact(&alice, &created.project_id, "interview-1").await;
    let second = h.artifact(&alice, &created.project_id, "interview-2").await;
    let both = vec![first.clone(), second.clone()];

    let err = h.orch.set_tagging_many(&bob, &both, false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let err = h
        .orch
        .set_tagging_many(&alice, &[first.clone(), "missing".to_string()], false)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ARTIFACT_NOT_FOUND");
    let artifact: Artifact = h.get(&first).await;
    assert!(artifact.tagging_open);

    assert_eq!(h.orch.set_tagging_many(&alice, &both, false).await.unwrap(), 2);
    assert_eq!(h.orch.set_tagging_many(&alice, &both, false).await.unwrap(), 0);
    for artifact_id in &both {
        let artifact: Artifact = h.get(artifact_id).await;
        assert!(!artifact.tagging_open);
    }

    let err = h.orch.set_tagging_many(&alice, &[], true).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_update_artifact() {
    let h = Harness::new();
    let [alice, bob, _] = h.users(&["alice", "bob", "carol"]).await.try_into().unwrap();
    let created = h.project(&alice, "Alpha", &["bob", "carol"]).await;
    let artifact_id = h.artifact(&alice, &created.project_id, "interview-1").await;
    let tag_id = h.tag(&bob, "urgent").await;
    h.orch.add_tag(&bob, &artifact_id, &tag_id).await.unwrap();

    let rename = ArtifactUpdate {
        name: Some("  interview-01 ".into()),
        description: Some("   ".into()),
        content_ref: None,
    };
    let err = h.orch.update_artifact(&bob, &artifact_id, rename.clone()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    h.orch.update_artifact(&alice, &artifact_id, rename).await.unwrap();
    let artifact: Artifact = h.get(&artifact_id).await;
    assert_eq!(artifact.name, "interview-01");
    assert_eq!(artifact.description, "Artifact interview-01");
    assert_eq!(artifact.content_ref, "s3://artifacts/interview-1");
    assert_eq!(artifact.tag_ids, vec![tag_id]);

    let blank = ArtifactUpdate {
        name: Some(" ".into()),
        ..ArtifactUpdate::default()
    };
    let err = h.orch.update_artifact(&alice, &artifact_id, blank).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}
