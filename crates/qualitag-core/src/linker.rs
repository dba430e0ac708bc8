//! Bidirectional relationship maintenance
//!
//! Every relationship is stored on both sides. The linker mutates both
//! in-memory records together; callers persist them. All operations are
//! idempotent and report whether anything changed.

use crate::models::{
    add_id, remove_id, Artifact, Collection, Project, Record, Role, Tag, Team, User,
};

/// Relationship kinds between collections, named owner side first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// `project.user_ids` / `user.project_ids` with a MEMBER role
    ProjectMember,
    /// `project.owner_id` / `user.project_ids` with the OWNER role
    ProjectOwner,
    ProjectTeam,
    ProjectArtifact,
    TeamUser,
    TeamArtifact,
    TagArtifact,
    UserTag,
}

impl Relation {
    /// Collections of the owner and member side
    pub fn sides(&self) -> (Collection, Collection) {
        match self {
            Relation::ProjectMember | Relation::ProjectOwner => {
                (Collection::Projects, Collection::Users)
            }
            Relation::ProjectTeam => (Collection::Projects, Collection::Teams),
            Relation::ProjectArtifact => (Collection::Projects, Collection::Artifacts),
            Relation::TeamUser => (Collection::Teams, Collection::Users),
            Relation::TeamArtifact => (Collection::Teams, Collection::Artifacts),
            Relation::TagArtifact => (Collection::Tags, Collection::Artifacts),
            Relation::UserTag => (Collection::Users, Collection::Tags),
        }
    }
}

/// Keeps forward and reverse references in step
#[derive(Debug, Clone, Copy, Default)]
pub struct RelationshipLinker;

impl RelationshipLinker {
    pub fn new() -> Self {
        Self
    }

    /// Add a member to a project. The owner is never listed as a member.
    pub fn link_project_member(&self, project: &mut Project, user: &mut User) -> bool {
        if project.is_owner(&user.id) {
            return false;
        }
        let forward = add_id(&mut project.user_ids, &user.id);
        let reverse = add_id(&mut user.project_ids, &project.id);
        let previous = user.project_roles.insert(project.id.clone(), Role::Member);
        let role = previous != Some(Role::Member);
        forward || reverse || role
    }

    pub fn unlink_project_member(&self, project: &mut Project, user: &mut User) -> bool {
        let forward = remove_id(&mut project.user_ids, &user.id);
        let reverse = self.detach_user_from_project(&project.id, user);
        forward || reverse
    }

    /// Project side only, for a member whose record is gone
    pub fn drop_project_member(&self, project: &mut Project, user_id: &str) -> bool {
        remove_id(&mut project.user_ids, user_id)
    }

    pub fn link_project_owner(&self, project: &mut Project, owner: &mut User) -> bool {
        let mut changed = false;
        if project.owner_id != owner.id {
            project.owner_id = owner.id.clone();
            changed = true;
        }
        changed |= remove_id(&mut project.user_ids, &owner.id);
        changed |= add_id(&mut owner.project_ids, &project.id);
        changed |= owner.project_roles.insert(project.id.clone(), Role::Owner) != Some(Role::Owner);
        changed
    }

    /// Remove a project from a user's side only, for when the project record is gone
    pub fn detach_user_from_project(&self, project_id: &str, user: &mut User) -> bool {
        let ids = remove_id(&mut user.project_ids, project_id);
        let role = user.project_roles.remove(project_id).is_some();
        ids || role
    }

    pub fn link_project_team(&self, project: &mut Project, team: &mut Team) -> bool {
        let mut changed = add_id(&mut project.team_ids, &team.id);
        if team.project_id != project.id {
            team.project_id = project.id.clone();
            changed = true;
        }
        changed
    }

    /// Team records cannot exist without a project, so only the project side changes
    pub fn unlink_project_team(&self, project: &mut Project, team_id: &str) -> bool {
        remove_id(&mut project.team_ids, team_id)
    }

    pub fn link_project_artifact(&self, project: &mut Project, artifact: &mut Artifact) -> bool {
        let mut changed = add_id(&mut project.artifact_ids, &artifact.id);
        if artifact.project_id != project.id {
            artifact.project_id = project.id.clone();
            changed = true;
        }
        changed
    }

    pub fn unlink_project_artifact(&self, project: &mut Project, artifact_id: &str) -> bool {
        remove_id(&mut project.artifact_ids, artifact_id)
    }

    pub fn link_team_user(&self, team: &mut Team, user: &mut User) -> bool {
        let forward = add_id(&mut team.user_ids, &user.id);
        let reverse = add_id(&mut user.team_ids, &team.id);
        forward || reverse
    }

    pub fn unlink_team_user(&self, team: &mut Team, user: &mut User) -> bool {
        let forward = remove_id(&mut team.user_ids, &user.id);
        let reverse = remove_id(&mut user.team_ids, &team.id);
        forward || reverse
    }

    /// Team side only, for a member whose record is gone
    pub fn drop_team_member(&self, team: &mut Team, user_id: &str) -> bool {
        remove_id(&mut team.user_ids, user_id)
    }

    pub fn link_team_artifact(&self, team: &mut Team, artifact: &mut Artifact) -> bool {
        let mut changed = add_id(&mut team.artifact_ids, &artifact.id);
        if artifact.team_id != team.id {
            artifact.team_id = team.id.clone();
            changed = true;
        }
        changed
    }

    pub fn unlink_team_artifact(&self, team: &mut Team, artifact_id: &str) -> bool {
        remove_id(&mut team.artifact_ids, artifact_id)
    }

    pub fn link_tag_artifact(&self, tag: &mut Tag, artifact: &mut Artifact) -> bool {
        let forward = add_id(&mut tag.artifact_ids, &artifact.id);
        let reverse = add_id(&mut artifact.tag_ids, &tag.id);
        forward || reverse
    }

    pub fn unlink_tag_artifact(&self, tag: &mut Tag, artifact: &mut Artifact) -> bool {
        let forward = remove_id(&mut tag.artifact_ids, &artifact.id);
        let reverse = remove_id(&mut artifact.tag_ids, &tag.id);
        forward || reverse
    }

    /// Artifact side only, for a tag whose record is gone
    pub fn drop_artifact_tag(&self, artifact: &mut Artifact, tag_id: &str) -> bool {
        remove_id(&mut artifact.tag_ids, tag_id)
    }

    pub fn link_user_tag(&self, user: &mut User, tag: &mut Tag) -> bool {
        let mut changed = add_id(&mut user.tag_ids, &tag.id);
        if tag.created_by != user.id {
            tag.created_by = user.id.clone();
            changed = true;
        }
        changed
    }

    pub fn unlink_user_tag(&self, user: &mut User, tag_id: &str) -> bool {
        remove_id(&mut user.tag_ids, tag_id)
    }

    /// Drop one side of a relationship when the other record is gone or
    /// is handled separately. Scalar parent references (`team.project_id`,
    /// `artifact.team_id`, `tag.created_by`) are left alone: those records
    /// cannot exist without their parent.
    pub fn detach(&self, relation: Relation, record: &mut Record, other_id: &str) -> bool {
        match (relation, record) {
            (Relation::ProjectMember, Record::Project(p)) => self.drop_project_member(p, other_id),
            (Relation::ProjectMember | Relation::ProjectOwner, Record::User(u)) => {
                self.detach_user_from_project(other_id, u)
            }
            (Relation::ProjectTeam, Record::Project(p)) => self.unlink_project_team(p, other_id),
            (Relation::ProjectArtifact, Record::Project(p)) => {
                self.unlink_project_artifact(p, other_id)
            }
            (Relation::TeamUser, Record::Team(t)) => self.drop_team_member(t, other_id),
            (Relation::TeamUser, Record::User(u)) => remove_id(&mut u.team_ids, other_id),
            (Relation::TeamArtifact, Record::Team(t)) => self.unlink_team_artifact(t, other_id),
            (Relation::TagArtifact, Record::Tag(t)) => remove_id(&mut t.artifact_ids, other_id),
            (Relation::TagArtifact, Record::Artifact(a)) => self.drop_artifact_tag(a, other_id),
            (Relation::UserTag, Record::User(u)) => self.unlink_user_tag(u, other_id),
            _ => false,
        }
    }
}
