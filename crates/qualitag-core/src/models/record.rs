//! Collection routing for heterogeneous records

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Artifact, Project, Tag, Team, User};

/// The five document collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Projects,
    Teams,
    Users,
    Tags,
    Artifacts,
}

impl Collection {
    /// Storage name of the collection
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Projects => "projects",
            Collection::Teams => "teams",
            Collection::Users => "users",
            Collection::Tags => "tags",
            Collection::Artifacts => "artifacts",
        }
    }

    /// Human-readable name of one record in the collection
    pub fn kind(&self) -> &'static str {
        match self {
            Collection::Projects => "Project",
            Collection::Teams => "Team",
            Collection::Users => "User",
            Collection::Tags => "Tag",
            Collection::Artifacts => "Artifact",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A relationship field that holds ids of records in another collection.
///
/// Scalar fields (`owner_id`, `project_id`) and list fields (`user_ids`)
/// are both covered; a record references an id if the scalar equals it or
/// the list contains it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefField {
    OwnerId,
    ProjectId,
    TeamId,
    CreatedBy,
    UserIds,
    TeamIds,
    ProjectIds,
    TagIds,
    ArtifactIds,
}

impl RefField {
    /// Document field name
    pub fn as_str(&self) -> &'static str {
        match self {
            RefField::OwnerId => "owner_id",
            RefField::ProjectId => "project_id",
            RefField::TeamId => "team_id",
            RefField::CreatedBy => "created_by",
            RefField::UserIds => "user_ids",
            RefField::TeamIds => "team_ids",
            RefField::ProjectIds => "project_ids",
            RefField::TagIds => "tag_ids",
            RefField::ArtifactIds => "artifact_ids",
        }
    }
}

/// Reference to a single stored record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub collection: Collection,
    pub id: String,
}

impl EntityRef {
    pub fn new(collection: Collection, id: impl Into<String>) -> Self {
        Self {
            collection,
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.collection.kind(), self.id)
    }
}

/// Any record stored in one of the collections
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Project(Project),
    Team(Team),
    User(User),
    Tag(Tag),
    Artifact(Artifact),
}

impl Record {
    pub fn collection(&self) -> Collection {
        match self {
            Record::Project(_) => Collection::Projects,
            Record::Team(_) => Collection::Teams,
            Record::User(_) => Collection::Users,
            Record::Tag(_) => Collection::Tags,
            Record::Artifact(_) => Collection::Artifacts,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Record::Project(p) => &p.id,
            Record::Team(t) => &t.id,
            Record::User(u) => &u.id,
            Record::Tag(t) => &t.id,
            Record::Artifact(a) => &a.id,
        }
    }

    pub fn set_id(&mut self, id: String) {
        match self {
            Record::Project(p) => p.id = id,
            Record::Team(t) => t.id = id,
            Record::User(u) => u.id = id,
            Record::Tag(t) => t.id = id,
            Record::Artifact(a) => a.id = id,
        }
    }

    /// Whether the given relationship field of this record points at `id`.
    /// Fields the record does not carry never match.
    pub fn references(&self, field: RefField, id: &str) -> bool {
        let contains = |ids: &[String]| ids.iter().any(|existing| existing == id);
        match (self, field) {
            (Record::Project(p), RefField::OwnerId) => p.owner_id == id,
            (Record::Project(p), RefField::UserIds) => contains(&p.user_ids),
            (Record::Project(p), RefField::TeamIds) => contains(&p.team_ids),
            (Record::Project(p), RefField::ArtifactIds) => contains(&p.artifact_ids),
            (Record::Team(t), RefField::ProjectId) => t.project_id == id,
            (Record::Team(t), RefField::UserIds) => contains(&t.user_ids),
            (Record::Team(t), RefField::ArtifactIds) => contains(&t.artifact_ids),
            (Record::User(u), RefField::ProjectIds) => contains(&u.project_ids),
            (Record::User(u), RefField::TeamIds) => contains(&u.team_ids),
            (Record::User(u), RefField::TagIds) => contains(&u.tag_ids),
            (Record::Tag(t), RefField::CreatedBy) => t.created_by == id,
            (Record::Tag(t), RefField::ArtifactIds) => contains(&t.artifact_ids),
            (Record::Artifact(a), RefField::ProjectId) => a.project_id == id,
            (Record::Artifact(a), RefField::TeamId) => a.team_id == id,
            (Record::Artifact(a), RefField::TagIds) => contains(&a.tag_ids),
            _ => false,
        }
    }
}

/// A typed record that lives in exactly one collection
pub trait Entity: Clone + Send + Sync + 'static {
    const COLLECTION: Collection;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn into_record(self) -> Record;
    fn from_record(record: Record) -> Option<Self>;

    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(Self::COLLECTION, self.id())
    }
}

macro_rules! impl_entity {
    ($ty:ident, $collection:ident) => {
        impl Entity for $ty {
            const COLLECTION: Collection = Collection::$collection;

            fn id(&self) -> &str {
                &self.id
            }

            fn set_id(&mut self, id: String) {
                self.id = id;
            }

            fn into_record(self) -> Record {
                Record::$ty(self)
            }

            fn from_record(record: Record) -> Option<Self> {
                match record {
                    Record::$ty(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

impl_entity!(Project, Projects);
impl_entity!(Team, Teams);
impl_entity!(User, Users);
impl_entity!(Tag, Tags);
impl_entity!(Artifact, Artifacts);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_references_scalar_and_list_fields() {
        let mut tag = Tag::new("URGENT".to_string(), "u1".to_string(), "#a6aebf".to_string());
        tag.artifact_ids.push("a1".to_string());
        let record = tag.into_record();

        assert!(record.references(RefField::CreatedBy, "u1"));
        assert!(record.references(RefField::ArtifactIds, "a1"));
        assert!(!record.references(RefField::ArtifactIds, "a2"));
        assert!(!record.references(RefField::UserIds, "u1"));
    }

    #[test]
    fn test_from_record_rejects_other_collection() {
        let record = Tag::new("URGENT".into(), "u1".into(), "#a6aebf".into()).into_record();
        assert!(Team::from_record(record.clone()).is_none());
        assert!(Tag::from_record(record).is_some());
    }
}
