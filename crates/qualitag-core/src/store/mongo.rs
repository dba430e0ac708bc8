//! MongoDB-backed store

use async_trait::async_trait;
use bson::{doc, Document};
use futures::TryStreamExt;
use mongodb::options::{ClientOptions, IndexOptions, ReplaceOptions};
use mongodb::{Client, Database, IndexModel};

use super::{new_id, EntityStore};
use crate::error::{QualitagError, QualitagResult};
use crate::models::{Collection, Record, RefField, User};

/// MongoDB database wrapper, one document collection per [`Collection`]
#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    /// Connect to MongoDB
    pub async fn connect(uri: &str, db_name: &str) -> anyhow::Result<Self> {
        let options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(options)?;
        let instance = Self {
            db: client.database(db_name),
        };

        instance.ping().await?;
        tracing::info!("Connected to MongoDB: {}", db_name);
        instance.ensure_indexes().await?;

        Ok(instance)
    }

    /// Ping the database to check connection
    async fn ping(&self) -> anyhow::Result<()> {
        self.db.run_command(doc! { "ping": 1 }, None).await?;
        Ok(())
    }

    /// Ensure lookup indexes exist for every relationship query
    pub async fn ensure_indexes(&self) -> anyhow::Result<()> {
        tracing::info!("Ensuring MongoDB indexes...");

        self.create_indexes(
            Collection::Users,
            vec![
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
                IndexModel::builder()
                    .keys(doc! { "username": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
                IndexModel::builder().keys(doc! { "team_ids": 1 }).build(),
                IndexModel::builder().keys(doc! { "project_ids": 1 }).build(),
            ],
        )
        .await?;

        self.create_indexes(
            Collection::Projects,
            vec![
                IndexModel::builder().keys(doc! { "name": 1 }).build(),
                IndexModel::builder().keys(doc! { "owner_id": 1 }).build(),
                IndexModel::builder().keys(doc! { "user_ids": 1 }).build(),
            ],
        )
        .await?;

        self.create_indexes(
            Collection::Teams,
            vec![
                IndexModel::builder().keys(doc! { "project_id": 1 }).build(),
                IndexModel::builder().keys(doc! { "user_ids": 1 }).build(),
            ],
        )
        .await?;

        self.create_indexes(
            Collection::Artifacts,
            vec![
                IndexModel::builder().keys(doc! { "team_id": 1 }).build(),
                IndexModel::builder().keys(doc! { "project_id": 1 }).build(),
                IndexModel::builder().keys(doc! { "tag_ids": 1 }).build(),
            ],
        )
        .await?;

        self.create_indexes(
            Collection::Tags,
            vec![
                IndexModel::builder()
                    .keys(doc! { "created_by": 1, "value": 1 })
                    .build(),
                IndexModel::builder().keys(doc! { "artifact_ids": 1 }).build(),
            ],
        )
        .await?;

        tracing::info!("MongoDB indexes ensured");
        Ok(())
    }

    async fn create_indexes(
        &self,
        collection: Collection,
        indexes: Vec<IndexModel>,
    ) -> anyhow::Result<()> {
        self.documents(collection).create_indexes(indexes, None).await?;
        Ok(())
    }

    fn documents(&self, collection: Collection) -> mongodb::Collection<Document> {
        self.db.collection(collection.name())
    }
}

fn to_document(record: &Record) -> QualitagResult<Document> {
    let document = match record {
        Record::Project(p) => bson::to_document(p)?,
        Record::Team(t) => bson::to_document(t)?,
        Record::User(u) => bson::to_document(u)?,
        Record::Tag(t) => bson::to_document(t)?,
        Record::Artifact(a) => bson::to_document(a)?,
    };
    Ok(document)
}

fn from_document(collection: Collection, document: Document) -> QualitagResult<Record> {
    let record = match collection {
        Collection::Projects => Record::Project(bson::from_document(document)?),
        Collection::Teams => Record::Team(bson::from_document(document)?),
        Collection::Users => Record::User(bson::from_document(document)?),
        Collection::Tags => Record::Tag(bson::from_document(document)?),
        Collection::Artifacts => Record::Artifact(bson::from_document(document)?),
    };
    Ok(record)
}

impl MongoStore {
    async fn find_user(&self, filter: Document) -> QualitagResult<Option<User>> {
        let document = self.documents(Collection::Users).find_one(filter, None).await?;
        match document {
            Some(document) => Ok(Some(bson::from_document(document)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl EntityStore for MongoStore {
    async fn get(&self, collection: Collection, id: &str) -> QualitagResult<Option<Record>> {
        let document = self
            .documents(collection)
            .find_one(doc! { "_id": id }, None)
            .await?;
        document
            .map(|document| from_document(collection, document))
            .transpose()
    }

    async fn put(&self, mut record: Record) -> QualitagResult<String> {
        if record.id().is_empty() {
            record.set_id(new_id());
        }
        let id = record.id().to_string();
        let document = to_document(&record)?;
        let options = ReplaceOptions::builder().upsert(true).build();

        self.documents(record.collection())
            .replace_one(doc! { "_id": id.as_str() }, document, options)
            .await?;
        Ok(id)
    }

    async fn delete(&self, collection: Collection, id: &str) -> QualitagResult<bool> {
        let result = self
            .documents(collection)
            .delete_one(doc! { "_id": id }, None)
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn find_user_by_email(&self, email: &str) -> QualitagResult<Option<User>> {
        self.find_user(doc! { "email": email.to_lowercase() }).await
    }

    async fn find_user_by_username(&self, username: &str) -> QualitagResult<Option<User>> {
        self.find_user(doc! { "username": username }).await
    }

    async fn project_name_exists(
        &self,
        name: &str,
        exclude_id: Option<&str>,
    ) -> QualitagResult<bool> {
        let mut filter = doc! { "name": name, "status": { "$ne": "CLOSED" } };
        if let Some(id) = exclude_id {
            filter.insert("_id", doc! { "$ne": id });
        }
        let count = self
            .documents(Collection::Projects)
            .count_documents(filter, None)
            .await?;
        Ok(count > 0)
    }

    async fn find_referencing(
        &self,
        collection: Collection,
        field: RefField,
        id: &str,
    ) -> QualitagResult<Vec<Record>> {
        // Equality on an array field matches any element
        let mut filter = Document::new();
        filter.insert(field.as_str(), id);
        let cursor = self.documents(collection).find(filter, None).await?;
        let documents: Vec<Document> = cursor.try_collect().await?;
        documents
            .into_iter()
            .map(|document| from_document(collection, document))
            .collect::<Result<Vec<_>, QualitagError>>()
    }
}
