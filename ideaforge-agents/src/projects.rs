//! Saved projects backed by SQLite.
//!
//! A project is a framework result the user chose to keep. Every operation
//! is scoped by user id; authentication happens upstream.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::agent::Stage;
use crate::factory::framework::Framework;
use crate::tokenomics::TokenomicsData;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("user_id is required")]
    MissingUserId,
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("stored project is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("project store lock poisoned")]
    Poisoned,
}

/// Fields supplied when saving a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub idea: String,
    pub stage: Stage,
    #[serde(default)]
    pub industry: Option<String>,
    pub framework: Framework,
    #[serde(default)]
    pub tokenomics: Option<TokenomicsData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub idea: String,
    pub stage: Stage,
    pub industry: Option<String>,
    pub framework: Framework,
    pub tokenomics: Option<TokenomicsData>,
    pub created_at: String,
}

/// List view: the framework is reduced to its summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
    pub idea: String,
    pub stage: Stage,
    pub industry: Option<String>,
    pub created_at: String,
    pub summary: String,
}

pub struct ProjectStore {
    db: Mutex<Connection>,
}

fn user(user_id: &str) -> Result<&str, StoreError> {
    let trimmed = user_id.trim();
    if trimmed.is_empty() {
        return Err(StoreError::MissingUserId);
    }
    Ok(trimmed)
}

fn stage_from_sql(raw: String) -> Stage {
    match raw.as_str() {
        "existing" => Stage::Existing,
        _ => Stage::New,
    }
}

const PROJECT_COLUMNS: &str = "id, name, idea, stage, industry, framework, tokenomics, created_at";

struct RawProject {
    id: String,
    name: String,
    idea: String,
    stage: String,
    industry: Option<String>,
    framework: String,
    tokenomics: Option<String>,
    created_at: String,
}

impl RawProject {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            idea: row.get(2)?,
            stage: row.get(3)?,
            industry: row.get(4)?,
            framework: row.get(5)?,
            tokenomics: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    fn decode(self) -> Result<Project, StoreError> {
        let tokenomics = match self.tokenomics {
            Some(json) => serde_json::from_str(&json)?,
            None => None,
        };
        Ok(Project {
            id: self.id,
            name: self.name,
            idea: self.idea,
            stage: stage_from_sql(self.stage),
            industry: self.industry,
            framework: serde_json::from_str(&self.framework)?,
            tokenomics,
            created_at: self.created_at,
        })
    }
}

impl ProjectStore {
    /// Open or create a project database.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = Connection::open(path)?;
        db.execute_batch(
            "CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                idea TEXT NOT NULL,
                stage TEXT NOT NULL,
                industry TEXT,
                framework TEXT NOT NULL,
                tokenomics TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_projects_user_created
                ON projects(user_id, created_at);",
        )?;
        Ok(Self { db: Mutex::new(db) })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::open(Path::new(":memory:"))
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.db.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn create(&self, user_id: &str, project: NewProject) -> Result<Project, StoreError> {
        let user_id = user(user_id)?;
        let record = Project {
            id: uuid::Uuid::new_v4().to_string(),
            name: project.name,
            idea: project.idea,
            stage: project.stage,
            industry: project.industry,
            framework: project.framework,
            tokenomics: project.tokenomics,
            created_at: Utc::now().to_rfc3339(),
        };
        let framework = serde_json::to_string(&record.framework)?;
        let tokenomics = record.tokenomics.as_ref().map(serde_json::to_string).transpose()?;

        let db = self.conn()?;
        db.execute(
            "INSERT INTO projects (id, user_id, name, idea, stage, industry, framework, tokenomics, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                record.id,
                user_id,
                record.name,
                record.idea,
                record.stage.to_string(),
                record.industry,
                framework,
                tokenomics,
                record.created_at,
            ],
        )?;
        tracing::info!(project = %record.id, "Project saved");
        Ok(record)
    }

    /// The user's projects, newest first.
    pub fn list(&self, user_id: &str) -> Result<Vec<ProjectSummary>, StoreError> {
        let user_id = user(user_id)?;
        let db = self.conn()?;
        let mut stmt = db.prepare(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt
            .query_map([user_id], RawProject::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|raw| {
                let p = raw.decode()?;
                Ok(ProjectSummary {
                    summary: p.framework.summary,
                    id: p.id,
                    name: p.name,
                    idea: p.idea,
                    stage: p.stage,
                    industry: p.industry,
                    created_at: p.created_at,
                })
            })
            .collect()
    }

    pub fn get(&self, user_id: &str, id: &str) -> Result<Option<Project>, StoreError> {
        let user_id = user(user_id)?;
        let db = self.conn()?;
        let raw = db
            .query_row(
                &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE user_id = ?1 AND id = ?2"),
                [user_id, id],
                RawProject::from_row,
            )
            .optional()?;
        raw.map(RawProject::decode).transpose()
    }

    /// Returns false when the user has no such project.
    pub fn delete(&self, user_id: &str, id: &str) -> Result<bool, StoreError> {
        let user_id = user(user_id)?;
        let db = self.conn()?;
        let n = db.execute("DELETE FROM projects WHERE user_id = ?1 AND id = ?2", [user_id, id])?;
        Ok(n > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_project(name: &str) -> NewProject {
        NewProject {
            name: name.into(),
            idea: "ticket resale marketplace".into(),
            stage: Stage::New,
            industry: Some("events".into()),
            framework: Framework {
                summary: format!("{name} summary"),
                recommended_chain: "Base".into(),
                ..Default::default()
            },
            tokenomics: Some(TokenomicsData::no_token()),
        }
    }

    #[test]
    fn create_get_roundtrip() {
        let store = ProjectStore::in_memory().unwrap();
        let created = store.create("alice", new_project("Tix")).unwrap();
        assert_eq!(created.id.len(), 36);

        let fetched = store.get("alice", &created.id).unwrap().unwrap();
        assert_eq!(fetched, created);
    }

    #[test]
    fn projects_are_scoped_by_user() {
        let store = ProjectStore::in_memory().unwrap();
        let p = store.create("alice", new_project("Tix")).unwrap();
        assert!(store.get("bob", &p.id).unwrap().is_none());
        assert!(store.list("bob").unwrap().is_empty());
        assert!(!store.delete("bob", &p.id).unwrap());
        assert!(store.get("alice", &p.id).unwrap().is_some());
    }

    #[test]
    fn list_is_newest_first_with_summary() {
        let store = ProjectStore::in_memory().unwrap();
        store.create("alice", new_project("First")).unwrap();
        store.create("alice", new_project("Second")).unwrap();
        let list = store.list("alice").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "Second");
        assert_eq!(list[0].summary, "Second summary");
        assert_eq!(list[1].name, "First");
    }

    #[test]
    fn delete_removes_once() {
        let store = ProjectStore::in_memory().unwrap();
        let p = store.create("alice", new_project("Tix")).unwrap();
        assert!(store.delete("alice", &p.id).unwrap());
        assert!(!store.delete("alice", &p.id).unwrap());
        assert!(store.get("alice", &p.id).unwrap().is_none());
    }

    #[test]
    fn blank_user_is_rejected() {
        let store = ProjectStore::in_memory().unwrap();
        assert!(matches!(store.create("  ", new_project("x")), Err(StoreError::MissingUserId)));
        assert!(matches!(store.list(""), Err(StoreError::MissingUserId)));
    }

    #[test]
    fn survives_reopen_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("projects.db");
        let id = {
            let store = ProjectStore::open(&path).unwrap();
            store.create("alice", new_project("Tix")).unwrap().id
        };
        let store = ProjectStore::open(&path).unwrap();
        assert_eq!(store.get("alice", &id).unwrap().unwrap().name, "Tix");
    }
}
