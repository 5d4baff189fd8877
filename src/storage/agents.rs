//! Agent registry operations.

use super::{Storage, format_ts, parse_ts, validate_identifier};
use crate::models::{Agent, AgentKind, Scope};
use crate::{Error, Result, StorageContext, is_constraint_violation};
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row, params};

const AGENT_COLUMNS: &str =
    "name, external_id, session_file, cursor, pid, repo_path, branch, kind, spawned_at";

fn agent_from_row(row: &Row<'_>) -> rusqlite::Result<Agent> {
    let cursor: i64 = row.get(3)?;
    let pid: Option<i64> = row.get(4)?;
    let kind: String = row.get(7)?;
    let kind = kind
        .parse::<AgentKind>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;
    let spawned_at: String = row.get(8)?;

    Ok(Agent {
        name: row.get(0)?,
        external_id: row.get(1)?,
        session_file: row.get(2)?,
        cursor: cursor.max(0) as u64,
        pid: pid.and_then(|p| u32::try_from(p).ok()),
        scope: Scope {
            repo_path: row.get(5)?,
            branch: row.get(6)?,
        },
        kind,
        spawned_at: parse_ts(8, &spawned_at)?,
    })
}

impl Storage {
    // === Agent Operations ===

    /// Register a newly spawned agent.
    pub fn create_agent(&mut self, agent: &Agent) -> Result<()> {
        validate_identifier("agent name", &agent.name)?;
        validate_identifier("external id", &agent.external_id)?;

        self.conn
            .execute(
                "INSERT INTO agents (name, external_id, session_file, cursor, pid,
                                     repo_path, branch, kind, spawned_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    agent.name,
                    agent.external_id,
                    agent.session_file,
                    agent.cursor as i64,
                    agent.pid.map(i64::from),
                    agent.scope.repo_path,
                    agent.scope.branch,
                    agent.kind.as_str(),
                    format_ts(&agent.spawned_at),
                ],
            )
            .map_err(|source| {
                if is_constraint_violation(&source) {
                    Error::Conflict(format!("Agent already exists: {}", agent.name))
                } else {
                    Error::Storage {
                        op: "insert agent",
                        source,
                    }
                }
            })?;
        Ok(())
    }

    /// Get an agent by name.
    pub fn get_agent(&self, name: &str) -> Result<Agent> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM agents WHERE name = ?1", AGENT_COLUMNS),
                [name],
                agent_from_row,
            )
            .optional()
            .op("get agent")?
            .ok_or_else(|| Error::NotFound(format!("Agent not found: {}", name)))
    }

    /// Persist a new read cursor.
    ///
    /// The stored value never decreases: a stale or smaller cursor leaves
    /// the current one in place.
    pub fn update_cursor(&mut self, name: &str, cursor: u64) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE agents SET cursor = MAX(cursor, ?2) WHERE name = ?1",
                params![name, cursor as i64],
            )
            .op("update agent cursor")?;
        if changed == 0 {
            return Err(Error::NotFound(format!("Agent not found: {}", name)));
        }
        Ok(())
    }

    /// Cache the discovered transcript path.
    pub fn update_session_file_path(&mut self, name: &str, path: &str) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE agents SET session_file = ?2 WHERE name = ?1",
                params![name, path],
            )
            .op("update agent session file")?;
        if changed == 0 {
            return Err(Error::NotFound(format!("Agent not found: {}", name)));
        }
        Ok(())
    }

    /// All agents, in spawn order.
    pub fn list_agents(&self) -> Result<Vec<Agent>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM agents ORDER BY spawned_at ASC, rowid ASC",
                AGENT_COLUMNS
            ))
            .op("list agents")?;
        let agents = stmt
            .query_map([], agent_from_row)
            .op("list agents")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .op("list agents")?;
        Ok(agents)
    }

    /// Agents spawned in a repository, optionally narrowed to one branch,
    /// in spawn order.
    pub fn list_agents_by_scope(&self, repo_path: &str, branch: Option<&str>) -> Result<Vec<Agent>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM agents
                 WHERE repo_path = ?1 AND (?2 IS NULL OR branch = ?2)
                 ORDER BY spawned_at ASC, rowid ASC",
                AGENT_COLUMNS
            ))
            .op("list agents by scope")?;
        let agents = stmt
            .query_map(params![repo_path, branch], agent_from_row)
            .op("list agents by scope")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .op("list agents by scope")?;
        Ok(agents)
    }
}

#[cfg(test)]
mod tests {
    use crate::Error;
    use crate::models::{Agent, AgentKind};
    use crate::test_utils::{TestEnv, scope};
    use chrono::Duration;

    fn agent(name: &str, branch: &str, offset_ms: i64) -> Agent {
        let mut agent = Agent::new(name, format!("0199-{}", name), scope("/work/repo", branch));
        agent.spawned_at += Duration::milliseconds(offset_ms);
        agent
    }

    #[test]
    fn test_create_and_get_agent_defaults() {
        let env = TestEnv::new();
        let mut storage = env.open_storage();
        storage.create_agent(&agent("otter", "main", 0)).unwrap();

        let stored = storage.get_agent("otter").unwrap();
        assert_eq!(stored.external_id, "0199-otter");
        assert_eq!(stored.cursor, 0);
        assert_eq!(stored.kind, AgentKind::Codex);
        assert_eq!(stored.session_file, "");
        assert!(stored.pid.is_none());
    }

    #[test]
    fn test_create_agent_preserves_kind_and_pid() {
        let env = TestEnv::new();
        let mut storage = env.open_storage();
        let mut gemini = agent("heron", "main", 0).with_kind(AgentKind::Gemini);
        gemini.pid = Some(4242);
        storage.create_agent(&gemini).unwrap();

        let stored = storage.get_agent("heron").unwrap();
        assert_eq!(stored.kind, AgentKind::Gemini);
        assert_eq!(stored.pid, Some(4242));
    }

    #[test]
    fn test_duplicate_agent_name_conflicts() {
        let env = TestEnv::new();
        let mut storage = env.open_storage();
        storage.create_agent(&agent("otter", "main", 0)).unwrap();
        let err = storage.create_agent(&agent("otter", "dev", 5)).unwrap_err();
        assert!(matches!(err, Error::Conflict(msg) if msg.contains("otter")));
        assert_eq!(storage.get_agent("otter").unwrap().scope.branch, "main");
    }

    #[test]
    fn test_create_agent_rejects_malformed_external_id() {
        let env = TestEnv::new();
        let mut storage = env.open_storage();
        let bad = Agent::new("otter", "../../etc/passwd", scope("/r", "main"));
        assert!(matches!(storage.create_agent(&bad), Err(Error::Validation(_))));
    }

    #[test]
    fn test_get_missing_agent() {
        let env = TestEnv::new();
        let storage = env.open_storage();
        assert!(matches!(storage.get_agent("ghost"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_update_cursor_is_monotonic() {
        let env = TestEnv::new();
        let mut storage = env.open_storage();
        storage.create_agent(&agent("otter", "main", 0)).unwrap();

        storage.update_cursor("otter", 12).unwrap();
        assert_eq!(storage.get_agent("otter").unwrap().cursor, 12);

        storage.update_cursor("otter", 7).unwrap();
        assert_eq!(storage.get_agent("otter").unwrap().cursor, 12);

        storage.update_cursor("otter", 20).unwrap();
        assert_eq!(storage.get_agent("otter").unwrap().cursor, 20);

        assert!(matches!(
            storage.update_cursor("ghost", 1),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_update_session_file_path() {
        let env = TestEnv::new();
        let mut storage = env.open_storage();
        storage.create_agent(&agent("otter", "main", 0)).unwrap();

        storage
            .update_session_file_path("otter", "/tmp/rollout-x.jsonl")
            .unwrap();
        let stored = storage.get_agent("otter").unwrap();
        assert!(stored.has_session_file());
        assert_eq!(stored.session_file, "/tmp/rollout-x.jsonl");

        assert!(matches!(
            storage.update_session_file_path("ghost", "/tmp/x"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_list_agents_in_spawn_order_and_by_scope() {
        let env = TestEnv::new();
        let mut storage = env.open_storage();
        storage.create_agent(&agent("c-late", "main", 30)).unwrap();
        storage.create_agent(&agent("a-early", "main", 10)).unwrap();
        storage.create_agent(&agent("b-dev", "dev", 20)).unwrap();
        let mut foreign = agent("z-other", "main", 0);
        foreign.scope.repo_path = "/other".to_string();
        storage.create_agent(&foreign).unwrap();

        let names = |agents: Vec<Agent>| agents.into_iter().map(|a| a.name).collect::<Vec<_>>();

        assert_eq!(
            names(storage.list_agents().unwrap()),
            vec!["z-other", "a-early", "b-dev", "c-late"]
        );
        assert_eq!(
            names(storage.list_agents_by_scope("/work/repo", None).unwrap()),
            vec!["a-early", "b-dev", "c-late"]
        );
        assert_eq!(
            names(storage.list_agents_by_scope("/work/repo", Some("main")).unwrap()),
            vec!["a-early", "c-late"]
        );
        assert!(storage.list_agents_by_scope("/nowhere", None).unwrap().is_empty());
    }
}
