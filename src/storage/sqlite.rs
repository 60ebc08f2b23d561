//! SQLite storage backend

use super::traits::{
    GraphStore, NodeFilter, OpenStore, RejectedEdge, RunStore, StorageResult, UpsertResult,
};
use crate::graph::{Citation, Edge, Framework, Node, NodeKey, NodeKind, Properties, Relation};
use crate::ingest::IngestionRun;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;

const NODE_COLUMNS: &str =
    "framework, kind, external_id, name, description, properties_json, citation_json";

const NODE_UPSERT: &str = r#"
    INSERT INTO nodes (key, framework, kind, external_id, sort_key, name, description,
                       properties_json, citation_json, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
    ON CONFLICT(key) DO UPDATE SET
        name = excluded.name,
        description = excluded.description,
        properties_json = excluded.properties_json,
        citation_json = excluded.citation_json,
        updated_at = excluded.updated_at
"#;

const CITATION_UPSERT: &str = r#"
    INSERT INTO citations (node_key, document_id, location, excerpt, recorded_at)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT(node_key, document_id) DO UPDATE SET
        location = excluded.location,
        excerpt = excluded.excerpt,
        recorded_at = excluded.recorded_at
"#;

const EDGE_UPSERT: &str = r#"
    INSERT INTO edges (relation, source_key, target_key, confidence, evidence)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT(relation, source_key, target_key) DO UPDATE SET
        confidence = excluded.confidence,
        evidence = excluded.evidence
"#;

/// Width digit runs are padded to in `sort_key`.
const SORT_DIGITS: usize = 10;

/// `8.2.10` -> `0000000008.0000000002.0000000010`, so identifiers order
/// numerically within each dotted or dashed segment.
fn natural_sort_key(external_id: &str) -> String {
    let mut key = String::with_capacity(external_id.len() + SORT_DIGITS);
    let mut digits = String::new();
    for c in external_id.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if !digits.is_empty() {
            key.push_str(&format!("{:0>width$}", digits, width = SORT_DIGITS));
            digits.clear();
        }
        key.push(c);
    }
    if !digits.is_empty() {
        key.push_str(&format!("{:0>width$}", digits, width = SORT_DIGITS));
    }
    key
}

/// Raw column values of one node row, decoded outside the row closure.
type NodeRow = (String, String, String, String, String, String, Option<String>);

/// SQLite-backed graph and run store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Initialize the database schema
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            -- Nodes are keyed by FRAMEWORK/Kind/external_id
            CREATE TABLE IF NOT EXISTS nodes (
                key TEXT PRIMARY KEY,
                framework TEXT NOT NULL,
                kind TEXT NOT NULL,
                external_id TEXT NOT NULL,
                -- external_id with digit runs zero-padded: PCI 2 sorts before 10
                sort_key TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                properties_json TEXT NOT NULL,
                citation_json TEXT,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_nodes_framework_kind
                ON nodes(framework, kind, sort_key);
            CREATE INDEX IF NOT EXISTS idx_nodes_external_id
                ON nodes(external_id);

            CREATE TABLE IF NOT EXISTS edges (
                relation TEXT NOT NULL,
                source_key TEXT NOT NULL,
                target_key TEXT NOT NULL,
                confidence REAL NOT NULL,
                evidence TEXT,
                PRIMARY KEY (relation, source_key, target_key),
                FOREIGN KEY (source_key) REFERENCES nodes(key),
                FOREIGN KEY (target_key) REFERENCES nodes(key)
            );

            CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source_key);
            CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target_key);

            -- One citation per (node, document); re-ingestion refreshes it
            CREATE TABLE IF NOT EXISTS citations (
                node_key TEXT NOT NULL,
                document_id TEXT NOT NULL,
                location TEXT NOT NULL,
                excerpt TEXT NOT NULL,
                recorded_at TEXT NOT NULL,
                PRIMARY KEY (node_key, document_id),
                FOREIGN KEY (node_key) REFERENCES nodes(key)
            );

            CREATE TABLE IF NOT EXISTS ingestion_runs (
                run_id TEXT PRIMARY KEY,
                framework TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                run_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_runs_framework
                ON ingestion_runs(framework, started_at);

            PRAGMA foreign_keys = ON;
            "#,
        )?;
        Ok(())
    }

    fn read_node_row(row: &Row<'_>) -> rusqlite::Result<NodeRow> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
        ))
    }

    fn row_to_node(row: NodeRow) -> StorageResult<Node> {
        let (framework, kind, external_id, name, description, properties_json, citation_json) =
            row;
        let framework: Framework = framework.parse()?;
        let kind: NodeKind = kind.parse()?;
        let properties: Properties = serde_json::from_str(&properties_json)?;
        let citation: Option<Citation> = match citation_json {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        };

        let mut node = Node::new(NodeKey::new(framework, kind, external_id), name)
            .with_description(description);
        node.properties = properties;
        node.citation = citation;
        Ok(node)
    }

    fn row_to_edge(
        relation: String,
        source: String,
        target: String,
        confidence: f64,
        evidence: Option<String>,
    ) -> StorageResult<Edge> {
        Ok(Edge {
            relation: relation.parse()?,
            source: source.parse()?,
            target: target.parse()?,
            confidence,
            evidence,
        })
    }

    /// Append WHERE clauses for a filter, returning the bound parameters.
    fn push_filter(
        sql: &mut String,
        params_vec: &mut Vec<Box<dyn rusqlite::ToSql>>,
        filter: &NodeFilter,
    ) {
        if let Some(framework) = filter.framework {
            sql.push_str(" AND framework = ?");
            params_vec.push(Box::new(framework.as_str().to_string()));
        }

        if !filter.kinds.is_empty() {
            let placeholders = vec!["?"; filter.kinds.len()].join(", ");
            sql.push_str(&format!(" AND kind IN ({})", placeholders));
            for kind in &filter.kinds {
                params_vec.push(Box::new(kind.as_str().to_string()));
            }
        }

        if let Some(ref external_id) = filter.external_id {
            sql.push_str(" AND external_id = ?");
            params_vec.push(Box::new(external_id.clone()));
        }
    }

    fn query_nodes(
        conn: &Connection,
        sql: &str,
        params_vec: &[Box<dyn rusqlite::ToSql>],
    ) -> StorageResult<Vec<Node>> {
        let mut stmt = conn.prepare(sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|b| b.as_ref()).collect();

        let rows = stmt.query_map(params_refs.as_slice(), Self::read_node_row)?;

        let mut nodes = Vec::new();
        for row in rows {
            nodes.push(Self::row_to_node(row?)?);
        }
        Ok(nodes)
    }
}

/// Escape LIKE wildcards so search terms match literally.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;")?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl GraphStore for SqliteStore {
    fn upsert_batch(&self, nodes: &[Node], edges: &[Edge]) -> StorageResult<UpsertResult> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        let mut result = UpsertResult::default();

        {
            let mut exists = tx.prepare_cached("SELECT 1 FROM nodes WHERE key = ?1")?;
            let mut upsert_node = tx.prepare_cached(NODE_UPSERT)?;
            let mut upsert_citation = tx.prepare_cached(CITATION_UPSERT)?;

            for node in nodes {
                let key = node.key.to_string();
                let existed = exists.exists(params![key])?;
                let citation_json = match &node.citation {
                    Some(citation) => Some(serde_json::to_string(citation)?),
                    None => None,
                };

                upsert_node.execute(params![
                    key,
                    node.framework().as_str(),
                    node.kind().as_str(),
                    node.external_id(),
                    natural_sort_key(node.external_id()),
                    node.name,
                    node.description,
                    serde_json::to_string(&node.properties)?,
                    citation_json,
                    now,
                ])?;

                if let Some(citation) = &node.citation {
                    upsert_citation.execute(params![
                        key,
                        citation.document_id,
                        citation.location,
                        citation.excerpt,
                        now,
                    ])?;
                }

                result.nodes_written += 1;
                if !existed {
                    result.nodes_created += 1;
                }
            }

            let mut upsert_edge = tx.prepare_cached(EDGE_UPSERT)?;
            for edge in edges {
                let source = edge.source.to_string();
                let target = edge.target.to_string();

                let missing = if !exists.exists(params![source])? {
                    Some(edge.source.clone())
                } else if !exists.exists(params![target])? {
                    Some(edge.target.clone())
                } else {
                    None
                };
                if let Some(missing) = missing {
                    result.rejected.push(RejectedEdge {
                        edge: edge.clone(),
                        missing,
                    });
                    continue;
                }

                upsert_edge.execute(params![
                    edge.relation.as_str(),
                    source,
                    target,
                    edge.confidence,
                    edge.evidence,
                ])?;
                result.edges_written += 1;
            }
        }

        tx.commit()?;
        Ok(result)
    }

    fn load_node(&self, key: &NodeKey) -> StorageResult<Option<Node>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!("SELECT {} FROM nodes WHERE key = ?1", NODE_COLUMNS);
        let row = conn
            .query_row(&sql, params![key.to_string()], Self::read_node_row)
            .optional()?;

        row.map(Self::row_to_node).transpose()
    }

    fn find_nodes(&self, filter: &NodeFilter) -> StorageResult<Vec<Node>> {
        let conn = self.conn.lock().unwrap();

        let mut sql = format!("SELECT {} FROM nodes WHERE 1 = 1", NODE_COLUMNS);
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        Self::push_filter(&mut sql, &mut params_vec, filter);

        sql.push_str(" ORDER BY framework, kind, sort_key, external_id");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        Self::query_nodes(&conn, &sql, &params_vec)
    }

    fn search_nodes(&self, terms: &[String], filter: &NodeFilter) -> StorageResult<Vec<Node>> {
        let terms: Vec<&String> = terms.iter().filter(|t| !t.trim().is_empty()).collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock().unwrap();

        let mut sql = format!("SELECT {} FROM nodes WHERE 1 = 1", NODE_COLUMNS);
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        Self::push_filter(&mut sql, &mut params_vec, filter);

        let clauses: Vec<&str> = terms
            .iter()
            .map(|_| {
                "(lower(external_id) LIKE ? ESCAPE '\\' \
                 OR lower(name) LIKE ? ESCAPE '\\' \
                 OR lower(description) LIKE ? ESCAPE '\\')"
            })
            .collect();
        sql.push_str(&format!(" AND ({})", clauses.join(" OR ")));
        for term in &terms {
            let pattern = like_pattern(term.trim());
            for _ in 0..3 {
                params_vec.push(Box::new(pattern.clone()));
            }
        }

        sql.push_str(" ORDER BY framework, kind, sort_key, external_id");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        Self::query_nodes(&conn, &sql, &params_vec)
    }

    fn citations(&self, key: &NodeKey) -> StorageResult<Vec<Citation>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT document_id, location, excerpt FROM citations
             WHERE node_key = ?1
             ORDER BY recorded_at DESC, document_id",
        )?;

        let rows = stmt.query_map(params![key.to_string()], |row| {
            Ok(Citation {
                document_id: row.get(0)?,
                location: row.get(1)?,
                excerpt: row.get(2)?,
            })
        })?;

        let mut citations = Vec::new();
        for row in rows {
            citations.push(row?);
        }
        Ok(citations)
    }

    fn edges_touching(&self, key: &NodeKey, relation: Option<Relation>) -> StorageResult<Vec<Edge>> {
        let conn = self.conn.lock().unwrap();

        let mut sql = String::from(
            "SELECT relation, source_key, target_key, confidence, evidence FROM edges
             WHERE (source_key = ?1 OR target_key = ?1)",
        );
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(key.to_string())];
        if let Some(relation) = relation {
            sql.push_str(" AND relation = ?2");
            params_vec.push(Box::new(relation.as_str().to_string()));
        }
        sql.push_str(" ORDER BY relation, source_key, target_key");

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|b| b.as_ref()).collect();

        let rows = stmt.query_map(params_refs.as_slice(), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?;

        let mut edges = Vec::new();
        for row in rows {
            let (relation, source, target, confidence, evidence) = row?;
            edges.push(Self::row_to_edge(relation, source, target, confidence, evidence)?);
        }
        Ok(edges)
    }

    fn node_count(&self) -> StorageResult<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn edge_count(&self) -> StorageResult<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM edges", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn node_counts_by_kind(&self) -> StorageResult<Vec<(Framework, NodeKind, usize)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT framework, kind, COUNT(*) FROM nodes
             GROUP BY framework, kind ORDER BY framework, kind",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut counts = Vec::new();
        for row in rows {
            let (framework, kind, count) = row?;
            counts.push((framework.parse()?, kind.parse()?, count as usize));
        }
        Ok(counts)
    }

    fn edge_counts_by_relation(&self) -> StorageResult<Vec<(Relation, usize)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT relation, COUNT(*) FROM edges GROUP BY relation ORDER BY relation",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = Vec::new();
        for row in rows {
            let (relation, count) = row?;
            counts.push((relation.parse()?, count as usize));
        }
        Ok(counts)
    }
}

impl RunStore for SqliteStore {
    fn save_run(&self, run: &IngestionRun) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO ingestion_runs (run_id, framework, status, started_at, run_json)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(run_id) DO UPDATE SET
                status = excluded.status,
                run_json = excluded.run_json
            "#,
            params![
                run.run_id().as_str(),
                run.framework().as_str(),
                run.status().as_str(),
                run.started_at().to_rfc3339(),
                serde_json::to_string(run)?,
            ],
        )?;
        Ok(())
    }

    fn list_runs(&self, framework: Option<Framework>) -> StorageResult<Vec<IngestionRun>> {
        let conn = self.conn.lock().unwrap();

        let mut sql = String::from("SELECT run_json FROM ingestion_runs");
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(framework) = framework {
            sql.push_str(" WHERE framework = ?1");
            params_vec.push(Box::new(framework.as_str().to_string()));
        }
        sql.push_str(" ORDER BY started_at DESC, run_id");

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|b| b.as_ref()).collect();
        let rows = stmt.query_map(params_refs.as_slice(), |row| row.get::<_, String>(0))?;

        let mut runs = Vec::new();
        for row in rows {
            runs.push(serde_json::from_str(&row?)?);
        }
        Ok(runs)
    }
}
