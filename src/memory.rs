//! In-memory document server.
//!
//! [`MemoryTransport`] answers [`RemoteRequest`]s the way a single document
//! server would, without any network: databases, documents with revisions,
//! `_all_docs` key ranges, canned view results, a `_replicator` database and a
//! `_scheduler/jobs` registry. Every request is recorded for assertions.
//!
//! Used for standalone mode and tests. Only compiled with the `test-util`
//! feature.
//!
//! # Scheduler Emulation
//!
//! ```text
//! POST   /_replicator        → document stored, job added to running set
//! DELETE /_replicator/{id}   → job removed; the oldest deferred job (if any)
//!                              is promoted into the running set
//! ```
//!
//! Deferred jobs model replications the scheduler has rescheduled: invisible
//! to `_scheduler/jobs` until something running stops.
//!
//! # Example
//!
//! ```rust
//! # async fn example() {
//! use replication_orchestrator::memory::MemoryTransport;
//! use serde_json::json;
//!
//! let server = MemoryTransport::with_system_databases();
//! server.insert_document("_replicator", "job-1", json!({"source": "a", "target": "b"})).await;
//! server.schedule_job("job-1").await;
//! # }
//! ```

use crate::gateway::REPLICATOR_DB;
use crate::transport::{
    BoxFuture, Method, RemoteRequest, RemoteResponse, Transport, TransportError,
};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Fixed timestamp reported for scheduler history entries.
const JOB_TIMESTAMP: &str = "2026-01-01T00:00:00Z";

#[derive(Debug, Clone)]
struct StoredDoc {
    rev: String,
    /// Body without `_id` / `_rev`.
    body: Map<String, Value>,
}

impl StoredDoc {
    fn generation(&self) -> u64 {
        self.rev
            .split('-')
            .next()
            .and_then(|g| g.parse().ok())
            .unwrap_or(0)
    }

    fn render(&self, id: &str) -> Value {
        let mut doc = Map::new();
        doc.insert("_id".to_string(), json!(id));
        doc.insert("_rev".to_string(), json!(self.rev));
        doc.extend(self.body.clone());
        Value::Object(doc)
    }
}

#[derive(Debug, Default)]
struct Database {
    docs: BTreeMap<String, StoredDoc>,
    /// Ids of deleted documents.
    tombstones: BTreeSet<String>,
    update_seq: u64,
    doc_del_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ScheduledJob {
    /// Backed by a `_replicator` document.
    Document(String),
    /// Started through `/_replicate`; no document.
    Transient(u64),
}

#[derive(Debug, Default)]
struct ServerState {
    databases: BTreeMap<String, Database>,
    views: HashMap<(String, String, String), Value>,
    running: Vec<ScheduledJob>,
    deferred: VecDeque<String>,
}

fn respond(status: u16, body: Value) -> RemoteResponse {
    RemoteResponse::new(status, body)
}

fn not_found(reason: &str) -> RemoteResponse {
    respond(404, json!({"error": "not_found", "reason": reason}))
}

fn conflict() -> RemoteResponse {
    respond(409, json!({"error": "conflict", "reason": "Document update conflict."}))
}

fn bad_request(reason: &str) -> RemoteResponse {
    respond(400, json!({"error": "bad_request", "reason": reason}))
}

fn no_database() -> RemoteResponse {
    not_found("Database does not exist.")
}

/// `{generation}-{first 16 bytes of sha256(body) as hex}`
fn revision(generation: u64, body: &Map<String, Value>) -> String {
    let digest = Sha256::digest(Value::Object(body.clone()).to_string().as_bytes());
    let hex: String = digest[..16].iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}-{}", generation, hex)
}

fn hex_id(seed: &[u8]) -> String {
    let digest = Sha256::digest(seed);
    digest[..16].iter().map(|b| format!("{:02x}", b)).collect()
}

impl ServerState {
    fn with_databases(names: &[&str]) -> Self {
        let mut state = Self::default();
        for name in names {
            state.databases.insert(name.to_string(), Database::default());
        }
        state
    }

    fn handle(&mut self, request: &RemoteRequest, next_id: u64) -> RemoteResponse {
        let path: Vec<&str> = request.path.iter().map(String::as_str).collect();

        match (request.method, path.as_slice()) {
            (Method::Get, []) => respond(200, json!({"couchdb": "Welcome", "version": "3.3.3"})),
            (Method::Get, ["_all_dbs"]) => {
                respond(200, json!(self.databases.keys().collect::<Vec<_>>()))
            }
            (Method::Get, ["_scheduler", "jobs"]) => self.scheduler_jobs(request),
            (_, ["_scheduler", _, ..]) => not_found("missing"),

            (Method::Head, [db]) => match self.databases.contains_key(*db) {
                true => respond(200, Value::Null),
                false => respond(404, Value::Null),
            },
            (Method::Get, [db]) => self.database_info(db),
            (Method::Put, [db]) => self.create_database(db),
            (Method::Delete, [db]) => self.delete_database(db),
            (Method::Post, [db]) => {
                let id = request
                    .body
                    .as_ref()
                    .and_then(|b| b.get("_id"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| hex_id(&next_id.to_be_bytes()));
                self.put_document(db, &id, request.body.clone())
            }

            (Method::Post, [db, "_compact"]) => match self.databases.contains_key(*db) {
                true => respond(202, json!({"ok": true})),
                false => no_database(),
            },
            (Method::Get, [db, "_all_docs"]) => self.all_docs(db, request),
            (Method::Get, [db, "_design", design, "_view", view]) => {
                if !self.databases.contains_key(*db) {
                    return no_database();
                }
                let key = (db.to_string(), design.to_string(), view.to_string());
                match self.views.get(&key) {
                    Some(result) => respond(200, result.clone()),
                    None => not_found("missing_named_view"),
                }
            }
            (_, [db, "_design", name]) => {
                let id = format!("_design/{}", name);
                self.document(request, db, &id)
            }
            (_, [db, id]) => self.document(request, db, id),

            _ => respond(405, json!({"error": "method_not_allowed", "reason": "Unsupported."})),
        }
    }

    // =========================================================================
    // Databases
    // =========================================================================

    fn create_database(&mut self, name: &str) -> RemoteResponse {
        if self.databases.contains_key(name) {
            return respond(
                412,
                json!({"error": "file_exists", "reason": "The database could not be created, the file already exists."}),
            );
        }
        self.databases.insert(name.to_string(), Database::default());
        respond(201, json!({"ok": true}))
    }

    fn delete_database(&mut self, name: &str) -> RemoteResponse {
        match self.databases.remove(name) {
            Some(_) => respond(200, json!({"ok": true})),
            None => no_database(),
        }
    }

    fn database_info(&self, name: &str) -> RemoteResponse {
        let Some(db) = self.databases.get(name) else {
            return no_database();
        };
        let external: usize = db
            .docs
            .values()
            .map(|d| Value::Object(d.body.clone()).to_string().len())
            .sum();
        respond(
            200,
            json!({
                "db_name": name,
                "doc_count": db.docs.len(),
                "doc_del_count": db.doc_del_count,
                "update_seq": format!("{}-g1AAAA", db.update_seq),
                "purge_seq": "0-g1AAAA",
                "sizes": {"file": external * 2 + 4096, "external": external, "active": external},
                "props": {},
                "compact_running": false,
                "instance_start_time": "0"
            }),
        )
    }

    fn all_docs(&self, name: &str, request: &RemoteRequest) -> RemoteResponse {
        let Some(db) = self.databases.get(name) else {
            return no_database();
        };

        let key = |param: &str| -> Result<Option<String>, RemoteResponse> {
            match request.query_value(param) {
                None => Ok(None),
                Some(raw) => serde_json::from_str::<String>(raw)
                    .map(Some)
                    .map_err(|_| bad_request("Invalid JSON key")),
            }
        };
        let start = match key("startkey") {
            Ok(k) => k,
            Err(resp) => return resp,
        };
        let end = match key("endkey") {
            Ok(k) => k,
            Err(resp) => return resp,
        };
        let inclusive_end = request.query_value("inclusive_end") != Some("false");
        let include_docs = request.query_value("include_docs") == Some("true");

        let in_range = |id: &str| {
            let after_start = start.as_deref().map_or(true, |s| id >= s);
            let before_end = end.as_deref().map_or(true, |e| {
                if inclusive_end {
                    id <= e
                } else {
                    id < e
                }
            });
            after_start && before_end
        };

        let offset = db
            .docs
            .keys()
            .take_while(|id| start.as_deref().map_or(false, |s| id.as_str() < s))
            .count();
        let rows: Vec<Value> = db
            .docs
            .iter()
            .filter(|(id, _)| in_range(id))
            .map(|(id, doc)| {
                let mut row = json!({"id": id, "key": id, "value": {"rev": doc.rev}});
                if include_docs {
                    row["doc"] = doc.render(id);
                }
                row
            })
            .collect();

        respond(
            200,
            json!({"total_rows": db.docs.len(), "offset": offset, "rows": rows}),
        )
    }

    // =========================================================================
    // Documents
    // =========================================================================

    fn document(&mut self, request: &RemoteRequest, db: &str, id: &str) -> RemoteResponse {
        match request.method {
            Method::Get => {
                let Some(database) = self.databases.get(db) else {
                    return no_database();
                };
                match database.docs.get(id) {
                    Some(doc) => respond(200, doc.render(id)),
                    None if database.tombstones.contains(id) => not_found("deleted"),
                    None => not_found("missing"),
                }
            }
            Method::Put => self.put_document(db, id, request.body.clone()),
            Method::Delete => self.delete_document(db, id, request.query_value("rev")),
            _ => respond(405, json!({"error": "method_not_allowed", "reason": "Unsupported."})),
        }
    }

    fn put_document(&mut self, db: &str, id: &str, body: Option<Value>) -> RemoteResponse {
        let Some(Value::Object(mut body)) = body else {
            return bad_request("Document must be a JSON object");
        };
        let Some(database) = self.databases.get_mut(db) else {
            return no_database();
        };

        let supplied_rev = body.remove("_rev");
        body.remove("_id");
        let supplied_rev = supplied_rev.as_ref().and_then(Value::as_str);

        let generation = match (database.docs.get(id), supplied_rev) {
            (Some(current), Some(rev)) if current.rev == rev => current.generation() + 1,
            (None, None) => 1,
            _ => return conflict(),
        };

        let rev = revision(generation, &body);
        database.docs.insert(
            id.to_string(),
            StoredDoc {
                rev: rev.clone(),
                body,
            },
        );
        database.tombstones.remove(id);
        database.update_seq += 1;

        let created = generation == 1;
        if db == REPLICATOR_DB && created {
            self.running.push(ScheduledJob::Document(id.to_string()));
        }

        respond(201, json!({"ok": true, "id": id, "rev": rev}))
    }

    fn delete_document(&mut self, db: &str, id: &str, rev: Option<&str>) -> RemoteResponse {
        let Some(database) = self.databases.get_mut(db) else {
            return no_database();
        };
        let Some(current) = database.docs.get(id) else {
            return not_found("missing");
        };
        if rev != Some(current.rev.as_str()) {
            return conflict();
        }

        let tombstone_rev = revision(current.generation() + 1, &Map::new());
        database.docs.remove(id);
        database.tombstones.insert(id.to_string());
        database.update_seq += 1;
        database.doc_del_count += 1;

        if db == REPLICATOR_DB {
            self.unschedule(id);
        }

        respond(200, json!({"ok": true, "id": id, "rev": tombstone_rev}))
    }

    // =========================================================================
    // Scheduler
    // =========================================================================

    fn unschedule(&mut self, doc_id: &str) {
        let job = ScheduledJob::Document(doc_id.to_string());
        let before = self.running.len();
        self.running.retain(|j| *j != job);
        self.deferred.retain(|d| d != doc_id);

        if self.running.len() < before {
            if let Some(next) = self.deferred.pop_front() {
                self.running.push(ScheduledJob::Document(next));
            }
        }
    }

    fn scheduler_jobs(&self, request: &RemoteRequest) -> RemoteResponse {
        let count = |param: &str| -> Result<Option<usize>, RemoteResponse> {
            match request.query_value(param) {
                None => Ok(None),
                Some(raw) => raw
                    .parse()
                    .map(Some)
                    .map_err(|_| bad_request("Invalid integer parameter")),
            }
        };
        let skip = match count("skip") {
            Ok(n) => n.unwrap_or(0),
            Err(resp) => return resp,
        };
        let limit = match count("limit") {
            Ok(n) => n.unwrap_or(usize::MAX),
            Err(resp) => return resp,
        };

        let jobs: Vec<Value> = self
            .running
            .iter()
            .skip(skip)
            .take(limit)
            .map(|job| match job {
                ScheduledJob::Document(doc_id) => {
                    let doc = self
                        .databases
                        .get(REPLICATOR_DB)
                        .and_then(|db| db.docs.get(doc_id));
                    let field = |name: &str| {
                        doc.and_then(|d| d.body.get(name).cloned())
                            .unwrap_or(Value::Null)
                    };
                    json!({
                        "database": REPLICATOR_DB,
                        "id": format!("{}+continuous", hex_id(doc_id.as_bytes())),
                        "pid": "<0.1000.0>",
                        "source": field("source"),
                        "target": field("target"),
                        "user": null,
                        "doc_id": doc_id,
                        "history": [
                            {"timestamp": JOB_TIMESTAMP, "type": "started"},
                            {"timestamp": JOB_TIMESTAMP, "type": "added"}
                        ],
                        "node": "nonode@nohost",
                        "start_time": JOB_TIMESTAMP
                    })
                }
                ScheduledJob::Transient(n) => json!({
                    "database": null,
                    "id": format!("{}+transient", hex_id(&n.to_be_bytes())),
                    "pid": "<0.1001.0>",
                    "source": null,
                    "target": null,
                    "user": "admin",
                    "doc_id": null,
                    "history": [{"timestamp": JOB_TIMESTAMP, "type": "started"}],
                    "node": "nonode@nohost",
                    "start_time": JOB_TIMESTAMP
                }),
            })
            .collect();

        respond(
            200,
            json!({"total_rows": self.running.len(), "offset": skip, "jobs": jobs}),
        )
    }
}

/// A [`Transport`] backed by an in-process document server.
pub struct MemoryTransport {
    state: Mutex<ServerState>,
    requests: Mutex<Vec<RemoteRequest>>,
    request_count: AtomicUsize,
    next_id: AtomicU64,
    unreachable: AtomicBool,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    /// An empty server with no databases.
    pub fn new() -> Self {
        Self::from_state(ServerState::default())
    }

    /// A server with `_global_changes`, `_users` and `_replicator` already created.
    pub fn with_system_databases() -> Self {
        Self::from_state(ServerState::with_databases(&[
            "_global_changes",
            "_users",
            REPLICATOR_DB,
        ]))
    }

    fn from_state(state: ServerState) -> Self {
        Self {
            state: Mutex::new(state),
            requests: Mutex::new(Vec::new()),
            request_count: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
            unreachable: AtomicBool::new(false),
        }
    }

    // =========================================================================
    // Seeding
    // =========================================================================

    /// Store a document directly (no request recorded), creating the
    /// database if needed. Overwrites any existing document. Returns its revision.
    ///
    /// Seeding `_replicator` does not schedule a job; use [`schedule_job`](Self::schedule_job).
    pub async fn insert_document(&self, db: &str, id: &str, body: Value) -> String {
        let mut state = self.state.lock().await;
        let database = state.databases.entry(db.to_string()).or_default();

        let mut body = match body {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        body.remove("_id");
        body.remove("_rev");

        let generation = database.docs.get(id).map_or(1, |d| d.generation() + 1);
        let rev = revision(generation, &body);
        database.docs.insert(
            id.to_string(),
            StoredDoc {
                rev: rev.clone(),
                body,
            },
        );
        database.update_seq += 1;
        rev
    }

    /// Mark a replicator document id as running. The document need not exist.
    pub async fn schedule_job(&self, doc_id: &str) {
        let mut state = self.state.lock().await;
        state.running.push(ScheduledJob::Document(doc_id.to_string()));
    }

    /// Queue a rescheduled job, promoted to running when a running job stops.
    pub async fn defer_job(&self, doc_id: &str) {
        let mut state = self.state.lock().await;
        state.deferred.push_back(doc_id.to_string());
    }

    /// Add a running job with no replicator document behind it.
    pub async fn schedule_transient_job(&self) {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock().await;
        state.running.push(ScheduledJob::Transient(n));
    }

    /// Canned result for `GET /{db}/_design/{design}/_view/{view}`.
    pub async fn set_view(&self, db: &str, design: &str, view: &str, result: Value) {
        let mut state = self.state.lock().await;
        state
            .views
            .insert((db.to_string(), design.to_string(), view.to_string()), result);
    }

    /// Make every subsequent request fail at the transport level.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub async fn has_database(&self, name: &str) -> bool {
        self.state.lock().await.databases.contains_key(name)
    }

    /// Current document (with `_id` and `_rev`), if present.
    pub async fn document(&self, db: &str, id: &str) -> Option<Value> {
        let state = self.state.lock().await;
        state
            .databases
            .get(db)
            .and_then(|d| d.docs.get(id))
            .map(|d| d.render(id))
    }

    /// Document ids of running, document-backed jobs, in scheduler order.
    pub async fn running_jobs(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .running
            .iter()
            .filter_map(|job| match job {
                ScheduledJob::Document(id) => Some(id.clone()),
                ScheduledJob::Transient(_) => None,
            })
            .collect()
    }

    pub async fn deferred_jobs(&self) -> Vec<String> {
        self.state.lock().await.deferred.iter().cloned().collect()
    }

    /// Every request received so far, in arrival order.
    pub async fn requests(&self) -> Vec<RemoteRequest> {
        self.requests.lock().await.clone()
    }

    /// Total requests received (including ones failed by `set_unreachable`).
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Requests received with the given method.
    pub async fn count(&self, method: Method) -> usize {
        self.requests
            .lock()
            .await
            .iter()
            .filter(|r| r.method == method)
            .count()
    }

    pub async fn clear_requests(&self) {
        self.requests.lock().await.clear();
        self.request_count.store(0, Ordering::SeqCst);
    }
}

impl Transport for MemoryTransport {
    fn send(&self, request: RemoteRequest) -> BoxFuture<'_, RemoteResponse> {
        Box::pin(async move {
            self.request_count.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().await.push(request.clone());

            if self.unreachable.load(Ordering::SeqCst) {
                return Err(TransportError("connection refused".to_string()));
            }

            let next_id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let mut state = self.state.lock().await;
            Ok(state.handle(&request, next_id))
        })
    }
}
