//! Leaderboard persisted to disk (XDG config or ~/.config/quarthtui) and a client that talks to it
//! from a worker thread so the game loop never waits on I/O.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, warn};

const FILENAME: &str = "scores.json";
/// Entries returned by `top_scores`.
pub const TOP_LIMIT: usize = 15;
pub const MAX_NAME_LEN: usize = 6;
/// Stored when a submitted name sanitizes to nothing.
pub const DEFAULT_NAME: &str = "PLAYER";

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed score file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid score: {0}")]
    InvalidScore(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub name: String,
    pub score: i64,
    /// Seconds since the Unix epoch of the last improvement.
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReceipt {
    pub id: u64,
    /// True only when an existing record was beaten.
    pub updated: bool,
    /// Stored score when the submission did not beat it.
    pub current_score: Option<i64>,
}

/// The leaderboard operations the game relies on.
pub trait ScoreService: Send + 'static {
    fn top_scores(&self) -> Result<Vec<ScoreEntry>, ScoreError>;
    fn save_score(&mut self, name: &str, score: i64) -> Result<SaveReceipt, ScoreError>;
}

/// Uppercase, keep `[A-Z0-9]`, at most six characters; `PLAYER` when nothing is left.
pub fn sanitize_name(raw: &str) -> String {
    let name: String = raw
        .trim()
        .chars()
        .map(|c| c.to_ascii_uppercase())
        .filter(char::is_ascii_alphanumeric)
        .take(MAX_NAME_LEN)
        .collect();
    if name.is_empty() {
        DEFAULT_NAME.to_string()
    } else {
        name
    }
}

/// `$XDG_CONFIG_HOME/quarthtui/scores.json`, falling back to `~/.config`.
pub fn default_path() -> PathBuf {
    let base = match std::env::var("XDG_CONFIG_HOME") {
        Ok(xdg) if !xdg.is_empty() => PathBuf::from(xdg),
        _ => std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".config"))
            .unwrap_or_else(|_| PathBuf::from(".")),
    };
    base.join("quarthtui").join(FILENAME)
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Record {
    id: u64,
    name: String,
    score: i64,
    timestamp: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreFile {
    next_id: u64,
    records: Vec<Record>,
}

/// JSON-file leaderboard with one record per name.
#[derive(Debug)]
pub struct ScoreBoard {
    path: Option<PathBuf>,
    data: StoreFile,
}

impl ScoreBoard {
    /// Open the store at `path`; a missing file is an empty board.
    pub fn open(path: &Path) -> Result<Self, ScoreError> {
        let data = match fs::read_to_string(path) {
            Ok(s) => serde_json::from_str(&s)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreFile::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path: Some(path.to_path_buf()),
            data,
        })
    }

    /// In-memory board, used when the file cannot be read.
    pub fn detached() -> Self {
        Self {
            path: None,
            data: StoreFile::default(),
        }
    }

    /// Write `data` out, then adopt it. A failed write leaves the board as it was.
    fn commit(&mut self, data: StoreFile) -> Result<(), ScoreError> {
        if let Some(path) = &self.path {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, serde_json::to_string_pretty(&data)?)?;
        }
        self.data = data;
        Ok(())
    }
}

impl ScoreService for ScoreBoard {
    fn top_scores(&self) -> Result<Vec<ScoreEntry>, ScoreError> {
        let mut records: Vec<&Record> = self.data.records.iter().collect();
        records.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then(a.timestamp.cmp(&b.timestamp))
                .then(a.id.cmp(&b.id))
        });
        Ok(records
            .into_iter()
            .take(TOP_LIMIT)
            .map(|r| ScoreEntry {
                name: r.name.clone(),
                score: r.score,
                timestamp: r.timestamp,
            })
            .collect())
    }

    fn save_score(&mut self, name: &str, score: i64) -> Result<SaveReceipt, ScoreError> {
        if score < 0 {
            return Err(ScoreError::InvalidScore(score));
        }
        let name = sanitize_name(name);

        let mut data = self.data.clone();
        let receipt = if let Some(record) = data.records.iter_mut().find(|r| r.name == name) {
            if score > record.score {
                record.score = score;
                record.timestamp = now_secs();
                SaveReceipt {
                    id: record.id,
                    updated: true,
                    current_score: None,
                }
            } else {
                return Ok(SaveReceipt {
                    id: record.id,
                    updated: false,
                    current_score: Some(record.score),
                });
            }
        } else {
            data.next_id += 1;
            let id = data.next_id;
            data.records.push(Record {
                id,
                name,
                score,
                timestamp: now_secs(),
            });
            SaveReceipt {
                id,
                updated: false,
                current_score: None,
            }
        };
        self.commit(data)?;
        Ok(receipt)
    }
}

#[derive(Debug, Clone)]
enum ScoreRequest {
    Top,
    Save { name: String, score: i64 },
}

/// Result of a submission: whether a personal best was beaten, plus the refreshed board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub updated: bool,
    pub top: Vec<ScoreEntry>,
}

#[derive(Debug, Clone)]
pub enum ScoreReply {
    Top(Result<Vec<ScoreEntry>, String>),
    Saved(Result<SubmitOutcome, String>),
}

/// Fire-and-forget access to a `ScoreService` running on its own thread.
#[derive(Debug)]
pub struct ScoreClient {
    requests: Sender<ScoreRequest>,
    replies: Receiver<ScoreReply>,
}

impl ScoreClient {
    pub fn spawn<S: ScoreService>(mut service: S) -> Result<Self, ScoreError> {
        let (requests, inbox) = mpsc::channel::<ScoreRequest>();
        let (outbox, replies) = mpsc::channel();
        thread::Builder::new()
            .name("scores".into())
            .spawn(move || {
                for request in inbox {
                    let reply = match request {
                        ScoreRequest::Top => {
                            ScoreReply::Top(service.top_scores().map_err(|e| e.to_string()))
                        }
                        ScoreRequest::Save { name, score } => ScoreReply::Saved(
                            service
                                .save_score(&name, score)
                                .and_then(|receipt| {
                                    Ok(SubmitOutcome {
                                        updated: receipt.updated,
                                        top: service.top_scores()?,
                                    })
                                })
                                .map_err(|e| e.to_string()),
                        ),
                    };
                    if outbox.send(reply).is_err() {
                        break;
                    }
                }
                debug!("score worker finished");
            })?;
        Ok(Self { requests, replies })
    }

    pub fn request_top(&self) {
        self.send(ScoreRequest::Top);
    }

    pub fn submit(&self, name: &str, score: i64) {
        self.send(ScoreRequest::Save {
            name: name.to_string(),
            score,
        });
    }

    fn send(&self, request: ScoreRequest) {
        if self.requests.send(request).is_err() {
            warn!("score worker is gone; request dropped");
        }
    }

    /// Replies that arrived since the last poll; never blocks.
    pub fn poll(&self) -> Vec<ScoreReply> {
        self.replies.try_iter().collect()
    }

    #[cfg(test)]
    fn wait(&self) -> ScoreReply {
        self.replies
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("score worker reply")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn board(dir: &TempDir) -> ScoreBoard {
        ScoreBoard::open(&dir.path().join("nested").join(FILENAME)).unwrap()
    }

    #[test]
    fn sanitize_normalizes_names() {
        assert_eq!(sanitize_name("  ab-c d!"), "ABCD");
        assert_eq!(sanitize_name("abcdefghij"), "ABCDEF");
        assert_eq!(sanitize_name("__"), DEFAULT_NAME);
        assert_eq!(sanitize_name(""), DEFAULT_NAME);
    }

    #[test]
    fn updated_only_when_beating_existing_record() {
        let dir = TempDir::new().unwrap();
        let mut b = board(&dir);

        let first = b.save_score("AB", 500).unwrap();
        assert!(!first.updated);

        let lower = b.save_score("AB", 300).unwrap();
        assert!(!lower.updated);
        assert_eq!(lower.current_score, Some(500));

        let higher = b.save_score("ab", 600).unwrap();
        assert!(higher.updated);
        assert_eq!(higher.id, first.id);

        let top = b.top_scores().unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].score, 600);
    }

    #[test]
    fn negative_scores_are_rejected() {
        let dir = TempDir::new().unwrap();
        let mut b = board(&dir);
        assert!(matches!(
            b.save_score("AB", -1),
            Err(ScoreError::InvalidScore(-1))
        ));
        assert!(b.top_scores().unwrap().is_empty());
    }

    #[test]
    fn top_is_ordered_and_limited() {
        let mut b = ScoreBoard::detached();
        for i in 0..20 {
            b.save_score(&format!("P{i}"), i * 10).unwrap();
        }
        b.save_score("TIE", 190).unwrap();
        let top = b.top_scores().unwrap();
        assert_eq!(top.len(), TOP_LIMIT);
        assert_eq!(top[0].name, "P19");
        assert_eq!(top[1].name, "TIE");
        assert!(top.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn board_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(FILENAME);
        {
            let mut b = ScoreBoard::open(&path).unwrap();
            b.save_score("ZED", 42).unwrap();
        }
        let b = ScoreBoard::open(&path).unwrap();
        assert_eq!(b.top_scores().unwrap()[0].name, "ZED");
    }

    #[test]
    fn failed_write_keeps_previous_board() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(FILENAME);
        let mut b = ScoreBoard::open(&path).unwrap();
        b.save_score("AB", 500).unwrap();
        // A directory where the file should be makes every write fail.
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();

        assert!(matches!(b.save_score("AB", 900), Err(ScoreError::Io(_))));
        assert!(matches!(b.save_score("NEW", 100), Err(ScoreError::Io(_))));
        let top = b.top_scores().unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!((top[0].name.as_str(), top[0].score), ("AB", 500));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(FILENAME);
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(ScoreBoard::open(&path), Err(ScoreError::Json(_))));
    }

    #[test]
    fn client_submits_off_thread() {
        let client = ScoreClient::spawn(ScoreBoard::detached()).unwrap();
        client.submit("AB", 500);
        match client.wait() {
            ScoreReply::Saved(Ok(outcome)) => {
                assert!(!outcome.updated);
                assert_eq!(outcome.top[0].name, "AB");
            }
            other => panic!("unexpected reply {other:?}"),
        }
        client.submit("AB", 600);
        assert!(matches!(client.wait(), ScoreReply::Saved(Ok(SubmitOutcome { updated: true, .. }))));
        client.request_top();
        assert!(matches!(client.wait(), ScoreReply::Top(Ok(top)) if top.len() == 1));
        assert!(client.poll().is_empty());
    }

    struct Offline;

    impl ScoreService for Offline {
        fn top_scores(&self) -> Result<Vec<ScoreEntry>, ScoreError> {
            Err(std::io::Error::other("offline").into())
        }

        fn save_score(&mut self, _: &str, _: i64) -> Result<SaveReceipt, ScoreError> {
            Err(std::io::Error::other("offline").into())
        }
    }

    #[test]
    fn client_reports_failures_as_replies() {
        let client = ScoreClient::spawn(Offline).unwrap();
        client.submit("AB", 1);
        assert!(matches!(client.wait(), ScoreReply::Saved(Err(_))));
    }
}
