//! IMAP-based email connector. Works with Gmail, Outlook, or any IMAP
//! server; credentials are `{imap_server, email, password}`.

use super::base::{Connector, ConnectorCredentials, ConnectorStatus, ConnectorStatusReport, SyncResult};
use mail_parser::MessageParser;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

const MAX_EMAILS_PER_SYNC: usize = 200;
const FOLDERS: [&str; 2] = ["INBOX", "[Gmail]/Sent Mail"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct GmailState {
    #[serde(default)]
    uid_watermarks: HashMap<String, u32>,
    #[serde(default)]
    last_sync: Option<String>,
    #[serde(default)]
    items_synced: usize,
}

pub struct GmailConnector {
    connector_id: String,
    label: String,
    base_dir: PathBuf,
    credentials: Option<ConnectorCredentials>,
    status: ConnectorStatus,
    last_sync: Option<String>,
    last_error: Option<String>,
    items_synced: usize,
}

impl GmailConnector {
    pub fn new(connector_id: &str, label: &str, storage_root: &std::path::Path) -> std::io::Result<Self> {
        let base_dir = storage_root.join("gmail").join(connector_id);
        std::fs::create_dir_all(base_dir.join("items"))?;
        Ok(Self {
            connector_id: connector_id.to_string(),
            label: label.to_string(),
            base_dir,
            credentials: None,
            status: ConnectorStatus::NotConfigured,
            last_sync: None,
            last_error: None,
            items_synced: 0,
        })
    }

    fn state_file(&self) -> PathBuf {
        self.base_dir.join("state.json")
    }

    fn load_state(&self) -> GmailState {
        std::fs::read_to_string(self.state_file())
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    fn save_state(&self, state: &GmailState) -> std::io::Result<()> {
        std::fs::write(self.state_file(), serde_json::to_string_pretty(state)?)
    }

    fn count_items(&self) -> usize {
        std::fs::read_dir(self.items_folder())
            .map(|rd| {
                rd.filter_map(|e| e.ok())
                    .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("txt"))
                    .count()
            })
            .unwrap_or(0)
    }

    fn connect_and_login(
        server: &str,
        email: &str,
        password: &str,
    ) -> anyhow::Result<imap::Session<native_tls::TlsStream<std::net::TcpStream>>> {
        let tls = native_tls::TlsConnector::builder().build()?;
        let client = imap::connect((server, 993), server, &tls)?;
        client
            .login(email, password)
            .map_err(|(e, _)| anyhow::anyhow!("imap login failed: {e}"))
    }
}

impl Connector for GmailConnector {
    fn authenticate(&mut self, credentials: &ConnectorCredentials) -> bool {
        let ConnectorCredentials::Imap {
            imap_server,
            email,
            password,
        } = credentials;

        match Self::connect_and_login(imap_server, email, password) {
            Ok(mut session) => {
                let _ = session.logout();
                self.credentials = Some(credentials.clone());
                self.status = ConnectorStatus::Authenticated;
                self.last_error = None;
                true
            }
            Err(e) => {
                self.status = ConnectorStatus::Error;
                self.last_error = Some(format!("imap auth failed: {e}"));
                false
            }
        }
    }

    fn sync(&mut self, progress: &dyn Fn(&str)) -> SyncResult {
        let Some(ConnectorCredentials::Imap {
            imap_server,
            email,
            password,
        }) = self.credentials.clone()
        else {
            return SyncResult {
                new_items: 0,
                total_items: self.count_items(),
                errors: vec!["Not authenticated".to_string()],
            };
        };

        self.status = ConnectorStatus::Syncing;
        let mut state = self.load_state();
        let items_folder = self.items_folder();
        let mut new_items = 0usize;
        let mut errors = Vec::new();

        let mut session = match Self::connect_and_login(&imap_server, &email, &password) {
            Ok(s) => s,
            Err(e) => {
                self.status = ConnectorStatus::Error;
                self.last_error = Some(e.to_string());
                return SyncResult {
                    new_items: 0,
                    total_items: self.count_items(),
                    errors: vec![e.to_string()],
                };
            }
        };

        for folder in FOLDERS {
            if session.select(folder).is_err() {
                errors.push(format!("failed to select folder {folder}"));
                continue;
            }

            progress(&format!("Syncing folder: {folder}"));

            let last_uid = *state.uid_watermarks.get(folder).unwrap_or(&0);
            let criteria = format!("UID {}:*", last_uid + 1);
            let uids = match session.uid_search(&criteria) {
                Ok(set) => set,
                Err(e) => {
                    errors.push(format!("{folder}: search failed: {e}"));
                    continue;
                }
            };

            let mut uids: Vec<u32> = uids.into_iter().filter(|u| *u > last_uid).collect();
            uids.sort_unstable();
            uids.truncate(MAX_EMAILS_PER_SYNC);

            let mut max_uid_this_folder = last_uid;

            for (i, uid) in uids.iter().enumerate() {
                let fetched = match session.uid_fetch(uid.to_string(), "RFC822") {
                    Ok(f) => f,
                    Err(e) => {
                        errors.push(format!("UID {uid}: {e}"));
                        continue;
                    }
                };
                let Some(msg) = fetched.iter().next().and_then(|f| f.body()) else {
                    continue;
                };

                let Some(parsed) = MessageParser::default().parse(msg) else {
                    errors.push(format!("UID {uid}: failed to parse message"));
                    continue;
                };

                let subject = parsed.subject().unwrap_or_default().to_string();
                let from_addr = format_address(parsed.from());
                let to_addr = format_address(parsed.to());
                let date_str = parsed
                    .date()
                    .map(|d| d.to_rfc3339())
                    .unwrap_or_default();
                let plain_parts: Vec<String> = parsed
                    .text_bodies()
                    .map(|c| c.to_string())
                    .collect();
                let body = if !plain_parts.is_empty() {
                    plain_parts.join("\n")
                } else {
                    let html_parts: Vec<String> =
                        parsed.html_bodies().map(|c| c.to_string()).collect();
                    strip_html(&html_parts.join("\n"))
                };

                let content = format!(
                    "Subject: {subject}\nFrom: {from_addr}\nTo: {to_addr}\nDate: {date_str}\nFolder: {folder}\n\n{body}"
                );

                let filename = format!("{uid}_{}.txt", safe_filename(&subject));
                if std::fs::write(items_folder.join(&filename), content).is_ok() {
                    new_items += 1;
                    if *uid > max_uid_this_folder {
                        max_uid_this_folder = *uid;
                    }
                } else {
                    errors.push(format!("UID {uid}: failed to write item file"));
                }

                if (i + 1) % 10 == 0 {
                    progress(&format!("{folder}: fetched {}/{}", i + 1, uids.len()));
                }
            }

            state.uid_watermarks.insert(folder.to_string(), max_uid_this_folder);
        }

        let _ = session.logout();

        self.last_sync = Some(chrono::Utc::now().to_rfc3339());
        self.items_synced = self.count_items();
        self.status = ConnectorStatus::Idle;
        self.last_error = None;

        state.last_sync = self.last_sync.clone();
        state.items_synced = self.items_synced;
        let _ = self.save_state(&state);

        SyncResult {
            new_items,
            total_items: self.items_synced,
            errors,
        }
    }

    fn status(&self) -> ConnectorStatusReport {
        ConnectorStatusReport {
            connector_id: self.connector_id.clone(),
            connector_type: "gmail".to_string(),
            label: self.label.clone(),
            status: self.status,
            last_sync: self.last_sync.clone(),
            last_error: self.last_error.clone(),
            items_synced: self.items_synced,
            items_folder: self.items_folder().to_string_lossy().to_string(),
        }
    }

    fn cleanup(&self) -> std::io::Result<()> {
        if self.base_dir.exists() {
            std::fs::remove_dir_all(&self.base_dir)?;
        }
        Ok(())
    }

    fn items_folder(&self) -> PathBuf {
        self.base_dir.join("items")
    }
}

fn format_address(addr: Option<&mail_parser::Address>) -> String {
    let Some(addr) = addr else {
        return String::new();
    };
    addr.iter()
        .map(|a| {
            let name = a.name().unwrap_or_default();
            let email = a.address().unwrap_or_default();
            if name.is_empty() {
                email.to_string()
            } else {
                format!("{name} <{email}>")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn html_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<style[^>]*>.*?</style>|<script[^>]*>.*?</script>|<[^>]+>").unwrap())
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

fn strip_html(html: &str) -> String {
    let text = html_tag_re().replace_all(html, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">");
    whitespace_re().replace_all(&text, " ").trim().to_string()
}

fn unsafe_filename_char_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s-]").unwrap())
}

/// Matches the original connector's filename derivation exactly: strip
/// non-word/space/hyphen characters, collapse whitespace to `_`, truncate
/// to 80 chars, empty → `no_subject`.
fn safe_filename(text: &str) -> String {
    let stripped = unsafe_filename_char_re().replace_all(text, "").trim().to_string();
    let collapsed = whitespace_re().replace_all(&stripped, "_").to_string();
    let truncated: String = collapsed.chars().take(80).collect();
    if truncated.is_empty() {
        "no_subject".to_string()
    } else {
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_filename_collapses_and_truncates() {
        assert_eq!(safe_filename("Hello, World!"), "Hello_World");
        assert_eq!(safe_filename(""), "no_subject");
        assert_eq!(safe_filename("   "), "no_subject");
        let long = "a".repeat(200);
        assert_eq!(safe_filename(&long).chars().count(), 80);
    }

    #[test]
    fn strip_html_removes_tags_and_entities() {
        let html = "<p>Hello&nbsp;<b>World</b>&amp;friends</p>";
        assert_eq!(strip_html(html), "Hello World &friends");
    }
}
