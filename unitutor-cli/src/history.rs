use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;
use unitutor_shared::{Conversation, MessageRole, StoredMessage};

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Ids combine a millisecond timestamp with a per-process counter so rapid
/// successive turns cannot collide.
fn next_id(prefix: &str) -> String {
    let seq = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}_{}_{}", prefix, Utc::now().format("%Y%m%d%H%M%S%3f"), seq)
}

/// File-backed conversation store: a JSON index of conversations plus one
/// JSONL message log per conversation, all under `data_dir`.
pub struct ConversationStore {
    data_dir: PathBuf,
}

impl ConversationStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        if !data_dir.exists() {
            fs::create_dir_all(&data_dir)
                .with_context(|| format!("creating data dir {:?}", data_dir))?;
        }
        Ok(Self { data_dir })
    }

    fn index_path(&self) -> PathBuf {
        self.data_dir.join("conversations.json")
    }

    fn messages_path(&self, conversation_id: &str) -> PathBuf {
        self.data_dir.join(format!("messages_{}.jsonl", conversation_id))
    }

    fn read_index(&self) -> Result<Vec<Conversation>> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading conversation index {:?}", path))?;
        serde_json::from_str(&raw).context("parsing conversation index")
    }

    fn write_index(&self, conversations: &[Conversation]) -> Result<()> {
        let json = serde_json::to_string_pretty(conversations)?;
        fs::write(self.index_path(), json).context("writing conversation index")?;
        Ok(())
    }

    pub fn create_conversation(
        &self,
        course_id: &str,
        title_hint: Option<&str>,
    ) -> Result<Conversation> {
        let now = Utc::now();
        let conversation = Conversation {
            id: next_id("conv"),
            course_id: course_id.to_string(),
            title: title_hint.map(str::to_string),
            created_at: now,
            updated_at: now,
        };

        let mut index = self.read_index()?;
        index.push(conversation.clone());
        self.write_index(&index)?;

        debug!("created conversation {} for course {}", conversation.id, course_id);
        Ok(conversation)
    }

    /// Append one message row and touch the conversation's `updated_at`.
    pub fn save_message(
        &self,
        conversation_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<StoredMessage> {
        let message = StoredMessage {
            id: next_id("msg"),
            conversation_id: conversation_id.to_string(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&message)?;
        let path = self.messages_path(conversation_id);
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening message log {:?}", path))?;
        writeln!(file, "{}", json)?;
        file.flush()?;

        let mut index = self.read_index()?;
        if let Some(conversation) = index.iter_mut().find(|c| c.id == conversation_id) {
            conversation.updated_at = message.created_at;
            self.write_index(&index)?;
        }

        Ok(message)
    }

    /// Conversations for one course, most recently updated first.
    pub fn list_conversations(&self, course_id: &str) -> Result<Vec<Conversation>> {
        let mut conversations: Vec<Conversation> = self
            .read_index()?
            .into_iter()
            .filter(|c| c.course_id == course_id)
            .collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(conversations)
    }

    /// Messages of one conversation, oldest first.
    pub fn load_messages(&self, conversation_id: &str) -> Result<Vec<StoredMessage>> {
        let path = self.messages_path(conversation_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading message log {:?}", path))?;
        let mut messages = Vec::new();
        for line in raw.lines().filter(|l| !l.trim().is_empty()) {
            messages.push(serde_json::from_str(line).context("parsing message row")?);
        }
        Ok(messages)
    }

    pub fn delete_conversation(&self, conversation_id: &str) -> Result<()> {
        let mut index = self.read_index()?;
        index.retain(|c| c.id != conversation_id);
        self.write_index(&index)?;

        let path = self.messages_path(conversation_id);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("removing message log {:?}", path))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_save_list_load_delete_round_trip() {
        let dir = tempdir().unwrap();
        let store = ConversationStore::new(dir.path()).unwrap();

        let convo = store
            .create_conversation("eng-elec-deg", Some("Circuits question"))
            .unwrap();
        assert_eq!(convo.title.as_deref(), Some("Circuits question"));

        store
            .save_message(&convo.id, MessageRole::User, "What is Ohm's law?")
            .unwrap();
        store
            .save_message(&convo.id, MessageRole::Assistant, "V = IR.")
            .unwrap();

        let messages = store.load_messages(&convo.id).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[1].content, "V = IR.");

        let listed = store.list_conversations("eng-elec-deg").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, convo.id);
        // save_message touched updated_at
        assert!(listed[0].updated_at >= convo.updated_at);

        assert!(store.list_conversations("other-course").unwrap().is_empty());

        store.delete_conversation(&convo.id).unwrap();
        assert!(store.list_conversations("eng-elec-deg").unwrap().is_empty());
        assert!(store.load_messages(&convo.id).unwrap().is_empty());
    }

    #[test]
    fn list_orders_newest_first() {
        let dir = tempdir().unwrap();
        let store = ConversationStore::new(dir.path()).unwrap();

        let first = store.create_conversation("c1", None).unwrap();
        let second = store.create_conversation("c1", None).unwrap();
        // Touch the first so it becomes the most recent.
        store.save_message(&first.id, MessageRole::User, "hi").unwrap();

        let listed = store.list_conversations("c1").unwrap();
        assert_eq!(listed[0].id, first.id);
        assert_eq!(listed[1].id, second.id);
    }

    #[test]
    fn rapid_creation_yields_unique_ids() {
        let dir = tempdir().unwrap();
        let store = ConversationStore::new(dir.path()).unwrap();

        let mut ids: Vec<String> = (0..20)
            .map(|_| store.create_conversation("c1", None).unwrap().id)
            .collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }
}
