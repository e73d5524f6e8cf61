//! Chat orchestrator: entry flow, optimistic sends and transcript

use std::sync::Arc;

use chrono::{DateTime, Local};
use perryclient::{ApiError, Corrections, Operation, SessionId, WorkflowApi};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Orchestrator state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatState {
    /// Entry flow (extract, then compliance check) in progress
    Loading,
    /// Accepting user input
    Ready,
    /// Entry flow failed; re-run [`ChatSession::start`] to retry
    Error(String),
}

/// Author of a transcript message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

/// One transcript bubble
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    pub at: DateTime<Local>,
}

impl ChatMessage {
    fn new(role: ChatRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            at: Local::now(),
        }
    }
}

/// Errors from misusing the orchestrator
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("Chat is not ready ({0})")]
    NotReady(String),
}

/// What a send did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Reply appended, input cleared
    Applied,
    /// Failure bubble appended, input kept
    Failed,
}

/// Conversational review of one upload session
///
/// Every send takes `&mut self` for its whole duration, so at most one request
/// is in flight and replies land in submission order.
pub struct ChatSession {
    api: Arc<dyn WorkflowApi>,
    session_id: SessionId,
    state: ChatState,
    messages: Vec<ChatMessage>,
    input: String,
}

impl ChatSession {
    pub fn new(api: Arc<dyn WorkflowApi>, session_id: SessionId) -> Self {
        debug!(%session_id, "ChatSession::new: called");
        Self {
            api,
            session_id,
            state: ChatState::Loading,
            messages: Vec::new(),
            input: String::new(),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ChatState::Ready
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, input: impl Into<String>) {
        self.input = input.into();
    }

    /// Entry flow: extract, then check compliance and post its text as the first reply
    pub async fn start(&mut self) -> &ChatState {
        debug!(session_id = %self.session_id, "start: called");
        self.state = ChatState::Loading;

        if let Err(e) = self.api.extract(&self.session_id).await {
            warn!(session_id = %self.session_id, error = %e, "start: extraction failed");
            self.state = ChatState::Error(e.to_string());
            return &self.state;
        }

        match self.api.check_compliance(&self.session_id).await {
            Ok(response) => {
                self.push(ChatRole::Assistant, response.message_text());
                self.state = ChatState::Ready;
                info!(session_id = %self.session_id, "start: chat ready");
            }
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "start: compliance check failed");
                self.state = ChatState::Error(e.to_string());
            }
        }
        &self.state
    }

    /// Send the current input as corrections to the merge step
    ///
    /// Non-blank input is appended as a user bubble before the request; blank
    /// input merges with empty corrections. The input is cleared only when the
    /// merge succeeds; a failure leaves it in place for editing.
    pub async fn send(&mut self) -> Result<SendOutcome, ChatError> {
        self.ensure_ready()?;
        let text = self.input.trim().to_string();
        if text.is_empty() {
            debug!("send: blank input, merging without corrections");
        } else {
            self.push(ChatRole::User, text.as_str());
        }
        let corrections = Corrections::from_input(&text);

        match self.api.merge(&self.session_id, &corrections).await {
            Ok(response) => {
                self.push(ChatRole::Assistant, response.message_text());
                self.input.clear();
                Ok(SendOutcome::Applied)
            }
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "send: merge failed");
                self.push(ChatRole::Assistant, failure_text(Operation::Merge, &e));
                Ok(SendOutcome::Failed)
            }
        }
    }

    /// Request the final action plan and post it as a reply
    pub async fn plan(&mut self) -> Result<SendOutcome, ChatError> {
        self.ensure_ready()?;
        match self.api.generate_action_plan(&self.session_id).await {
            Ok(response) => {
                self.push(ChatRole::Assistant, response.message_text());
                Ok(SendOutcome::Applied)
            }
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "plan: action plan failed");
                self.push(ChatRole::Assistant, failure_text(Operation::ActionPlan, &e));
                Ok(SendOutcome::Failed)
            }
        }
    }

    fn ensure_ready(&self) -> Result<(), ChatError> {
        match &self.state {
            ChatState::Ready => Ok(()),
            ChatState::Loading => Err(ChatError::NotReady("loading".to_string())),
            ChatState::Error(e) => Err(ChatError::NotReady(e.clone())),
        }
    }

    fn push(&mut self, role: ChatRole, text: impl Into<String>) {
        self.messages.push(ChatMessage::new(role, text));
    }
}

/// Bubble text for a failed step
fn failure_text(operation: Operation, err: &ApiError) -> String {
    match err {
        ApiError::StepFailed { status, detail, .. } => {
            format!("{} failed (status {}): {}", operation, status, detail)
        }
        other => format!("{} failed: {}", operation, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use perryclient::StepResponse;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Scripted reply for one mock call
    #[derive(Clone)]
    enum Reply {
        Body(&'static str),
        Status(u16, &'static str),
        Hang,
    }

    impl Reply {
        async fn resolve(&self, operation: Operation) -> Result<StepResponse, ApiError> {
            match self {
                Self::Body(body) => Ok(StepResponse::parse(*body, &["result", "message"])),
                Self::Status(status, detail) => Err(ApiError::StepFailed {
                    operation,
                    status: *status,
                    detail: detail.to_string(),
                }),
                Self::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(ApiError::Timeout(Duration::from_secs(3600)))
                }
            }
        }
    }

    /// Mock workflow backend for unit tests
    struct MockWorkflow {
        extract: Reply,
        compliance: Reply,
        merges: Vec<Reply>,
        plan: Reply,
        merge_calls: AtomicUsize,
        last_corrections: Mutex<Option<Corrections>>,
    }

    impl MockWorkflow {
        fn new(compliance: Reply, merges: Vec<Reply>) -> Self {
            Self {
                extract: Reply::Body(r#"{"message":"extracted"}"#),
                compliance,
                merges,
                plan: Reply::Body(r#"{"result":"Stop aspirin 7 days before surgery"}"#),
                merge_calls: AtomicUsize::new(0),
                last_corrections: Mutex::new(None),
            }
        }

        fn merge_calls(&self) -> usize {
            self.merge_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl WorkflowApi for MockWorkflow {
        async fn extract(&self, _session_id: &SessionId) -> Result<StepResponse, ApiError> {
            self.extract.resolve(Operation::Extraction).await
        }

        async fn check_compliance(&self, _session_id: &SessionId) -> Result<StepResponse, ApiError> {
            self.compliance.resolve(Operation::ComplianceCheck).await
        }

        async fn merge(&self, _session_id: &SessionId, corrections: &Corrections) -> Result<StepResponse, ApiError> {
            let idx = self.merge_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_corrections.lock().unwrap() = Some(corrections.clone());
            match self.merges.get(idx) {
                Some(reply) => reply.resolve(Operation::Merge).await,
                None => Err(ApiError::StepFailed {
                    operation: Operation::Merge,
                    status: 500,
                    detail: "No more mock responses".to_string(),
                }),
            }
        }

        async fn generate_action_plan(&self, _session_id: &SessionId) -> Result<StepResponse, ApiError> {
            self.plan.resolve(Operation::ActionPlan).await
        }
    }

    fn session(mock: MockWorkflow) -> (ChatSession, Arc<MockWorkflow>) {
        let mock = Arc::new(mock);
        let session = ChatSession::new(mock.clone(), SessionId::from("S1"));
        (session, mock)
    }

    #[tokio::test]
    async fn test_start_posts_compliance_text() {
        let (mut chat, _) = session(MockWorkflow::new(Reply::Body(r#"{"result":"Patient compliant"}"#), vec![]));
        assert_eq!(chat.state(), &ChatState::Loading);

        assert_eq!(chat.start().await, &ChatState::Ready);
        assert_eq!(chat.transcript().len(), 1);
        assert_eq!(chat.transcript()[0].role, ChatRole::Assistant);
        assert_eq!(chat.transcript()[0].text, "Patient compliant");
    }

    #[tokio::test]
    async fn test_start_extraction_failure() {
        let mut mock = MockWorkflow::new(Reply::Body("{}"), vec![]);
        mock.extract = Reply::Status(500, "model unavailable");
        let (mut chat, _) = session(mock);

        match chat.start().await {
            ChatState::Error(text) => assert!(text.contains("Extraction failed")),
            other => panic!("Expected Error, got {:?}", other),
        }
        assert!(chat.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_start_compliance_failure_then_retry() {
        let (mut chat, _) = session(MockWorkflow::new(Reply::Status(404, "Session not found"), vec![]));

        assert!(matches!(chat.start().await, ChatState::Error(text) if text.contains("Session not found")));
        assert!(chat.send().await.is_err());
        assert!(matches!(chat.start().await, ChatState::Error(_)));
    }

    #[tokio::test]
    async fn test_send_not_ready() {
        let (mut chat, mock) = session(MockWorkflow::new(Reply::Body("{}"), vec![]));
        chat.set_input("hold metformin");

        assert_eq!(chat.send().await, Err(ChatError::NotReady("loading".to_string())));
        assert!(chat.transcript().is_empty());
        assert_eq!(mock.merge_calls(), 0);
    }

    #[tokio::test]
    async fn test_send_success_clears_input() {
        let (mut chat, mock) = session(MockWorkflow::new(
            Reply::Body(r#"{"result":"Patient compliant"}"#),
            vec![Reply::Body(r#"{"message":"Applied 1 corrections successfully"}"#)],
        ));
        chat.start().await;
        chat.set_input("  hold metformin the morning of surgery ");

        assert_eq!(chat.send().await, Ok(SendOutcome::Applied));
        assert_eq!(chat.input(), "");

        let texts: Vec<_> = chat.transcript().iter().map(|m| (m.role, m.text.as_str())).collect();
        assert_eq!(
            texts,
            vec![
                (ChatRole::Assistant, "Patient compliant"),
                (ChatRole::User, "hold metformin the morning of surgery"),
                (ChatRole::Assistant, "Applied 1 corrections successfully"),
            ]
        );

        let corrections = mock.last_corrections.lock().unwrap().clone().unwrap();
        assert_eq!(
            corrections.as_map().get("notes").and_then(|v| v.as_str()),
            Some("hold metformin the morning of surgery")
        );
    }

    #[tokio::test]
    async fn test_send_failure_keeps_input() {
        let (mut chat, _) = session(MockWorkflow::new(
            Reply::Body(r#"{"result":"Patient compliant"}"#),
            vec![Reply::Status(500, "Internal Server Error")],
        ));
        chat.start().await;
        chat.set_input("continue lisinopril");

        assert_eq!(chat.send().await, Ok(SendOutcome::Failed));
        assert_eq!(chat.input(), "continue lisinopril");
        assert_eq!(chat.state(), &ChatState::Ready);

        let last = chat.transcript().last().unwrap();
        assert_eq!(last.role, ChatRole::Assistant);
        assert!(last.text.contains("Merge failed"));
        assert!(last.text.contains("Internal Server Error"));
    }

    #[tokio::test]
    async fn test_send_blank_input_merges_empty_corrections() {
        let (mut chat, mock) = session(MockWorkflow::new(
            Reply::Body(r#"{"result":"Patient compliant"}"#),
            vec![Reply::Status(500, "Internal Server Error")],
        ));
        chat.start().await;
        chat.set_input("   ");

        assert_eq!(chat.send().await, Ok(SendOutcome::Failed));
        assert_eq!(mock.merge_calls(), 1);
        let corrections = mock.last_corrections.lock().unwrap().clone().unwrap();
        assert!(corrections.is_empty());

        assert_eq!(chat.transcript().len(), 2);
        let last = chat.transcript().last().unwrap();
        assert_eq!(last.role, ChatRole::Assistant);
        assert!(last.text.contains("Merge failed"));
    }

    #[tokio::test]
    async fn test_replies_in_submission_order() {
        let (mut chat, _) = session(MockWorkflow::new(
            Reply::Body(r#"{"result":"ok"}"#),
            vec![Reply::Body(r#"{"result":"first"}"#), Reply::Body(r#"{"result":"second"}"#)],
        ));
        chat.start().await;

        for text in ["one", "two"] {
            chat.set_input(text);
            chat.send().await.unwrap();
        }

        let texts: Vec<_> = chat.transcript().iter().skip(1).map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "first", "two", "second"]);
    }

    #[tokio::test]
    async fn test_abandoned_send_keeps_user_bubble_and_input() {
        let (mut chat, _) = session(MockWorkflow::new(Reply::Body(r#"{"result":"ok"}"#), vec![Reply::Hang]));
        chat.start().await;
        chat.set_input("stop ibuprofen");

        let abandoned = tokio::time::timeout(Duration::from_millis(20), chat.send()).await;
        assert!(abandoned.is_err());

        assert_eq!(chat.transcript().len(), 2);
        assert_eq!(chat.transcript()[1].role, ChatRole::User);
        assert_eq!(chat.input(), "stop ibuprofen");
        assert!(chat.is_ready());
    }

    #[tokio::test]
    async fn test_plan_appends_reply() {
        let (mut chat, _) = session(MockWorkflow::new(Reply::Body(r#"{"result":"ok"}"#), vec![]));
        assert!(chat.plan().await.is_err());

        chat.start().await;
        assert_eq!(chat.plan().await, Ok(SendOutcome::Applied));
        assert_eq!(chat.transcript().last().unwrap().text, "Stop aspirin 7 days before surgery");
    }

    #[tokio::test]
    async fn test_plan_failure_bubble() {
        let mut mock = MockWorkflow::new(Reply::Body(r#"{"result":"ok"}"#), vec![]);
        mock.plan = Reply::Status(502, "upstream model error");
        let (mut chat, _) = session(mock);
        chat.start().await;

        assert_eq!(chat.plan().await, Ok(SendOutcome::Failed));
        let last = chat.transcript().last().unwrap();
        assert_eq!(last.text, "Action plan failed (status 502): upstream model error");
    }

    #[test]
    fn test_failure_text_for_transport_error() {
        let text = failure_text(Operation::Merge, &ApiError::Timeout(Duration::from_secs(30)));
        assert_eq!(text, "Merge failed: Request timed out after 30s");
    }
}
