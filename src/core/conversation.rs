use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::core::completion::{CompletionClient, RemoteError};
use crate::core::message::{Content, Turn};

/// Ordered, append-only turn history for one session.
#[derive(Debug, Default, Clone)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// True when turns go user, assistant, user, ... with no gaps.
    ///
    /// A failed submission leaves an unanswered user turn, which breaks this.
    pub fn is_alternating(&self) -> bool {
        self.turns.iter().enumerate().all(|(index, turn)| {
            if index % 2 == 0 {
                turn.is_user()
            } else {
                turn.is_assistant()
            }
        })
    }
}

/// The most recent answered question, in the shape the study room saves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub query: String,
    pub response: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// The query was empty after trimming; nothing was sent.
    Validation,
    /// Another submission is still waiting for its answer.
    Busy,
    Remote(RemoteError),
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Validation => write!(f, "Please enter a question first"),
            SubmitError::Busy => write!(f, "Still waiting for the previous answer"),
            SubmitError::Remote(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SubmitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SubmitError::Remote(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RemoteError> for SubmitError {
    fn from(err: RemoteError) -> Self {
        SubmitError::Remote(err)
    }
}

/// Clears the in-flight flag when a submission finishes or its future is dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Owns the session's conversation and issues one completion request per submission.
pub struct ConversationAccumulator {
    client: Arc<dyn CompletionClient>,
    conversation: Mutex<Conversation>,
    in_flight: AtomicBool,
}

impl ConversationAccumulator {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            client,
            conversation: Mutex::new(Conversation::new()),
            in_flight: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Conversation> {
        self.conversation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Snapshot of the history so far.
    pub fn conversation(&self) -> Conversation {
        self.lock().clone()
    }

    pub fn turn_count(&self) -> usize {
        self.lock().len()
    }

    /// Send `text` (plus `image_url` on the first turn only) and return the assistant's reply.
    ///
    /// The user turn stays recorded even if the request fails.
    pub async fn submit(&self, text: &str, image_url: Option<&str>) -> Result<String, SubmitError> {
        let query = text.trim();
        if query.is_empty() {
            return Err(SubmitError::Validation);
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("rejecting submission while another is in flight");
            return Err(SubmitError::Busy);
        }
        let _in_flight = InFlight(&self.in_flight);

        let history = {
            let mut conversation = self.lock();
            let content = match image_url {
                Some(url) if conversation.is_empty() => Content::with_image(query, url),
                Some(_) => {
                    debug!("ignoring image reference on a follow-up question");
                    Content::text(query)
                }
                None => Content::text(query),
            };
            conversation.push(Turn::user(content));
            conversation.turns().to_vec()
        };

        info!(turns = history.len(), "submitting question");
        match self.client.complete(&history).await {
            Ok(text) => {
                self.lock().push(Turn::assistant(text.clone()));
                Ok(text)
            }
            Err(err) => {
                warn!(error = %err, "completion request failed");
                Err(SubmitError::Remote(err))
            }
        }
    }

    /// The last user turn that received an answer, paired with that answer.
    pub fn last_exchange(&self) -> Option<Exchange> {
        let conversation = self.lock();
        let turns = conversation.turns();
        let answer_index = turns.iter().rposition(Turn::is_assistant)?;
        let question = turns[..answer_index].iter().rev().find(|turn| turn.is_user())?;

        Some(Exchange {
            query: question.content.as_text(),
            response: turns[answer_index].content.as_text(),
            image_url: question.content.image_url().map(str::to_owned),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::{ContentPart, Role};
    use crate::utils::test_utils::ScriptedCompletionClient;
    use async_trait::async_trait;
    use tokio::sync::Notify;

    fn accumulator_with(
        replies: Vec<Result<String, RemoteError>>,
    ) -> (ConversationAccumulator, Arc<ScriptedCompletionClient>) {
        let client = Arc::new(ScriptedCompletionClient::new(replies));
        (ConversationAccumulator::new(client.clone()), client)
    }

    #[tokio::test]
    async fn first_submission_produces_user_then_assistant() {
        let (accumulator, client) = accumulator_with(vec![Ok("Gravity is a force...".into())]);

        let reply = accumulator.submit("What is gravity?", None).await.unwrap();
        assert_eq!(reply, "Gravity is a force...");

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0],
            vec![Turn::user(Content::text("What is gravity?"))]
        );

        let conversation = accumulator.conversation();
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.turns()[0].role, Role::User);
        assert_eq!(conversation.turns()[1], Turn::assistant("Gravity is a force..."));
    }

    #[tokio::test]
    async fn every_request_carries_the_full_history() {
        let replies = (1..=4).map(|n| Ok(format!("answer {n}"))).collect();
        let (accumulator, client) = accumulator_with(replies);

        for n in 1..=4 {
            accumulator.submit(&format!("question {n}"), None).await.unwrap();
        }

        let conversation = accumulator.conversation();
        assert_eq!(conversation.len(), 8);
        assert!(conversation.is_alternating());

        let requests = client.requests();
        for (index, request) in requests.iter().enumerate() {
            assert_eq!(request.len(), index * 2 + 1);
            assert_eq!(request[..], conversation.turns()[..index * 2 + 1]);
        }
    }

    #[tokio::test]
    async fn blank_queries_never_reach_the_endpoint() {
        let (accumulator, client) = accumulator_with(vec![]);

        for blank in ["", "   ", "\n\t"] {
            assert_eq!(
                accumulator.submit(blank, Some("https://x/img.png")).await,
                Err(SubmitError::Validation)
            );
        }
        assert_eq!(accumulator.turn_count(), 0);
        assert_eq!(client.request_count(), 0);
    }

    #[tokio::test]
    async fn query_is_trimmed_before_sending() {
        let (accumulator, client) = accumulator_with(vec![Ok("ok".into())]);
        accumulator.submit("  why?  ", None).await.unwrap();
        assert_eq!(client.requests()[0][0].content, Content::text("why?"));
    }

    #[tokio::test]
    async fn image_attaches_to_the_first_turn_only() {
        let (accumulator, client) =
            accumulator_with(vec![Ok("a picture".into()), Ok("more".into())]);

        accumulator
            .submit("What is this?", Some("https://x/img.png"))
            .await
            .unwrap();
        accumulator
            .submit("Tell me more", Some("https://x/other.png"))
            .await
            .unwrap();

        let requests = client.requests();
        assert_eq!(
            requests[0][0].content,
            Content::Multimodal {
                parts: vec![
                    ContentPart::Text {
                        text: "What is this?".into()
                    },
                    ContentPart::ImageUrl {
                        url: "https://x/img.png".into()
                    },
                ]
            }
        );
        assert_eq!(requests[1][2].content, Content::text("Tell me more"));
        assert_eq!(requests[1][0], requests[0][0]);
    }

    #[tokio::test]
    async fn failure_keeps_user_turn_and_releases_busy_flag() {
        let (accumulator, client) = accumulator_with(vec![
            Err(RemoteError::new("Request failed: connection refused")),
            Ok("second try".into()),
        ]);

        let err = accumulator.submit("hello", None).await.unwrap_err();
        assert_eq!(
            err,
            SubmitError::Remote(RemoteError::new("Request failed: connection refused"))
        );
        assert!(!accumulator.is_busy());

        let conversation = accumulator.conversation();
        assert_eq!(conversation.len(), 1);
        assert!(conversation.turns()[0].is_user());

        let reply = accumulator.submit("hello", None).await.unwrap();
        assert_eq!(reply, "second try");
        let conversation = accumulator.conversation();
        assert_eq!(conversation.len(), 3);
        assert!(!conversation.is_alternating());
        assert_eq!(client.requests()[1].len(), 2);
    }

    struct GatedClient {
        started: Notify,
        release: Notify,
    }

    #[async_trait]
    impl CompletionClient for GatedClient {
        async fn complete(&self, _turns: &[Turn]) -> Result<String, RemoteError> {
            self.started.notify_one();
            self.release.notified().await;
            Ok("done".into())
        }
    }

    #[tokio::test]
    async fn overlapping_submission_is_rejected_as_busy() {
        let client = Arc::new(GatedClient {
            started: Notify::new(),
            release: Notify::new(),
        });
        let accumulator = Arc::new(ConversationAccumulator::new(client.clone()));

        let first = {
            let accumulator = accumulator.clone();
            tokio::spawn(async move { accumulator.submit("first", None).await })
        };
        client.started.notified().await;

        assert!(accumulator.is_busy());
        assert_eq!(
            accumulator.submit("second", None).await,
            Err(SubmitError::Busy)
        );
        assert_eq!(accumulator.turn_count(), 1);

        client.release.notify_one();
        assert_eq!(first.await.unwrap(), Ok("done".to_string()));
        assert!(!accumulator.is_busy());
        assert_eq!(accumulator.turn_count(), 2);
    }

    #[tokio::test]
    async fn last_exchange_pairs_answer_with_its_question() {
        let (accumulator, _client) = accumulator_with(vec![
            Ok("first answer".into()),
            Err(RemoteError::new("boom")),
        ]);
        assert_eq!(accumulator.last_exchange(), None);

        accumulator
            .submit("first?", Some("https://x/img.png"))
            .await
            .unwrap();
        let _ = accumulator.submit("second?", None).await;

        assert_eq!(
            accumulator.last_exchange(),
            Some(Exchange {
                query: "first?".into(),
                response: "first answer".into(),
                image_url: Some("https://x/img.png".into()),
            })
        );
    }
}
