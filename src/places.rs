use std::collections::HashSet;
use std::sync::Arc;

use crate::history::HistoryStore;
use crate::models::{PlaceCandidate, SelectionOutcome};

/// Picks the next point of interest to narrate. Walks the distance-ordered
/// candidates for the first name the session has not visited; when every
/// nearby point is exhausted it falls back to narrating the area itself and
/// computes how much prior narration to re-inject.
pub struct PlaceSelector {
    history: Arc<dyn HistoryStore>,
}

impl PlaceSelector {
    pub fn new(history: Arc<dyn HistoryStore>) -> Self {
        Self { history }
    }

    pub async fn select(
        &self,
        session_key: &str,
        candidates: &[PlaceCandidate],
        visited: &mut HashSet<String>,
        address: &str,
    ) -> SelectionOutcome {
        for candidate in candidates {
            if visited.contains(&candidate.name) {
                continue;
            }
            visited.insert(candidate.name.clone());
            return SelectionOutcome {
                selected_place: candidate.name.clone(),
                is_repeat_fallback: false,
                repeat_count: 0,
                lookback_text: None,
            };
        }

        // The address is an area, not a discrete point; it never enters the
        // visited set.
        let (repeat_count, lookback_text) = self.lookback(session_key).await;
        SelectionOutcome {
            selected_place: address.to_string(),
            is_repeat_fallback: true,
            repeat_count,
            lookback_text,
        }
    }

    /// Reads the last message's repeat counter R, then the R most recent
    /// message texts. The second read depends on the first, so they stay
    /// sequential. Returns (R + 1, joined lookback text).
    async fn lookback(&self, session_key: &str) -> (i64, Option<String>) {
        let last = match self.history.most_recent(session_key, 1).await {
            Ok(messages) => messages.into_iter().next(),
            Err(err) => {
                tracing::warn!(session = %session_key, error = %err, "history read failed, lookback skipped");
                None
            }
        };

        let previous = last.map(|m| m.repeat_counter).unwrap_or(0);

        let lookback_text = if previous > 0 {
            match self.history.most_recent(session_key, previous).await {
                Ok(messages) => {
                    let joined = messages
                        .iter()
                        .map(|m| m.text.as_str())
                        .collect::<Vec<_>>()
                        .join(" ");
                    (!joined.trim().is_empty()).then_some(joined)
                }
                Err(err) => {
                    tracing::warn!(session = %session_key, error = %err, "history read failed, lookback skipped");
                    None
                }
            }
        } else {
            None
        };

        (previous + 1, lookback_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HistoryMessage;
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    struct MemoryHistory {
        messages: Mutex<Vec<HistoryMessage>>,
    }

    impl MemoryHistory {
        fn new() -> Self {
            Self {
                messages: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl HistoryStore for MemoryHistory {
        async fn append(&self, _session_key: &str, message: HistoryMessage) -> Result<()> {
            self.messages.lock().unwrap().push(message);
            Ok(())
        }

        async fn most_recent(
            &self,
            _session_key: &str,
            limit: i64,
        ) -> Result<Vec<HistoryMessage>> {
            let messages = self.messages.lock().unwrap();
            Ok(messages.iter().rev().take(limit.max(0) as usize).cloned().collect())
        }
    }

    fn candidate(name: &str) -> PlaceCandidate {
        PlaceCandidate {
            name: name.to_string(),
            lat: 1.2840,
            lng: 103.8515,
            photo_reference: None,
        }
    }

    fn narration(text: &str, repeat: i64) -> HistoryMessage {
        HistoryMessage {
            timestamp: Utc::now(),
            text: text.to_string(),
            is_user_authored: false,
            repeat_counter: repeat,
            location: None,
        }
    }

    fn selector() -> (PlaceSelector, Arc<MemoryHistory>) {
        let history = Arc::new(MemoryHistory::new());
        (PlaceSelector::new(history.clone()), history)
    }

    #[tokio::test]
    async fn picks_first_unvisited_candidate() {
        let (selector, _) = selector();
        let candidates = vec![candidate("A"), candidate("B"), candidate("C")];
        let mut visited: HashSet<String> = ["A".to_string()].into_iter().collect();

        let outcome = selector.select("s1", &candidates, &mut visited, "some address").await;

        assert_eq!(outcome.selected_place, "B");
        assert!(!outcome.is_repeat_fallback);
        assert_eq!(outcome.repeat_count, 0);
        assert!(visited.contains("A") && visited.contains("B"));
        assert!(!visited.contains("C"));
    }

    #[tokio::test]
    async fn exhausted_candidates_fall_back_to_address() {
        let (selector, history) = selector();
        history.append("s1", narration("first walk", 0)).await.unwrap();

        let candidates = vec![candidate("A"), candidate("B")];
        let mut visited: HashSet<String> =
            ["A".to_string(), "B".to_string()].into_iter().collect();

        let outcome = selector
            .select("s1", &candidates, &mut visited, "Tiong Bahru, Singapore")
            .await;

        assert!(outcome.is_repeat_fallback);
        assert_eq!(outcome.selected_place, "Tiong Bahru, Singapore");
        // Last counter was 0, so this turn repeats once and has no lookback.
        assert_eq!(outcome.repeat_count, 1);
        assert!(outcome.lookback_text.is_none());
        assert!(!visited.contains("Tiong Bahru, Singapore"));
    }

    #[tokio::test]
    async fn repeat_counter_grows_and_collects_lookback() {
        let (selector, history) = selector();
        history.append("s1", narration("about the park", 0)).await.unwrap();
        history.append("s1", narration("about the mall", 1)).await.unwrap();

        let mut visited: HashSet<String> = ["A".to_string()].into_iter().collect();
        let outcome = selector
            .select("s1", &[candidate("A")], &mut visited, "Bishan")
            .await;

        assert_eq!(outcome.repeat_count, 2);
        assert_eq!(outcome.lookback_text.as_deref(), Some("about the mall"));

        history.append("s1", narration("about the area", 2)).await.unwrap();
        let next = selector
            .select("s1", &[candidate("A")], &mut visited, "Bishan")
            .await;

        assert_eq!(next.repeat_count, 3);
        assert_eq!(
            next.lookback_text.as_deref(),
            Some("about the area about the mall")
        );
    }

    #[tokio::test]
    async fn empty_candidates_fall_back() {
        let (selector, _) = selector();
        let mut visited = HashSet::new();
        let outcome = selector.select("s1", &[], &mut visited, "1.2840,103.8515").await;

        assert!(outcome.is_repeat_fallback);
        assert_eq!(outcome.selected_place, "1.2840,103.8515");
        assert!(visited.is_empty());
    }
}
