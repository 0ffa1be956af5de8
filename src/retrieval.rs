use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use tokio::time::timeout;

use crate::collection::CollectionClient;
use crate::models::{ContextBundle, Document};

#[derive(Clone)]
pub struct Retriever {
    clients: Vec<Arc<dyn CollectionClient>>,
    per_collection_limit: usize,
    query_timeout: Duration,
}

impl Retriever {
    pub fn new(
        clients: Vec<Arc<dyn CollectionClient>>,
        per_collection_limit: usize,
        query_timeout: Duration,
    ) -> Self {
        Self {
            clients,
            per_collection_limit,
            query_timeout,
        }
    }

    /// Fans the term list out across every collection concurrently. Within a
    /// collection, terms run sequentially in priority order so earlier terms
    /// fill the snippet cap first. A collection that fails or times out
    /// contributes nothing; the bundle still carries its key.
    pub async fn retrieve(
        &self,
        query_text: &str,
        terms: &[String],
        fallback_coords: Option<(f64, f64)>,
    ) -> ContextBundle {
        let collected = futures::future::join_all(self.clients.iter().map(|client| {
            self.collect_collection(client.as_ref(), query_text, terms, fallback_coords)
        }))
        .await;

        let mut bundle = ContextBundle::with_keys(self.clients.iter().map(|c| c.key()));
        for (key, snippets) in collected {
            for snippet in snippets {
                bundle.push_snippet(&key, snippet, self.per_collection_limit);
            }
        }
        bundle
    }

    async fn collect_collection(
        &self,
        client: &dyn CollectionClient,
        query_text: &str,
        terms: &[String],
        fallback_coords: Option<(f64, f64)>,
    ) -> (String, Vec<String>) {
        let key = client.key().to_string();
        let mut snippets: Vec<String> = Vec::new();

        for term in terms {
            if snippets.len() >= self.per_collection_limit {
                break;
            }

            let result = match timeout(
                self.query_timeout,
                client.query(term, self.per_collection_limit),
            )
            .await
            {
                Err(_) => {
                    tracing::warn!(collection = %key, term = %term, "collection query timed out");
                    continue;
                }
                Ok(Err(err)) => {
                    tracing::warn!(collection = %key, term = %term, error = %err, "collection query failed");
                    continue;
                }
                Ok(Ok(result)) => result,
            };

            let documents = if client.ranked() {
                result.documents
            } else {
                rank_documents(result.documents, query_text, terms)
            };

            for document in documents {
                if snippets.len() >= self.per_collection_limit {
                    break;
                }
                push_unique(&mut snippets, format_document(&document.text));
            }
        }

        // Nothing matched any term: one coordinate-radius lookup before
        // giving the collection up for this turn.
        if snippets.is_empty() {
            if let Some((lat, lng)) = fallback_coords {
                match timeout(
                    self.query_timeout,
                    client.query_radius(lat, lng, self.per_collection_limit),
                )
                .await
                {
                    Ok(Ok(result)) => {
                        for document in result.documents {
                            if snippets.len() >= self.per_collection_limit {
                                break;
                            }
                            push_unique(&mut snippets, format_document(&document.text));
                        }
                    }
                    Ok(Err(err)) => {
                        tracing::warn!(collection = %key, error = %err, "radius fallback failed");
                    }
                    Err(_) => {
                        tracing::warn!(collection = %key, "radius fallback timed out");
                    }
                }
            }
        }

        (key, snippets)
    }
}

/// Relevance score for one document against the query. Additive rules:
/// full-query substring, per-term hits weighted by phrase length, then
/// metadata name and attraction-type echoes in the query.
pub fn score(document: &Document, query_text: &str, terms: &[String]) -> f32 {
    let doc_lower = document.text.to_lowercase();
    let query_lower = query_text.to_lowercase();
    let mut score = 0.0_f32;

    if !query_lower.is_empty() && doc_lower.contains(&query_lower) {
        score += 2.0;
    }

    for term in terms {
        if doc_lower.contains(term.as_str()) {
            score += 0.3 * term.split_whitespace().count() as f32;
        }
    }

    if let Some(name) = &document.metadata.name {
        let name = name.to_lowercase();
        if !name.is_empty() && query_lower.contains(&name) {
            score += 1.0;
        }
    }

    if let Some(kind) = &document.metadata.attraction_type {
        let kind = kind.to_lowercase();
        if !kind.is_empty() && query_lower.contains(&kind) {
            score += 0.5;
        }
    }

    score
}

/// Orders unranked store results by score, dropping zero-score documents.
/// The sort is stable: ties keep their retrieval order.
fn rank_documents(documents: Vec<Document>, query_text: &str, terms: &[String]) -> Vec<Document> {
    let mut scored: Vec<(f32, Document)> = documents
        .into_iter()
        .map(|doc| (score(&doc, query_text, terms), doc))
        .filter(|(score, _)| *score > 0.0)
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().map(|(_, doc)| doc).collect()
}

/// Reduces a document with labeled sections ("Summary:", "History:",
/// "Description:") to the concatenated section bodies in label order.
/// Unlabeled documents pass through trimmed.
pub fn format_document(text: &str) -> String {
    let label_re = Regex::new(r"^(Summary|History|Description):\s*")
        .unwrap_or_else(|_| Regex::new("^$").unwrap());

    let mut bodies = Vec::new();
    for section in text.split("\n\n") {
        let section = section.trim();
        if let Some(found) = label_re.find(section) {
            let body = section[found.end()..].trim();
            if !body.is_empty() {
                bodies.push(body.to_string());
            }
        }
    }

    if bodies.is_empty() {
        text.trim().to_string()
    } else {
        bodies.join(" ")
    }
}

fn push_unique(snippets: &mut Vec<String>, snippet: String) {
    if snippet.is_empty() || snippets.iter().any(|existing| *existing == snippet) {
        return;
    }
    snippets.push(snippet);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::{CollectionClient, StoreError};
    use crate::models::{CollectionResult, DocumentMetadata};
    use async_trait::async_trait;

    fn doc(text: &str) -> Document {
        Document {
            text: text.to_string(),
            metadata: DocumentMetadata::default(),
        }
    }

    struct StubCollection {
        key: &'static str,
        documents: Vec<Document>,
        radius_documents: Vec<Document>,
        unavailable: bool,
    }

    #[async_trait]
    impl CollectionClient for StubCollection {
        fn key(&self) -> &str {
            self.key
        }

        fn ranked(&self) -> bool {
            false
        }

        async fn query(&self, _term: &str, _limit: usize) -> Result<CollectionResult, StoreError> {
            if self.unavailable {
                return Err(StoreError::Unavailable("stub offline".to_string()));
            }
            Ok(CollectionResult {
                collection_key: self.key.to_string(),
                documents: self.documents.clone(),
            })
        }

        async fn query_radius(
            &self,
            _lat: f64,
            _lng: f64,
            _limit: usize,
        ) -> Result<CollectionResult, StoreError> {
            Ok(CollectionResult {
                collection_key: self.key.to_string(),
                documents: self.radius_documents.clone(),
            })
        }
    }

    fn retriever(clients: Vec<Arc<dyn CollectionClient>>, limit: usize) -> Retriever {
        Retriever::new(clients, limit, Duration::from_secs(1))
    }

    #[test]
    fn score_adds_rule_contributions_in_order() {
        let mut document = doc("Fort Canning Park history and gardens");
        document.metadata.name = Some("Fort Canning".to_string());
        document.metadata.attraction_type = Some("park".to_string());

        let terms = vec!["fort canning".to_string(), "park".to_string()];

        // Full query substring: +2.0; "fort canning": +0.6; "park": +0.3;
        // metadata name: +1.0; attraction type: +0.5.
        let total = score(&document, "fort canning park", &terms);
        assert!((total - 4.4).abs() < 1e-6);

        let no_terms = score(&document, "fort canning park", &[]);
        assert!((no_terms - 3.5).abs() < 1e-6);
    }

    #[test]
    fn score_is_monotone_in_matched_terms() {
        let document = doc("the esplanade sits by marina bay");
        let mut terms = Vec::new();
        let mut last = score(&document, "somewhere else", &terms);

        for term in ["esplanade", "marina bay", "bay"] {
            terms.push(term.to_string());
            let next = score(&document, "somewhere else", &terms);
            assert!(next >= last);
            last = next;
        }
    }

    #[test]
    fn labeled_sections_reduce_to_bodies() {
        assert_eq!(format_document("Summary: X\n\nHistory: Y"), "X Y");
        assert_eq!(
            format_document("Summary: A\n\nUnrelated part\n\nDescription: B"),
            "A B"
        );
        assert_eq!(format_document("  plain scraped text  "), "plain scraped text");
    }

    #[tokio::test]
    async fn bundle_respects_cap_and_dedupes() {
        let stub = StubCollection {
            key: "wikipedia",
            documents: vec![
                doc("alpha fact"),
                doc("alpha fact"),
                doc("beta fact"),
                doc("gamma fact"),
            ],
            radius_documents: vec![],
            unavailable: false,
        };

        let retriever = retriever(vec![Arc::new(stub)], 2);
        let terms = vec!["alpha fact".to_string(), "beta".to_string()];
        let bundle = retriever.retrieve("alpha fact beta gamma", &terms, None).await;

        let snippets = bundle.snippets("wikipedia");
        assert_eq!(snippets.len(), 2);
        assert_eq!(snippets[0], "alpha fact");
        assert_ne!(snippets[0], snippets[1]);
    }

    #[tokio::test]
    async fn unavailable_collection_leaves_empty_entry() {
        let healthy = StubCollection {
            key: "wikipedia",
            documents: vec![doc("merlion fact")],
            radius_documents: vec![],
            unavailable: false,
        };
        let offline = StubCollection {
            key: "attractions",
            documents: vec![],
            radius_documents: vec![],
            unavailable: true,
        };

        let retriever = retriever(vec![Arc::new(healthy), Arc::new(offline)], 3);
        let terms = vec!["merlion".to_string()];
        let bundle = retriever.retrieve("merlion", &terms, None).await;

        assert_eq!(bundle.snippets("wikipedia"), ["merlion fact"]);
        assert!(bundle.snippets("attractions").is_empty());
        assert!(!bundle.is_empty());
    }

    #[tokio::test]
    async fn radius_fallback_fills_empty_collection() {
        let stub = StubCollection {
            key: "attractions",
            documents: vec![],
            radius_documents: vec![doc("nearby hawker centre")],
            unavailable: false,
        };

        let retriever = retriever(vec![Arc::new(stub)], 3);
        let terms = vec!["nothing matches".to_string()];

        let without_coords = retriever.retrieve("nothing matches", &terms, None).await;
        assert!(without_coords.snippets("attractions").is_empty());

        let with_coords = retriever
            .retrieve("nothing matches", &terms, Some((1.2840, 103.8515)))
            .await;
        assert_eq!(with_coords.snippets("attractions"), ["nearby hawker centre"]);
    }
}
