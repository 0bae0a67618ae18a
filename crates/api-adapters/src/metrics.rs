//! Prometheus counters for board activity, rendered at `/metrics`.

use domains::{VoteKind, VoteOutcome};
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct VoteLabels {
    kind: String,
    outcome: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct CreatedLabels {
    kind: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct HttpLabels {
    method: String,
    status: String,
}

pub struct Metrics {
    registry: Registry,
    votes: Family<VoteLabels, Counter>,
    messages_created: Family<CreatedLabels, Counter>,
    http_requests: Family<HttpLabels, Counter>,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let votes = Family::<VoteLabels, Counter>::default();
        let messages_created = Family::<CreatedLabels, Counter>::default();
        let http_requests = Family::<HttpLabels, Counter>::default();

        // Counter names get the `_total` suffix on encode.
        registry.register(
            "nestboard_votes",
            "Votes applied, by kind and outcome",
            votes.clone(),
        );
        registry.register(
            "nestboard_messages_created",
            "Messages created, posts and comments",
            messages_created.clone(),
        );
        registry.register(
            "nestboard_http_requests",
            "HTTP requests served, by method and status",
            http_requests.clone(),
        );

        Self {
            registry,
            votes,
            messages_created,
            http_requests,
        }
    }

    pub fn record_vote(&self, kind: VoteKind, outcome: VoteOutcome) {
        self.votes
            .get_or_create(&VoteLabels {
                kind: kind.as_str().to_string(),
                outcome: outcome.as_str().to_string(),
            })
            .inc();
    }

    pub fn record_created(&self, is_root: bool) {
        let kind = if is_root { "post" } else { "comment" };
        self.messages_created
            .get_or_create(&CreatedLabels {
                kind: kind.to_string(),
            })
            .inc();
    }

    pub fn record_request(&self, method: &str, status: u16) {
        self.http_requests
            .get_or_create(&HttpLabels {
                method: method.to_string(),
                status: status.to_string(),
            })
            .inc();
    }

    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_recorded_counters() {
        let metrics = Metrics::new();
        metrics.record_vote(VoteKind::Like, VoteOutcome::Cast);
        metrics.record_vote(VoteKind::Like, VoteOutcome::Cast);
        metrics.record_created(false);

        let text = metrics.render().unwrap();
        assert!(text.contains(r#"nestboard_votes_total{kind="like",outcome="cast"} 2"#));
        assert!(text.contains(r#"nestboard_messages_created_total{kind="comment"} 1"#));
    }
}
