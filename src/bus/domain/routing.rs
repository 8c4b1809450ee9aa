//! Topic routing-key matching.
//!
//! Keys and patterns are dot-separated words. In a pattern `*` matches
//! exactly one word and `#` matches zero or more words.

const WORD_SEPARATOR: char = '.';
const ONE_WORD: &str = "*";
const ANY_WORDS: &str = "#";

/// Returns whether `routing_key` matches the binding `pattern`.
///
/// Runs in `O(pattern words × key words)` however many `#` the pattern has.
#[must_use]
pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let key_words: Vec<&str> = routing_key.split(WORD_SEPARATOR).collect();

    // reachable[j]: the pattern words seen so far match the first j key words.
    let mut reachable: Vec<bool> = std::iter::once(true)
        .chain(key_words.iter().map(|_| false))
        .collect();
    for word in pattern.split(WORD_SEPARATOR) {
        reachable = if word == ANY_WORDS {
            let mut seen = false;
            reachable
                .iter()
                .map(|&matched| {
                    seen |= matched;
                    seen
                })
                .collect()
        } else {
            std::iter::once(false)
                .chain(
                    reachable
                        .iter()
                        .zip(&key_words)
                        .map(|(&matched, key_word)| {
                            matched && (word == ONE_WORD || word == *key_word)
                        }),
                )
                .collect()
        };
        if !reachable.contains(&true) {
            return false;
        }
    }
    reachable.last().copied().unwrap_or(false)
}

/// Returns the broadcast routing key, narrowed by `filter` when given.
#[must_use]
pub fn broadcast_key(filter: Option<&str>) -> String {
    format!("broadcast.{}", filter.unwrap_or("all"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("agent.x.*", "agent.x.task", true)]
    #[case("agent.x.*", "agent.x.task.extra", false)]
    #[case("agent.x.*", "agent.x", false)]
    #[case("agent.x.#", "agent.x", true)]
    #[case("agent.x.#", "agent.x.task.extra", true)]
    #[case("agent.x.#", "agent.y.task", false)]
    #[case("broadcast.all", "broadcast.all", true)]
    #[case("broadcast.all", "broadcast.backend", false)]
    #[case("#", "anything.at.all", true)]
    #[case("*.task_request", "agent.task_request", true)]
    #[case("failed.agent-1", "failed.agent-1", true)]
    #[case("#.error", "agent.a.error", true)]
    #[case("#.error", "agent.a.status", false)]
    #[case("#.#", "agent", true)]
    #[case("agent.#.#.task", "agent.task", true)]
    #[case("agent.#.*.task", "agent.task", false)]
    #[case("*", "agent.x", false)]
    fn topic_patterns_match_words(
        #[case] pattern: &str,
        #[case] routing_key: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(topic_matches(pattern, routing_key), expected);
    }

    #[rstest]
    fn broadcast_keys_default_to_all() {
        assert_eq!(broadcast_key(None), "broadcast.all");
        assert_eq!(broadcast_key(Some("backend")), "broadcast.backend");
    }

    #[rstest]
    fn many_wildcards_on_long_keys_stay_fast() {
        let pattern = format!("{}.never", ["#"; 24].join("."));
        let routing_key = ["word"; 64].join(".");

        let started = std::time::Instant::now();
        assert!(!topic_matches(&pattern, &routing_key));
        assert!(topic_matches(&pattern, &format!("{routing_key}.never")));
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
    }
}
