use std::{fmt, time::Duration};

use async_trait::async_trait;
use rand::seq::IndexedRandom;

use crate::{safety, state::Mode};

const ROAST_TEMPLATE_ECHO: &str = "you are a $n.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    Compliment,
    Roast,
}

impl Category {
    /// Fair coin flip.
    pub fn random() -> Self {
        if rand::random_bool(0.5) {
            Category::Compliment
        } else {
            Category::Roast
        }
    }

    /// JSON field carrying the text in the upstream response.
    pub fn field(self) -> &'static str {
        match self {
            Category::Compliment => "compliment",
            Category::Roast => "insult",
        }
    }

    fn pools(self) -> (&'static [&'static str], &'static [&'static str]) {
        match self {
            Category::Compliment => (COMPLIMENTS, SPICY_COMPLIMENTS),
            Category::Roast => (ROASTS, SPICY_ROASTS),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Compliment => f.write_str("compliment"),
            Category::Roast => f.write_str("roast"),
        }
    }
}

const COMPLIMENTS: &[&str] = &[
    "You’re doing great!",
    "Your taste is impeccable.",
    "You make hard things look easy.",
    "Your curiosity is your superpower.",
    "Your energy is contagious.",
    "You have a gift for clarity.",
];

const SPICY_COMPLIMENTS: &[&str] = &[
    "You’re annoyingly good at this.",
    "Honestly, the group chat would be boring without you.",
    "You could talk your way out of a parking ticket.",
];

const ROASTS: &[&str] = &[
    "You’re like a cloud. When you disappear, it’s a beautiful day.",
    "I’d agree with you, but then we’d both be wrong.",
    "Somewhere out there is a tree working hard for your oxygen. You owe it an apology.",
    "You have the charisma of a dial tone.",
    "Your opinions would be better if they stayed buffering.",
];

const SPICY_ROASTS: &[&str] = &[
    "You’re not the dumbest person alive, but you better hope they don’t die.",
    "You bring everyone so much joy when you leave the room.",
    "If laziness were a sport, you’d still find a way to skip practice.",
];

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("upstream unavailable")]
    Unavailable(#[source] reqwest::Error),
    #[error("upstream sent garbage: {0}")]
    Garbage(&'static str),
}

/// Raw network side of a text source.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn fetch(&self) -> Result<String, FetchError>;
}

/// Produces one candidate, or `None` when it has nothing usable.
#[async_trait]
pub trait TextSource: Send + Sync {
    async fn candidate(&self, mode: Mode) -> Option<String>;
}

pub struct HttpUpstream {
    client: reqwest::Client,
    url: String,
    field: &'static str,
}

impl HttpUpstream {
    pub fn new(client: reqwest::Client, url: String, category: Category) -> Self {
        Self {
            client,
            url,
            field: category.field(),
        }
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn fetch(&self) -> Result<String, FetchError> {
        let body = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(FetchError::Unavailable)?
            .json::<serde_json::Value>()
            .await
            .map_err(FetchError::Unavailable)?;

        body.get(self.field)
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .ok_or(FetchError::Garbage("missing text field"))
    }
}

/// Builds the shared client used by both upstreams.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(timeout).build()
}

/// Upstream fetch with validation, falling back to a local phrase pool.
pub struct FallbackSource<U> {
    category: Category,
    upstream: U,
}

impl<U: Upstream> FallbackSource<U> {
    pub fn new(category: Category, upstream: U) -> Self {
        Self { category, upstream }
    }

    async fn fetch_validated(&self) -> Result<String, FetchError> {
        let raw = self.upstream.fetch().await?;

        validate(self.category, &raw)
    }
}

#[async_trait]
impl<U: Upstream> TextSource for FallbackSource<U> {
    async fn candidate(&self, mode: Mode) -> Option<String> {
        match self.fetch_validated().await {
            Ok(text) => return Some(text),
            Err(err) => log::warn!("{} fetch failed: {err}", self.category),
        }

        pick_fallback(self.category, mode)
    }
}

pub fn validate(category: Category, raw: &str) -> Result<String, FetchError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(FetchError::Garbage("empty text"));
    }

    if category == Category::Roast {
        if text.to_lowercase() == ROAST_TEMPLATE_ECHO {
            return Err(FetchError::Garbage("unfilled template"));
        }

        if text.chars().count() <= 3 {
            return Err(FetchError::Garbage("too short"));
        }
    }

    let text = polish(text);
    if !safety::is_clean(&text) {
        return Err(FetchError::Garbage("blocked by safety filter"));
    }

    Ok(text)
}

/// Capitalizes the first letter and makes sure the text ends a sentence.
fn polish(text: &str) -> String {
    let mut chars = text.chars();
    let mut polished = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
    };

    if !polished.ends_with(['.', '!', '?']) {
        polished.push('.');
    }

    polished
}

/// Uniform pick among the pool entries that pass the safety filter.
pub fn pick_fallback(category: Category, mode: Mode) -> Option<String> {
    let (standard, spicy) = category.pools();
    let extra: &[&str] = match mode {
        Mode::Standard => &[],
        Mode::Spicy => spicy,
    };

    let pool = standard.iter().chain(extra).copied().collect::<Vec<_>>();

    choose_clean(&pool)
}

/// Filters `pool` through the safety filter on every call, then picks one.
fn choose_clean(pool: &[&str]) -> Option<String> {
    let survivors = pool
        .iter()
        .copied()
        .filter(|text| safety::is_clean(text))
        .collect::<Vec<_>>();

    survivors
        .choose(&mut rand::rng())
        .map(|text| text.to_string())
}

#[cfg(test)]
mod tests {
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    use super::*;

    struct Scripted(Result<&'static str, &'static str>);

    #[async_trait]
    impl Upstream for Scripted {
        async fn fetch(&self) -> Result<String, FetchError> {
            self.0.map(str::to_string).map_err(FetchError::Garbage)
        }
    }

    fn in_pool(pool: &[&str], text: &str) -> bool {
        pool.iter().any(|entry| *entry == text)
    }

    #[test]
    fn polish_capitalizes_and_terminates() {
        assert_eq!(polish("you rock"), "You rock.");
        assert_eq!(polish("you rock!"), "You rock!");
        assert_eq!(polish("really?"), "Really?");
    }

    #[test]
    fn validate_rejects_roast_template_echo() {
        assert!(validate(Category::Roast, "You are a $n.").is_err());
        assert!(validate(Category::Roast, "  you are a $N.  ").is_err());
    }

    #[test]
    fn validate_rejects_short_roasts_only() {
        assert!(validate(Category::Roast, "bad").is_err());
        assert_eq!(validate(Category::Compliment, "ok").unwrap(), "Ok.");
    }

    #[test]
    fn validate_rejects_empty_and_unsafe() {
        assert!(validate(Category::Compliment, "   ").is_err());
        assert!(validate(Category::Roast, "you are a total retard").is_err());
    }

    #[test]
    fn validate_trims_and_polishes() {
        assert_eq!(
            validate(Category::Compliment, "  your smile is bright ").unwrap(),
            "Your smile is bright."
        );
    }

    #[test]
    fn standard_mode_draws_from_standard_pool() {
        for _ in 0..20 {
            let text = pick_fallback(Category::Roast, Mode::Standard).unwrap();
            assert!(in_pool(ROASTS, &text));
        }
    }

    #[test]
    fn spicy_mode_draws_from_both_pools() {
        for _ in 0..20 {
            let text = pick_fallback(Category::Compliment, Mode::Spicy).unwrap();
            assert!(in_pool(COMPLIMENTS, &text) || in_pool(SPICY_COMPLIMENTS, &text));
        }
    }

    #[test]
    fn unsafe_pool_entries_are_skipped() {
        for _ in 0..20 {
            let text = choose_clean(&["a spicy take", "fine"]);
            assert_eq!(text.as_deref(), Some("fine"));
        }
    }

    #[test]
    fn fully_unsafe_pool_yields_nothing() {
        assert_eq!(choose_clean(&["a spicy take", "RETARDED"]), None);
        assert_eq!(choose_clean(&[]), None);
    }

    #[test]
    fn every_pool_entry_is_clean() {
        for text in COMPLIMENTS
            .iter()
            .chain(SPICY_COMPLIMENTS)
            .chain(ROASTS)
            .chain(SPICY_ROASTS)
        {
            assert!(safety::is_clean(text), "{text}");
        }
    }

    #[tokio::test]
    async fn template_echo_falls_back_to_roast_pool() {
        let source = FallbackSource::new(Category::Roast, Scripted(Ok("You are a $n.")));

        let text = source.candidate(Mode::Standard).await.unwrap();

        assert!(in_pool(ROASTS, &text));
    }

    #[tokio::test]
    async fn upstream_failure_falls_back() {
        let source = FallbackSource::new(Category::Compliment, Scripted(Err("down")));

        let text = source.candidate(Mode::Standard).await.unwrap();

        assert!(in_pool(COMPLIMENTS, &text));
    }

    #[tokio::test]
    async fn valid_upstream_text_is_polished() {
        let source = FallbackSource::new(Category::Compliment, Scripted(Ok("you shine")));

        assert_eq!(
            source.candidate(Mode::Spicy).await.as_deref(),
            Some("You shine.")
        );
    }

    /// Answers a single request with a canned HTTP response.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 2048];
            let _ = socket.read(&mut request).await;

            let response = format!(
                "HTTP/1.1 {status}\r\n\
                 Content-Type: application/json\r\n\
                 Content-Length: {}\r\n\
                 Connection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });

        format!("http://{addr}/api")
    }

    async fn fetch_from(
        category: Category,
        status: &'static str,
        body: &'static str,
    ) -> Result<String, FetchError> {
        let url = serve_once(status, body).await;
        let client = http_client(Duration::from_secs(5)).unwrap();

        HttpUpstream::new(client, url, category).fetch().await
    }

    #[tokio::test]
    async fn server_error_is_unavailable() {
        let body = r#"{"insult":"You are a sock."}"#;
        let outcome = fetch_from(Category::Roast, "500 Internal Server Error", body).await;

        assert!(matches!(outcome, Err(FetchError::Unavailable(_))));
    }

    #[tokio::test]
    async fn non_json_body_is_unavailable() {
        let outcome = fetch_from(Category::Compliment, "200 OK", "<html>nope</html>").await;

        assert!(matches!(outcome, Err(FetchError::Unavailable(_))));
    }

    #[tokio::test]
    async fn non_string_field_is_garbage() {
        let outcome = fetch_from(Category::Roast, "200 OK", r#"{"insult": 5}"#).await;

        assert!(matches!(outcome, Err(FetchError::Garbage(_))));
    }

    #[tokio::test]
    async fn missing_field_is_garbage() {
        let outcome = fetch_from(Category::Roast, "200 OK", r#"{"compliment":"hi"}"#).await;

        assert!(matches!(outcome, Err(FetchError::Garbage(_))));
    }

    #[tokio::test]
    async fn text_field_is_extracted() {
        let outcome = fetch_from(Category::Compliment, "200 OK", r#"{"compliment":"hi"}"#).await;

        assert_eq!(outcome.unwrap(), "hi");
    }
}
