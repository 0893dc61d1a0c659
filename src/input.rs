//! Where the search request comes from
//!
//! The binary asks on the terminal for whatever was not given as a flag.
//! [`StaticInput`] answers from fixed values, which is what tests and
//! non-interactive callers use.

use crate::error::{Error, Result};
use crate::types::{Credential, DEFAULT_COUNT, SearchQuery};
use std::io::{BufRead, Write};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Source of the three values a run needs
pub trait InputProvider {
    /// Access token; blank means anonymous
    fn token(&mut self) -> Result<String>;
    /// Search text
    fn query(&mut self) -> Result<String>;
    /// Requested count, unparsed
    fn count(&mut self) -> Result<String>;
}

/// Parse a requested count, falling back to [`DEFAULT_COUNT`]
///
/// ```
/// use repo_collector::input::parse_count;
///
/// assert_eq!(parse_count(" 25 "), 25);
/// assert_eq!(parse_count("lots"), 10);
/// ```
pub fn parse_count(raw: &str) -> usize {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => n,
        _ => {
            warn!(input = %raw.trim(), default = DEFAULT_COUNT, "invalid count, using default");
            DEFAULT_COUNT
        }
    }
}

/// Ask `provider` for token, query and count, in that order
pub fn read_query(provider: &mut dyn InputProvider) -> Result<SearchQuery> {
    let credential = Credential::new(provider.token()?);
    let text = provider.query()?;
    if text.trim().is_empty() {
        return Err(Error::config("query", "you must enter something to search for"));
    }
    let count = parse_count(&provider.count()?);
    SearchQuery::new(text, count, credential)
}

/// Read the query on a dedicated thread, giving up when `cancel` fires
///
/// Terminal reads cannot be interrupted, so the provider is built and
/// queried on its own thread and left behind on cancellation. Returns
/// `Ok(None)` when cancelled before every answer was given.
pub async fn read_query_or_cancel<F, P>(
    make_provider: F,
    cancel: &CancellationToken,
) -> Result<Option<SearchQuery>>
where
    F: FnOnce() -> P + Send + 'static,
    P: InputProvider,
{
    let (tx, rx) = oneshot::channel();
    std::thread::Builder::new()
        .name("prompt".to_string())
        .spawn(move || {
            let mut provider = make_provider();
            tx.send(read_query(&mut provider)).ok();
        })?;

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Ok(None),
        answer = rx => match answer {
            Ok(result) => result.map(Some),
            Err(_) => Err(Error::Io(std::io::Error::other(
                "prompt thread ended without an answer",
            ))),
        },
    }
}

/// Fixed answers
#[derive(Clone, Debug, Default)]
pub struct StaticInput {
    /// Access token
    pub token: String,
    /// Search text
    pub query: String,
    /// Requested count
    pub count: String,
}

impl StaticInput {
    /// Answers for an anonymous search
    pub fn new(query: impl Into<String>, count: impl ToString) -> Self {
        Self {
            token: String::new(),
            query: query.into(),
            count: count.to_string(),
        }
    }

    /// Attach a token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }
}

impl InputProvider for StaticInput {
    fn token(&mut self) -> Result<String> {
        Ok(self.token.clone())
    }

    fn query(&mut self) -> Result<String> {
        Ok(self.query.clone())
    }

    fn count(&mut self) -> Result<String> {
        Ok(self.count.clone())
    }
}

/// Terminal prompts
///
/// Generic over the streams so prompts can be driven from memory.
pub struct PromptInput<R, W> {
    reader: R,
    writer: W,
}

impl PromptInput<std::io::StdinLock<'static>, std::io::Stdout> {
    /// Prompt on the process's stdin/stdout
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> PromptInput<R, W> {
    /// Prompt using `reader` and `writer`
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    fn ask(&mut self, intro: &str, prompt: &str) -> Result<String> {
        writeln!(self.writer, "{intro}")?;
        write!(self.writer, "   > {prompt}: ")?;
        self.writer.flush()?;

        let mut line = String::new();
        let read = self.reader.read_line(&mut line)?;
        if read == 0 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "input closed before an answer was given",
            )));
        }
        writeln!(self.writer)?;
        Ok(line.trim().to_string())
    }
}

impl<R: BufRead, W: Write> InputProvider for PromptInput<R, W> {
    fn token(&mut self) -> Result<String> {
        self.ask(
            concat!(
                "1. Paste your GitHub token for API access.\n",
                "   (Press Enter to skip; anonymous searches are rate limited.)"
            ),
            "Token",
        )
    }

    fn query(&mut self) -> Result<String> {
        self.ask(
            "2. What are you looking for? (e.g. 'trading bot python', 'portfolio react')",
            "Search",
        )
    }

    fn count(&mut self) -> Result<String> {
        self.ask(
            "3. How many repositories should be downloaded? (e.g. 10, 50, 100)",
            "Count",
        )
    }
}
