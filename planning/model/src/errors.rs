//! User facing error messages, rendered with excerpts of the PDDL source they refer to.

use std::fmt::{Debug, Display, Formatter};
use std::ops::Range;
use std::sync::Arc;

use crate::{Environment, Sym, pddl::input::Input};
use annotate_snippets::*;

/// Titles of at most this length are followed by the text of the span they refer to.
const INLINE_SPAN_LEN: usize = 40;

/// A substring of an input, with metadata for displaying (filename, indices, ...)
#[derive(Clone)]
pub struct Span {
    input: Arc<Input>,
    span: Range<usize>,
}

impl Span {
    /// Span of the characters `first..=last` of the input.
    pub fn new(input: Arc<Input>, first: usize, last: usize) -> Self {
        Span {
            input,
            span: first..(last + 1),
        }
    }

    /// Span covering a whole text that does not come from a source file.
    fn detached(text: String) -> Self {
        let span = 0..text.len();
        Span {
            input: Arc::new(Input::from_string(text)),
            span,
        }
    }

    pub fn str(&self) -> &str {
        &self.input.text.as_str()[self.span.clone()]
    }

    pub fn annotate(&self, level: Level<'static>, message: impl ToString) -> Annot {
        Annot {
            level,
            span: self.clone(),
            message: message.to_string(),
        }
    }

    pub fn error(&self, message: impl ToString) -> Annot {
        self.annotate(Level::ERROR, message)
    }

    pub fn info(&self, message: impl ToString) -> Annot {
        self.annotate(Level::INFO, message)
    }

    /// Span covering only the last character of this one.
    pub fn end(self) -> Self {
        let last = self.span.end.saturating_sub(1).max(self.span.start);
        Span {
            input: self.input,
            span: last..(last + 1),
        }
    }

    /// Error message pointing at this span.
    pub fn invalid(&self, msg: impl ToString) -> Message {
        let msg = msg.to_string();
        let title = if self.span.len() < INLINE_SPAN_LEN {
            format!("{msg}: {}", self.str())
        } else {
            msg.clone()
        };
        Message::error(title).snippet(self.error(msg))
    }
}

impl Debug for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}..{}]", self.span.start, self.span.end)
    }
}

/// An item that may be located in the source. Items without location are displayed on their own.
pub trait Spanned: Display {
    fn span(&self) -> Option<&Span>;

    fn loc(&self) -> Span {
        self.span().cloned().unwrap_or_else(|| Span::detached(self.to_string()))
    }

    fn invalid(&self, msg: impl ToString) -> Message {
        self.loc().invalid(msg)
    }

    fn error(&self, message: impl ToString) -> Annot {
        self.loc().error(message)
    }

    fn info(&self, message: impl ToString) -> Annot {
        self.loc().info(message)
    }
}

impl Spanned for &Sym {
    fn span(&self) -> Option<&Span> {
        self.span.as_ref()
    }
}

/// A labelled excerpt of the source.
pub struct Annot {
    level: Level<'static>,
    span: Span,
    message: String,
}

impl Annot {
    fn build(&self) -> Snippet<'_, Annotation<'_>> {
        let kind = if self.level == Level::ERROR {
            AnnotationKind::Primary
        } else {
            AnnotationKind::Context
        };
        let snippet = Snippet::source(&self.span.input.text)
            .line_start(1)
            .fold(true)
            .annotation(kind.span(self.span.span.clone()).label(&self.message));
        match self.span.input.source.as_ref() {
            Some(file) => snippet.path(file.as_str()),
            None => snippet,
        }
    }
}

/// A user facing error: a title, some annotated excerpts of the source and some context lines.
pub struct Message {
    level: Level<'static>,
    title: String,
    snippets: Vec<Annot>,
    context: Vec<String>,
}

impl Message {
    pub fn error(title: impl ToString) -> Self {
        Message {
            level: Level::ERROR,
            title: title.to_string(),
            snippets: Vec::new(),
            context: Vec::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn snippet(mut self, snippet: Annot) -> Self {
        self.snippets.push(snippet);
        self
    }

    /// Adds an excerpt of the source, labelled with `msg`.
    pub fn info(self, s: impl Spanned, msg: &str) -> Message {
        let annot = s.info(msg);
        self.snippet(annot)
    }
}

impl std::error::Error for Message {}

impl From<std::io::Error> for Message {
    fn from(value: std::io::Error) -> Self {
        Message::error(value)
    }
}

/// Replaces an absent value (or the title of an error) with an error of the given title.
pub trait Title<T> {
    fn title(self, title: impl ToString) -> std::result::Result<T, Message>;
}

impl<T> Title<T> for std::result::Result<T, Message> {
    fn title(self, title: impl ToString) -> Result<T, Message> {
        self.map_err(|mut e| {
            let previous = std::mem::replace(&mut e.title, title.to_string());
            e.context.push(previous);
            e
        })
    }
}

impl<T> Title<T> for Option<T> {
    fn title(self, title: impl ToString) -> Result<T, Message> {
        self.ok_or_else(|| Message::error(title))
    }
}

impl Display for Message {
    /// The alternate form is rendered without colors.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let renderer = if f.alternate() {
            Renderer::plain()
        } else {
            Renderer::styled()
        };
        let group = self
            .level
            .clone()
            .primary_title(&self.title)
            .elements(self.snippets.iter().map(Annot::build));
        f.write_str(&renderer.render(&[group]))?;
        for line in &self.context {
            write!(f, "\n  = {line}")?;
        }
        Ok(())
    }
}

impl Debug for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:#}")
    }
}

pub trait ErrorMessageExt<T> {
    fn with_info(self, annot: impl FnOnce() -> Annot) -> Result<T, Message>;
    /// Points at `tagged` in the error, labelled with `tag`.
    fn ctx2(self, tagged: impl Spanned, tag: impl ToString) -> Result<T, Message>;
}

impl<T> ErrorMessageExt<T> for Result<T, Message> {
    fn with_info(self, annot: impl FnOnce() -> Annot) -> Result<T, Message> {
        self.map_err(|m| m.snippet(annot()))
    }

    fn ctx2(self, tagged: impl Spanned, tag: impl ToString) -> Result<T, Message> {
        self.with_info(|| tagged.info(tag))
    }
}

/// Errors that need the environment to be turned into a user facing message.
pub trait ToEnvMessage {
    fn to_message(self, env: &Environment) -> Message;
}

pub trait EnvError<T> {
    fn msg(self, env: &Environment) -> Result<T, Message>;
}

impl<T, E: ToEnvMessage> EnvError<T> for Result<T, E> {
    fn msg(self, env: &Environment) -> Result<T, Message> {
        self.map_err(|e| e.to_message(env))
    }
}
