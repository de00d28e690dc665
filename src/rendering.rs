//! Step rendering
//!
//! Converts a step's markdown to the HTML shown in the panel. Three kinds of
//! elements are rewritten on the way:
//!
//! - fenced code blocks without an info string become command blocks: parsed
//!   into a [`ResolvedCommand`] and given a `katapod.sendText` play link
//! - links to `command:katapod.loadPage?<step>` get an encoded step payload
//! - local image sources are mapped through the display surface
//!
//! Everything else goes through pulldown-cmark's HTML writer untouched.

use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use tracing::warn;

use crate::content::ContentSource;
use crate::directive::{parse_code_block, ResolvedCommand};
use crate::host::DisplaySurface;
use crate::trigger::{self, Trigger, COMMAND_URI_SCHEME, LOAD_PAGE_COMMAND};

/// Marks an image source that points outside the scenario
const REMOTE_URI_MARKER: &str = "://";

const STEP_PAGE_HTML_PREFIX: &str = r#"<!DOCTYPE html>
<html lang="en">
	<head>
		<meta charset="UTF-8">
		<meta name="viewport" content="width=device-width, initial-scale=1.0">
		<link rel="stylesheet" type="text/css" href="https://datastax-academy.github.io/katapod-shared-assets/css/katapod.css" />
		<script src="https://datastax-academy.github.io/katapod-shared-assets/js/katapod.js"></script>
		<link rel="stylesheet" type="text/css" href="https://datastax-academy.github.io/katapod-shared-assets/quiz/quiz.css" />
		<link rel="stylesheet" type="text/css" href="https://datastax-academy.github.io/katapod-shared-assets/quiz/page.css" />
		<script src="https://datastax-academy.github.io/katapod-shared-assets/quiz/quiz.js"></script>
		<script src="https://datastax-academy.github.io/katapod-shared-assets/quiz/main.js"></script>
	</head>
	<body>
"#;

const STEP_PAGE_HTML_POSTFIX: &str = r#"
		<script>
			window.addEventListener("message", event => {
				const message = event.data;
				switch(message.command){
					case "scroll_to_top":
						window.scrollTo(0, 0);
						break;
				}
			});
		</script>
	</body>
</html>
"#;

/// Result of rendering one step page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedStep {
    /// Complete HTML document for the panel
    pub html: String,
    /// Inline command blocks in source order (index = block index)
    pub commands: Vec<ResolvedCommand>,
}

/// True unless the image source is a full remote URI
pub fn is_local_image_src(src: &str) -> bool {
    !src.contains(REMOTE_URI_MARKER)
}

/// Render `markdown` as the page of `step`
pub fn render_step(
    step: &str,
    markdown: &str,
    content: &dyn ContentSource,
    display: &dyn DisplaySurface,
) -> RenderedStep {
    let mut renderer = StepRenderer {
        step,
        content,
        display,
        commands: Vec::new(),
    };
    let body = renderer.render_body(markdown);
    RenderedStep {
        html: format!("{}{}{}", STEP_PAGE_HTML_PREFIX, body, STEP_PAGE_HTML_POSTFIX),
        commands: renderer.commands,
    }
}

struct StepRenderer<'r> {
    step: &'r str,
    content: &'r dyn ContentSource,
    display: &'r dyn DisplaySurface,
    commands: Vec<ResolvedCommand>,
}

impl<'r> StepRenderer<'r> {
    fn render_body(&mut self, markdown: &str) -> String {
        let options = Options::ENABLE_TABLES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS;
        let parser = Parser::new_ext(markdown, options);

        let mut events: Vec<Event> = Vec::new();
        let mut command_block: Option<String> = None;

        for event in parser {
            match event {
                Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(ref info)))
                    if info.trim().is_empty() =>
                {
                    command_block = Some(String::new());
                }
                Event::Text(text) if command_block.is_some() => {
                    if let Some(buffer) = command_block.as_mut() {
                        buffer.push_str(&text);
                    }
                }
                Event::End(TagEnd::CodeBlock) if command_block.is_some() => {
                    let raw = command_block.take().unwrap_or_default();
                    events.push(Event::Html(self.command_block_html(&raw).into()));
                }
                Event::Start(Tag::Link {
                    link_type,
                    dest_url,
                    title,
                    id,
                }) => events.push(Event::Start(Tag::Link {
                    link_type,
                    dest_url: rewrite_load_page_link(dest_url),
                    title,
                    id,
                })),
                Event::Start(Tag::Image {
                    link_type,
                    dest_url,
                    title,
                    id,
                }) => events.push(Event::Start(Tag::Image {
                    link_type,
                    dest_url: self.rewrite_image_src(dest_url),
                    title,
                    id,
                })),
                other => events.push(other),
            }
        }

        let mut body = String::new();
        html::push_html(&mut body, events.into_iter());
        body
    }

    fn command_block_html(&mut self, raw: &str) -> String {
        let command = parse_code_block(self.step, self.commands.len(), raw);
        let escaped = escape_html(&command.command);

        let play_link = if command.execute {
            match Trigger::SendText(command.clone()).to_uri() {
                Ok(uri) => Some(uri),
                Err(e) => {
                    warn!(code_block_id = %command.code_block_id, error = %e, "Cannot encode play link");
                    None
                }
            }
        } else {
            None
        };

        self.commands.push(command);

        match play_link {
            Some(uri) => format!(
                "<pre title=\"Click &lt;play button&gt; to execute!\"><code><a class=\"command_link button1\" title=\"Click to execute!\" href=\"{}\">\u{25B6}</a>{}</code></pre>\n",
                uri, escaped
            ),
            None => format!("<pre><code>{}</code></pre>\n", escaped),
        }
    }

    fn rewrite_image_src<'a>(&self, src: CowStr<'a>) -> CowStr<'a> {
        if !is_local_image_src(&src) {
            return src;
        }
        let path = self.content.resolve_path(&src);
        self.display.resource_uri(&path).into()
    }
}

/// `command:katapod.loadPage?step2` → `command:katapod.loadPage?<encoded [{"step":"step2"}]>`
fn rewrite_load_page_link(url: CowStr<'_>) -> CowStr<'_> {
    let marker = format!("{}:{}?", COMMAND_URI_SCHEME, LOAD_PAGE_COMMAND);
    if !url.contains(&marker) {
        return url;
    }
    let step = url.replacen(&marker, "", 1);
    match trigger::encode_step_uri(&step) {
        Ok(payload) => format!("{}{}", marker, payload).into(),
        Err(e) => {
            warn!(step = %step, error = %e, "Cannot encode loadPage link");
            url
        }
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
