//! Streaming call parser

use std::ops::Range;

use serde::Serialize;

use crate::call::{ActionCall, Arguments};
use crate::vocabulary::{ActionSignature, Vocabulary};

/// One piece of a parsed model reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Segment {
    Text { content: String, span: Range<usize> },
    Action { call: ActionCall, span: Range<usize> },
}

impl Segment {
    /// Byte range of the input this segment was built from
    pub fn span(&self) -> Range<usize> {
        match self {
            Segment::Text { span, .. } | Segment::Action { span, .. } => span.clone(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Segment::Text { content, .. } => Some(content),
            Segment::Action { .. } => None,
        }
    }

    pub fn as_call(&self) -> Option<&ActionCall> {
        match self {
            Segment::Action { call, .. } => Some(call),
            Segment::Text { .. } => None,
        }
    }

    pub fn into_call(self) -> Option<ActionCall> {
        match self {
            Segment::Action { call, .. } => Some(call),
            Segment::Text { .. } => None,
        }
    }
}

struct OpenArgument<'v> {
    name: &'v str,
    close_tag: String,
    value_start: usize,
}

struct OpenAction<'v> {
    signature: &'v ActionSignature,
    start: usize,
    arguments: Arguments,
    argument: Option<OpenArgument<'v>>,
}

enum State<'v> {
    Outside,
    Inside(OpenAction<'v>),
}

/// Split `text` into text and action-call segments.
///
/// Segment spans are contiguous and cover the whole input. Unterminated
/// calls come back with `complete == false`.
pub fn parse(text: &str, vocabulary: &Vocabulary) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut state = State::Outside;
    // Start of the accumulation buffer `text[buffer_start..end]`
    let mut buffer_start = 0;

    for (offset, ch) in text.char_indices() {
        // Every delimiter ends in '>'
        if ch != '>' {
            continue;
        }
        let end = offset + 1;
        let buffer = &text[buffer_start..end];

        match &mut state {
            State::Outside => {
                let Some(signature) = vocabulary.iter().find(|s| buffer.ends_with(s.open_tag()))
                else {
                    continue;
                };
                let tag_start = end - signature.open_tag().len();
                if tag_start > buffer_start {
                    segments.push(Segment::Text {
                        content: text[buffer_start..tag_start].to_string(),
                        span: buffer_start..tag_start,
                    });
                }
                buffer_start = end;
                state = State::Inside(OpenAction {
                    signature,
                    start: tag_start,
                    arguments: Arguments::new(),
                    argument: None,
                });
            }
            State::Inside(open) => match &open.argument {
                Some(argument) => {
                    if buffer.ends_with(&argument.close_tag) {
                        let value_end = end - argument.close_tag.len();
                        let value = &text[argument.value_start..value_end];
                        open.arguments.insert(argument.name, value);
                        open.argument = None;
                    }
                }
                None => {
                    if buffer.ends_with(open.signature.close_tag()) {
                        let call = ActionCall {
                            name: open.signature.name().to_string(),
                            arguments: std::mem::take(&mut open.arguments),
                            complete: true,
                        };
                        segments.push(Segment::Action {
                            call,
                            span: open.start..end,
                        });
                        buffer_start = end;
                        state = State::Outside;
                        continue;
                    }

                    let opened = open
                        .signature
                        .arguments()
                        .find(|name| buffer.ends_with(&format!("<{}>", name)));
                    if let Some(name) = opened {
                        open.argument = Some(OpenArgument {
                            name,
                            close_tag: format!("</{}>", name),
                            value_start: end,
                        });
                    }
                }
            },
        }
    }

    match state {
        State::Inside(mut open) => {
            if let Some(argument) = open.argument.take() {
                open.arguments
                    .insert(argument.name, &text[argument.value_start..]);
            }
            segments.push(Segment::Action {
                call: ActionCall {
                    name: open.signature.name().to_string(),
                    arguments: open.arguments,
                    complete: false,
                },
                span: open.start..text.len(),
            });
        }
        State::Outside => {
            if buffer_start < text.len() {
                segments.push(Segment::Text {
                    content: text[buffer_start..].to_string(),
                    span: buffer_start..text.len(),
                });
            }
        }
    }

    segments
}
