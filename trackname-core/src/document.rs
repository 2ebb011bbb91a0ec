//! Scanning and patching of the score document embedded in a container.
//!
//! The document is never turned into a tree. A single tokenizer pass records,
//! for every `Part` element, its `id` and the byte range holding the text of
//! its `trackName` child. Rewriting splices new text into those ranges, so the
//! remaining bytes of the document come through exactly as they were read.

use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

use log::warn;
use xmlparser::{ElementEnd, Token, Tokenizer};

use crate::error::DocumentError;

pub const PART_TAG: &str = "Part";
pub const TRACK_NAME_TAG: &str = "trackName";
pub const ID_ATTRIBUTE: &str = "id";

const BOM: char = '\u{feff}';

/// Location of a `trackName` element inside the document text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextSlot {
    /// Byte range replaced on rewrite. For `<trackName>..</trackName>` this is
    /// the content between the tags; for `<trackName/>` it is the whole element.
    pub range: Range<usize>,
    /// Unescaped text content.
    pub text: String,
    pub self_closing: bool,
}

/// One `Part` element as found by [`scan_parts`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartNode {
    pub id: Option<String>,
    pub track_name: Option<TextSlot>,
    /// Offset just past the `Part` start tag. `None` for `<Part/>`.
    pub body_start: Option<usize>,
}

struct OpenTrackName {
    part: usize,
    depth: usize,
    content_start: usize,
    text: String,
}

/// Find every `Part` element in document order.
pub fn scan_parts(text: &str) -> Result<Vec<PartNode>, DocumentError> {
    let mut parts: Vec<PartNode> = Vec::new();
    // (index into `parts`, depth of the Part element in `stack`)
    let mut open_parts: Vec<(usize, usize)> = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut pending: Option<(String, usize)> = None;
    let mut pending_part: Option<usize> = None;
    let mut open_track: Option<OpenTrackName> = None;
    let mut saw_root = false;

    for token in Tokenizer::from(text) {
        match token? {
            Token::ElementStart { prefix, local, span } => {
                pending = Some((qualified(prefix.as_str(), local.as_str()), span.start()));
                pending_part = None;
                if local.as_str() == PART_TAG {
                    parts.push(PartNode {
                        id: None,
                        track_name: None,
                        body_start: None,
                    });
                    pending_part = Some(parts.len() - 1);
                }
            }
            Token::Attribute { local, value, .. } => {
                if let Some(idx) = pending_part {
                    if local.as_str() == ID_ATTRIBUTE {
                        parts[idx].id = Some(unescape(value.as_str()));
                    }
                }
            }
            Token::ElementEnd { end, span } => match end {
                ElementEnd::Open => {
                    let Some((name, _)) = pending.take() else {
                        continue;
                    };
                    saw_root = true;
                    if let Some(idx) = pending_part.take() {
                        parts[idx].body_start = Some(span.end());
                        open_parts.push((idx, stack.len()));
                    } else if name == TRACK_NAME_TAG && open_track.is_none() {
                        if let Some(part) = direct_parent_part(&open_parts, &parts, stack.len()) {
                            open_track = Some(OpenTrackName {
                                part,
                                depth: stack.len(),
                                content_start: span.end(),
                                text: String::new(),
                            });
                        }
                    }
                    stack.push(name);
                }
                ElementEnd::Empty => {
                    let Some((name, start)) = pending.take() else {
                        continue;
                    };
                    saw_root = true;
                    if pending_part.take().is_some() {
                        continue;
                    }
                    if name == TRACK_NAME_TAG && open_track.is_none() {
                        if let Some(part) = direct_parent_part(&open_parts, &parts, stack.len()) {
                            parts[part].track_name = Some(TextSlot {
                                range: start..span.end(),
                                text: String::new(),
                                self_closing: true,
                            });
                        }
                    }
                }
                ElementEnd::Close(prefix, local) => {
                    let found = qualified(prefix.as_str(), local.as_str());
                    let expected = stack.pop().ok_or_else(|| DocumentError::UnexpectedClose {
                        found: found.clone(),
                        position: span.start(),
                    })?;
                    if expected != found {
                        return Err(DocumentError::MismatchedTag {
                            expected,
                            found,
                            position: span.start(),
                        });
                    }

                    if open_track.as_ref().is_some_and(|t| t.depth == stack.len()) {
                        if let Some(track) = open_track.take() {
                            parts[track.part].track_name = Some(TextSlot {
                                range: track.content_start..span.start(),
                                text: track.text,
                                self_closing: false,
                            });
                        }
                    }
                    if open_parts.last().is_some_and(|&(_, depth)| depth == stack.len()) {
                        open_parts.pop();
                    }
                }
            },
            Token::Text { text: chunk } => {
                if let Some(track) = open_track.as_mut() {
                    if stack.len() == track.depth + 1 {
                        track.text.push_str(&unescape(chunk.as_str()));
                    }
                }
            }
            Token::Cdata { text: chunk, .. } => {
                if let Some(track) = open_track.as_mut() {
                    if stack.len() == track.depth + 1 {
                        track.text.push_str(chunk.as_str());
                    }
                }
            }
            _ => {}
        }
    }

    if let Some(name) = stack.pop() {
        return Err(DocumentError::Unclosed(name));
    }
    if !saw_root {
        return Err(DocumentError::NoRoot);
    }

    Ok(parts)
}

/// Index of the innermost open `Part` if an element starting at `depth` is its
/// direct child and the part has no `trackName` yet.
fn direct_parent_part(open_parts: &[(usize, usize)], parts: &[PartNode], depth: usize) -> Option<usize> {
    let &(idx, part_depth) = open_parts.last()?;
    (part_depth + 1 == depth && parts[idx].track_name.is_none()).then_some(idx)
}

fn qualified(prefix: &str, local: &str) -> String {
    if prefix.is_empty() {
        local.to_string()
    } else {
        format!("{prefix}:{local}")
    }
}

/// New names for [`rewrite_track_names`] and how they find their `Part`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Renames {
    /// Keyed by the index of the part in document order.
    ByPosition(BTreeMap<usize, String>),
    /// Keyed by `id` attribute. Parts without an id never match.
    ById(HashMap<String, String>),
}

impl Renames {
    pub fn is_empty(&self) -> bool {
        match self {
            Renames::ByPosition(names) => names.is_empty(),
            Renames::ById(names) => names.is_empty(),
        }
    }

    fn lookup(&self, position: usize, id: Option<&str>) -> Option<&str> {
        match self {
            Renames::ByPosition(names) => names.get(&position),
            Renames::ById(names) => id.and_then(|id| names.get(id)),
        }
        .map(String::as_str)
    }
}

/// Result of [`rewrite_track_names`].
#[derive(Debug)]
pub struct Rewrite {
    pub text: String,
    /// `id` of every part in document order.
    pub ids: Vec<Option<String>>,
    /// Positions of the parts whose `trackName` was written.
    pub written: Vec<usize>,
    /// Positions of matched parts that lack a `trackName` and were left alone.
    pub skipped: Vec<usize>,
}

/// Replace the `trackName` text of every part matched by `renames`.
///
/// With `create_missing`, a part that has no `trackName` child gets one
/// inserted directly after its start tag.
pub fn rewrite_track_names(
    text: &str,
    renames: &Renames,
    create_missing: bool,
) -> Result<Rewrite, DocumentError> {
    let (bom, body) = match text.strip_prefix(BOM) {
        Some(rest) => (&text[..BOM.len_utf8()], rest),
        None => ("", text),
    };

    let parts = scan_parts(body)?;
    let mut edits: Vec<(Range<usize>, String)> = Vec::new();
    let mut ids = Vec::with_capacity(parts.len());
    let mut written = Vec::new();
    let mut skipped = Vec::new();

    for (position, part) in parts.into_iter().enumerate() {
        let name = renames.lookup(position, part.id.as_deref());
        ids.push(part.id);
        let Some(name) = name else { continue };

        match (part.track_name, part.body_start) {
            (Some(slot), _) if slot.self_closing => {
                edits.push((slot.range, track_name_element(name)));
                written.push(position);
            }
            (Some(slot), _) => {
                edits.push((slot.range, escape_text(name)));
                written.push(position);
            }
            (None, Some(at)) if create_missing => {
                edits.push((at..at, track_name_element(name)));
                written.push(position);
            }
            _ => {
                warn!(
                    "part #{} has no {TRACK_NAME_TAG} element; leaving it unchanged",
                    position + 1
                );
                skipped.push(position);
            }
        }
    }

    edits.sort_by_key(|(range, _)| range.start);

    let mut out = String::with_capacity(text.len() + 64);
    out.push_str(bom);
    let mut cursor = 0;
    for (range, replacement) in edits {
        out.push_str(&body[cursor..range.start]);
        out.push_str(&replacement);
        cursor = range.end;
    }
    out.push_str(&body[cursor..]);

    Ok(Rewrite {
        text: out,
        ids,
        written,
        skipped,
    })
}

/// Strip a leading byte order mark before handing text to [`scan_parts`].
pub fn without_bom(text: &str) -> &str {
    text.strip_prefix(BOM).unwrap_or(text)
}

fn track_name_element(name: &str) -> String {
    format!("<{TRACK_NAME_TAG}>{}</{TRACK_NAME_TAG}>", escape_text(name))
}

/// Escape character data for use as element text.
pub fn escape_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Resolve the predefined entities and character references in `raw`.
/// Unknown references are kept verbatim.
pub fn unescape(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let resolved = rest.find(';').and_then(|semi| {
            let c = match &rest[1..semi] {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "amp" => Some('&'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                reference => reference
                    .strip_prefix("#x")
                    .map(|hex| u32::from_str_radix(hex, 16))
                    .or_else(|| reference.strip_prefix('#').map(str::parse::<u32>))
                    .and_then(Result::ok)
                    .and_then(char::from_u32),
            };
            c.map(|c| (c, semi))
        });

        match resolved {
            Some((c, semi)) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCORE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<museScore version="4.20">
  <Score>
    <Part id="1">
      <Staff id="1"/>
      <trackName>Flute</trackName>
      <Instrument id="flute">
        <trackName>Inner</trackName>
      </Instrument>
    </Part>
    <Part id="2">
      <trackName>Oboe &amp; Cor</trackName>
    </Part>
    <Part id="3">
      <Staff id="2"/>
    </Part>
    <Part>
      <trackName/>
    </Part>
  </Score>
</museScore>
"#;

    fn by_id(pairs: &[(&str, &str)]) -> Renames {
        Renames::ById(
            pairs
                .iter()
                .map(|(id, name)| (id.to_string(), name.to_string()))
                .collect(),
        )
    }

    fn by_position(pairs: &[(usize, &str)]) -> Renames {
        Renames::ByPosition(
            pairs
                .iter()
                .map(|(position, name)| (*position, name.to_string()))
                .collect(),
        )
    }

    #[test]
    fn scan_finds_parts_in_document_order() {
        let parts = scan_parts(SCORE).unwrap();
        assert_eq!(parts.len(), 4);

        assert_eq!(parts[0].id.as_deref(), Some("1"));
        assert_eq!(parts[0].track_name.as_ref().unwrap().text, "Flute");
        assert_eq!(parts[1].track_name.as_ref().unwrap().text, "Oboe & Cor");
        assert!(parts[2].track_name.is_none());
        assert!(parts[2].body_start.is_some());
        assert_eq!(parts[3].id, None);
        assert!(parts[3].track_name.as_ref().unwrap().self_closing);
    }

    #[test]
    fn nested_track_name_is_not_the_part_name() {
        let parts = scan_parts(SCORE).unwrap();
        let slot = parts[0].track_name.as_ref().unwrap();
        assert_eq!(&SCORE[slot.range.clone()], "Flute");
    }

    #[test]
    fn rewrite_only_touches_requested_parts() {
        let out = rewrite_track_names(SCORE, &by_id(&[("2", "Oboe <solo>")]), false).unwrap();
        assert_eq!(out.written, vec![1]);
        assert_eq!(
            out.text,
            SCORE.replace("Oboe &amp; Cor", "Oboe &lt;solo&gt;")
        );
    }

    #[test]
    fn missing_track_name_is_left_alone_by_default() {
        let out = rewrite_track_names(SCORE, &by_id(&[("3", "Clarinet")]), false).unwrap();
        assert!(out.written.is_empty());
        assert_eq!(out.skipped, vec![2]);
        assert_eq!(out.text, SCORE);
    }

    #[test]
    fn missing_track_name_can_be_created() {
        let out = rewrite_track_names(SCORE, &by_id(&[("3", "Clarinet")]), true).unwrap();
        assert_eq!(out.written, vec![2]);

        let parts = scan_parts(&out.text).unwrap();
        assert_eq!(parts[2].track_name.as_ref().unwrap().text, "Clarinet");
        assert_eq!(parts[0].track_name.as_ref().unwrap().text, "Flute");
    }

    #[test]
    fn self_closing_track_name_is_expanded() {
        let doc = r#"<score><Part id="9"><trackName/></Part></score>"#;
        let out = rewrite_track_names(doc, &by_id(&[("9", "Harp")]), false).unwrap();
        assert_eq!(
            out.text,
            r#"<score><Part id="9"><trackName>Harp</trackName></Part></score>"#
        );
    }

    #[test]
    fn byte_order_mark_survives_rewrite() {
        let doc = "\u{feff}<score><Part id=\"1\"><trackName>A</trackName></Part></score>";
        let out = rewrite_track_names(doc, &by_position(&[(0, "B")]), false).unwrap();
        assert_eq!(
            out.text,
            "\u{feff}<score><Part id=\"1\"><trackName>B</trackName></Part></score>"
        );
    }

    #[test]
    fn positions_reach_parts_without_an_id() {
        let out = rewrite_track_names(SCORE, &by_position(&[(3, "Harp")]), false).unwrap();
        assert_eq!(out.written, vec![3]);
        assert_eq!(out.ids[3], None);
        assert_eq!(scan_parts(&out.text).unwrap()[3].track_name.as_ref().unwrap().text, "Harp");

        let by_unknown = rewrite_track_names(SCORE, &by_id(&[("Unknown", "Harp")]), false).unwrap();
        assert!(by_unknown.written.is_empty());
    }

    #[test]
    fn shared_ids_take_separate_names_by_position() {
        let doc = r#"<s><Part id="1"><trackName>Vn</trackName></Part><Part id="1"><trackName>Vn</trackName></Part></s>"#;
        let out = rewrite_track_names(doc, &by_position(&[(0, "Vn 1"), (1, "Vn 2")]), false).unwrap();
        let names: Vec<_> = scan_parts(&out.text)
            .unwrap()
            .into_iter()
            .map(|p| p.track_name.unwrap().text)
            .collect();
        assert_eq!(names, ["Vn 1", "Vn 2"]);
    }

    #[test]
    fn mismatched_tags_are_rejected() {
        let err = scan_parts("<score><Part></score></Part>").unwrap_err();
        assert!(matches!(err, DocumentError::MismatchedTag { .. }));
    }

    #[test]
    fn unclosed_root_is_rejected() {
        assert!(scan_parts("<score><Part id=\"1\">").is_err());
    }

    #[test]
    fn unescape_handles_references() {
        assert_eq!(unescape("a &lt;b&gt; &#65;&#x42; &bogus; &"), "a <b> AB &bogus; &");
        assert_eq!(escape_text("R&B <live>"), "R&amp;B &lt;live&gt;");
    }
}
