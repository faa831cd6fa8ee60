//! Incremental tag parser
//!
//! A permissive state machine over `<name attr="value" ...> ... </name>`
//! markup, fed completion text fragments split at arbitrary boundaries.
//! Tag names and attribute keys are lowercased; attribute values keep their
//! case. A `<` that cannot start a tag is literal text, and an incomplete
//! trailing tag at stream end is flushed as literal text rather than
//! raising an error. Close tags are not checked against open-tag names;
//! scope matching is the agent's concern.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagEvent {
    Open {
        name: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
    Close {
        name: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Text,
    /// Consumed `<`, nothing decided yet
    TagOpen,
    OpenName,
    BeforeAttr,
    AttrName,
    AfterAttrName,
    BeforeValue,
    ValueDouble,
    ValueSingle,
    ValueBare,
    /// Consumed `/` inside an open tag, expecting `>`
    SelfClosing,
    /// Consumed `</`
    CloseStart,
    CloseName,
    CloseEnd,
}

/// Incremental, fragment-oriented tag parser.
#[derive(Debug)]
pub struct TagParser {
    state: State,
    /// Pending literal text, flushed at each fragment boundary
    text: String,
    /// Raw characters of the construct being parsed, for literal fallback
    raw: String,
    name: String,
    attr_name: String,
    attr_value: String,
    attributes: Vec<(String, String)>,
}

impl Default for TagParser {
    fn default() -> Self {
        Self::new()
    }
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.')
}

impl TagParser {
    pub fn new() -> Self {
        Self {
            state: State::Text,
            text: String::new(),
            raw: String::new(),
            name: String::new(),
            attr_name: String::new(),
            attr_value: String::new(),
            attributes: Vec::new(),
        }
    }

    /// Feed one fragment, returning the events it completes. Pending literal
    /// text is flushed at the end of each fragment so text streams through
    /// without waiting for the next tag.
    pub fn feed(&mut self, input: &str) -> Vec<TagEvent> {
        let mut events = Vec::new();
        for c in input.chars() {
            self.step(c, &mut events);
        }
        self.flush_text(&mut events);
        events
    }

    /// The completion stream has ended: an unfinished construct is literal
    /// text, not an error.
    pub fn finish(&mut self) -> Vec<TagEvent> {
        let mut events = Vec::new();
        if self.state != State::Text {
            self.fall_back_to_text();
        }
        self.flush_text(&mut events);
        events
    }

    fn step(&mut self, c: char, events: &mut Vec<TagEvent>) {
        if self.state == State::Text {
            if c == '<' {
                self.flush_text(events);
                self.raw.push('<');
                self.state = State::TagOpen;
            } else {
                self.text.push(c);
            }
            return;
        }
        self.raw.push(c);
        self.advance(c, events);
    }

    fn advance(&mut self, c: char, events: &mut Vec<TagEvent>) {
        match self.state {
            State::Text => unreachable!("handled in step"),
            State::TagOpen => {
                if c == '/' {
                    self.state = State::CloseStart;
                } else if is_name_start(c) {
                    self.name.clear();
                    self.name.extend(c.to_lowercase());
                    self.state = State::OpenName;
                } else if c == '<' {
                    // "<<" - the first `<` was literal, stay in TagOpen
                    self.text.push('<');
                    self.raw.clear();
                    self.raw.push('<');
                } else {
                    self.fall_back_to_text();
                }
            }
            State::OpenName => {
                if is_name_char(c) {
                    self.name.extend(c.to_lowercase());
                } else if c.is_whitespace() {
                    self.state = State::BeforeAttr;
                } else if c == '/' {
                    self.state = State::SelfClosing;
                } else if c == '>' {
                    self.emit_open(events);
                } else {
                    self.fall_back_to_text();
                }
            }
            State::BeforeAttr => {
                if c.is_whitespace() {
                    // skip
                } else if c == '>' {
                    self.emit_open(events);
                } else if c == '/' {
                    self.state = State::SelfClosing;
                } else if is_name_start(c) {
                    self.attr_name.clear();
                    self.attr_name.extend(c.to_lowercase());
                    self.state = State::AttrName;
                }
                // anything else inside a tag is ignored, permissively
            }
            State::AttrName => {
                if is_name_char(c) {
                    self.attr_name.extend(c.to_lowercase());
                } else if c == '=' {
                    self.state = State::BeforeValue;
                } else if c.is_whitespace() {
                    self.state = State::AfterAttrName;
                } else if c == '>' {
                    self.finish_attr_without_value();
                    self.emit_open(events);
                } else if c == '/' {
                    self.finish_attr_without_value();
                    self.state = State::SelfClosing;
                }
            }
            State::AfterAttrName => {
                if c.is_whitespace() {
                    // skip
                } else if c == '=' {
                    self.state = State::BeforeValue;
                } else if c == '>' {
                    self.finish_attr_without_value();
                    self.emit_open(events);
                } else if c == '/' {
                    self.finish_attr_without_value();
                    self.state = State::SelfClosing;
                } else if is_name_start(c) {
                    self.finish_attr_without_value();
                    self.attr_name.extend(c.to_lowercase());
                    self.state = State::AttrName;
                }
            }
            State::BeforeValue => {
                if c.is_whitespace() {
                    // skip
                } else if c == '"' {
                    self.state = State::ValueDouble;
                } else if c == '\'' {
                    self.state = State::ValueSingle;
                } else if c == '>' {
                    self.finish_attr_without_value();
                    self.emit_open(events);
                } else {
                    self.attr_value.push(c);
                    self.state = State::ValueBare;
                }
            }
            State::ValueDouble => {
                if c == '"' {
                    self.finish_attr();
                    self.state = State::BeforeAttr;
                } else {
                    self.attr_value.push(c);
                }
            }
            State::ValueSingle => {
                if c == '\'' {
                    self.finish_attr();
                    self.state = State::BeforeAttr;
                } else {
                    self.attr_value.push(c);
                }
            }
            State::ValueBare => {
                if c.is_whitespace() {
                    self.finish_attr();
                    self.state = State::BeforeAttr;
                } else if c == '>' {
                    self.finish_attr();
                    self.emit_open(events);
                } else {
                    self.attr_value.push(c);
                }
            }
            State::SelfClosing => {
                if c == '>' {
                    let name = self.name.clone();
                    self.emit_open(events);
                    events.push(TagEvent::Close { name });
                } else {
                    // stray '/': reprocess as part of the open tag
                    self.state = State::BeforeAttr;
                    self.advance(c, events);
                }
            }
            State::CloseStart => {
                if is_name_start(c) {
                    self.name.clear();
                    self.name.extend(c.to_lowercase());
                    self.state = State::CloseName;
                } else if c == '>' {
                    self.emit_close(events);
                } else {
                    self.fall_back_to_text();
                }
            }
            State::CloseName => {
                if is_name_char(c) {
                    self.name.extend(c.to_lowercase());
                } else if c.is_whitespace() {
                    self.state = State::CloseEnd;
                } else if c == '>' {
                    self.emit_close(events);
                } else {
                    self.fall_back_to_text();
                }
            }
            State::CloseEnd => {
                if c == '>' {
                    self.emit_close(events);
                }
                // skip everything else between the close name and '>'
            }
        }
    }

    fn emit_open(&mut self, events: &mut Vec<TagEvent>) {
        self.flush_text(events);
        events.push(TagEvent::Open {
            name: std::mem::take(&mut self.name),
            attributes: std::mem::take(&mut self.attributes),
        });
        self.reset_tag();
    }

    fn emit_close(&mut self, events: &mut Vec<TagEvent>) {
        self.flush_text(events);
        events.push(TagEvent::Close {
            name: std::mem::take(&mut self.name),
        });
        self.reset_tag();
    }

    fn finish_attr(&mut self) {
        self.attributes
            .push((std::mem::take(&mut self.attr_name), std::mem::take(&mut self.attr_value)));
    }

    fn finish_attr_without_value(&mut self) {
        if !self.attr_name.is_empty() {
            self.attributes.push((std::mem::take(&mut self.attr_name), String::new()));
        }
        self.attr_value.clear();
    }

    /// Whatever looked like a tag was not one: replay its raw characters as
    /// literal text.
    fn fall_back_to_text(&mut self) {
        self.text.push_str(&self.raw);
        self.reset_tag();
    }

    fn reset_tag(&mut self) {
        self.raw.clear();
        self.name.clear();
        self.attr_name.clear();
        self.attr_value.clear();
        self.attributes.clear();
        self.state = State::Text;
    }

    fn flush_text(&mut self, events: &mut Vec<TagEvent>) {
        if !self.text.is_empty() {
            events.push(TagEvent::Text(std::mem::take(&mut self.text)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(name: &str, attributes: &[(&str, &str)]) -> TagEvent {
        TagEvent::Open {
            name: name.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn text(t: &str) -> TagEvent {
        TagEvent::Text(t.to_string())
    }

    fn close(name: &str) -> TagEvent {
        TagEvent::Close {
            name: name.to_string(),
        }
    }

    /// Feed everything in one fragment and append finish events.
    fn parse_all(input: &str) -> Vec<TagEvent> {
        let mut parser = TagParser::new();
        let mut events = parser.feed(input);
        events.extend(parser.finish());
        events
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(parse_all("hello world"), vec![text("hello world")]);
    }

    #[test]
    fn test_simple_tag_pair() {
        assert_eq!(
            parse_all("a<t>b</t>c"),
            vec![text("a"), open("t", &[]), text("b"), close("t"), text("c")]
        );
    }

    #[test]
    fn test_attributes_double_and_single_quoted() {
        assert_eq!(
            parse_all(r#"<step name="One" mode='fast'>x</step>"#),
            vec![
                open("step", &[("name", "One"), ("mode", "fast")]),
                text("x"),
                close("step")
            ]
        );
    }

    #[test]
    fn test_bare_attribute_value() {
        assert_eq!(parse_all("<t n=3>"), vec![open("t", &[("n", "3")])]);
    }

    #[test]
    fn test_valueless_attribute() {
        assert_eq!(parse_all("<t verbose>"), vec![open("t", &[("verbose", "")])]);
    }

    #[test]
    fn test_names_and_keys_lowercased_values_kept() {
        assert_eq!(
            parse_all(r#"<Greet Name="World">"#),
            vec![open("greet", &[("name", "World")])]
        );
        assert_eq!(parse_all("</GREET>"), vec![close("greet")]);
    }

    #[test]
    fn test_self_closing_tag_emits_open_and_close() {
        assert_eq!(
            parse_all(r#"<ping target="x"/>"#),
            vec![open("ping", &[("target", "x")]), close("ping")]
        );
    }

    #[test]
    fn test_tag_split_across_fragments() {
        let mut parser = TagParser::new();
        assert_eq!(parser.feed("before <gre"), vec![text("before ")]);
        assert_eq!(parser.feed("et name=\"Wor"), vec![]);
        assert_eq!(
            parser.feed("ld\">after"),
            vec![open("greet", &[("name", "World")]), text("after")]
        );
        assert_eq!(parser.finish(), vec![]);
    }

    #[test]
    fn test_text_streams_per_fragment() {
        let mut parser = TagParser::new();
        assert_eq!(parser.feed("Hel"), vec![text("Hel")]);
        assert_eq!(parser.feed("lo"), vec![text("lo")]);
    }

    #[test]
    fn test_stray_angle_bracket_is_text() {
        assert_eq!(parse_all("a < b"), vec![text("a "), text("< b")]);
        assert_eq!(parse_all("1 <2"), vec![text("1 "), text("<2")]);
    }

    #[test]
    fn test_double_angle_bracket() {
        assert_eq!(parse_all("<<t>"), vec![text("<"), open("t", &[])]);
    }

    #[test]
    fn test_incomplete_tag_at_finish_is_text() {
        let mut parser = TagParser::new();
        assert_eq!(parser.feed("tail <unfin attr=\"x"), vec![text("tail ")]);
        assert_eq!(parser.finish(), vec![text("<unfin attr=\"x")]);
    }

    #[test]
    fn test_nested_tags() {
        assert_eq!(
            parse_all("<a>1<b>2</b>3</a>"),
            vec![
                open("a", &[]),
                text("1"),
                open("b", &[]),
                text("2"),
                close("b"),
                text("3"),
                close("a")
            ]
        );
    }

    #[test]
    fn test_close_tag_with_trailing_whitespace() {
        assert_eq!(parse_all("</t  >"), vec![close("t")]);
    }

    #[test]
    fn test_whitespace_heavy_open_tag() {
        assert_eq!(
            parse_all("<t  a = \"1\"   b='2' >"),
            vec![open("t", &[("a", "1"), ("b", "2")])]
        );
    }

    #[test]
    fn test_parser_reusable_after_fallback() {
        let mut parser = TagParser::new();
        let mut events = parser.feed("<1 then <ok>");
        events.extend(parser.finish());
        assert_eq!(events, vec![text("<1 then "), open("ok", &[])]);
    }
}
