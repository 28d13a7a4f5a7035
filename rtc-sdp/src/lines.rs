//! Line-level view of a session description body.
//!
//! A body is split into an ordered list of sections: the session-level
//! section first (possibly empty), then one section per `m=` line. Every line
//! remembers its own terminator so that [`SdpDocument::marshal`] reproduces
//! the input byte for byte, including bodies that mix `\r\n` and `\n` or that
//! end without a terminator.

use std::fmt;

const MEDIA_LINE_TYPE: char = 'm';
const CONNECTION_LINE_PREFIX: &str = "c=IN ";

/// Terminator that followed a line in the original body.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum LineEnding {
    #[default]
    Crlf,
    Lf,
    /// Last line of a body that does not end with a terminator.
    None,
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Crlf => "\r\n",
            LineEnding::Lf => "\n",
            LineEnding::None => "",
        }
    }
}

/// One `<type>=<value>` line. Lines that do not follow that shape are kept
/// verbatim and report no type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdpLine {
    pub text: String,
    pub ending: LineEnding,
}

impl SdpLine {
    pub fn new(text: impl Into<String>, ending: LineEnding) -> Self {
        SdpLine {
            text: text.into(),
            ending,
        }
    }

    /// Type letter of the line, `Some('b')` for `b=AS:500`.
    pub fn typ(&self) -> Option<char> {
        let mut chars = self.text.chars();
        match (chars.next(), chars.next()) {
            (Some(typ), Some('=')) => Some(typ),
            _ => None,
        }
    }

    /// Everything after `<type>=`, or the whole text for untyped lines.
    pub fn value(&self) -> &str {
        match self.typ() {
            Some(typ) => &self.text[typ.len_utf8() + 1..],
            None => &self.text,
        }
    }

    pub fn is_connection(&self) -> bool {
        self.text.starts_with(CONNECTION_LINE_PREFIX)
    }
}

impl fmt::Display for SdpLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.text, self.ending.as_str())
    }
}

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct SdpSection {
    pub lines: Vec<SdpLine>,
}

impl SdpSection {
    /// Whether this section was opened by an `m=` line.
    pub fn is_media(&self) -> bool {
        self.lines
            .first()
            .is_some_and(|line| line.typ() == Some(MEDIA_LINE_TYPE))
    }

    /// Media kind of the section (`video` for `m=video 9 ...`).
    pub fn media_kind(&self) -> Option<&str> {
        if !self.is_media() {
            return None;
        }
        self.lines
            .first()
            .and_then(|line| line.value().split_whitespace().next())
    }

    pub fn connection_index(&self) -> Option<usize> {
        self.lines.iter().position(SdpLine::is_connection)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdpDocument {
    pub sections: Vec<SdpSection>,
}

impl Default for SdpDocument {
    fn default() -> Self {
        SdpDocument {
            sections: vec![SdpSection::default()],
        }
    }
}

impl SdpDocument {
    pub fn parse(body: &str) -> Self {
        let mut doc = SdpDocument::default();

        for raw in body.split_inclusive('\n') {
            let line = if let Some(text) = raw.strip_suffix("\r\n") {
                SdpLine::new(text, LineEnding::Crlf)
            } else if let Some(text) = raw.strip_suffix('\n') {
                SdpLine::new(text, LineEnding::Lf)
            } else {
                SdpLine::new(raw, LineEnding::None)
            };

            if line.typ() == Some(MEDIA_LINE_TYPE) {
                doc.sections.push(SdpSection::default());
            }
            if let Some(section) = doc.sections.last_mut() {
                section.lines.push(line);
            }
        }

        doc
    }

    pub fn marshal(&self) -> String {
        let mut out = String::new();
        for line in self.lines() {
            out.push_str(&line.text);
            out.push_str(line.ending.as_str());
        }
        out
    }

    pub fn lines(&self) -> impl Iterator<Item = &SdpLine> {
        self.sections.iter().flat_map(|section| section.lines.iter())
    }

    pub fn media_sections(&self) -> impl Iterator<Item = &SdpSection> {
        self.sections.iter().filter(|section| section.is_media())
    }

    /// Location `(section, line)` of the first line matching `predicate`.
    pub fn position<P>(&self, mut predicate: P) -> Option<(usize, usize)>
    where
        P: FnMut(&SdpLine) -> bool,
    {
        self.sections
            .iter()
            .enumerate()
            .find_map(|(s, section)| section.lines.iter().position(&mut predicate).map(|l| (s, l)))
    }

    pub fn line_mut(&mut self, (s, l): (usize, usize)) -> Option<&mut SdpLine> {
        self.sections.get_mut(s).and_then(|section| section.lines.get_mut(l))
    }

    /// Terminator used by the body around `(s, l)`: the closest terminated
    /// line at or before it, else the first terminated line of the body,
    /// else `\r\n`.
    pub fn ending_near(&self, (s, l): (usize, usize)) -> LineEnding {
        let terminated = |line: &&SdpLine| line.ending != LineEnding::None;
        let before = self
            .sections
            .iter()
            .take(s + 1)
            .enumerate()
            .flat_map(|(i, section)| {
                let end = if i == s { l + 1 } else { section.lines.len() };
                section.lines.iter().take(end)
            })
            .filter(terminated)
            .last();

        before
            .or_else(|| self.lines().find(terminated))
            .map(|line| line.ending)
            .unwrap_or_default()
    }

    /// Inserts `line` right after the line at `(s, l)`.
    ///
    /// When the anchor is the unterminated last line, the anchor takes over
    /// the body's own terminator (see [`SdpDocument::ending_near`]) and the
    /// inserted line becomes the unterminated one.
    pub fn insert_after(&mut self, (s, l): (usize, usize), mut line: SdpLine) -> bool {
        let ending = self.ending_near((s, l));
        let Some(section) = self.sections.get_mut(s) else {
            return false;
        };
        let Some(anchor) = section.lines.get_mut(l) else {
            return false;
        };

        if anchor.ending == LineEnding::None {
            anchor.ending = ending;
            line.ending = LineEnding::None;
        } else {
            line.ending = anchor.ending;
        }
        section.lines.insert(l + 1, line);
        true
    }

    /// Drops every line matching `predicate`, returns how many were removed.
    pub fn retain<P>(&mut self, mut predicate: P) -> usize
    where
        P: FnMut(&SdpLine) -> bool,
    {
        let mut removed = 0;
        for section in &mut self.sections {
            let before = section.lines.len();
            section.lines.retain(&mut predicate);
            removed += before - section.lines.len();
        }
        removed
    }
}
