// Ravello Ansible
// Copyright (C) Riff Labs Limited <team@riff.cc>
// Based on Jetporch by Michael DeHaan <michael@michaeldehaan.net> + contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// long with this program.  If not, see <http://www.gnu.org/licenses/>.

use std::fmt;
use std::str::FromStr;
use crate::error::PathError;

/// One step of a path: a mapping key or a sequence position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl Segment {
    /// The key spelling of this segment. An index used against a mapping
    /// addresses the key made of its digits.
    pub fn as_key(&self) -> String {
        match self {
            Segment::Key(k) => k.clone(),
            Segment::Index(i) => i.to_string(),
        }
    }
}

/// A parsed dotted path such as `design.vms.0.name`.
///
/// `\.` puts a literal dot inside a key and `\\` a literal backslash. A
/// segment made only of ASCII digits is an index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        if raw.is_empty() {
            return Err(PathError::Invalid { path: raw.to_string() });
        }

        let mut pieces: Vec<(String, bool)> = Vec::new();
        let mut current = String::new();
        // a piece that held an escape is always a key, even if all digits remain
        let mut escaped = false;
        let mut chars = raw.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some(next) => {
                        current.push(next);
                        escaped = true;
                    }
                    None => current.push('\\'),
                },
                '.' => {
                    pieces.push((std::mem::take(&mut current), escaped));
                    escaped = false;
                }
                _ => current.push(c),
            }
        }
        pieces.push((current, escaped));

        let segments = pieces
            .into_iter()
            .map(|(piece, escaped)| Self::classify(piece, escaped))
            .collect();
        Ok(Self { segments })
    }

    fn classify(piece: String, escaped: bool) -> Segment {
        if !escaped && !piece.is_empty() && piece.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = piece.parse::<usize>() {
                return Segment::Index(index);
            }
        }
        Segment::Key(piece)
    }

    pub fn from_segments(segments: Vec<Segment>) -> Result<Self, PathError> {
        if segments.is_empty() {
            return Err(PathError::Invalid { path: String::new() });
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    pub fn child_key(&self, key: &str) -> Path {
        let mut segments = self.segments.clone();
        segments.push(Segment::Key(key.to_string()));
        Path { segments }
    }

    pub fn child_index(&self, index: usize) -> Path {
        let mut segments = self.segments.clone();
        segments.push(Segment::Index(index));
        Path { segments }
    }

    /// Append every segment of a relative dotted path, e.g.
    /// `switch.join("networkSegments.0.id")`.
    pub fn join(&self, rest: &str) -> Result<Path, PathError> {
        let tail = Path::parse(rest)?;
        let mut segments = self.segments.clone();
        segments.extend(tail.segments);
        Ok(Path { segments })
    }
}

fn escape_key(key: &str) -> String {
    let escaped = key.replace('\\', "\\\\").replace('.', "\\.");
    // an all-digit key must not read back as an index
    if !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()) {
        return format!("\\{}", escaped);
    }
    escaped
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .segments
            .iter()
            .map(|segment| match segment {
                Segment::Index(i) => i.to_string(),
                Segment::Key(k) => escape_key(k),
            })
            .collect();
        write!(f, "{}", rendered.join("."))
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

/// Anything the accessor functions accept as a path.
pub trait IntoPath {
    fn into_path(self) -> Result<Path, PathError>;
}

impl IntoPath for Path {
    fn into_path(self) -> Result<Path, PathError> {
        Ok(self)
    }
}

impl IntoPath for &Path {
    fn into_path(self) -> Result<Path, PathError> {
        Ok(self.clone())
    }
}

impl IntoPath for &str {
    fn into_path(self) -> Result<Path, PathError> {
        Path::parse(self)
    }
}

impl IntoPath for String {
    fn into_path(self) -> Result<Path, PathError> {
        Path::parse(&self)
    }
}

impl IntoPath for &String {
    fn into_path(self) -> Result<Path, PathError> {
        Path::parse(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keys_and_indexes() {
        let path = Path::parse("design.vms.0.name").unwrap();
        assert_eq!(
            path.segments(),
            &[
                Segment::Key(String::from("design")),
                Segment::Key(String::from("vms")),
                Segment::Index(0),
                Segment::Key(String::from("name")),
            ]
        );
    }

    #[test]
    fn test_escaped_dot_stays_in_key() {
        let path = Path::parse("a\\.b.c").unwrap();
        assert_eq!(path.segments(), &[Segment::Key(String::from("a.b")), Segment::Key(String::from("c"))]);
        assert_eq!(path.to_string(), "a\\.b.c");
    }

    #[test]
    fn test_escaped_backslash() {
        let path = Path::parse("a\\\\.b").unwrap();
        assert_eq!(path.segments(), &[Segment::Key(String::from("a\\")), Segment::Key(String::from("b"))]);
        assert_eq!(path.to_string(), "a\\\\.b");
    }

    #[test]
    fn test_escaped_digits_stay_a_key() {
        let path = Path::parse("ports.\\1").unwrap();
        assert_eq!(path.segments()[1], Segment::Key(String::from("1")));
        assert_eq!(Path::parse(&path.to_string()).unwrap(), path);
    }

    #[test]
    fn test_empty_path_is_invalid() {
        assert_eq!(Path::parse(""), Err(PathError::Invalid { path: String::new() }));
    }

    #[test]
    fn test_empty_segments_are_keys() {
        let path = Path::parse("a..b").unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path.segments()[1], Segment::Key(String::new()));
    }

    #[test]
    fn test_children_and_join() {
        let base = Path::parse("design.network.switches").unwrap();
        let switch = base.child_index(2);
        assert_eq!(switch.to_string(), "design.network.switches.2");
        assert_eq!(switch.child_key("ports").to_string(), "design.network.switches.2.ports");
        assert_eq!(switch.join("networkSegments.0.id").unwrap().to_string(),
            "design.network.switches.2.networkSegments.0.id");
    }
}
