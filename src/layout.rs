//! Record types and their fixed-width column layouts.
//!
//! Every layout renders a delimited record into columns joined by
//! [`FIELD_SEPARATOR`]; the columns already add up to the record length, the
//! final pad to `required_length` only guards against layout drift.

use std::fmt;

use serde::Serialize;

pub const FIELD_SEPARATOR: char = '!';

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    Fled,
    Immi,
    Punish,
    Unknown,
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RecordType::Fled => "Fled",
            RecordType::Immi => "Immi",
            RecordType::Punish => "Punish",
            RecordType::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

// Checked in order; the first marker found in the file name decides.
const NAME_MARKERS: [(&str, RecordType); 3] = [
    ("Punish-", RecordType::Punish),
    ("Fled-", RecordType::Fled),
    ("Immi-", RecordType::Immi),
];

/// Classifies a file by the record-type marker in its base name.
pub fn classify(file_name: &str) -> RecordType {
    NAME_MARKERS
        .iter()
        .find(|(marker, _)| file_name.contains(marker))
        .map(|(_, kind)| *kind)
        .unwrap_or(RecordType::Unknown)
}

impl RecordType {
    pub fn layout(self) -> Option<&'static RecordLayout> {
        match self {
            RecordType::Fled => Some(&FLED),
            RecordType::Immi => Some(&IMMI),
            RecordType::Punish => Some(&PUNISH),
            RecordType::Unknown => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Justify {
    Left,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    Literal(&'static str),
    /// `I` when source field 0 is exactly `I`, otherwise `U`.
    Discriminator,
    Field(usize),
    /// Rendered blank when the record is too short to carry it.
    OptionalField(usize),
    Blank,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Column {
    pub source: Source,
    pub width: usize,
    pub justify: Justify,
}

const fn left(source: Source, width: usize) -> Column {
    Column {
        source,
        width,
        justify: Justify::Left,
    }
}

const fn right(source: Source, width: usize) -> Column {
    Column {
        source,
        width,
        justify: Justify::Right,
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct RecordLayout {
    pub record_type: RecordType,
    pub required_length: usize,
    /// Source files of this type may use `|` instead of `!`.
    pub accepts_pipe: bool,
    pub columns: &'static [Column],
}

pub static FLED: RecordLayout = RecordLayout {
    record_type: RecordType::Fled,
    required_length: 120,
    accepts_pipe: false,
    columns: &[
        left(Source::Literal("I"), 1),
        left(Source::Field(1), 10),
        left(Source::Field(2), 50),
        left(Source::Field(3), 15),
        left(Source::Field(4), 3),
        right(Source::Field(5), 8),
        right(Source::Field(6), 1),
        right(Source::Field(7), 8),
        right(Source::OptionalField(8), 8),
        left(Source::Blank, 7),
    ],
};

pub static IMMI: RecordLayout = RecordLayout {
    record_type: RecordType::Immi,
    required_length: 110,
    accepts_pipe: true,
    columns: &[
        left(Source::Discriminator, 1),
        left(Source::Field(1), 10),
        left(Source::Blank, 50),
        left(Source::Field(3), 15),
        left(Source::Field(4), 3),
        right(Source::Field(5), 8),
        right(Source::Field(6), 1),
        right(Source::Field(7), 8),
        right(Source::Field(8), 1),
        left(Source::Blank, 4),
    ],
};

pub static PUNISH: RecordLayout = RecordLayout {
    record_type: RecordType::Punish,
    required_length: 120,
    accepts_pipe: false,
    columns: &[
        left(Source::Literal("U"), 1),
        left(Source::Field(1), 10),
        left(Source::Blank, 50),
        left(Source::Field(3), 15),
        left(Source::Field(4), 3),
        right(Source::Field(5), 8),
        right(Source::Field(6), 1),
        right(Source::Field(7), 8),
        right(Source::Field(8), 8),
        left(Source::Blank, 7),
    ],
};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum RenderError {
    #[error("record has {available} fields, {required} required (missing field {index})")]
    MissingField {
        index: usize,
        available: usize,
        required: usize,
    },
}

impl RecordLayout {
    /// Number of source fields a record must carry.
    pub fn required_fields(&self) -> usize {
        self.columns
            .iter()
            .filter_map(|column| match column.source {
                Source::Field(index) => Some(index + 1),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Renders one already-split record into a line of exactly `required_length` characters.
    pub fn render(&self, fields: &[&str]) -> Result<String, RenderError> {
        let mut rendered = Vec::with_capacity(self.columns.len());
        for column in self.columns {
            let value = match column.source {
                Source::Literal(text) => text,
                Source::Discriminator => {
                    if fields.first() == Some(&"I") {
                        "I"
                    } else {
                        "U"
                    }
                }
                Source::Field(index) => {
                    fields
                        .get(index)
                        .copied()
                        .ok_or_else(|| RenderError::MissingField {
                            index,
                            available: fields.len(),
                            required: self.required_fields(),
                        })?
                }
                Source::OptionalField(index) => fields.get(index).copied().unwrap_or(""),
                Source::Blank => "",
            };
            rendered.push(fit(value, column.width, column.justify));
        }

        let line = rendered.join(FIELD_SEPARATOR.to_string().as_str());
        Ok(fit(&line, self.required_length, Justify::Left))
    }
}

/// Pads `text` with spaces to `width` characters, or truncates it to its first `width`.
pub fn fit(text: &str, width: usize, justify: Justify) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.chars().take(width).collect();
    }
    let padding = " ".repeat(width - len);
    match justify {
        Justify::Left => format!("{text}{padding}"),
        Justify::Right => format!("{padding}{text}"),
    }
}
