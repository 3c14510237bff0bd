use std::{fmt, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize};

/// Backends disagree on whether ids are JSON numbers or strings; both decode
/// to the same string form.
#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Int(i64),
    Float(f64),
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(value) => value,
        StringOrNumber::Int(value) => value.to_string(),
        StringOrNumber::Float(value) => value.to_string(),
    })
}

fn lenient_points<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::Int(value) => i32::try_from(value).map_err(de::Error::custom),
        StringOrNumber::Float(value) if value.fract() == 0.0 => {
            i32::try_from(value as i64).map_err(de::Error::custom)
        }
        StringOrNumber::Float(value) => Err(de::Error::custom(format!(
            "item_point must be an integer, got {value}"
        ))),
        StringOrNumber::String(value) => value
            .trim()
            .parse::<i32>()
            .map_err(|err| de::Error::custom(format!("invalid item_point {value:?}: {err}"))),
    }
}

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                lenient_string(deserializer).map(Self)
            }
        }
    };
}

id_newtype!(BranchId);
id_newtype!(StudentId);
id_newtype!(DisciplineItemId);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub student_id: StudentId,
    #[serde(alias = "student_name")]
    pub name: String,
    #[serde(default, alias = "classroom")]
    pub classroom_name: Option<String>,
}

impl Student {
    pub fn new(
        student_id: impl Into<String>,
        name: impl Into<String>,
        classroom_name: Option<&str>,
    ) -> Self {
        Self {
            student_id: StudentId::new(student_id),
            name: name.into(),
            classroom_name: classroom_name.map(str::to_string),
        }
    }

    /// The classroom this student is grouped under, or `None` when the
    /// roster left it null or blank.
    pub fn classroom(&self) -> Option<&str> {
        self.classroom_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Positive recognition.
    Prs,
    /// Disciplinary point.
    Dps,
}

impl Polarity {
    pub const ALL: [Polarity; 2] = [Polarity::Prs, Polarity::Dps];

    pub fn code(self) -> &'static str {
        match self {
            Polarity::Prs => "prs",
            Polarity::Dps => "dps",
        }
    }

    pub fn matches_item_type(self, item_type: &str) -> bool {
        item_type.trim().eq_ignore_ascii_case(self.code())
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown polarity {0:?}, expected \"prs\" or \"dps\"")]
pub struct UnknownPolarity(pub String);

impl FromStr for Polarity {
    type Err = UnknownPolarity;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Polarity::ALL
            .into_iter()
            .find(|polarity| polarity.matches_item_type(value))
            .ok_or_else(|| UnknownPolarity(value.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisciplineItem {
    pub discipline_item_id: DisciplineItemId,
    pub item_title: String,
    #[serde(deserialize_with = "lenient_points")]
    pub item_point: i32,
    #[serde(default)]
    pub item_type: String,
}

impl DisciplineItem {
    pub fn new(
        discipline_item_id: impl Into<String>,
        item_title: impl Into<String>,
        item_point: i32,
        polarity: Polarity,
    ) -> Self {
        Self {
            discipline_item_id: DisciplineItemId::new(discipline_item_id),
            item_title: item_title.into(),
            item_point,
            item_type: polarity.code().to_string(),
        }
    }

    /// Polarity declared by `item_type`. The sign of `item_point` is expected
    /// to agree but is not checked.
    pub fn polarity(&self) -> Option<Polarity> {
        self.item_type.parse().ok()
    }
}
