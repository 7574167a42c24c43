//! Transaction categories and their fixed display tables.
//!
//! Labels and colors are shared by the charts, the transaction table and the CSV export.

use std::fmt::Display;

use rusqlite::{
    ToSql,
    types::{FromSql, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The color used for categories without an entry in the color table.
pub const DEFAULT_CATEGORY_COLOR: &str = "#94a3b8";

/// What a transaction was for.
///
/// Users may type any category when creating a transaction. Categories that
/// are not one of the predefined keys are kept verbatim as [Category::Custom].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Housing,
    Food,
    Transportation,
    Utilities,
    Entertainment,
    Healthcare,
    Salary,
    Investment,
    #[default]
    Other,
    Custom(String),
}

impl Category {
    /// The predefined categories in the order they are offered to the user.
    pub const PREDEFINED: [Category; 9] = [
        Category::Housing,
        Category::Food,
        Category::Transportation,
        Category::Utilities,
        Category::Entertainment,
        Category::Healthcare,
        Category::Salary,
        Category::Investment,
        Category::Other,
    ];

    /// Parse a stored category key.
    ///
    /// Blank keys become [Category::Other], unknown keys become [Category::Custom].
    pub fn from_key(key: &str) -> Self {
        match key.trim() {
            "" | "other" => Category::Other,
            "housing" => Category::Housing,
            "food" => Category::Food,
            "transportation" => Category::Transportation,
            "utilities" => Category::Utilities,
            "entertainment" => Category::Entertainment,
            "healthcare" => Category::Healthcare,
            "salary" => Category::Salary,
            "investment" => Category::Investment,
            custom => Category::Custom(custom.to_owned()),
        }
    }

    /// The key the category is stored and grouped under.
    pub fn key(&self) -> &str {
        match self {
            Category::Housing => "housing",
            Category::Food => "food",
            Category::Transportation => "transportation",
            Category::Utilities => "utilities",
            Category::Entertainment => "entertainment",
            Category::Healthcare => "healthcare",
            Category::Salary => "salary",
            Category::Investment => "investment",
            Category::Other => "other",
            Category::Custom(key) => key,
        }
    }

    /// The Portuguese name shown in tables and exports. Custom categories are shown as typed.
    pub fn label(&self) -> &str {
        match self {
            Category::Housing => "Moradia",
            Category::Food => "Alimentação",
            Category::Transportation => "Transporte",
            Category::Utilities => "Serviços",
            Category::Entertainment => "Entretenimento",
            Category::Healthcare => "Saúde",
            Category::Salary => "Salário",
            Category::Investment => "Investimento",
            Category::Other => "Outros",
            Category::Custom(key) => key,
        }
    }

    /// The name shown in chart legends, custom categories get a leading capital letter.
    pub fn chart_label(&self) -> String {
        match self {
            Category::Custom(key) => capitalize(key),
            predefined => predefined.label().to_owned(),
        }
    }

    /// The hex color used for the category in charts.
    pub fn color(&self) -> &'static str {
        match self {
            Category::Housing => "#22c55e",
            Category::Food => "#3b82f6",
            Category::Transportation => "#f59e0b",
            Category::Utilities => "#a855f7",
            Category::Entertainment => "#ec4899",
            Category::Healthcare => "#ef4444",
            Category::Salary => "#22c55e",
            Category::Investment => "#3b82f6",
            Category::Other | Category::Custom(_) => DEFAULT_CATEGORY_COLOR,
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let key = String::deserialize(deserializer)?;
        Ok(Category::from_key(&key))
    }
}

impl ToSql for Category {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.key()))
    }
}

impl FromSql for Category {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str().map(Category::from_key)
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();

    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
