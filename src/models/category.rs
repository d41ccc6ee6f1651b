//! Animation category enumeration used to select category-specific rule text

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Domain category assigned to a request by the feasibility classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    /// Function plots, coordinate planes, geometry in the plane
    Graph2d,
    /// Surfaces, 3D axes, camera movement
    Graph3d,
    /// Physical systems and simulations
    Physics,
    /// Charts, distributions, data plots
    Statistics,
    /// Algorithms and data structures
    ComputerDatastructure,
    /// Text-only animations
    Text,
}

impl Category {
    /// Returns the display name for the category
    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Graph2d => "2D Graph",
            Category::Graph3d => "3D Graph",
            Category::Physics => "Physics",
            Category::Statistics => "Statistics",
            Category::ComputerDatastructure => "Data Structures",
            Category::Text => "Text",
        }
    }

    /// Returns the wire tag used in classifier output and rule frontmatter
    pub fn tag(&self) -> &'static str {
        match self {
            Category::Graph2d => "GRAPH2D",
            Category::Graph3d => "GRAPH3D",
            Category::Physics => "PHYSICS",
            Category::Statistics => "STATISTICS",
            Category::ComputerDatastructure => "COMPUTER_DATASTRUCTURE",
            Category::Text => "TEXT",
        }
    }

    /// Returns the default rule file name for this category
    pub fn rule_file_name(&self) -> String {
        format!("{}.md", self.tag().to_lowercase())
    }

    /// Returns all categories
    pub fn all() -> &'static [Category] {
        &[
            Category::Graph2d,
            Category::Graph3d,
            Category::Physics,
            Category::Statistics,
            Category::ComputerDatastructure,
            Category::Text,
        ]
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::Graph2d
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl FromStr for Category {
    type Err = String;

    /// Lenient parse: case and separators are ignored ("graph-2d", "Graph2D", "GRAPH_2D")
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_uppercase();

        match normalized.as_str() {
            "GRAPH2D" | "2D" => Ok(Category::Graph2d),
            "GRAPH3D" | "3D" => Ok(Category::Graph3d),
            "PHYSICS" => Ok(Category::Physics),
            "STATISTICS" | "STATS" => Ok(Category::Statistics),
            "COMPUTERDATASTRUCTURE" | "COMPUTERDATASTRUCTURES" | "DATASTRUCTURE" => {
                Ok(Category::ComputerDatastructure)
            }
            "TEXT" => Ok(Category::Text),
            _ => Err(format!("unknown category '{}'", s)),
        }
    }
}
