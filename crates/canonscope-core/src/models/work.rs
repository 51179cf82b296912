use serde::{Deserialize, Serialize};

/// One row of the metadata table: a literary work of the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkMetadata {
    #[serde(rename = "xmlid")]
    pub id: String,
    pub basename: String,
    pub title: String,
    #[serde(rename = "au-name")]
    pub author: String,
}

impl WorkMetadata {
    pub fn new(
        id: impl Into<String>,
        basename: impl Into<String>,
        title: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            basename: basename.into(),
            title: title.into(),
            author: author.into(),
        }
    }

    /// Title as sent to the catalog: the collection's edition suffix is dropped.
    pub fn search_title(&self) -> &str {
        self.title.split(": ELT").next().unwrap_or("").trim()
    }

    /// Author as sent to the catalog: the surname part before the first comma.
    pub fn search_author(&self) -> &str {
        self.author.split(',').next().unwrap_or("").trim()
    }
}
