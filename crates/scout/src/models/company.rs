use serde::{Deserialize, Serialize};

/// A company in the catalog, as read from the record store
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompanyRecord {
    #[serde(alias = "company_name")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "website_url")]
    pub website: String,
    #[serde(default, alias = "city")]
    pub location: String,
    #[serde(default, alias = "website_text")]
    pub excerpt_text: String,
}

impl CompanyRecord {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_website<S: Into<String>>(mut self, website: S) -> Self {
        self.website = website.into();
        self
    }

    pub fn with_location<S: Into<String>>(mut self, location: S) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_excerpt<S: Into<String>>(mut self, excerpt_text: S) -> Self {
        self.excerpt_text = excerpt_text.into();
        self
    }

    /// The projection of this record sent back to the model.
    ///
    /// The excerpt is left out and the description cut to `description_chars` characters
    /// to keep tool results small.
    pub fn summary(&self, description_chars: usize) -> CompanySummary {
        CompanySummary {
            company_name: self.name.clone(),
            description: self.description.chars().take(description_chars).collect(),
            website_url: self.website.clone(),
            city: self.location.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanySummary {
    pub company_name: String,
    pub description: String,
    pub website_url: String,
    pub city: String,
}
