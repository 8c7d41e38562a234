use anyhow::{anyhow, Result};
use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::LazyLock;

use crate::models::{company_is_specified, CurriculumVitae, CvTransformationPlan, JobPosting};

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s<>"{}|\\^`\[\]]+"#).expect("URL pattern is valid")
});

/// Key that carries a document title when converting untyped JSON.
pub const TITLE_KEY: &str = "_title";

const MAX_INLINE_CHARS: usize = 80;
const MAX_LINK_TEXT_CHARS: usize = 60;
const TRUNCATED_LINK_TEXT_CHARS: usize = 57;

/// Fields tried, in order, to name an item of a structured list.
const ITEM_TITLE_FIELDS: [&str; 5] = ["title", "name", "company", "degree", "language"];

// --- Document tree ---

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Empty,
    Text(String),
    /// Numbers and booleans, rendered verbatim.
    Scalar(String),
    List(Vec<Node>),
    Map(Document),
}

impl Node {
    fn is_empty(&self) -> bool {
        match self {
            Node::Empty => true,
            Node::Text(s) => s.is_empty(),
            Node::List(items) => items.is_empty(),
            Node::Scalar(_) | Node::Map(_) => false,
        }
    }

    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Node::Empty,
            Value::String(s) => Node::Text(s.clone()),
            Value::Bool(b) => Node::Scalar(b.to_string()),
            Value::Number(n) => Node::Scalar(n.to_string()),
            Value::Array(items) => Node::List(items.iter().map(Node::from_json).collect()),
            Value::Object(map) => Node::Map(Document::from_json(map)),
        }
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::Text(s)
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::Text(s.to_string())
    }
}

impl From<&String> for Node {
    fn from(s: &String) -> Self {
        Node::Text(s.clone())
    }
}

impl<T: Into<Node>> From<Option<T>> for Node {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Node::Empty)
    }
}

impl<T: Into<Node>> From<Vec<T>> for Node {
    fn from(items: Vec<T>) -> Self {
        Node::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<&Vec<String>> for Node {
    fn from(items: &Vec<String>) -> Self {
        Node::List(items.iter().map(Node::from).collect())
    }
}

impl From<Document> for Node {
    fn from(doc: Document) -> Self {
        Node::Map(doc)
    }
}

/// An ordered set of labelled fields with an optional heading.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub title: Option<String>,
    pub fields: Vec<(String, Node)>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            fields: Vec::new(),
        }
    }

    /// Adds a field unless its value is empty; empty values never render.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<Node>) {
        let node = value.into();
        if !node.is_empty() {
            self.fields.push((key.into(), node));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn text_field(&self, key: &str) -> Option<&str> {
        self.fields.iter().find_map(|(k, node)| match node {
            Node::Text(s) if k == key && !s.is_empty() => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn from_json(map: &serde_json::Map<String, Value>) -> Self {
        let mut doc = Document::new();
        for (key, value) in map {
            if key == TITLE_KEY {
                if let Value::String(title) = value {
                    doc.title = Some(title.clone());
                }
                continue;
            }
            doc.push(key.clone(), Node::from_json(value));
        }
        doc
    }
}

// --- Composition ---

/// Type-specific selection and grouping of fields for the markdown mirror.
pub trait ComposeMarkdown {
    fn compose(&self) -> Document;
}

impl ComposeMarkdown for JobPosting {
    fn compose(&self) -> Document {
        let company_known = company_is_specified(&self.company);
        let mut doc = if company_known {
            Document::titled(format!("{} at {}", self.title, self.company))
        } else {
            Document::titled(self.title.clone())
        };

        doc.push("original_posting", &self.url);
        if company_known {
            doc.push("company", &self.company);
        }
        doc.push("industry", &self.industry);
        doc.push("experience_level", &self.experience_level);
        doc.push("description", &self.description);

        let mut requirements = Document::new();
        requirements.push("education", &self.education);
        requirements.push("years_experience", self.years_experience.clone());
        requirements.push("must_have", &self.hard_requirements);
        if !requirements.is_empty() {
            doc.push("requirements", requirements);
        }

        let mut skills = Document::new();
        skills.push("technical", &self.technical_skills);
        skills.push("soft", &self.soft_skills);
        skills.push("preferred", &self.preferred_skills);
        if !skills.is_empty() {
            doc.push("skills", skills);
        }

        doc.push("responsibilities", &self.responsibilities);

        let mut ats = Document::new();
        ats.push("keywords", &self.keywords);
        ats.push("tools_and_technologies", &self.tools_and_tech);
        if !ats.is_empty() {
            doc.push("ats_optimization", ats);
        }

        doc
    }
}

impl ComposeMarkdown for CurriculumVitae {
    fn compose(&self) -> Document {
        let mut doc = Document::titled(self.name.clone());

        let mut contact = Document::new();
        contact.push("email", &self.contact.email);
        contact.push("phone", &self.contact.phone);
        if !self.contact.city.is_empty() && !self.contact.state.is_empty() {
            contact.push(
                "location",
                format!("{}, {}", self.contact.city, self.contact.state),
            );
        }
        contact.push("linkedin", &self.contact.linkedin);
        contact.push("github", &self.contact.github);
        if !contact.is_empty() {
            doc.push("contact", contact);
        }

        doc.push("profession", &self.profession);
        doc.push("core_expertise", &self.core_expertise);
        doc.push("summary", &self.summary_of_qualifications);

        let experience: Vec<Document> = self
            .experience
            .iter()
            .map(|exp| {
                let mut item = Document::new();
                item.push("title", &exp.title);
                item.push("company", &exp.company);
                item.push("location", &exp.location);
                item.push("dates", format!("{} - {}", exp.start_date, exp.end_date));
                item.push("responsibilities", exp.responsibilities.clone());
                item
            })
            .collect();
        doc.push("experience", experience);

        let additional: Vec<Document> = self
            .additional_experience
            .iter()
            .map(|exp| {
                let mut item = Document::new();
                item.push("title", &exp.title);
                item.push("company", &exp.company);
                item.push("dates", format!("{} - {}", exp.start_date, exp.end_date));
                item
            })
            .collect();
        doc.push("additional_experience", additional);

        let education: Vec<Document> = self
            .education
            .iter()
            .map(|edu| {
                let mut item = Document::new();
                item.push("degree", &edu.degree);
                item.push("institution", &edu.institution);
                item.push("location", &edu.location);
                item.push("dates", format!("{} - {}", edu.start_date, edu.end_date));
                item.push("coursework", &edu.coursework);
                item
            })
            .collect();
        doc.push("education", education);

        let mut skills = Document::new();
        for area in &self.areas_of_expertise {
            skills.push(area.name.clone(), &area.skills);
        }
        if !skills.is_empty() {
            doc.push("skills", skills);
        }

        let mut languages = Document::new();
        for lang in &self.languages {
            languages.push(lang.language.clone(), &lang.level);
        }
        if !languages.is_empty() {
            doc.push("languages", languages);
        }

        doc
    }
}

impl ComposeMarkdown for CvTransformationPlan {
    fn compose(&self) -> Document {
        let mut doc = Document::titled(format!(
            "Transformation Plan: {} at {}",
            self.job_title, self.company
        ));

        let mut alignment = Document::new();
        alignment.push("matching_skills", &self.matching_skills);
        alignment.push("missing_skills", &self.missing_skills);
        alignment.push("transferable_skills", &self.transferable_skills);
        if !alignment.is_empty() {
            doc.push("alignment_analysis", alignment);
        }

        let mut transformations = Document::new();
        transformations.push("profession_update", self.profession_update.clone());
        transformations.push("core_expertise_updates", &self.core_expertise_updates);
        transformations.push("summary_updates", &self.summary_updates);
        transformations.push("experience_updates", &self.experience_updates);
        if !transformations.is_empty() {
            doc.push("transformations", transformations);
        }

        let mut ats = Document::new();
        ats.push("keyword_insertions", &self.keyword_insertions);
        ats.push("quantification_suggestions", &self.quantification_suggestions);
        if !ats.is_empty() {
            doc.push("ats_optimization", ats);
        }

        doc.push("evidence_sources", &self.evidence_sources);

        doc
    }
}

// --- Conversion entry points ---

pub fn convert<T: ComposeMarkdown>(record: &T) -> String {
    render(&record.compose(), 1)
}

/// Converts a record with no composer by rendering its fields as they are.
pub fn convert_value(value: &Value) -> Result<String> {
    match value {
        Value::Object(map) => Ok(render(&Document::from_json(map), 1)),
        other => Err(anyhow!(
            "Cannot convert a non-object value to markdown: {}",
            other
        )),
    }
}

// --- Rendering ---

pub fn render(doc: &Document, level: usize) -> String {
    render_fields(doc.title.as_deref(), &doc.fields, level)
}

fn render_fields(title: Option<&str>, fields: &[(String, Node)], level: usize) -> String {
    let mut parts = Vec::new();
    let mut level = level;

    if let Some(title) = title.filter(|t| !t.is_empty()) {
        parts.push(format!("{} {}\n", heading(level), title));
        level += 1;
    }

    for (key, node) in fields {
        let formatted = format_field(&key_to_label(key), node, level);
        if !formatted.is_empty() {
            parts.push(formatted);
        }
    }

    parts.join("\n")
}

fn format_field(label: &str, node: &Node, level: usize) -> String {
    if node.is_empty() {
        return String::new();
    }

    match node {
        Node::Text(text) => {
            let text = linkify_urls(text);
            if text.chars().count() < MAX_INLINE_CHARS && !text.contains('\n') {
                format!("**{}:** {}\n", label, text)
            } else {
                format!("**{}:**\n\n{}\n", label, text)
            }
        }
        Node::Scalar(value) => format!("**{}:** {}\n", label, value),
        Node::List(items) => {
            let strings: Option<Vec<&str>> = items
                .iter()
                .map(|item| match item {
                    Node::Text(s) => Some(s.as_str()),
                    _ => None,
                })
                .collect();

            if let Some(strings) = strings {
                let bullets: Vec<String> = strings
                    .iter()
                    .map(|s| format!("- {}", linkify_urls(s)))
                    .collect();
                return format!("**{}:**\n\n{}\n", label, bullets.join("\n"));
            }

            let mut parts = vec![format!("{} {}\n", heading(level), label)];
            for (i, item) in items.iter().enumerate() {
                if let Node::Map(doc) = item {
                    let title = doc
                        .title
                        .clone()
                        .or_else(|| item_title(doc))
                        .unwrap_or_else(|| format!("Item {}", i + 1));
                    parts.push(render_fields(Some(&title), &doc.fields, level + 1));
                }
            }
            parts.join("\n")
        }
        Node::Map(doc) => format!("{} {}\n\n{}", heading(level), label, render(doc, level + 1)),
        Node::Empty => String::new(),
    }
}

fn heading(level: usize) -> String {
    "#".repeat(level)
}

fn item_title(doc: &Document) -> Option<String> {
    ITEM_TITLE_FIELDS
        .iter()
        .find_map(|field| doc.text_field(field))
        .map(str::to_string)
}

/// `technical_skills` -> `Technical Skills`
pub fn key_to_label(key: &str) -> String {
    let mut label = String::with_capacity(key.len());
    let mut prev_is_letter = false;
    for c in key.replace('_', " ").chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                label.extend(c.to_lowercase());
            } else {
                label.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            label.push(c);
            prev_is_letter = false;
        }
    }
    label
}

pub fn linkify_urls(text: &str) -> String {
    URL_PATTERN
        .replace_all(text, |caps: &Captures| {
            let url = &caps[0];
            let display = if url.chars().count() > MAX_LINK_TEXT_CHARS {
                let prefix: String = url.chars().take(TRUNCATED_LINK_TEXT_CHARS).collect();
                format!("{}...", prefix)
            } else {
                url.to_string()
            };
            format!("[{}]({})", display, url)
        })
        .into_owned()
}
