//! Domain and overview documents.

use serde::Deserialize;

use super::markdown;
use crate::error::ParseError;
use crate::models::{DocCommon, DomainDoc, OverviewDoc, TableRef};

#[derive(Debug, Default, Deserialize)]
struct DomainFront {
    database: Option<String>,
    domain: Option<String>,
    summary: Option<String>,
    #[serde(default)]
    tables: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OverviewFront {
    database: Option<String>,
    title: Option<String>,
    summary: Option<String>,
}

fn database_of(front: Option<String>, body: &str, default_database: &str) -> String {
    front
        .or_else(|| markdown::bold_field(body, "database").map(str::to_string))
        .unwrap_or_else(|| default_database.to_string())
}

pub fn parse_domain(text: &str, default_database: &str) -> Result<DomainDoc, ParseError> {
    let (front_raw, body) = markdown::split_front_matter(text)?;
    let front: DomainFront = markdown::parse_front(front_raw)?;
    let sections = markdown::sections(body);

    let domain = front
        .domain
        .clone()
        .or_else(|| markdown::prefixed_title(body, "domain").map(str::to_string))
        .filter(|d| !d.trim().is_empty())
        .ok_or(ParseError::MissingField("domain"))?;

    let raw_tables = if front.tables.is_empty() {
        markdown::section(&sections, "tables")
            .map(|s| markdown::bullets(&s.body))
            .unwrap_or_default()
    } else {
        front.tables
    };
    let mut tables = Vec::new();
    for raw in raw_tables {
        // Bullets may carry a trailing description: `public.orders: ...`.
        let name = raw
            .split([':', ' '])
            .next()
            .unwrap_or_default()
            .to_string();
        let table = TableRef::parse(&name).ok_or(ParseError::BadTableRef(raw))?;
        if !tables.contains(&table) {
            tables.push(table);
        }
    }

    Ok(DomainDoc {
        common: DocCommon {
            database: database_of(front.database, body, default_database),
            summary: markdown::summary(front.summary.as_deref(), body),
            content: body.trim().to_string(),
            sections,
        },
        domain: domain.trim().to_string(),
        tables,
    })
}

pub fn parse_overview(text: &str, default_database: &str) -> Result<OverviewDoc, ParseError> {
    let (front_raw, body) = markdown::split_front_matter(text)?;
    let front: OverviewFront = markdown::parse_front(front_raw)?;
    let sections = markdown::sections(body);

    let title = front
        .title
        .clone()
        .or_else(|| markdown::prefixed_title(body, "overview").map(str::to_string))
        .or_else(|| markdown::title_heading(body).map(str::to_string))
        .unwrap_or_else(|| "overview".to_string());

    Ok(OverviewDoc {
        common: DocCommon {
            database: database_of(front.database, body, default_database),
            summary: markdown::summary(front.summary.as_deref(), body),
            content: body.trim().to_string(),
            sections,
        },
        title: title.trim().to_string(),
    })
}
