//! Markdown helpers shared by the per-type parsers.
//!
//! Only the small subset of Markdown that documentation files use is
//! recognised: ATX headings, `**Key:** value` lines, pipe tables and
//! bullet lists.

use crate::error::ParseError;
use crate::models::Section;

pub const SUMMARY_MAX_CHARS: usize = 280;

const FRONT_MATTER_DELIM: &str = "+++";

/// Split an optional `+++` TOML front-matter block from the body.
pub fn split_front_matter(text: &str) -> Result<(Option<&str>, &str), ParseError> {
    let trimmed = text.trim_start_matches('\u{feff}');
    let mut lines = trimmed.split_inclusive('\n');
    match lines.next() {
        Some(first) if first.trim_end() == FRONT_MATTER_DELIM => {}
        _ => return Ok((None, trimmed)),
    }

    let start = trimmed.find('\n').map(|i| i + 1).unwrap_or(trimmed.len());
    let mut offset = start;
    for line in trimmed[start..].split_inclusive('\n') {
        if line.trim_end() == FRONT_MATTER_DELIM {
            let front = &trimmed[start..offset];
            let body = &trimmed[offset + line.len()..];
            return Ok((Some(front), body));
        }
        offset += line.len();
    }
    Err(ParseError::UnclosedFrontMatter)
}

/// Parse a front-matter block into a typed struct.
pub fn parse_front<T>(front: Option<&str>) -> Result<T, ParseError>
where
    T: serde::de::DeserializeOwned + Default,
{
    match front {
        Some(raw) => toml::from_str(raw).map_err(|e| ParseError::FrontMatter(e.message().to_string())),
        None => Ok(T::default()),
    }
}

fn heading(line: &str) -> Option<(u8, &str)> {
    let trimmed = line.trim_start();
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &trimmed[level..];
    if !rest.is_empty() && !rest.starts_with(' ') {
        return None;
    }
    Some((level as u8, rest.trim()))
}

/// Every heading with the text beneath it, up to the next heading.
pub fn sections(body: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current: Option<Section> = None;
    for line in body.lines() {
        if let Some((level, text)) = heading(line) {
            if let Some(mut done) = current.take() {
                done.body = done.body.trim().to_string();
                sections.push(done);
            }
            current = Some(Section {
                level,
                heading: text.to_string(),
                body: String::new(),
            });
        } else if let Some(section) = current.as_mut() {
            section.body.push_str(line);
            section.body.push('\n');
        }
    }
    if let Some(mut done) = current {
        done.body = done.body.trim().to_string();
        sections.push(done);
    }
    sections
}

/// Find a section by heading, ignoring case.
pub fn section<'a>(sections: &'a [Section], name: &str) -> Option<&'a Section> {
    sections
        .iter()
        .find(|s| s.heading.eq_ignore_ascii_case(name))
}

/// Text of the first level-1 heading.
pub fn title_heading(body: &str) -> Option<&str> {
    body.lines().find_map(|line| match heading(line) {
        Some((1, text)) if !text.is_empty() => Some(text),
        _ => None,
    })
}

/// Value of a title heading with the given prefix, e.g. `Table:`.
pub fn prefixed_title<'a>(body: &'a str, prefix: &str) -> Option<&'a str> {
    let title = title_heading(body)?;
    let (head, rest) = title.split_once(':')?;
    if head.trim().eq_ignore_ascii_case(prefix) {
        let rest = rest.trim();
        (!rest.is_empty()).then_some(rest)
    } else {
        None
    }
}

/// Value of a `**Key:** value` line (also accepts `**Key**: value`).
pub fn bold_field<'a>(body: &'a str, key: &str) -> Option<&'a str> {
    for line in body.lines() {
        let line = line.trim().trim_start_matches("- ").trim();
        let Some(rest) = line.strip_prefix("**") else {
            continue;
        };
        let Some((label, value)) = rest.split_once("**") else {
            continue;
        };
        let label = label.trim().trim_end_matches(':').trim();
        if label.eq_ignore_ascii_case(key) {
            let value = value.trim().trim_start_matches(':').trim();
            if !value.is_empty() {
                return Some(value);
            }
        }
    }
    None
}

/// Rows of the first pipe table in `text`. The first row is the header;
/// the `|---|` separator row is dropped.
pub fn table_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut started = false;
    for line in text.lines() {
        let line = line.trim();
        if !line.starts_with('|') {
            if started {
                break;
            }
            continue;
        }
        started = true;
        let cells: Vec<String> = line
            .trim_matches('|')
            .split('|')
            .map(|c| c.trim().trim_matches('`').trim().to_string())
            .collect();
        let is_separator = cells
            .iter()
            .all(|c| !c.is_empty() && c.chars().all(|ch| matches!(ch, '-' | ':' | ' ')));
        if !is_separator {
            rows.push(cells);
        }
    }
    rows
}

/// Text of each `-`/`*` bullet line.
pub fn bullets(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim();
            line.strip_prefix("- ")
                .or_else(|| line.strip_prefix("* "))
                .map(|item| item.trim().trim_matches('`').trim().to_string())
        })
        .filter(|item| !item.is_empty())
        .collect()
}

/// First paragraph that is not a heading, key line, table or list.
pub fn first_paragraph(body: &str) -> Option<String> {
    let mut paragraph: Vec<&str> = Vec::new();
    for line in body.lines() {
        let trimmed = line.trim();
        let structural = heading(trimmed).is_some()
            || trimmed.starts_with("**")
            || trimmed.starts_with('|')
            || trimmed.starts_with("- ")
            || trimmed.starts_with("* ");
        if trimmed.is_empty() || structural {
            if !paragraph.is_empty() {
                break;
            }
            continue;
        }
        paragraph.push(trimmed);
    }
    (!paragraph.is_empty()).then(|| paragraph.join(" "))
}

/// Truncate to at most `max` characters, on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].trim_end().to_string(),
        None => text.to_string(),
    }
}

/// Front-matter summary, else the first paragraph, capped in length.
pub fn summary(front: Option<&str>, body: &str) -> String {
    let raw = front
        .map(str::to_string)
        .filter(|s| !s.trim().is_empty())
        .or_else(|| first_paragraph(body))
        .unwrap_or_default();
    truncate_chars(raw.trim(), SUMMARY_MAX_CHARS)
}

/// Split a comma-separated list, dropping empty items.
pub fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(|s| s.trim().trim_matches('`').trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
