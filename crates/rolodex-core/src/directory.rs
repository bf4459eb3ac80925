//! Legacy IP-phone directory rendering (`CiscoIPPhone*` XML objects).

use std::fmt::Write as _;

use crate::Contact;

/// Most phones refuse directories with more entries than this
pub const DIRECTORY_PAGE_SIZE: usize = 32;

const MAX_FIELD_CHARS: usize = 32;
const XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// One dialable line of the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub telephone: String,
}

/// Flatten contacts into one entry per phone number. Contacts without a
/// number are left out.
#[must_use]
pub fn directory_entries(contacts: &[Contact]) -> Vec<DirectoryEntry> {
    contacts
        .iter()
        .filter(|contact| !contact.is_deleted)
        .flat_map(|contact| {
            let labelled = contact.phones.len() > 1;
            contact.phones.iter().map(move |phone| {
                let name = match (&phone.label, labelled) {
                    (Some(label), true) => format!("{} ({label})", contact.display_name),
                    _ => contact.display_name.clone(),
                };
                DirectoryEntry {
                    name: truncate(&name),
                    telephone: truncate(&phone.number),
                }
            })
        })
        .collect()
}

/// Number of pages needed for `entries`, never less than one
#[must_use]
pub fn page_count(entries: usize) -> usize {
    entries.div_ceil(DIRECTORY_PAGE_SIZE).max(1)
}

/// Top-level menu offering browse and search
#[must_use]
pub fn render_menu(title: &str, base_url: &str) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "{XML_HEADER}");
    let _ = writeln!(output, "<CiscoIPPhoneMenu>");
    let _ = writeln!(output, "<Title>{}</Title>", xml_escape(title));
    let _ = writeln!(output, "<Prompt>Select an option</Prompt>");
    for (name, path) in [("Browse", "/directory/list"), ("Search", "/directory/search")] {
        let _ = writeln!(
            output,
            "<MenuItem><Name>{name}</Name><URL>{}</URL></MenuItem>",
            xml_escape(&format!("{base_url}{path}"))
        );
    }
    let _ = writeln!(output, "</CiscoIPPhoneMenu>");
    output
}

/// Input form that submits `q` to the directory listing
#[must_use]
pub fn render_search_input(title: &str, base_url: &str) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "{XML_HEADER}");
    let _ = writeln!(output, "<CiscoIPPhoneInput>");
    let _ = writeln!(output, "<Title>{}</Title>", xml_escape(title));
    let _ = writeln!(output, "<Prompt>Enter a name or number</Prompt>");
    let _ = writeln!(
        output,
        "<URL>{}</URL>",
        xml_escape(&format!("{base_url}/directory/list"))
    );
    let _ = writeln!(output, "<InputItem>");
    let _ = writeln!(output, "<DisplayName>Name or number</DisplayName>");
    let _ = writeln!(output, "<QueryStringParam>q</QueryStringParam>");
    let _ = writeln!(output, "<DefaultValue></DefaultValue>");
    let _ = writeln!(output, "<InputFlags>A</InputFlags>");
    let _ = writeln!(output, "</InputItem>");
    let _ = writeln!(output, "</CiscoIPPhoneInput>");
    output
}

/// One page of the directory. `page` is 1-based and clamped to the
/// available range.
#[must_use]
pub fn render_directory_page(
    title: &str,
    base_url: &str,
    entries: &[DirectoryEntry],
    page: usize,
    query: Option<&str>,
) -> String {
    let total_pages = page_count(entries.len());
    let page = page.clamp(1, total_pages);
    let start = (page - 1) * DIRECTORY_PAGE_SIZE;
    let visible = entries.iter().skip(start).take(DIRECTORY_PAGE_SIZE);

    let page_url = |target: usize| {
        let mut url = format!("{base_url}/directory/list?page={target}");
        if let Some(query) = query.filter(|query| !query.trim().is_empty()) {
            let _ = write!(url, "&q={}", urlencoding::encode(query.trim()));
        }
        url
    };

    let mut output = String::new();
    let _ = writeln!(output, "{XML_HEADER}");
    let _ = writeln!(output, "<CiscoIPPhoneDirectory>");
    let _ = writeln!(output, "<Title>{}</Title>", xml_escape(title));
    let _ = writeln!(output, "<Prompt>Page {page} of {total_pages}</Prompt>");
    for entry in visible {
        let _ = writeln!(
            output,
            "<DirectoryEntry><Name>{}</Name><Telephone>{}</Telephone></DirectoryEntry>",
            xml_escape(&entry.name),
            xml_escape(&entry.telephone)
        );
    }

    let mut soft_keys = vec![("Dial", "SoftKey:Dial".to_string())];
    if page < total_pages {
        soft_keys.push(("Next", page_url(page + 1)));
    }
    if page > 1 {
        soft_keys.push(("Previous", page_url(page - 1)));
    }
    soft_keys.push(("Exit", "SoftKey:Exit".to_string()));
    for (position, (name, url)) in soft_keys.iter().enumerate() {
        let _ = writeln!(
            output,
            "<SoftKeyItem><Name>{name}</Name><URL>{}</URL><Position>{}</Position></SoftKeyItem>",
            xml_escape(url),
            position + 1
        );
    }
    let _ = writeln!(output, "</CiscoIPPhoneDirectory>");
    output
}

/// Escape the five XML special characters
#[must_use]
pub fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn truncate(value: &str) -> String {
    value.chars().take(MAX_FIELD_CHARS).collect()
}
