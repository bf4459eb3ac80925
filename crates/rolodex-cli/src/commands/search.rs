use rolodex_core::{Contact, DatabaseService};

use crate::commands::common::{
    contact_to_list_item, format_contact_lines, normalize_search_query, ContactListItem,
};
use crate::error::CliError;

pub async fn search_contacts(
    store: &DatabaseService,
    query: &str,
    limit: usize,
) -> Result<Vec<Contact>, CliError> {
    let normalized_query = normalize_search_query(query)?;
    Ok(store.search_contacts(&normalized_query, limit).await?)
}

pub async fn run_search(
    store: &DatabaseService,
    query: &str,
    limit: usize,
    as_json: bool,
) -> Result<(), CliError> {
    let contacts = search_contacts(store, query, limit).await?;

    if as_json {
        let json_items = contacts
            .iter()
            .map(contact_to_list_item)
            .collect::<Vec<ContactListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_contact_lines(&contacts) {
            println!("{line}");
        }
    }

    Ok(())
}
