use rolodex_core::DatabaseService;

use crate::commands::common::{contact_to_list_item, format_contact_lines, ContactListItem};
use crate::error::CliError;

pub async fn run_list(
    store: &DatabaseService,
    limit: usize,
    offset: usize,
    as_json: bool,
) -> Result<(), CliError> {
    let contacts = store.list_contacts(limit, offset).await?;

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
